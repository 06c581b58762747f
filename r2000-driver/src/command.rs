use crate::constants::{
    COMMAND_BASE_PATH, DEFAULT_WATCHDOG_TIMEOUT_MS, MISSING_PARAMETER_VALUE, PACKET_TYPE,
};
use crate::error::{R2000Error, Result};
use r2000_data::{HandleInfo, HandleType, ParameterMap, ProtocolInfo};
use serde_json::Value;
use std::net::UdpSocket;
use std::time::Duration;
use tracing::{debug, warn};

/// Client of the scanner's HTTP/JSON command interface.
///
/// Every command is one synchronous `GET /cmd/<command>?<params>`. Transport
/// failures, non-200 replies, unparsable bodies and device-reported errors
/// all come back as `Err`.
pub struct CommandChannel {
    host: String,
    port: u16,
    agent: ureq::Agent,
}

impl CommandChannel {
    pub fn new(host: &str, port: u16) -> CommandChannel {
        CommandChannel::with_timeout(host, port, Duration::from_secs(20))
    }

    pub fn with_timeout(host: &str, port: u16, timeout: Duration) -> CommandChannel {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        CommandChannel {
            host: host.to_string(),
            port,
            agent,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn send_http_command(&self, command: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = format!(
            "http://{}:{}{}/{}",
            self.host, self.port, COMMAND_BASE_PATH, command
        );
        let mut request = self.agent.get(&url);
        for (key, value) in params {
            request = request.query(*key, *value);
        }

        let mut response = request.call()?;
        let status = response.status().as_u16();
        let body = response.body_mut().read_to_string()?;
        if status != 200 {
            return Err(R2000Error::CommandFailed {
                command: command.to_string(),
                reason: format!("HTTP status {}", status),
            });
        }
        serde_json::from_str(&body)
            .map_err(|e| R2000Error::InvalidResponse(format!("{}: {}", command, e)))
    }

    /// Sends a command and requires the device to report success.
    fn execute(&self, command: &str, params: &[(&str, &str)]) -> Result<Value> {
        debug!(command, ?params, "sending command");
        let result = self
            .send_http_command(command, params)
            .and_then(|json| check_error_code(&json).map(|_| json));
        if let Err(e) = &result {
            warn!(command, error = %e, "command failed");
        }
        result
    }

    pub fn get_parameter(&self, name: &str) -> Result<String> {
        let json = self.execute("get_parameter", &[("list", name)])?;
        json.get(name)
            .map(value_to_string)
            .ok_or_else(|| R2000Error::InvalidResponse(format!("parameter {} missing", name)))
    }

    pub fn set_parameter(&self, name: &str, value: &str) -> Result<()> {
        self.execute("set_parameter", &[(name, value)]).map(|_| ())
    }

    /// Reads several parameters at once. Names the device does not report
    /// are mapped to a placeholder value instead of being omitted.
    pub fn get_parameters(&self, names: &[String]) -> Result<ParameterMap> {
        if names.is_empty() {
            return Ok(ParameterMap::new());
        }
        let list = names.join(";");
        let json = self.execute("get_parameter", &[("list", &list)])?;
        Ok(parse_parameters(&json, names))
    }

    pub fn get_parameter_list(&self) -> Result<Vec<String>> {
        let json = self.execute("list_parameters", &[])?;
        string_array(&json, "parameters")
    }

    pub fn get_protocol_info(&self) -> Result<ProtocolInfo> {
        let json = self.execute("get_protocol_info", &[])?;
        parse_protocol_info(&json)
    }

    pub fn request_handle_tcp(&self, start_angle: i32) -> Result<HandleInfo> {
        let start_angle_str = start_angle.to_string();
        let json = self.execute(
            "request_handle_tcp",
            &[("packet_type", PACKET_TYPE), ("start_angle", &start_angle_str)],
        )?;
        let handle = handle_string(&json)?;
        let port = json
            .get("port")
            .and_then(Value::as_u64)
            .and_then(|p| u16::try_from(p).ok())
            .ok_or_else(|| R2000Error::InvalidResponse("missing or invalid port".into()))?;
        Ok(new_handle_info(
            handle,
            HandleType::Tcp,
            self.host.clone(),
            port,
            start_angle,
        ))
    }

    /// Requests a UDP handle. An empty `hostname` is replaced by the local
    /// address facing the scanner.
    pub fn request_handle_udp(
        &self,
        port: u16,
        hostname: &str,
        start_angle: i32,
    ) -> Result<HandleInfo> {
        let hostname = match hostname {
            "" => self.discover_local_ip().unwrap_or_default(),
            h => h.to_string(),
        };
        let port_str = port.to_string();
        let start_angle_str = start_angle.to_string();
        let json = self.execute(
            "request_handle_udp",
            &[
                ("packet_type", PACKET_TYPE),
                ("start_angle", &start_angle_str),
                ("port", &port_str),
                ("address", &hostname),
            ],
        )?;
        let handle = handle_string(&json)?;
        Ok(new_handle_info(
            handle,
            HandleType::Udp,
            hostname,
            port,
            start_angle,
        ))
    }

    pub fn release_handle(&self, handle: &str) -> Result<()> {
        self.execute("release_handle", &[("handle", handle)])
            .map(|_| ())
    }

    pub fn start_scan_output(&self, handle: &str) -> Result<()> {
        self.execute("start_scanoutput", &[("handle", handle)])
            .map(|_| ())
    }

    pub fn stop_scan_output(&self, handle: &str) -> Result<()> {
        self.execute("stop_scanoutput", &[("handle", handle)])
            .map(|_| ())
    }

    pub fn feed_watchdog(&self, handle: &str) -> Result<()> {
        self.execute("feed_watchdog", &[("handle", handle)])
            .map(|_| ())
    }

    pub fn reboot_device(&self) -> Result<()> {
        self.execute("reboot_device", &[]).map(|_| ())
    }

    pub fn reset_parameters(&self, names: &[String]) -> Result<()> {
        let list = names.join(";");
        self.execute("reset_parameter", &[("list", &list)])
            .map(|_| ())
    }

    /// Best-effort discovery of the local address used to reach the scanner.
    pub fn discover_local_ip(&self) -> Option<String> {
        let discover = || -> std::io::Result<String> {
            let socket = UdpSocket::bind("0.0.0.0:0")?;
            socket.connect((self.host.as_str(), self.port))?;
            Ok(socket.local_addr()?.ip().to_string())
        };
        match discover() {
            Ok(ip) => Some(ip),
            Err(e) => {
                warn!(error = %e, "could not discover local IP address");
                None
            }
        }
    }
}

/// Requires `error_code == 0` and `error_text == "success"`.
pub(crate) fn check_error_code(json: &Value) -> Result<()> {
    let code = json.get("error_code").and_then(Value::as_i64);
    let text = json.get("error_text").and_then(Value::as_str);
    match (code, text) {
        (Some(0), Some("success")) => Ok(()),
        (code, Some(text)) => {
            warn!("scanner replied: {}", text);
            Err(R2000Error::DeviceError {
                code: code.unwrap_or(-1),
                text: text.to_string(),
            })
        }
        _ => Err(R2000Error::InvalidResponse(
            "reply lacks error_code or error_text".into(),
        )),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn string_array(json: &Value, key: &str) -> Result<Vec<String>> {
    let array = json
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| R2000Error::InvalidResponse(format!("{} is not an array", key)))?;
    Ok(array.iter().map(value_to_string).collect())
}

fn handle_string(json: &Value) -> Result<String> {
    json.get("handle")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| R2000Error::InvalidResponse("missing handle".into()))
}

pub(crate) fn parse_parameters(json: &Value, names: &[String]) -> ParameterMap {
    names
        .iter()
        .map(|name| {
            let value = json
                .get(name)
                .map(value_to_string)
                .unwrap_or_else(|| MISSING_PARAMETER_VALUE.to_string());
            (name.clone(), value)
        })
        .collect()
}

pub(crate) fn parse_protocol_info(json: &Value) -> Result<ProtocolInfo> {
    let protocol_name = json.get("protocol_name").and_then(Value::as_str);
    let version_major = json.get("version_major").and_then(Value::as_i64);
    let version_minor = json.get("version_minor").and_then(Value::as_i64);
    match (protocol_name, version_major, version_minor) {
        (Some(name), Some(major), Some(minor)) => Ok(ProtocolInfo {
            protocol_name: name.to_string(),
            version_major: major,
            version_minor: minor,
            commands: string_array(json, "commands")?,
        }),
        _ => Err(R2000Error::InvalidResponse(
            "incomplete protocol info".into(),
        )),
    }
}

fn new_handle_info(
    handle: String,
    handle_type: HandleType,
    hostname: String,
    port: u16,
    start_angle: i32,
) -> HandleInfo {
    HandleInfo {
        handle,
        handle_type,
        hostname,
        port,
        packet_type: 'C',
        start_angle,
        watchdog_enabled: true,
        watchdog_timeout: DEFAULT_WATCHDOG_TIMEOUT_MS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// Answers one HTTP request on a loopback port with a fixed reply.
    fn respond_once(status: &str, body: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let status = status.to_string();
        std::thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 512];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match conn.read(&mut buf) {
                    Ok(0) | Err(_) => return,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let reply = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = conn.write_all(reply.as_bytes());
        });
        port
    }

    #[test]
    fn test_check_error_code() {
        assert!(check_error_code(&json!({"error_code": 0, "error_text": "success"})).is_ok());

        assert!(matches!(
            check_error_code(&json!({"error_code": 110, "error_text": "invalid handle"})),
            Err(R2000Error::DeviceError { code: 110, .. })
        ));
        assert!(matches!(
            check_error_code(&json!({"error_code": 0, "error_text": "fine"})),
            Err(R2000Error::DeviceError { code: 0, .. })
        ));
        assert!(matches!(
            check_error_code(&json!({"error_code": 0})),
            Err(R2000Error::InvalidResponse(_))
        ));
        assert!(matches!(
            check_error_code(&json!({"error_code": "0", "error_text": "success"})),
            Err(R2000Error::DeviceError { code: -1, .. })
        ));
    }

    #[test]
    fn test_parse_parameters() {
        let reply = json!({
            "error_code": 0,
            "error_text": "success",
            "scan_frequency": 35,
            "scan_direction": "ccw",
        });
        let names = vec![
            "scan_frequency".to_string(),
            "scan_direction".to_string(),
            "serial".to_string(),
        ];
        let params = parse_parameters(&reply, &names);
        assert_eq!(params.len(), 3);
        assert_eq!(params["scan_frequency"], "35");
        assert_eq!(params["scan_direction"], "ccw");
        assert_eq!(params["serial"], MISSING_PARAMETER_VALUE);
    }

    #[test]
    fn test_parse_protocol_info() {
        let reply = json!({
            "protocol_name": "pfsdp",
            "version_major": 1,
            "version_minor": 2,
            "commands": ["get_protocol_info", "feed_watchdog"],
            "error_code": 0,
            "error_text": "success",
        });
        let info = parse_protocol_info(&reply).unwrap();
        assert_eq!(info.protocol_name, "pfsdp");
        assert_eq!(info.version_major, 1);
        assert_eq!(info.version_minor, 2);
        assert!(info.supports("feed_watchdog"));

        let incomplete = json!({"protocol_name": "pfsdp", "version_major": 1});
        assert!(parse_protocol_info(&incomplete).is_err());
    }

    #[test]
    fn test_unreachable_device() {
        // nothing listens on the discard port of the loopback interface
        let channel = CommandChannel::with_timeout("127.0.0.1", 9, Duration::from_millis(500));
        assert!(channel.get_protocol_info().is_err());
        assert!(channel.feed_watchdog("abc").is_err());
    }

    #[test]
    fn test_http_error_status() {
        let port = respond_once(
            "500 Internal Server Error",
            r#"{"error_code":0,"error_text":"success"}"#,
        );
        let channel = CommandChannel::with_timeout("127.0.0.1", port, Duration::from_secs(2));
        match channel.feed_watchdog("s1") {
            Err(R2000Error::CommandFailed { command, reason }) => {
                assert_eq!(command, "feed_watchdog");
                assert_eq!(reason, "HTTP status 500");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_unparsable_reply() {
        let port = respond_once("200 OK", "not json");
        let channel = CommandChannel::with_timeout("127.0.0.1", port, Duration::from_secs(2));
        assert!(matches!(
            channel.feed_watchdog("s1"),
            Err(R2000Error::InvalidResponse(_))
        ));
    }
}
