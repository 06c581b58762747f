#![allow(dead_code)]

use r2000_data::PACKET_TYPE_C;
use r2000_driver::{Packet, PacketHeader};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream, UdpSocket};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Builds the byte stream of one scan split into packets.
pub fn scan_bytes(scan_number: u16, points: u16, per_packet: u16) -> Vec<u8> {
    let mut out = Vec::new();
    let mut first_index = 0;
    let mut packet_number = 1;
    while first_index < points {
        let n = per_packet.min(points - first_index);
        let distances: Vec<u32> = (first_index..first_index + n)
            .map(|i| 1000 + i as u32)
            .collect();
        let packet = Packet {
            header: PacketHeader {
                magic: 0x5CA2,
                packet_type: PACKET_TYPE_C,
                packet_size: 60 + 4 * n as u32,
                header_size: 60,
                scan_number,
                packet_number,
                scan_frequency: 10000,
                num_points_scan: points,
                num_points_packet: n,
                first_index,
                first_angle: -1_800_000,
                angular_increment: 3_600_000 / points as i32,
                ..Default::default()
            },
            amplitudes: vec![500; n as usize],
            distances,
        };
        out.extend(packet.to_bytes());
        first_index += n;
        packet_number += 1;
    }
    out
}

/// Stream of `scans` consecutive scans of `points` points each.
pub fn stream_bytes(scans: u16, points: u16, per_packet: u16) -> Vec<u8> {
    (0..scans)
        .flat_map(|s| scan_bytes(s, points, per_packet))
        .collect()
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap();
                out.push(u8::from_str_radix(hex, 16).unwrap());
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).unwrap()
}

/// Command name and decoded query parameters of one request.
#[derive(Clone, Debug)]
pub struct Request {
    pub command: String,
    pub params: BTreeMap<String, String>,
}

fn parse_request_line(line: &str) -> Request {
    // GET /cmd/<command>?<query> HTTP/1.1
    let target = line.split_whitespace().nth(1).unwrap_or("");
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let command = path.trim_start_matches("/cmd/").to_string();
    let params = query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|p| {
            let (k, v) = p.split_once('=').unwrap_or((p, ""));
            (percent_decode(k), percent_decode(v))
        })
        .collect();
    Request { command, params }
}

fn success(mut body: Value) -> Value {
    body["error_code"] = json!(0);
    body["error_text"] = json!("success");
    body
}

struct State {
    version_major: i64,
    data_port: u16,
    stream: Vec<u8>,
    parameters: BTreeMap<String, String>,
    requests: Vec<Request>,
}

/// Loopback stand-in for a scanner: an HTTP command interface plus a TCP
/// data port, and UDP output to whatever a UDP handle asks for.
pub struct MockScanner {
    pub http_port: u16,
    pub data_port: u16,
    state: Arc<Mutex<State>>,
}

impl MockScanner {
    pub fn start(version_major: i64, stream: Vec<u8>) -> MockScanner {
        let http = TcpListener::bind("127.0.0.1:0").unwrap();
        let data = TcpListener::bind("127.0.0.1:0").unwrap();
        let http_port = http.local_addr().unwrap().port();
        let data_port = data.local_addr().unwrap().port();

        let parameters = [
            ("scan_frequency", "35"),
            ("samples_per_scan", "3600"),
            ("vendor", "Pepperl+Fuchs"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let state = Arc::new(Mutex::new(State {
            version_major,
            data_port,
            stream,
            parameters,
            requests: Vec::new(),
        }));

        let http_state = Arc::clone(&state);
        std::thread::spawn(move || {
            for conn in http.incoming() {
                let Ok(conn) = conn else { continue };
                handle_http(conn, &http_state);
            }
        });

        let data_state = Arc::clone(&state);
        std::thread::spawn(move || {
            for conn in data.incoming() {
                let Ok(mut conn) = conn else { continue };
                let bytes = data_state.lock().unwrap().stream.clone();
                let _ = conn.write_all(&bytes);
                // keep the connection open until the client goes away
                let _ = conn.read(&mut [0u8; 1]);
            }
        });

        MockScanner {
            http_port,
            data_port,
            state,
        }
    }

    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.command).collect()
    }

    pub fn parameter(&self, name: &str) -> Option<String> {
        self.state.lock().unwrap().parameters.get(name).cloned()
    }
}

fn handle_http(mut conn: TcpStream, state: &Arc<Mutex<State>>) {
    conn.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match conn.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }
    let text = String::from_utf8_lossy(&request);
    let request = parse_request_line(text.lines().next().unwrap_or(""));
    let body = respond(&request, state);
    state.lock().unwrap().requests.push(request);

    let body = body.to_string();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = conn.write_all(response.as_bytes());
}

fn respond(request: &Request, state: &Arc<Mutex<State>>) -> Value {
    let mut state = state.lock().unwrap();
    let param = |name: &str| request.params.get(name).cloned().unwrap_or_default();
    match request.command.as_str() {
        "get_protocol_info" => success(json!({
            "protocol_name": "pfsdp",
            "version_major": state.version_major,
            "version_minor": 3,
            "commands": ["get_protocol_info", "list_parameters", "get_parameter",
                         "set_parameter", "request_handle_tcp", "request_handle_udp",
                         "release_handle", "start_scanoutput", "stop_scanoutput",
                         "feed_watchdog"],
        })),
        "list_parameters" => {
            let names: Vec<&String> = state.parameters.keys().collect();
            success(json!({ "parameters": names }))
        }
        "get_parameter" => {
            let mut body = json!({});
            for name in param("list").split(';') {
                if let Some(value) = state.parameters.get(name) {
                    body[name] = match value.parse::<i64>() {
                        Ok(n) => json!(n),
                        Err(_) => json!(value),
                    };
                }
            }
            success(body)
        }
        "set_parameter" => {
            for (k, v) in &request.params {
                state.parameters.insert(k.clone(), v.clone());
            }
            success(json!({}))
        }
        "request_handle_tcp" => success(json!({ "port": state.data_port, "handle": "s1" })),
        "request_handle_udp" => success(json!({ "handle": "s2" })),
        "start_scanoutput" if param("handle") == "s2" => {
            let udp = state
                .requests
                .iter()
                .rev()
                .find(|r| r.command == "request_handle_udp")
                .cloned();
            if let Some(udp) = udp {
                let address = udp.params.get("address").cloned().unwrap_or_default();
                let port: u16 = udp.params.get("port").unwrap().parse().unwrap();
                let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
                let mut stream = state.stream.as_slice();
                while !stream.is_empty() {
                    let size = u32::from_le_bytes([stream[4], stream[5], stream[6], stream[7]]);
                    let (packet, rest) = stream.split_at(size as usize);
                    socket.send_to(packet, (address.as_str(), port)).unwrap();
                    stream = rest;
                }
            }
            success(json!({}))
        }
        "start_scanoutput" | "stop_scanoutput" | "release_handle" | "feed_watchdog" => {
            success(json!({}))
        }
        _ => json!({ "error_code": 100, "error_text": "unknown command" }),
    }
}
