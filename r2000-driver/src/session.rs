use crate::command::CommandChannel;
use crate::config::DriverConfig;
use crate::constants::SUPPORTED_PROTOCOL_MAJOR;
use crate::error::{R2000Error, Result};
use crate::receiver::StreamReceiver;
use crate::time::elapsed_exceeds;
use r2000_data::{HandleInfo, ParameterMap, ProtocolInfo, Scan};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

struct Connection {
    channel: CommandChannel,
    protocol_info: ProtocolInfo,
    parameters: ParameterMap,
}

struct Capture {
    handle: HandleInfo,
    receiver: StreamReceiver,
    watchdog_interval: Duration,
    last_watchdog_feed: Option<Instant>,
}

/// Session state. Transitions replace the whole value.
enum SessionState {
    Disconnected,
    Connected(Connection),
    Capturing(Connection, Capture),
}

/// Interval between watchdog feeds: a third of the timeout, at least one
/// second, rounded down to whole seconds.
pub(crate) fn watchdog_interval(watchdog_timeout_ms: u32) -> Duration {
    Duration::from_secs((watchdog_timeout_ms / 3000).max(1) as u64)
}

/// Connection to one scanner: command channel, streaming handle and
/// watchdog.
///
/// ```no_run
/// use r2000_driver::ScannerSession;
///
/// let mut session = ScannerSession::new();
/// session.connect("192.168.1.70", 80).unwrap();
/// session.start_capturing_tcp().unwrap();
/// loop {
///     if session.get_full_scans_available() > 0 {
///         if let Ok(Some(scan)) = session.get_scan() {
///             println!("{} points", scan.len());
///         }
///     }
/// }
/// ```
pub struct ScannerSession {
    config: DriverConfig,
    state: SessionState,
}

impl Default for ScannerSession {
    fn default() -> Self {
        ScannerSession::new()
    }
}

impl ScannerSession {
    pub fn new() -> ScannerSession {
        ScannerSession {
            config: DriverConfig::default(),
            state: SessionState::Disconnected,
        }
    }

    pub fn with_config(config: DriverConfig) -> Result<ScannerSession> {
        config.validate()?;
        Ok(ScannerSession {
            config,
            state: SessionState::Disconnected,
        })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Connects to the command interface at `host:port`, checks the protocol
    /// version and reads all parameters. An existing session is closed first.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        self.disconnect();

        let channel = CommandChannel::with_timeout(host, port, self.config.http_timeout());
        let protocol_info = channel.get_protocol_info().map_err(|e| {
            error!(host, port, "could not connect to laser range finder");
            R2000Error::Connection(e.to_string())
        })?;
        if protocol_info.version_major != SUPPORTED_PROTOCOL_MAJOR {
            error!(
                version_major = protocol_info.version_major,
                version_minor = protocol_info.version_minor,
                "wrong protocol version"
            );
            return Err(R2000Error::UnsupportedProtocolVersion {
                major: protocol_info.version_major,
                minor: protocol_info.version_minor,
            });
        }
        let parameters =
            read_all_parameters(&channel).map_err(|e| R2000Error::Connection(e.to_string()))?;

        info!(
            host,
            port,
            protocol = %protocol_info.protocol_name,
            version_major = protocol_info.version_major,
            version_minor = protocol_info.version_minor,
            "connected to laser range finder"
        );
        self.state = SessionState::Connected(Connection {
            channel,
            protocol_info,
            parameters,
        });
        Ok(())
    }

    /// Requests a TCP handle, connects to its data port and starts the scan
    /// output. A running capture is stopped first, so when the new start
    /// fails the session is left connected but no longer capturing.
    pub fn start_capturing_tcp(&mut self) -> Result<()> {
        self.prepare_capture()?;
        let capture = match &self.state {
            SessionState::Connected(connection) => start_tcp(connection, &self.config)?,
            _ => return Err(R2000Error::NotConnected),
        };
        self.enter_capturing(capture);
        Ok(())
    }

    /// Binds a local UDP port, requests a UDP handle sending to it and starts
    /// the scan output. A running capture is stopped first, so when the new
    /// start fails the session is left connected but no longer capturing.
    pub fn start_capturing_udp(&mut self) -> Result<()> {
        self.prepare_capture()?;
        let capture = match &self.state {
            SessionState::Connected(connection) => start_udp(connection, &self.config)?,
            _ => return Err(R2000Error::NotConnected),
        };
        self.enter_capturing(capture);
        Ok(())
    }

    fn prepare_capture(&mut self) -> Result<()> {
        if matches!(self.state, SessionState::Capturing(..)) {
            // failing teardown still leaves the session connected
            let _ = self.stop_capturing();
        }
        if !self.check_connection() {
            return Err(R2000Error::NotConnected);
        }
        Ok(())
    }

    fn enter_capturing(&mut self, capture: Capture) {
        self.state = match std::mem::replace(&mut self.state, SessionState::Disconnected) {
            SessionState::Connected(connection) | SessionState::Capturing(connection, _) => {
                info!(
                    handle = %capture.handle.handle,
                    kind = ?capture.handle.handle_type,
                    "scan capturing started"
                );
                SessionState::Capturing(connection, capture)
            }
            SessionState::Disconnected => SessionState::Disconnected,
        };
    }

    /// Stops the scan output and releases the handle. Teardown continues
    /// past failing steps and the session always ends up connected.
    pub fn stop_capturing(&mut self) -> Result<()> {
        let (connection, mut capture) =
            match std::mem::replace(&mut self.state, SessionState::Disconnected) {
                SessionState::Capturing(connection, capture) => (connection, capture),
                other => {
                    self.state = other;
                    return Err(R2000Error::NotCapturing);
                }
            };

        capture.receiver.disconnect();
        let handle = &capture.handle.handle;
        let stopped = connection.channel.stop_scan_output(handle);
        let released = connection.channel.release_handle(handle);
        info!(handle = %handle, "scan capturing stopped");

        self.state = SessionState::Connected(connection);
        stopped.and(released)
    }

    /// Stops capturing if needed and forgets all session state.
    pub fn disconnect(&mut self) {
        if matches!(self.state, SessionState::Capturing(..)) {
            if let Err(e) = self.stop_capturing() {
                warn!(error = %e, "stopping capture during disconnect failed");
            }
        }
        if let SessionState::Connected(connection) =
            std::mem::replace(&mut self.state, SessionState::Disconnected)
        {
            info!(host = connection.channel.host(), "disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        !matches!(self.state, SessionState::Disconnected)
    }

    /// True while capturing and the receiver is still alive.
    pub fn is_capturing(&self) -> bool {
        match &self.state {
            SessionState::Capturing(_, capture) => capture.receiver.is_connected(),
            _ => false,
        }
    }

    /// Command channel liveness: the scanner must still answer
    /// `get_protocol_info`.
    pub fn check_connection(&self) -> bool {
        let alive = match self.connection() {
            Some(connection) => connection.channel.get_protocol_info().is_ok(),
            None => false,
        };
        if !alive {
            error!("no connection to laser range finder or connection lost");
        }
        alive
    }

    pub fn protocol_info(&self) -> Option<&ProtocolInfo> {
        self.connection().map(|c| &c.protocol_info)
    }

    pub fn handle_info(&self) -> Option<&HandleInfo> {
        match &self.state {
            SessionState::Capturing(_, capture) => Some(&capture.handle),
            _ => None,
        }
    }

    /// Feeds the watchdog when due, then pops the oldest scan. The scan may
    /// still be filling, check [`Self::get_full_scans_available`] first when
    /// that matters.
    pub fn get_scan(&mut self) -> Result<Option<Scan>> {
        // a failed feed is already logged
        let _ = self.feed_watchdog(false);
        match &self.state {
            SessionState::Capturing(_, capture) => Ok(capture.receiver.get_scan()),
            _ => {
                error!("no scan capturing started");
                Err(R2000Error::NoReceiver)
            }
        }
    }

    /// Number of queued scans no longer being appended to.
    pub fn get_full_scans_available(&self) -> usize {
        match &self.state {
            SessionState::Capturing(_, capture) => capture.receiver.full_scans_available(),
            _ => 0,
        }
    }

    /// Number of queued scans including the one being filled.
    pub fn scans_available(&self) -> usize {
        match &self.state {
            SessionState::Capturing(_, capture) => capture.receiver.scans_available(),
            _ => 0,
        }
    }

    /// Feeds the watchdog if the feed interval elapsed or `force` is set.
    /// The feed time is recorded even when the command fails.
    pub fn feed_watchdog(&mut self, force: bool) -> Result<()> {
        let SessionState::Capturing(connection, capture) = &mut self.state else {
            return Err(R2000Error::NotCapturing);
        };
        if !force && !elapsed_exceeds(capture.last_watchdog_feed, capture.watchdog_interval) {
            return Ok(());
        }
        capture.last_watchdog_feed = Some(Instant::now());
        connection
            .channel
            .feed_watchdog(&capture.handle.handle)
            .inspect_err(|e| error!(error = %e, "feeding watchdog failed"))
    }

    /// Refreshes the parameter mirror from the device and returns it.
    pub fn get_parameters(&mut self) -> Result<&ParameterMap> {
        let connection = self.connection_mut().ok_or(R2000Error::NotConnected)?;
        connection.parameters = read_all_parameters(&connection.channel)?;
        Ok(&connection.parameters)
    }

    pub fn get_parameter(&self, name: &str) -> Result<String> {
        self.channel()?.get_parameter(name)
    }

    pub fn set_parameter(&self, name: &str, value: &str) -> Result<()> {
        self.channel()?.set_parameter(name, value)
    }

    pub fn set_scan_frequency(&self, frequency: u32) -> Result<()> {
        self.set_parameter("scan_frequency", &frequency.to_string())
    }

    pub fn set_samples_per_scan(&self, samples: u32) -> Result<()> {
        self.set_parameter("samples_per_scan", &samples.to_string())
    }

    pub fn reboot_device(&self) -> Result<()> {
        self.channel()?.reboot_device()
    }

    pub fn reset_parameters(&self, names: &[String]) -> Result<()> {
        self.channel()?.reset_parameters(names)
    }

    fn connection(&self) -> Option<&Connection> {
        match &self.state {
            SessionState::Connected(connection) | SessionState::Capturing(connection, _) => {
                Some(connection)
            }
            SessionState::Disconnected => None,
        }
    }

    fn connection_mut(&mut self) -> Option<&mut Connection> {
        match &mut self.state {
            SessionState::Connected(connection) | SessionState::Capturing(connection, _) => {
                Some(connection)
            }
            SessionState::Disconnected => None,
        }
    }

    fn channel(&self) -> Result<&CommandChannel> {
        self.connection()
            .map(|c| &c.channel)
            .ok_or(R2000Error::NotConnected)
    }
}

impl Drop for ScannerSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn read_all_parameters(channel: &CommandChannel) -> Result<ParameterMap> {
    let names = channel.get_parameter_list()?;
    channel.get_parameters(&names)
}

fn start_tcp(connection: &Connection, config: &DriverConfig) -> Result<Capture> {
    let channel = &connection.channel;
    let handle = channel.request_handle_tcp(config.start_angle)?;
    let receiver = match StreamReceiver::connect_tcp(channel.host(), handle.port, config) {
        Ok(receiver) => receiver,
        Err(e) => {
            let _ = channel.release_handle(&handle.handle);
            return Err(e);
        }
    };
    start_output(channel, handle, receiver)
}

fn start_udp(connection: &Connection, config: &DriverConfig) -> Result<Capture> {
    let channel = &connection.channel;
    let receiver = StreamReceiver::bind_udp(config)?;
    let handle = channel.request_handle_udp(
        receiver.local_port(),
        &config.udp_address,
        config.start_angle,
    )?;
    start_output(channel, handle, receiver)
}

fn start_output(
    channel: &CommandChannel,
    handle: HandleInfo,
    receiver: StreamReceiver,
) -> Result<Capture> {
    if let Err(e) = channel.start_scan_output(&handle.handle) {
        let _ = channel.release_handle(&handle.handle);
        return Err(e);
    }
    Ok(Capture {
        watchdog_interval: watchdog_interval(handle.watchdog_timeout),
        last_watchdog_feed: None,
        handle,
        receiver,
    })
}
