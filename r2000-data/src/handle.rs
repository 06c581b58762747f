#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Transport used by a streaming handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HandleType {
    Tcp,
    Udp,
}

/// Session handle issued by the scanner for one scan data output.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HandleInfo {
    /// Handle identifier issued by the device.
    pub handle: String,
    pub handle_type: HandleType,
    /// TCP: scanner host. UDP: local address the scanner sends to.
    pub hostname: String,
    pub port: u16,
    /// Packet type requested, always 'C'.
    pub packet_type: char,
    /// Start angle of the scan output in 1/10000 degree.
    pub start_angle: i32,
    pub watchdog_enabled: bool,
    /// Watchdog timeout in milliseconds.
    pub watchdog_timeout: u32,
}
