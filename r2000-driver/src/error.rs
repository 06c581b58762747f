use std::io;
use thiserror::Error;

pub type Result<T, E = R2000Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum R2000Error {
    #[error("Packet must start with 5C A2 43 00. Observed = {0}.")]
    InvalidMagicNumber(String),
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),
    #[error("Packet needs {needed} bytes but only {available} are buffered.")]
    IncompletePacket { needed: usize, available: usize },
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("Command {command} failed: {reason}")]
    CommandFailed { command: String, reason: String },
    #[error("Scanner replied with error code {code}: {text}")]
    DeviceError { code: i64, text: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Unsupported protocol version {major}.{minor}, only major version 1 is supported")]
    UnsupportedProtocolVersion { major: i64, minor: i64 },
    #[error("Invalid recording header: samples per scan = {samples_per_scan}, scan frequency = {scan_frequency}")]
    InvalidRecordingHeader {
        samples_per_scan: u64,
        scan_frequency: u64,
    },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Could not connect to laser range finder: {0}")]
    Connection(String),
    #[error("No connection to laser range finder")]
    NotConnected,
    #[error("Scan capturing is not active")]
    NotCapturing,
    #[error("No scan capturing started")]
    NoReceiver,
    #[error("Recording writer is not initialised, call init before writing scans")]
    NotInitialized,
    #[error(transparent)]
    IoError(#[from] io::Error),
}

impl R2000Error {
    /// Configuration errors must halt the dependent workflow. Every other
    /// error is recoverable by the caller.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            R2000Error::UnsupportedProtocolVersion { .. }
                | R2000Error::InvalidRecordingHeader { .. }
                | R2000Error::Config(_)
        )
    }
}

impl From<ureq::Error> for R2000Error {
    fn from(err: ureq::Error) -> Self {
        R2000Error::Http(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_fatal() {
        assert!(R2000Error::UnsupportedProtocolVersion { major: 2, minor: 0 }.is_fatal());
        assert!(R2000Error::InvalidRecordingHeader {
            samples_per_scan: 1,
            scan_frequency: 1
        }
        .is_fatal());
        assert!(!R2000Error::NoReceiver.is_fatal());
        assert!(!R2000Error::MalformedPacket("x".to_string()).is_fatal());
    }
}
