//! Driver for the R2000 rotating laser range-finder.
//!
//! The scanner is configured through an HTTP/JSON command interface
//! ([`CommandChannel`]) and streams binary scan data over TCP or UDP
//! ([`StreamReceiver`]). [`ScannerSession`] ties both together:
//!
//! ```no_run
//! use r2000_driver::ScannerSession;
//!
//! let mut session = ScannerSession::new();
//! session.connect("192.168.1.70", 80)?;
//! session.set_scan_frequency(20)?;
//! session.start_capturing_udp()?;
//!
//! while session.get_full_scans_available() == 0 {
//!     std::thread::sleep(std::time::Duration::from_millis(10));
//! }
//! if let Some(scan) = session.get_scan()? {
//!     println!("received {} points", scan.len());
//! }
//! session.disconnect();
//! # Ok::<(), r2000_driver::R2000Error>(())
//! ```
//!
//! Scans can be stored with [`RecordingWriter`] and played back with
//! [`RecordingReader`] or [`ReplayThread`].

mod codec;
mod command;
mod config;
mod constants;
mod error;
mod numeric;
mod packet;
mod receiver;
pub mod recording;
mod ring_buffer;
mod scan;
mod session;
mod time;
mod transport;

pub use crate::codec::{compress, decompress};
pub use crate::command::CommandChannel;
pub use crate::config::DriverConfig;
pub use crate::error::{R2000Error, Result};
pub use crate::packet::{parse_packet, Packet};
pub use crate::receiver::StreamReceiver;
pub use crate::recording::{RecordingReader, RecordingWriter, ReplayThread};
pub use crate::ring_buffer::RingBuffer;
pub use crate::scan::{ScanAssembler, ScanQueue};
pub use crate::session::ScannerSession;
pub use r2000_data::{HandleInfo, HandleType, PacketHeader, ParameterMap, ProtocolInfo, Scan};
