//! Recording and replay of scans.
//!
//! A recording starts with the scan geometry (samples per scan and scan
//! frequency), each as a width-prefixed little-endian integer. Every scan
//! follows as a record of a 64 bit counter, the distance field, the
//! amplitude field and the raw packet headers.

mod player;
mod reader;
mod writer;

pub use player::ReplayThread;
pub use reader::RecordingReader;
pub use writer::RecordingWriter;
