pub mod handle;
pub mod header;
pub mod models;
pub mod protocol;
pub mod scan;

pub use handle::{HandleInfo, HandleType};
pub use header::{PacketHeader, HEADER_SIZE, MAGIC_BYTES, PACKET_TYPE_C};
pub use models::{is_legal_samples_per_scan, is_legal_scan_frequency, SAMPLES_PER_SCAN};
pub use protocol::{ParameterMap, ProtocolInfo};
pub use scan::Scan;
