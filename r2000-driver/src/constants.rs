pub(crate) const MAGIC_SEQUENCE: [u8; 4] = [0x5C, 0xA2, 0x43, 0x00];
pub(crate) const MIN_HEADER_SIZE: usize = 60;
pub(crate) const DISTANCE_MASK: u32 = 0x000F_FFFF;
pub(crate) const AMPLITUDE_SHIFT: u32 = 20;
pub(crate) const SCAN_QUEUE_CAPACITY: usize = 100;
pub(crate) const SUPPORTED_PROTOCOL_MAJOR: i64 = 1;
pub(crate) const COMMAND_BASE_PATH: &str = "/cmd";
pub(crate) const PACKET_TYPE: &str = "C";
pub(crate) const DEFAULT_WATCHDOG_TIMEOUT_MS: u32 = 60000;
pub(crate) const MISSING_PARAMETER_VALUE: &str = "--COULD NOT RETRIEVE VALUE--";
// Recording format
pub(crate) const COUNTER_WIDTH: u8 = 8;
pub(crate) const FIELD_WIDTH: u8 = 4;
pub(crate) const COMPRESSED_COUNT_SIZE: usize = 4;
