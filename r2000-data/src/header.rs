#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Size in bytes of a packed packet header on the wire.
pub const HEADER_SIZE: usize = 60;

/// Leading bytes of every packet.
pub const MAGIC_BYTES: [u8; 2] = [0x5C, 0xA2];

/// Packet type "C": distance and amplitude packed into one 32 bit word.
pub const PACKET_TYPE_C: u16 = 0x0043;

/// Header of a TCP or UDP data packet sent by the scanner.
///
/// All fields except `magic` are little-endian on the wire. `magic` is kept
/// in wire order, so a valid header always has `magic == 0x5CA2`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PacketHeader {
    /// Magic marker, `0x5CA2`.
    pub magic: u16,
    /// Packet type, `0x0043` for type C packets.
    pub packet_type: u16,
    /// Overall packet size (header + payload) in bytes.
    pub packet_size: u32,
    /// Header size in bytes, 60 unless the device pads the header.
    pub header_size: u16,
    /// Scan sequence number, overflows.
    pub scan_number: u16,
    /// Packet sequence number within a scan, starting with 1.
    pub packet_number: u16,
    /// Raw timestamp of the internal clock in NTP format.
    pub timestamp_raw: u64,
    /// Externally synchronised timestamp, zero when unavailable.
    pub timestamp_sync: u64,
    pub status_flags: u32,
    /// Scan head rotation frequency in milli-Hertz.
    pub scan_frequency: u32,
    /// Number of points in the complete scan.
    pub num_points_scan: u16,
    /// Number of points carried by this packet.
    pub num_points_packet: u16,
    /// Index of the first point of this packet within the scan.
    pub first_index: u16,
    /// Absolute angle of the first point in 1/10000 degree.
    pub first_angle: i32,
    /// Angle between two consecutive points in 1/10000 degree.
    pub angular_increment: i32,
    pub output_status: u32,
    pub field_status: u32,
}

impl PacketHeader {
    /// Decodes a header from the first [`HEADER_SIZE`] bytes of `data`.
    ///
    /// Returns `None` when `data` is too short. No field is validated here.
    pub fn from_bytes(data: &[u8]) -> Option<PacketHeader> {
        if data.len() < HEADER_SIZE {
            return None;
        }
        Some(PacketHeader {
            magic: u16::from_be_bytes([data[0], data[1]]),
            packet_type: le_u16(data, 2),
            packet_size: le_u32(data, 4),
            header_size: le_u16(data, 8),
            scan_number: le_u16(data, 10),
            packet_number: le_u16(data, 12),
            timestamp_raw: le_u64(data, 14),
            timestamp_sync: le_u64(data, 22),
            status_flags: le_u32(data, 30),
            scan_frequency: le_u32(data, 34),
            num_points_scan: le_u16(data, 38),
            num_points_packet: le_u16(data, 40),
            first_index: le_u16(data, 42),
            first_angle: le_u32(data, 44) as i32,
            angular_increment: le_u32(data, 48) as i32,
            output_status: le_u32(data, 52),
            field_status: le_u32(data, 56),
        })
    }

    /// Encodes the header in its packed wire layout.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..2].copy_from_slice(&self.magic.to_be_bytes());
        out[2..4].copy_from_slice(&self.packet_type.to_le_bytes());
        out[4..8].copy_from_slice(&self.packet_size.to_le_bytes());
        out[8..10].copy_from_slice(&self.header_size.to_le_bytes());
        out[10..12].copy_from_slice(&self.scan_number.to_le_bytes());
        out[12..14].copy_from_slice(&self.packet_number.to_le_bytes());
        out[14..22].copy_from_slice(&self.timestamp_raw.to_le_bytes());
        out[22..30].copy_from_slice(&self.timestamp_sync.to_le_bytes());
        out[30..34].copy_from_slice(&self.status_flags.to_le_bytes());
        out[34..38].copy_from_slice(&self.scan_frequency.to_le_bytes());
        out[38..40].copy_from_slice(&self.num_points_scan.to_le_bytes());
        out[40..42].copy_from_slice(&self.num_points_packet.to_le_bytes());
        out[42..44].copy_from_slice(&self.first_index.to_le_bytes());
        out[44..48].copy_from_slice(&self.first_angle.to_le_bytes());
        out[48..52].copy_from_slice(&self.angular_increment.to_le_bytes());
        out[52..56].copy_from_slice(&self.output_status.to_le_bytes());
        out[56..60].copy_from_slice(&self.field_status.to_le_bytes());
        out
    }

    /// Rotation frequency in Hertz.
    pub fn scan_frequency_hz(&self) -> f64 {
        self.scan_frequency as f64 / 1000.
    }
}

fn le_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn le_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn le_u64(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = PacketHeader {
            magic: 0x5CA2,
            packet_type: PACKET_TYPE_C,
            packet_size: 60 + 4 * 3,
            header_size: 60,
            scan_number: 7,
            packet_number: 1,
            timestamp_raw: 0x0102_0304_0506_0708,
            first_angle: -1_800_000,
            angular_increment: 1000,
            ..Default::default()
        };
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], &[0x5C, 0xA2, 0x43, 0x00]);
        assert_eq!(&bytes[4..8], &[72, 0, 0, 0]);
        assert_eq!(&bytes[14..22], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(PacketHeader::from_bytes(&bytes), Some(header));
    }

    #[test]
    fn test_short_header() {
        assert_eq!(PacketHeader::from_bytes(&[0x5C, 0xA2, 0x43, 0x00]), None);
    }
}
