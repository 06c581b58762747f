use crate::constants::{AMPLITUDE_SHIFT, DISTANCE_MASK, MAGIC_SEQUENCE, MIN_HEADER_SIZE};
use crate::error::R2000Error;
use crate::numeric::{le_u32, to_string};
use r2000_data::PacketHeader;

/// Upper bound for a declared packet size. Anything larger is corrupt.
const MAX_PACKET_SIZE: usize = 65536;

/// One parsed type C packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    /// Distances in millimeters, in device order.
    pub distances: Vec<u32>,
    /// Amplitudes, parallel to `distances`.
    pub amplitudes: Vec<u32>,
}

impl Packet {
    /// Encodes the packet in wire layout. Header fields are written as given,
    /// the payload follows at `header_size`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let header_size = self.header.header_size as usize;
        let mut out = self.header.to_bytes().to_vec();
        out.resize(header_size.max(out.len()), 0);
        for (d, a) in self.distances.iter().zip(self.amplitudes.iter()) {
            out.extend_from_slice(&encode_point(*d, *a).to_le_bytes());
        }
        out
    }
}

pub(crate) fn decode_point(word: u32) -> (u32, u32) {
    (word & DISTANCE_MASK, word >> AMPLITUDE_SHIFT)
}

pub(crate) fn encode_point(distance: u32, amplitude: u32) -> u32 {
    (distance & DISTANCE_MASK) | (amplitude << AMPLITUDE_SHIFT)
}

pub(crate) fn is_packet_start(window: &[u8]) -> bool {
    window.len() >= MAGIC_SEQUENCE.len() && window[..MAGIC_SEQUENCE.len()] == MAGIC_SEQUENCE
}

/// Validates the header at the start of `window` and returns it.
///
/// `IncompletePacket` means the window is a valid prefix that needs more
/// bytes. Every other error means the data at the window start is corrupt.
pub(crate) fn validate_packet_header(window: &[u8]) -> Result<PacketHeader, R2000Error> {
    if window.len() < MIN_HEADER_SIZE {
        return Err(R2000Error::IncompletePacket {
            needed: MIN_HEADER_SIZE,
            available: window.len(),
        });
    }
    if !is_packet_start(window) {
        return Err(R2000Error::InvalidMagicNumber(to_string(&window[0..4])));
    }
    let header = PacketHeader::from_bytes(window).ok_or(R2000Error::IncompletePacket {
        needed: MIN_HEADER_SIZE,
        available: window.len(),
    })?;

    let header_size = header.header_size as usize;
    let packet_size = header.packet_size as usize;
    if header_size < MIN_HEADER_SIZE {
        return Err(R2000Error::MalformedPacket(format!(
            "header size {} is below the minimum of {} bytes",
            header_size, MIN_HEADER_SIZE
        )));
    }
    if header_size > packet_size || packet_size > MAX_PACKET_SIZE {
        return Err(R2000Error::MalformedPacket(format!(
            "inconsistent sizes: header {} bytes, packet {} bytes",
            header_size, packet_size
        )));
    }
    let payload_size = header.num_points_packet as usize * 4;
    if header_size + payload_size > packet_size {
        return Err(R2000Error::MalformedPacket(format!(
            "{} points do not fit into a packet of {} bytes",
            header.num_points_packet, packet_size
        )));
    }
    if header.first_index as usize + header.num_points_packet as usize
        > header.num_points_scan as usize
    {
        return Err(R2000Error::MalformedPacket(format!(
            "points {}..{} exceed the scan size of {}",
            header.first_index,
            header.first_index as usize + header.num_points_packet as usize,
            header.num_points_scan
        )));
    }
    if packet_size > window.len() {
        return Err(R2000Error::IncompletePacket {
            needed: packet_size,
            available: window.len(),
        });
    }
    Ok(header)
}

/// Parses a packet from a window that starts at a magic sequence.
pub fn parse_packet(window: &[u8]) -> Result<Packet, R2000Error> {
    let header = validate_packet_header(window)?;
    let start = header.header_size as usize;
    let n = header.num_points_packet as usize;

    let mut distances = Vec::with_capacity(n);
    let mut amplitudes = Vec::with_capacity(n);
    for word in window[start..start + n * 4].chunks_exact(4) {
        let (d, a) = decode_point(le_u32(word));
        distances.push(d);
        amplitudes.push(a);
    }
    Ok(Packet {
        header,
        distances,
        amplitudes,
    })
}
