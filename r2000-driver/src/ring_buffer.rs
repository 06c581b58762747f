use crate::constants::{MAGIC_SEQUENCE, MIN_HEADER_SIZE};
use crate::error::R2000Error;
use crate::packet::{parse_packet, Packet};
use std::collections::VecDeque;
use tracing::debug;

/// Byte buffer that absorbs reads of arbitrary size and aligns them to
/// packet boundaries. Bytes are appended at the back and consumed from the
/// front.
#[derive(Debug, Default)]
pub struct RingBuffer {
    buffer: VecDeque<u8>,
    discarded: u64,
}

impl RingBuffer {
    pub fn new() -> RingBuffer {
        RingBuffer::default()
    }

    pub fn with_capacity(capacity: usize) -> RingBuffer {
        RingBuffer {
            buffer: VecDeque::with_capacity(capacity),
            discarded: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Total number of bytes dropped while resynchronising.
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded
    }

    pub fn push_back(&mut self, data: &[u8]) {
        self.buffer.extend(data);
    }

    /// Removes and returns up to `n` bytes from the front.
    pub fn consume_front(&mut self, n: usize) -> Vec<u8> {
        let n = n.min(self.buffer.len());
        self.buffer.drain(..n).collect()
    }

    fn discard_front(&mut self, n: usize) {
        let n = n.min(self.buffer.len());
        self.buffer.drain(..n);
        self.discarded += n as u64;
    }

    /// Offset of the first magic sequence, if any.
    pub fn find_packet_start(&mut self) -> Option<usize> {
        self.buffer
            .make_contiguous()
            .windows(MAGIC_SEQUENCE.len())
            .position(|w| w == MAGIC_SEQUENCE)
    }

    /// Extracts the next complete packet.
    ///
    /// Bytes preceding a magic sequence are dropped. A malformed packet is
    /// skipped by dropping its first byte and searching again. Returns `None`
    /// when the buffered data does not yet hold a complete packet.
    pub fn next_packet(&mut self) -> Option<Packet> {
        loop {
            if self.buffer.len() < MIN_HEADER_SIZE {
                return None;
            }

            let start = match self.find_packet_start() {
                Some(start) => start,
                None => {
                    // the tail may hold the beginning of a split magic sequence
                    let n = self.buffer.len() - (MAGIC_SEQUENCE.len() - 1);
                    debug!(discarded = n, "no packet start in buffer");
                    self.discard_front(n);
                    return None;
                }
            };
            if start > 0 {
                debug!(discarded = start, "resynchronising to packet start");
                self.discard_front(start);
            }

            match parse_packet(self.buffer.make_contiguous()) {
                Ok(packet) => {
                    self.buffer.drain(..packet.header.packet_size as usize);
                    return Some(packet);
                }
                Err(R2000Error::IncompletePacket { .. }) => return None,
                Err(e) => {
                    debug!(error = %e, "dropping malformed packet");
                    self.discard_front(1);
                }
            }
        }
    }
}
