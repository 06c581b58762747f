use crate::constants::SCAN_QUEUE_CAPACITY;
use crate::packet::Packet;
use r2000_data::Scan;
use std::collections::VecDeque;
use tracing::warn;

pub(crate) trait R2000Scan {
    fn push_packet(&mut self, packet: Packet);
}

impl R2000Scan for Scan {
    /// Appends points in device order. Lost packets leave gaps.
    fn push_packet(&mut self, packet: Packet) {
        let Packet {
            header,
            distances,
            amplitudes,
        } = packet;
        self.distances.extend(distances);
        self.amplitudes.extend(amplitudes);
        self.headers.push(header);
    }
}

/// Bounded FIFO of scans. When full, the oldest scan is dropped.
#[derive(Debug)]
pub struct ScanQueue {
    scans: VecDeque<Scan>,
    capacity: usize,
    overflows: u64,
}

impl Default for ScanQueue {
    fn default() -> Self {
        ScanQueue::with_capacity(SCAN_QUEUE_CAPACITY)
    }
}

impl ScanQueue {
    pub fn new() -> ScanQueue {
        ScanQueue::default()
    }

    pub fn with_capacity(capacity: usize) -> ScanQueue {
        let capacity = capacity.max(1);
        ScanQueue {
            scans: VecDeque::with_capacity(capacity),
            capacity,
            overflows: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a scan, evicting the oldest one when the queue is full.
    /// Returns true when a scan was evicted.
    pub fn push(&mut self, scan: Scan) -> bool {
        let evicted = if self.scans.len() >= self.capacity {
            self.scans.pop_front();
            self.overflows += 1;
            warn!(
                dropped_total = self.overflows,
                "Too many scans in receiver queue: dropping scans"
            );
            true
        } else {
            false
        };
        self.scans.push_back(scan);
        evicted
    }

    /// Removes the oldest scan, which may be incomplete.
    pub fn pop(&mut self) -> Option<Scan> {
        self.scans.pop_front()
    }

    pub fn back_mut(&mut self) -> Option<&mut Scan> {
        self.scans.back_mut()
    }

    /// Number of scans, including the one still being filled.
    pub fn scans_available(&self) -> usize {
        self.scans.len()
    }

    /// Number of scans no longer being appended to.
    pub fn full_scans_available(&self) -> usize {
        self.scans.len().saturating_sub(1)
    }

    /// Number of scans dropped because the queue was full.
    pub fn overflow_count(&self) -> u64 {
        self.overflows
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    pub fn clear(&mut self) {
        self.scans.clear();
    }
}

/// Reassembles packets into full-rotation scans.
#[derive(Debug, Default)]
pub struct ScanAssembler {
    queue: ScanQueue,
}

impl ScanAssembler {
    pub fn new() -> ScanAssembler {
        ScanAssembler::default()
    }

    pub fn with_capacity(capacity: usize) -> ScanAssembler {
        ScanAssembler {
            queue: ScanQueue::with_capacity(capacity),
        }
    }

    /// Adds a packet to the scan being filled. A packet numbered 1 starts a
    /// new scan, as does any packet arriving while the queue is empty.
    /// Returns true when starting the scan evicted an older one.
    pub fn push_packet(&mut self, packet: Packet) -> bool {
        let mut evicted = false;
        if packet.header.packet_number == 1 || self.queue.is_empty() {
            evicted = self.queue.push(Scan::new());
        }
        if let Some(scan) = self.queue.back_mut() {
            scan.push_packet(packet);
        }
        evicted
    }

    pub fn pop(&mut self) -> Option<Scan> {
        self.queue.pop()
    }

    pub fn queue(&self) -> &ScanQueue {
        &self.queue
    }

    pub fn scans_available(&self) -> usize {
        self.queue.scans_available()
    }

    pub fn full_scans_available(&self) -> usize {
        self.queue.full_scans_available()
    }

    pub fn overflow_count(&self) -> u64 {
        self.queue.overflow_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::tests::make_packet;

    #[test]
    fn test_assembles_scan() {
        let mut assembler = ScanAssembler::new();
        assembler.push_packet(make_packet(0, 1, 0, 6, &[1, 2]));
        assembler.push_packet(make_packet(0, 2, 2, 6, &[3, 4]));
        assembler.push_packet(make_packet(0, 3, 4, 6, &[5, 6]));
        assert_eq!(assembler.full_scans_available(), 0);

        assembler.push_packet(make_packet(1, 1, 0, 6, &[7]));
        assert_eq!(assembler.scans_available(), 2);
        assert_eq!(assembler.full_scans_available(), 1);

        let scan = assembler.pop().unwrap();
        assert_eq!(scan.distances, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(scan.amplitudes.len(), scan.distances.len());
        assert_eq!(scan.headers.len(), 3);
        assert!(scan.is_complete());

        let tail = assembler.pop().unwrap();
        assert_eq!(tail.distances, vec![7]);
        assert!(!tail.is_complete());
    }

    #[test]
    fn test_bootstraps_mid_scan() {
        let mut assembler = ScanAssembler::new();
        assembler.push_packet(make_packet(4, 3, 4, 6, &[5, 6]));
        assert_eq!(assembler.scans_available(), 1);

        assembler.push_packet(make_packet(5, 1, 0, 6, &[1, 2]));
        let partial = assembler.pop().unwrap();
        assert_eq!(partial.distances, vec![5, 6]);
        assert!(!partial.is_complete());
    }

    #[test]
    fn test_lost_packet_leaves_gap() {
        let mut assembler = ScanAssembler::new();
        assembler.push_packet(make_packet(0, 1, 0, 6, &[1, 2]));
        assembler.push_packet(make_packet(0, 3, 4, 6, &[5, 6]));
        assembler.push_packet(make_packet(1, 1, 0, 6, &[1]));

        let scan = assembler.pop().unwrap();
        assert_eq!(scan.distances, vec![1, 2, 5, 6]);
        assert_eq!(scan.headers.len(), 2);
        assert!(!scan.is_complete());
    }

    #[test]
    fn test_queue_eviction() {
        let mut queue = ScanQueue::new();
        let mut evictions = 0;
        for i in 0..101u32 {
            let mut scan = Scan::new();
            scan.distances.push(i);
            scan.amplitudes.push(i);
            if queue.push(scan) {
                evictions += 1;
            }
        }
        assert_eq!(evictions, 1);
        assert_eq!(queue.overflow_count(), 1);
        assert_eq!(queue.scans_available(), 100);
        assert_eq!(queue.pop().unwrap().distances, vec![1]);
    }

    #[test]
    fn test_assembler_eviction() {
        let mut assembler = ScanAssembler::with_capacity(3);
        for scan_number in 0..5 {
            assembler.push_packet(make_packet(scan_number, 1, 0, 1, &[scan_number as u32]));
        }
        assert_eq!(assembler.scans_available(), 3);
        assert_eq!(assembler.overflow_count(), 2);
        assert_eq!(assembler.pop().unwrap().distances, vec![2]);
    }

    #[test]
    fn test_full_scans_available() {
        let mut queue = ScanQueue::new();
        assert_eq!(queue.full_scans_available(), 0);
        queue.push(Scan::new());
        assert_eq!(queue.full_scans_available(), 0);
        for _ in 0..4 {
            queue.push(Scan::new());
        }
        assert_eq!(queue.full_scans_available(), 4);
    }
}
