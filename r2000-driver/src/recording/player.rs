use crate::error::Result;
use crate::receiver::do_terminate;
use crate::recording::RecordingReader;
use crate::scan::ScanQueue;
use crate::time::sleep_ms;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use r2000_data::Scan;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error};

/// Plays a recording back in a background thread at its scan frequency.
///
/// Replayed scans land in a bounded queue with the same drop policy as live
/// capture, so consumers can treat a recording like a scanner.
pub struct ReplayThread {
    samples_per_scan: u32,
    scan_frequency: u32,
    queue: Arc<Mutex<ScanQueue>>,
    terminator_tx: Sender<bool>,
    thread: Option<JoinHandle<()>>,
}

impl ReplayThread {
    pub fn start(path: impl AsRef<Path>, queue_capacity: usize) -> Result<ReplayThread> {
        let reader = RecordingReader::load(path)?;
        let samples_per_scan = reader.samples_per_scan();
        let scan_frequency = reader.scan_frequency();

        let queue = Arc::new(Mutex::new(ScanQueue::with_capacity(queue_capacity)));
        let (terminator_tx, terminator_rx) = bounded(10);
        let thread_queue = Arc::clone(&queue);
        let thread = std::thread::Builder::new()
            .name("r2000-replay".to_string())
            .spawn(move || replay_loop(reader, thread_queue, terminator_rx))?;

        Ok(ReplayThread {
            samples_per_scan,
            scan_frequency,
            queue,
            terminator_tx,
            thread: Some(thread),
        })
    }

    pub fn samples_per_scan(&self) -> u32 {
        self.samples_per_scan
    }

    pub fn scan_frequency(&self) -> u32 {
        self.scan_frequency
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn get_scan(&self) -> Option<Scan> {
        self.queue.lock().pop()
    }

    pub fn scans_available(&self) -> usize {
        self.queue.lock().scans_available()
    }

    /// Replayed scans are never partial, so every queued scan counts.
    pub fn full_scans_available(&self) -> usize {
        self.queue.lock().scans_available()
    }

    pub fn overflow_count(&self) -> u64 {
        self.queue.lock().overflow_count()
    }

    /// Stops playback and waits for the thread. Safe to call repeatedly.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.terminator_tx.try_send(true);
        if thread.join().is_err() {
            error!("replay thread panicked");
        }
    }
}

impl Drop for ReplayThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn replay_loop(
    mut reader: RecordingReader,
    queue: Arc<Mutex<ScanQueue>>,
    terminator_rx: Receiver<bool>,
) {
    debug!(scan_frequency = reader.scan_frequency(), "replay started");
    while !do_terminate(&terminator_rx) {
        match reader.update() {
            Ok(true) => {
                let scan = reader.last_scan().clone();
                queue.lock().push(scan);
            }
            Ok(false) => sleep_ms(1),
            Err(e) => {
                error!(error = %e, "replay stopped");
                return;
            }
        }
    }
    debug!(count = reader.count(), "replay terminated");
}
