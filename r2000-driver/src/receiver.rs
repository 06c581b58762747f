use crate::config::DriverConfig;
use crate::error::Result;
use crate::ring_buffer::RingBuffer;
use crate::scan::ScanAssembler;
use crate::transport::{ByteSource, ReadOutcome, ShutdownHandle, TcpSource, UdpSource};
use crossbeam_channel::{bounded, Receiver, Sender};
use crossbeam_utils::atomic::AtomicCell;
use parking_lot::Mutex;
use r2000_data::{HandleType, Scan};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// State shared between the receive thread and the consumer.
struct Shared {
    assembler: Mutex<ScanAssembler>,
    alive: AtomicBool,
    last_data: AtomicCell<Instant>,
}

/// Background receiver of scan data over TCP or UDP.
///
/// The receive thread owns the socket and the byte buffer. Only the scan
/// queue is shared, and its lock is held while moving packets or scans.
pub struct StreamReceiver {
    kind: HandleType,
    local_port: u16,
    silence_timeout: Duration,
    shared: Arc<Shared>,
    terminator_tx: Sender<bool>,
    shutdown: ShutdownHandle,
    thread: Option<JoinHandle<()>>,
}

impl StreamReceiver {
    /// Connects to the scanner's TCP data port and starts receiving.
    pub fn connect_tcp(host: &str, port: u16, config: &DriverConfig) -> Result<StreamReceiver> {
        let source = TcpSource::connect(host, port, config.http_timeout(), config.read_timeout())?;
        StreamReceiver::start(Box::new(source), config)
    }

    /// Binds a local UDP port (`config.udp_bind_port`, 0 for ephemeral) and
    /// starts receiving. The scanner must be told about [`Self::local_port`].
    pub fn bind_udp(config: &DriverConfig) -> Result<StreamReceiver> {
        let source = UdpSource::bind(config.udp_bind_port, config.read_timeout())?;
        StreamReceiver::start(Box::new(source), config)
    }

    fn start(source: Box<dyn ByteSource>, config: &DriverConfig) -> Result<StreamReceiver> {
        let kind = source.kind();
        let local_port = source.local_port();
        let shutdown = source.shutdown_handle()?;
        let shared = Arc::new(Shared {
            assembler: Mutex::new(ScanAssembler::with_capacity(config.queue_capacity)),
            alive: AtomicBool::new(true),
            last_data: AtomicCell::new(Instant::now()),
        });

        let (terminator_tx, terminator_rx) = bounded(10);
        let thread_shared = Arc::clone(&shared);
        let buffer_size = config.receive_buffer_size;
        let thread = std::thread::Builder::new()
            .name("r2000-receiver".to_string())
            .spawn(move || {
                receive_loop(source, thread_shared, terminator_rx, buffer_size);
            })?;

        Ok(StreamReceiver {
            kind,
            local_port,
            silence_timeout: config.silence_timeout(),
            shared,
            terminator_tx,
            shutdown,
            thread: Some(thread),
        })
    }

    pub fn kind(&self) -> HandleType {
        self.kind
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// True while the receive thread is running.
    pub fn is_connected(&self) -> bool {
        self.thread.is_some() && self.shared.alive.load(Ordering::SeqCst)
    }

    /// Stops the receive thread and waits for it. Safe to call repeatedly
    /// and after the thread exited on its own.
    pub fn disconnect(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.terminator_tx.try_send(true);
        self.shutdown.shutdown();
        if thread.join().is_err() {
            error!("receive thread panicked");
        }
        self.shared.alive.store(false, Ordering::SeqCst);
    }

    /// Receiver level liveness. A receiver that got no data within the
    /// silence timeout disconnects itself.
    pub fn check_connection(&mut self) -> bool {
        if !self.is_connected() {
            return false;
        }
        let silence = self.shared.last_data.load().elapsed();
        if silence > self.silence_timeout {
            warn!(
                silence_ms = silence.as_millis() as u64,
                "no scan data received, disconnecting"
            );
            self.disconnect();
            return false;
        }
        true
    }

    /// Pops the oldest scan, which may still be filling.
    pub fn get_scan(&self) -> Option<Scan> {
        self.shared.assembler.lock().pop()
    }

    pub fn scans_available(&self) -> usize {
        self.shared.assembler.lock().scans_available()
    }

    pub fn full_scans_available(&self) -> usize {
        self.shared.assembler.lock().full_scans_available()
    }

    pub fn overflow_count(&self) -> u64 {
        self.shared.assembler.lock().overflow_count()
    }
}

impl Drop for StreamReceiver {
    fn drop(&mut self) {
        self.disconnect();
    }
}

pub(crate) fn do_terminate(terminator_rx: &Receiver<bool>) -> bool {
    terminator_rx.try_recv().unwrap_or(false)
}

fn receive_loop(
    mut source: Box<dyn ByteSource>,
    shared: Arc<Shared>,
    terminator_rx: Receiver<bool>,
    buffer_size: usize,
) {
    info!(
        kind = ?source.kind(),
        local_port = source.local_port(),
        "receive loop started"
    );
    let mut ring = RingBuffer::with_capacity(buffer_size * 2);
    let mut buf = vec![0u8; buffer_size];

    loop {
        if do_terminate(&terminator_rx) {
            debug!("receive loop terminated");
            break;
        }

        match source.receive(&mut buf) {
            Ok(ReadOutcome::Data(n)) => {
                shared.last_data.store(Instant::now());
                ring.push_back(&buf[..n]);
                while let Some(packet) = ring.next_packet() {
                    shared.assembler.lock().push_packet(packet);
                }
            }
            Ok(ReadOutcome::Idle) => continue,
            Ok(ReadOutcome::Closed) => {
                info!("scan data stream closed by remote");
                break;
            }
            Err(e) => {
                if !do_terminate(&terminator_rx) {
                    warn!(error = %e, "receiving scan data failed");
                }
                break;
            }
        }
    }

    shared.alive.store(false, Ordering::SeqCst);
    debug!(
        discarded_bytes = ring.discarded_bytes(),
        "receive loop exited"
    );
}
