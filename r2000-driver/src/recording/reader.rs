use crate::codec::{read_header_field, read_u32_field, read_uint};
use crate::error::{R2000Error, Result};
use crate::time::elapsed_exceeds;
use r2000_data::{is_legal_samples_per_scan, is_legal_scan_frequency, Scan};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Seek, SeekFrom};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Replays a recording file written by
/// [`RecordingWriter`](crate::recording::RecordingWriter).
///
/// The recording is cyclic: reading past the last record continues with the
/// first one.
#[derive(Debug)]
pub struct RecordingReader {
    reader: BufReader<File>,
    samples_per_scan: u32,
    scan_frequency: u32,
    data_start: u64,
    count: u64,
    last_scan: Scan,
    last_read: Option<Instant>,
}

impl RecordingReader {
    /// Opens a recording and validates its header. A header with an illegal
    /// scan geometry is a fatal error.
    pub fn load(path: impl AsRef<Path>) -> Result<RecordingReader> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);

        let (samples_per_scan, scan_frequency) = match read_header(&mut reader) {
            Ok(header) => header,
            Err(e @ R2000Error::InvalidRecordingHeader { .. }) => {
                error!(path = %path.display(), error = %e, "invalid recording header");
                return Err(e);
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "unreadable recording header");
                return Err(R2000Error::Config(format!(
                    "{}: unreadable recording header: {}",
                    path.display(),
                    e
                )));
            }
        };
        let data_start = reader.stream_position()?;
        debug!(
            path = %path.display(),
            samples_per_scan,
            scan_frequency,
            "recording loaded"
        );

        Ok(RecordingReader {
            reader,
            samples_per_scan,
            scan_frequency,
            data_start,
            count: 0,
            last_scan: Scan::new(),
            last_read: None,
        })
    }

    pub fn samples_per_scan(&self) -> u32 {
        self.samples_per_scan
    }

    /// Scan frequency in Hertz.
    pub fn scan_frequency(&self) -> u32 {
        self.scan_frequency
    }

    /// Time between two scans at the recorded frequency.
    pub fn scan_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.scan_frequency as f64)
    }

    /// Counter of the record read last.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn last_scan(&self) -> &Scan {
        &self.last_scan
    }

    /// Reads the next record once a scan period passed since the previous
    /// read. Returns true when a new scan was read.
    pub fn update(&mut self) -> Result<bool> {
        if !elapsed_exceeds(self.last_read, self.scan_period()) {
            return Ok(false);
        }
        self.last_read = Some(Instant::now());
        self.next_scan()?;
        Ok(true)
    }

    /// Reads the next record, rewinding to the first one at the end of the
    /// file. A record that fails to decode also rewinds, so the following
    /// call starts again from a record boundary.
    pub fn next_scan(&mut self) -> Result<&Scan> {
        let (counter, scan) = match self.read_record() {
            Ok(record) => record,
            Err(R2000Error::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!(last_count = self.count, "end of recording, rewinding");
                self.rewind()?;
                self.read_record()?
            }
            Err(e) => {
                warn!(last_count = self.count, error = %e, "corrupt record, rewinding");
                self.rewind()?;
                return Err(e);
            }
        };
        self.count = counter;
        self.last_scan = scan;
        Ok(&self.last_scan)
    }

    fn rewind(&mut self) -> Result<()> {
        self.reader.seek(SeekFrom::Start(self.data_start))?;
        Ok(())
    }

    fn read_record(&mut self) -> Result<(u64, Scan)> {
        let counter = read_uint(&mut self.reader)?;
        let mut distances = read_u32_field(&mut self.reader)?;
        let mut amplitudes = read_u32_field(&mut self.reader)?;
        let headers = read_header_field(&mut self.reader)?;

        if distances.len() != amplitudes.len() {
            warn!(
                counter,
                distances = distances.len(),
                amplitudes = amplitudes.len(),
                "record fields differ in length, truncating"
            );
            let len = distances.len().min(amplitudes.len());
            distances.truncate(len);
            amplitudes.truncate(len);
        }
        Ok((
            counter,
            Scan {
                distances,
                amplitudes,
                headers,
            },
        ))
    }
}

fn read_header(reader: &mut BufReader<File>) -> Result<(u32, u32)> {
    let samples_per_scan = read_uint(reader)?;
    let scan_frequency = read_uint(reader)?;
    let invalid = || R2000Error::InvalidRecordingHeader {
        samples_per_scan,
        scan_frequency,
    };
    let samples = u32::try_from(samples_per_scan).map_err(|_| invalid())?;
    let frequency = u32::try_from(scan_frequency).map_err(|_| invalid())?;
    if !is_legal_samples_per_scan(samples) || !is_legal_scan_frequency(frequency) {
        return Err(invalid());
    }
    Ok((samples, frequency))
}
