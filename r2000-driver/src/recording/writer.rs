use crate::codec::{write_header_field, write_u32_field, write_uint};
use crate::constants::{COUNTER_WIDTH, FIELD_WIDTH};
use crate::error::{R2000Error, Result};
use r2000_data::{is_legal_samples_per_scan, is_legal_scan_frequency, Scan};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Appends scans to a recording file.
///
/// The file header has to be written with [`RecordingWriter::init`] before
/// the first scan. Distance and amplitude fields are compressed unless
/// disabled with [`RecordingWriter::set_compress`].
pub struct RecordingWriter {
    path: PathBuf,
    file: Option<BufWriter<File>>,
    initialized: bool,
    compress: bool,
    count: u64,
    size: u64,
}

impl RecordingWriter {
    /// Creates the file, truncating an existing one.
    pub fn open(path: impl AsRef<Path>) -> Result<RecordingWriter> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        debug!(path = %path.display(), "recording opened");
        Ok(RecordingWriter {
            path,
            file: Some(BufWriter::new(file)),
            initialized: false,
            compress: true,
            count: 0,
            size: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn set_compress(&mut self, compress: bool) {
        self.compress = compress;
    }

    pub fn compress(&self) -> bool {
        self.compress
    }

    /// Number of scans written.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Number of bytes written, header included.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Writes the file header. Must be called exactly once, before any scan.
    pub fn init(&mut self, samples_per_scan: u32, scan_frequency: u32) -> Result<()> {
        if self.initialized {
            return Err(R2000Error::Config(
                "recording header is already written".into(),
            ));
        }
        if !is_legal_samples_per_scan(samples_per_scan) || !is_legal_scan_frequency(scan_frequency)
        {
            error!(
                samples_per_scan,
                scan_frequency, "refusing to write invalid recording header"
            );
            return Err(R2000Error::InvalidRecordingHeader {
                samples_per_scan: samples_per_scan as u64,
                scan_frequency: scan_frequency as u64,
            });
        }

        let mut header = Vec::with_capacity(10);
        write_uint(&mut header, FIELD_WIDTH, samples_per_scan as u64);
        write_uint(&mut header, FIELD_WIDTH, scan_frequency as u64);
        self.file()?.write_all(&header)?;
        self.size += header.len() as u64;
        self.initialized = true;
        Ok(())
    }

    /// Appends one scan record. Encoding happens before anything is written,
    /// so a failing scan leaves the file untouched.
    pub fn write_scan(&mut self, scan: &Scan) -> Result<()> {
        if !self.initialized {
            error!("recording header missing, call init before writing scans");
            return Err(R2000Error::NotInitialized);
        }

        let mut record = Vec::with_capacity(16 + scan.len() * 8);
        write_uint(&mut record, COUNTER_WIDTH, self.count);
        write_u32_field(&mut record, &scan.distances, self.compress)?;
        write_u32_field(&mut record, &scan.amplitudes, self.compress)?;
        write_header_field(&mut record, &scan.headers);

        self.file()?.write_all(&record)?;
        self.count += 1;
        self.size += record.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.file()?.flush()?;
        Ok(())
    }

    /// Flushes and closes the file. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            debug!(
                path = %self.path.display(),
                scans = self.count,
                bytes = self.size,
                "recording closed"
            );
        }
        Ok(())
    }

    fn file(&mut self) -> Result<&mut BufWriter<File>> {
        self.file.as_mut().ok_or_else(|| {
            R2000Error::IoError(io::Error::new(
                io::ErrorKind::NotConnected,
                "recording is closed",
            ))
        })
    }
}

impl Drop for RecordingWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(error = %e, "closing recording failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::tests::make_packet;
    use crate::scan::R2000Scan;

    #[test]
    fn test_header_layout() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("header.r2k");
        let mut writer = RecordingWriter::open(&path).unwrap();
        writer.init(25200, 10).unwrap();
        writer.close().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes, vec![4, 0x70, 0x62, 0, 0, 4, 10, 0, 0, 0]);
    }

    #[test]
    fn test_write_requires_init() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("no_init.r2k");
        let mut writer = RecordingWriter::open(&path).unwrap();
        assert!(matches!(
            writer.write_scan(&Scan::new()),
            Err(R2000Error::NotInitialized)
        ));
        assert_eq!(writer.count(), 0);
        writer.close().unwrap();
        assert!(std::fs::read(&path).unwrap().is_empty());
    }

    #[test]
    fn test_init_validation() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut writer = RecordingWriter::open(dir.path().join("bad.r2k")).unwrap();
        assert!(writer.init(1000, 10).unwrap_err().is_fatal());
        assert!(writer.init(3600, 60).is_err());
        writer.init(3600, 50).unwrap();
        assert!(writer.init(3600, 50).is_err());
    }

    #[test]
    fn test_uncompressed_record_layout() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("plain.r2k");
        let mut writer = RecordingWriter::open(&path).unwrap();
        writer.set_compress(false);
        writer.init(72, 10).unwrap();

        let mut scan = Scan::new();
        scan.push_packet(make_packet(0, 1, 0, 2, &[1000, 2000]));
        writer.write_scan(&scan).unwrap();
        writer.write_scan(&scan).unwrap();
        assert_eq!(writer.count(), 2);
        writer.close().unwrap();
        assert!(!writer.is_open());

        let bytes = std::fs::read(&path).unwrap();
        // header, then counter 0 and two points of distance data
        assert_eq!(&bytes[10..19], &[8, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[19..25], &[0, 4, 2, 0, 0, 0]);
        assert_eq!(&bytes[25..29], &1000u32.to_le_bytes());
        // record: 9 counter + 3 * 6 field prefixes + 2 * 8 points + 60 header
        let record_len = 9 + 18 + 16 + 60;
        assert_eq!(bytes.len(), 10 + 2 * record_len);
        assert_eq!(writer.size(), bytes.len() as u64);
    }

    #[test]
    fn test_write_after_close() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut writer = RecordingWriter::open(dir.path().join("closed.r2k")).unwrap();
        writer.init(72, 10).unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
        assert!(writer.write_scan(&Scan::new()).is_err());
    }
}
