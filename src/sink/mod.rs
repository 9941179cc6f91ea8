//! Event sink module
//!
//! Append-only CSV event log. Each batch is rendered into one buffer and
//! handed to the writer in a single `write_all`, then flushed, so nothing is
//! held back past the call.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{RecorderError, Result};
use crate::event::{NormalizedEvent, CSV_HEADER};

/// Approximate rendered size of one row, for buffer sizing
const ROW_CAPACITY: usize = 48;

/// Append-only event log
pub struct EventSink<W: Write = File> {
    writer: Option<W>,
    path: Option<PathBuf>,
    records_written: u64,
}

impl EventSink<File> {
    /// Create (or truncate) the log file at `path`, creating missing parent
    /// directories, and write the header row
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                RecorderError::StorageError(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let file = File::create(path).map_err(|e| {
            RecorderError::StorageError(format!("Failed to create {}: {}", path.display(), e))
        })?;

        let mut sink = Self::new(file)?;
        sink.path = Some(path.to_path_buf());
        info!(path = %path.display(), "Event log created");
        Ok(sink)
    }
}

impl<W: Write> EventSink<W> {
    /// Wrap an arbitrary writer, writing the header row immediately
    pub fn new(mut writer: W) -> Result<Self> {
        writer.write_all(CSV_HEADER.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        Ok(Self {
            writer: Some(writer),
            path: None,
            records_written: 0,
        })
    }

    /// Append a batch of events in order as one write.
    ///
    /// Returns the number of rows written. The caller is responsible for
    /// excluding concurrent appends; `&mut self` makes that explicit.
    pub fn append_batch(&mut self, events: &[NormalizedEvent]) -> Result<usize> {
        if events.is_empty() {
            return Ok(0);
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| RecorderError::StorageError("Event log is closed".to_string()))?;

        let mut buffer = String::with_capacity(events.len() * ROW_CAPACITY);
        for event in events {
            event.write_csv_row(&mut buffer);
        }

        writer.write_all(buffer.as_bytes())?;
        writer.flush()?;

        self.records_written += events.len() as u64;
        debug!(rows = events.len(), "Appended batch");
        Ok(events.len())
    }

    /// Flush and release the writer. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            info!(
                path = ?self.path,
                records = self.records_written,
                "Event log closed"
            );
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    /// Data rows written so far
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Borrow the underlying writer while the sink is open
    pub fn get_ref(&self) -> Option<&W> {
        self.writer.as_ref()
    }
}

impl<W: Write> Drop for EventSink<W> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "Failed to close event log on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, Side};
    use rust_decimal_macros::dec;
    use std::io;

    fn event(timestamp: u64, kind: EventKind, side: Side) -> NormalizedEvent {
        NormalizedEvent {
            timestamp,
            kind,
            side,
            price: dec!(100.25),
            quantity: dec!(1.5),
        }
    }

    fn contents(sink: &EventSink<Vec<u8>>) -> String {
        String::from_utf8(sink.get_ref().unwrap().clone()).unwrap()
    }

    /// Writer that fails every write
    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_header_written_on_open() {
        let sink = EventSink::new(Vec::<u8>::new()).unwrap();
        assert_eq!(contents(&sink), "timestamp,type,side,price,quantity\n");
        assert_eq!(sink.records_written(), 0);
    }

    #[test]
    fn test_append_batch_keeps_order() {
        let mut sink = EventSink::new(Vec::<u8>::new()).unwrap();
        let written = sink
            .append_batch(&[
                event(1, EventKind::Add, Side::Buy),
                event(1, EventKind::Cancel, Side::Sell),
            ])
            .unwrap();
        sink.append_batch(&[event(2, EventKind::Trade, Side::Buy)]).unwrap();

        assert_eq!(written, 2);
        assert_eq!(sink.records_written(), 3);
        assert_eq!(
            contents(&sink),
            "timestamp,type,side,price,quantity\n\
             1,A,B,100.25,1.5\n\
             1,C,S,100.25,1.5\n\
             2,T,B,100.25,1.5\n"
        );
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let mut sink = EventSink::new(Vec::<u8>::new()).unwrap();
        assert_eq!(sink.append_batch(&[]).unwrap(), 0);
        assert_eq!(sink.records_written(), 0);
    }

    #[test]
    fn test_close_is_idempotent_and_rejects_appends() {
        let mut sink = EventSink::new(Vec::<u8>::new()).unwrap();
        sink.close().unwrap();
        sink.close().unwrap();
        assert!(sink.is_closed());

        let err = sink
            .append_batch(&[event(1, EventKind::Add, Side::Buy)])
            .unwrap_err();
        assert!(matches!(err, RecorderError::StorageError(_)));
    }

    #[test]
    fn test_write_failure_is_storage_error() {
        let err = EventSink::new(BrokenWriter).err().unwrap();
        assert!(matches!(err, RecorderError::StorageError(_)));
    }

    #[test]
    fn test_create_makes_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data").join("market_data.csv");

        let mut sink = EventSink::create(&path).unwrap();
        sink.append_batch(&[event(9, EventKind::Trade, Side::Sell)]).unwrap();
        sink.close().unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "timestamp,type,side,price,quantity\n9,T,S,100.25,1.5\n");
        assert_eq!(sink.path(), Some(path.as_path()));
    }

    #[test]
    fn test_create_fails_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();

        let err = EventSink::create(blocker.join("out.csv")).err().unwrap();
        assert!(matches!(err, RecorderError::StorageError(_)));
    }
}
