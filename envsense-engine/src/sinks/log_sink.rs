//! Append-only log sink
//!
//! One destination per [`LogStream`]. The destination is created with a
//! header line on first append; read-back returns data lines in write order
//! with the header excluded.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use envsense_common::events::LogStream;
use tracing::{debug, info};

use crate::config::DataPaths;
use crate::error::{Error, Result};
use crate::record::{encode_line, split_records};

/// Append-only record storage
pub trait LogSink: Send + Sync {
    /// Append one encoded line, creating the destination with `header` if needed
    fn append(&self, stream: LogStream, header: &[&str], line: &str) -> Result<()>;

    /// All data lines in order, header excluded
    fn read_back(&self, stream: LogStream) -> Result<Vec<String>>;

    /// Delete the destination entirely
    fn clear(&self, stream: LogStream) -> Result<()>;
}

/// CSV files in the data folder, one per stream
#[derive(Debug)]
pub struct CsvFileLog {
    paths: DataPaths,
    /// Serializes header creation with appends
    write_lock: Mutex<()>,
}

impl CsvFileLog {
    pub fn new(paths: DataPaths) -> Self {
        Self {
            paths,
            write_lock: Mutex::new(()),
        }
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }
}

impl LogSink for CsvFileLog {
    fn append(&self, stream: LogStream, header: &[&str], line: &str) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let path = self.paths.log_file(stream);

        let is_new = !path.exists();
        if is_new {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if is_new {
            writeln!(file, "{}", encode_line(header))?;
            info!("Created {} log at {}", stream, path.display());
        }
        writeln!(file, "{}", line)?;
        debug!("Appended {} log line ({} bytes)", stream, line.len());
        Ok(())
    }

    fn read_back(&self, stream: LogStream) -> Result<Vec<String>> {
        let path = self.paths.log_file(stream);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        Ok(split_records(&content).into_iter().skip(1).collect())
    }

    fn clear(&self, stream: LogStream) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let path = self.paths.log_file(stream);
        if path.exists() {
            fs::remove_file(&path)?;
            info!("Deleted {} log at {}", stream, path.display());
        }
        Ok(())
    }
}

/// In-memory sink with optional write-failure injection
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<HashMap<LogStream, Vec<String>>>,
    headers: Mutex<HashMap<LogStream, String>>,
    fail_writes: AtomicBool,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent append fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn header(&self, stream: LogStream) -> Option<String> {
        self.headers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&stream)
            .cloned()
    }
}

impl LogSink for MemoryLog {
    fn append(&self, stream: LogStream, header: &[&str], line: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::sink(format!("log:{}", stream), "injected write failure"));
        }
        self.headers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(stream)
            .or_insert_with(|| encode_line(header));
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(stream)
            .or_default()
            .push(line.to_string());
        Ok(())
    }

    fn read_back(&self, stream: LogStream) -> Result<Vec<String>> {
        Ok(self
            .lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&stream)
            .cloned()
            .unwrap_or_default())
    }

    fn clear(&self, stream: LogStream) -> Result<()> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).remove(&stream);
        self.headers.lock().unwrap_or_else(|e| e.into_inner()).remove(&stream);
        Ok(())
    }
}
