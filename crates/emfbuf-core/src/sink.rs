//! Output sinks: where serialized records go.
//!
//! A sink receives one validated record per call and writes it as a single
//! line. Failures surface as `EmfError::Emission`; nothing here retries.

use std::io::{self, Write};
use std::sync::Mutex;

use crate::error::{EmfError, Result};
use crate::record::EmfRecord;

/// Destination for flushed records.
pub trait RecordSink: Send + Sync {
    fn emit(&self, record: &EmfRecord) -> Result<()>;
}

/// Writes each record as one JSON line to any `Write`.
pub struct WriterSink<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl WriterSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> RecordSink for WriterSink<W> {
    fn emit(&self, record: &EmfRecord) -> Result<()> {
        let mut line = record.to_json_line()?;
        line.push('\n');

        let mut out = self
            .out
            .lock()
            .map_err(|_| EmfError::Emission("writer lock poisoned".into()))?;
        out.write_all(line.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

/// Keeps emitted records in memory. Intended for tests.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<EmfRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn records(&self) -> Vec<EmfRecord> {
        match self.records.lock() {
            Ok(r) => r.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain everything emitted so far.
    pub fn take(&self) -> Vec<EmfRecord> {
        match self.records.lock() {
            Ok(mut r) => std::mem::take(&mut *r),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl RecordSink for MemorySink {
    fn emit(&self, record: &EmfRecord) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| EmfError::Emission("memory sink lock poisoned".into()))?;
        records.push(record.clone());
        Ok(())
    }
}
