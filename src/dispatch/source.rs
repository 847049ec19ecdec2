//! Sequential reader over a job file made of concatenated JSON records.

use crate::job::descriptor::JobDescriptor;
use anyhow::{Context, Result};
use serde_json::de::IoRead;
use serde_json::{Deserializer, StreamDeserializer};
use std::fmt;
use std::io::{Cursor, Read};
use std::path::Path;

/// A record in the job file that could not be decoded.
#[derive(Debug)]
pub struct SourceError {
    record: usize,
    source: serde_json::Error,
}

impl SourceError {
    /// One-based position of the offending record.
    pub fn record(&self) -> usize {
        self.record
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "malformed job record #{} (line {}, column {}): {}",
            self.record,
            self.source.line(),
            self.source.column(),
            self.source
        )
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Yields job descriptors one at a time. After the first malformed record the
/// source reports itself exhausted.
pub struct JobSource<R: Read> {
    records: StreamDeserializer<'static, IoRead<R>, JobDescriptor>,
    yielded: usize,
    exhausted: bool,
}

impl JobSource<Cursor<Vec<u8>>> {
    /// Reads the whole job file. Failing to read it is fatal to the run.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to open job source {}", path.display()))?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::from_reader(Cursor::new(bytes.into()))
    }
}

impl<R: Read> JobSource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            records: Deserializer::from_reader(reader).into_iter(),
            yielded: 0,
            exhausted: false,
        }
    }

    /// Number of records pulled so far, malformed ones included.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Returns the next descriptor, a decoding error, or `None` at clean end of input.
    pub fn next_descriptor(&mut self) -> Option<Result<JobDescriptor, SourceError>> {
        if self.exhausted {
            return None;
        }

        match self.records.next() {
            None => {
                self.exhausted = true;
                None
            }
            Some(Ok(descriptor)) => {
                self.yielded += 1;
                Some(Ok(descriptor))
            }
            Some(Err(source)) => {
                self.yielded += 1;
                self.exhausted = true;
                Some(Err(SourceError {
                    record: self.yielded,
                    source,
                }))
            }
        }
    }
}

impl<R: Read> Iterator for JobSource<R> {
    type Item = Result<JobDescriptor, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_descriptor()
    }
}
