//! Newline-delimited change envelopes, grouped into batches.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// A batch of serialized envelopes as delivered by the change source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Line number of the last record in the batch. Committed once the batch is applied.
    pub end_offset: u64,
    pub records: Vec<String>,
}

/// Reads one envelope per line and hands them out in batches.
pub struct BatchSource<R> {
    reader: R,
    batch_size: usize,
    offset: u64,
    line: String,
}

impl<R: AsyncBufRead + Unpin> BatchSource<R> {
    pub fn new(reader: R, batch_size: usize) -> Self {
        Self {
            reader,
            batch_size: batch_size.max(1),
            offset: 0,
            line: String::new(),
        }
    }

    /// Offset of the last line read.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read up to `batch_size` records. `None` once the input is exhausted.
    ///
    /// Blank lines are kept: the router counts them as records without
    /// payload.
    pub async fn next_batch(&mut self) -> Result<Option<Batch>> {
        let mut records = Vec::with_capacity(self.batch_size);

        while records.len() < self.batch_size {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .await
                .with_context(|| format!("Failed to read record at line {}", self.offset + 1))?;
            if read == 0 {
                break;
            }

            self.offset += 1;
            records.push(self.line.trim_end_matches(|c: char| c == '\r' || c == '\n').to_string());
        }

        if records.is_empty() {
            return Ok(None);
        }

        Ok(Some(Batch {
            end_offset: self.offset,
            records,
        }))
    }
}

/// Batch source over a file.
pub async fn open_file(
    path: &Path,
    batch_size: usize,
) -> Result<BatchSource<BufReader<tokio::fs::File>>> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open input: {}", path.display()))?;
    Ok(BatchSource::new(BufReader::new(file), batch_size))
}

/// Batch source over stdin.
pub fn open_stdin(batch_size: usize) -> BatchSource<BufReader<tokio::io::Stdin>> {
    BatchSource::new(BufReader::new(tokio::io::stdin()), batch_size)
}
