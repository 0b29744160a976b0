//! Writer strategies.
//!
//! [`FileWriter`] is the seam between the orchestrator and the archive
//! engine. [`BatchWriter`] buffers each part fully before committing it;
//! [`StreamingWriter`] pushes bytes straight through to the archive as the
//! XML writer produces them, for constant memory regardless of output size.

use std::io::{Seek, Write};

use crate::archive::{ArchiveWriter, BatchEntry};
use crate::error::{Error, Result};

/// Which concrete strategy a [`FileWriter`] is, for diagnostics/logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterKind {
    Batch,
    Streaming,
}

/// Running totals a writer accumulates across a save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub parts_written: u64,
    pub bytes_written: u64,
}

/// Common seam both writer strategies implement.
pub trait FileWriter {
    fn write_whole_file(&mut self, path: &str, content: &[u8]) -> Result<()>;
    fn open_streaming(&mut self, path: &str) -> Result<()>;
    fn write_chunk(&mut self, bytes: &[u8]) -> Result<()>;
    fn close_streaming(&mut self) -> Result<()>;
    fn stats(&self) -> WriterStats;
    fn kind(&self) -> WriterKind;
}

/// Buffers each part's complete bytes in memory, committing them to the
/// archive in one bulk call at end of save.
pub struct BatchWriter {
    entries: Vec<BatchEntry>,
    streaming_buffer: Option<(String, Vec<u8>)>,
    stats: WriterStats,
}

impl BatchWriter {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            streaming_buffer: None,
            stats: WriterStats::default(),
        }
    }

    /// Commit every buffered entry to the archive writer.
    pub fn finish<W: Write + Seek>(self, archive: &mut ArchiveWriter<W>) -> Result<()> {
        archive.add_batch(&self.entries)
    }
}

impl Default for BatchWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FileWriter for BatchWriter {
    fn write_whole_file(&mut self, path: &str, content: &[u8]) -> Result<()> {
        if self.streaming_buffer.is_some() {
            return Err(Error::InvalidState(
                "batch writer: cannot write a whole file while a stream is open".to_string(),
            ));
        }
        self.stats.parts_written += 1;
        self.stats.bytes_written += content.len() as u64;
        self.entries.push(BatchEntry {
            name: path.to_string(),
            bytes: content.to_vec(),
        });
        Ok(())
    }

    fn open_streaming(&mut self, path: &str) -> Result<()> {
        if self.streaming_buffer.is_some() {
            return Err(Error::InvalidState(
                "batch writer: a stream is already open".to_string(),
            ));
        }
        self.streaming_buffer = Some((path.to_string(), Vec::new()));
        Ok(())
    }

    fn write_chunk(&mut self, bytes: &[u8]) -> Result<()> {
        let (_, buf) = self.streaming_buffer.as_mut().ok_or_else(|| {
            Error::InvalidState("batch writer: no stream is open".to_string())
        })?;
        buf.extend_from_slice(bytes);
        Ok(())
    }

    fn close_streaming(&mut self) -> Result<()> {
        let (path, buf) = self.streaming_buffer.take().ok_or_else(|| {
            Error::InvalidState("batch writer: no stream is open to close".to_string())
        })?;
        self.stats.parts_written += 1;
        self.stats.bytes_written += buf.len() as u64;
        self.entries.push(BatchEntry { name: path, bytes: buf });
        Ok(())
    }

    fn stats(&self) -> WriterStats {
        self.stats
    }

    fn kind(&self) -> WriterKind {
        WriterKind::Batch
    }
}

/// Opens a single archive entry at a time and writes chunks straight
/// through, closing the entry when done. Uses constant memory regardless
/// of output size. Mutually exclusive with an already-open stream.
pub struct StreamingWriter<'a, W: Write + Seek> {
    archive: &'a mut ArchiveWriter<W>,
    entry_open: bool,
    stats: WriterStats,
}

impl<'a, W: Write + Seek> StreamingWriter<'a, W> {
    pub fn new(archive: &'a mut ArchiveWriter<W>) -> Self {
        Self {
            archive,
            entry_open: false,
            stats: WriterStats::default(),
        }
    }
}

impl<'a, W: Write + Seek> Write for StreamingWriter<'a, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.write_chunk(buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a, W: Write + Seek> FileWriter for StreamingWriter<'a, W> {
    fn write_whole_file(&mut self, path: &str, content: &[u8]) -> Result<()> {
        if self.entry_open {
            return Err(Error::InvalidState(
                "streaming writer: cannot write a whole file while a stream is open".to_string(),
            ));
        }
        self.archive.write_whole_entry(path, content)?;
        self.stats.parts_written += 1;
        self.stats.bytes_written += content.len() as u64;
        Ok(())
    }

    fn open_streaming(&mut self, path: &str) -> Result<()> {
        if self.entry_open {
            return Err(Error::InvalidState(
                "streaming writer: a stream is already open".to_string(),
            ));
        }
        self.archive.start_entry(path)?;
        self.entry_open = true;
        Ok(())
    }

    fn write_chunk(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.entry_open {
            return Err(Error::InvalidState(
                "streaming writer: no stream is open".to_string(),
            ));
        }
        self.archive.feed_bytes(bytes)?;
        self.stats.bytes_written += bytes.len() as u64;
        Ok(())
    }

    fn close_streaming(&mut self) -> Result<()> {
        if !self.entry_open {
            return Err(Error::InvalidState(
                "streaming writer: no stream is open to close".to_string(),
            ));
        }
        self.archive.end_entry()?;
        self.entry_open = false;
        self.stats.parts_written += 1;
        Ok(())
    }

    fn stats(&self) -> WriterStats {
        self.stats
    }

    fn kind(&self) -> WriterKind {
        WriterKind::Streaming
    }
}
