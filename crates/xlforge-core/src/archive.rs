//! Archive engine: a writer and reader over the deflate-compressed ZIP
//! container every OPC package is stored in.

use std::io::{Read, Seek, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};

/// Default deflate level, matching what most Excel-compatible writers use.
pub const DEFAULT_COMPRESSION_LEVEL: i64 = 6;

/// Store-only; useful for benchmarking or when the consumer recompresses.
pub const STORE_COMPRESSION_LEVEL: i64 = 0;

fn file_options(level: i64) -> SimpleFileOptions {
    let method = if level == STORE_COMPRESSION_LEVEL {
        CompressionMethod::Stored
    } else {
        CompressionMethod::Deflated
    };
    let mut options = SimpleFileOptions::default().compression_method(method);
    if method == CompressionMethod::Deflated {
        options = options.compression_level(Some(level as i32));
    }
    options
}

/// A single precomputed entry for [`ArchiveWriter::add_batch`].
pub struct BatchEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Writes OPC parts into a ZIP archive, one entry at a time or in bulk.
pub struct ArchiveWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    compression_level: i64,
    entry_open: bool,
}

impl<W: Write + Seek> ArchiveWriter<W> {
    pub fn new(sink: W, compression_level: i64) -> Self {
        Self {
            zip: ZipWriter::new(sink),
            compression_level,
            entry_open: false,
        }
    }

    /// Start a new entry, reserving its local header. Only one entry may be
    /// open at a time.
    pub fn start_entry(&mut self, name: &str) -> Result<()> {
        if self.entry_open {
            return Err(Error::InvalidState(
                "archive writer: an entry is already open".to_string(),
            ));
        }
        self.zip.start_file(name, file_options(self.compression_level))?;
        self.entry_open = true;
        Ok(())
    }

    /// Deflate-encode and append bytes to the currently open entry.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.entry_open {
            return Err(Error::InvalidState(
                "archive writer: no entry is open".to_string(),
            ));
        }
        self.zip.write_all(bytes)?;
        Ok(())
    }

    /// End the currently open entry. CRC32 and sizes are finalized by the
    /// underlying ZIP writer when the next entry starts or the archive is
    /// finished.
    pub fn end_entry(&mut self) -> Result<()> {
        if !self.entry_open {
            return Err(Error::InvalidState(
                "archive writer: no entry is open to end".to_string(),
            ));
        }
        self.entry_open = false;
        Ok(())
    }

    /// Write one complete entry in a single call.
    pub fn write_whole_entry(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        self.start_entry(name)?;
        self.feed_bytes(bytes)?;
        self.end_entry()
    }

    /// Write a batch of precomputed entries.
    pub fn add_batch(&mut self, entries: &[BatchEntry]) -> Result<()> {
        for entry in entries {
            self.write_whole_entry(&entry.name, &entry.bytes)?;
        }
        Ok(())
    }

    /// Copy a single entry byte-for-byte from a source archive, used by the
    /// resource manager's passthrough save path.
    pub fn copy_entry_from<R: Read + Seek>(
        &mut self,
        source: &mut ZipArchive<R>,
        name: &str,
    ) -> Result<()> {
        let mut entry = source
            .by_name(name)
            .map_err(|e| Error::ArchiveCorrupt(format!("{name}: {e}")))?;
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        drop(entry);
        self.write_whole_entry(name, &bytes)
    }

    /// Close the archive, writing the central directory and
    /// end-of-central-directory record.
    pub fn finish(mut self) -> Result<W> {
        if self.entry_open {
            return Err(Error::InvalidState(
                "archive writer: finish called with an entry still open".to_string(),
            ));
        }
        Ok(self.zip.finish()?)
    }
}

/// Reads OPC parts out of a ZIP archive.
pub struct ArchiveReader<R: Read + Seek> {
    archive: ZipArchive<R>,
}

impl<R: Read + Seek> ArchiveReader<R> {
    pub fn new(source: R) -> Result<Self> {
        let archive = ZipArchive::new(source)
            .map_err(|e| Error::ArchiveCorrupt(format!("central directory: {e}")))?;
        Ok(Self { archive })
    }

    /// List every entry name, in central-directory order.
    pub fn list(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.archive.file_names().any(|n| n == name)
    }

    /// Extract an entry to an owned byte buffer.
    pub fn extract_bytes(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut entry = self
            .archive
            .by_name(name)
            .map_err(|e| Error::ArchiveCorrupt(format!("missing entry {name}: {e}")))?;
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buf)
            .map_err(|e| Error::ArchiveCorrupt(format!("truncated entry {name}: {e}")))?;
        Ok(buf)
    }

    /// Extract an entry and decode it as UTF-8 text.
    pub fn extract_string(&mut self, name: &str) -> Result<String> {
        let mut entry = self
            .archive
            .by_name(name)
            .map_err(|e| Error::ArchiveCorrupt(format!("missing entry {name}: {e}")))?;
        let mut s = String::with_capacity(entry.size() as usize);
        entry
            .read_to_string(&mut s)
            .map_err(|e| Error::ArchiveCorrupt(format!("invalid UTF-8 in entry {name}: {e}")))?;
        Ok(s)
    }

    /// Extract an entry directly into a caller-provided sink.
    pub fn extract_to<W: Write>(&mut self, name: &str, sink: &mut W) -> Result<u64> {
        let mut entry = self
            .archive
            .by_name(name)
            .map_err(|e| Error::ArchiveCorrupt(format!("missing entry {name}: {e}")))?;
        std::io::copy(&mut entry, sink)
            .map_err(|e| Error::ArchiveCorrupt(format!("truncated entry {name}: {e}")))
    }

    /// Borrow the underlying `zip` archive for the passthrough copy path.
    pub fn inner_mut(&mut self) -> &mut ZipArchive<R> {
        &mut self.archive
    }
}
