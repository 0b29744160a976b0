//! Writer configuration.

/// Writer strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Choose batch or streaming at save time based on the configured
    /// thresholds.
    #[default]
    Auto,
    Batch,
    Streaming,
}

/// Options controlling how a workbook is serialized on save.
///
/// Every field has a documented default; callers only override what they
/// need to.
#[derive(Debug, Clone, PartialEq)]
pub struct WriterOptions {
    /// Whether string cells go through the shared-string dictionary
    /// (`xl/sharedStrings.xml`) or are written as inline strings.
    pub use_shared_strings: bool,
    /// Deflate level, 0 (store) through 9 (best compression).
    pub compression_level: i64,
    pub mode: WriteMode,
    /// Total occupied-cell count above which [`WriteMode::Auto`] picks
    /// streaming.
    pub auto_cell_threshold: u64,
    /// Estimated in-memory footprint (bytes) above which [`WriteMode::Auto`]
    /// picks streaming.
    pub auto_memory_threshold: u64,
    /// Force streaming regardless of size estimates.
    pub constant_memory: bool,
    /// Rows buffered ahead of the XML writer for a single sheet.
    pub row_buffer_size: usize,
    /// Size of the XML stream writer's internal flush buffer.
    pub xml_buffer_size: usize,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            use_shared_strings: true,
            compression_level: crate::archive::DEFAULT_COMPRESSION_LEVEL,
            mode: WriteMode::Auto,
            auto_cell_threshold: 1_000_000,
            auto_memory_threshold: 256 * 1024 * 1024,
            constant_memory: false,
            row_buffer_size: 1024,
            xml_buffer_size: 8192,
        }
    }
}

impl WriterOptions {
    /// Validate option values that have a restricted legal range.
    pub fn validate(&self) -> crate::error::Result<()> {
        if !(0..=9).contains(&self.compression_level) {
            return Err(crate::error::Error::InvalidArgument(format!(
                "compression_level must be 0..=9, got {}",
                self.compression_level
            )));
        }
        Ok(())
    }

    /// Decide whether this save should use the streaming strategy, given
    /// the sheet's current cell count and an estimated memory footprint.
    pub fn should_stream(&self, cell_count: u64, estimated_bytes: u64) -> bool {
        match self.mode {
            WriteMode::Streaming => true,
            WriteMode::Batch => false,
            WriteMode::Auto => {
                self.constant_memory
                    || cell_count > self.auto_cell_threshold
                    || estimated_bytes > self.auto_memory_threshold
            }
        }
    }
}
