//! Error types for the XlForge core library.
//!
//! Provides a comprehensive [`Error`] enum covering all failure modes
//! encountered when reading, writing, and manipulating Excel workbooks.

use thiserror::Error;

/// The top-level error type for XlForge.
#[derive(Error, Debug)]
pub enum Error {
    // ===== Cell reference errors =====
    /// The given string is not a valid A1-style cell reference.
    #[error("invalid cell reference: {0}")]
    InvalidCellReference(String),

    /// The row number is out of the allowed range (1..=1_048_576).
    #[error("invalid row number: {0}")]
    InvalidRowNumber(u32),

    /// The column number is out of the allowed range (1..=16_384).
    #[error("invalid column number: {0}")]
    InvalidColumnNumber(u32),

    // ===== Sheet errors =====
    /// No sheet with the given name exists in the workbook.
    #[error("sheet '{name}' does not exist")]
    SheetNotFound { name: String },

    /// A sheet with the given name already exists.
    #[error("sheet '{name}' already exists")]
    SheetAlreadyExists { name: String },

    /// The sheet name violates Excel naming rules.
    #[error("invalid sheet name: {0}")]
    InvalidSheetName(String),

    // ===== I/O errors =====
    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error originating from the ZIP layer.
    #[error("ZIP error: {0}")]
    Zip(String),

    /// An error encountered while parsing XML.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// An error encountered while deserializing XML into typed structures.
    #[error("XML deserialization error: {0}")]
    XmlDeserialize(String),

    // ===== Value errors =====
    /// A cell value exceeds the maximum character limit.
    #[error("cell value too long: {length} characters (max {max})")]
    CellValueTooLong { length: usize, max: usize },

    /// A row/column/argument is out of range or otherwise malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The workbook is not in a state that permits the requested operation
    /// (e.g. mutating a read-only workbook, saving a closed one, opening a
    /// streaming entry twice).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The archive's central directory is missing, truncated, or an entry's
    /// CRC32 does not match its recorded checksum.
    #[error("archive corrupt: {0}")]
    ArchiveCorrupt(String),

    /// An input package part is not well-formed or does not match the
    /// structure this crate expects.
    #[error("format error in {path}: {message}")]
    FormatError { path: String, message: String },

    /// A feature the core deliberately does not implement.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// An internal or otherwise unclassified error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Zip(err.to_string())
    }
}

/// A convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
