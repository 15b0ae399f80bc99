use crate::core::models::structure::ParsedStructure;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::Utf8Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to read structure file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Structure file is not valid UTF-8: {0}")]
    Utf8(#[from] Utf8Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: ParseErrorKind },
    #[error("Missing required record: {0}")]
    MissingRecord(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseErrorKind {
    #[error("Invalid number for '{tag}' (value: '{value}')")]
    InvalidNumber { tag: String, value: String },
    #[error("Unrecognized species '{0}'")]
    InvalidSpecies(String),
    #[error("Invalid symmetry operation '{0}'")]
    InvalidSymmetryOperation(String),
    #[error("Loop has {values} values, which is not a multiple of its {tags} tags")]
    LoopRowLength { tags: usize, values: usize },
    #[error("Loop declares no tags")]
    EmptyLoop,
    #[error("Tag '{0}' has no value")]
    MissingValue(String),
    #[error("Unterminated quoted string")]
    UnterminatedQuote,
    #[error("Unterminated semicolon text field")]
    UnterminatedTextField,
}

/// Capability to turn the raw bytes of a structure file into a [`ParsedStructure`].
///
/// The validation workflow only depends on this trait, so any file format can be
/// plugged in. Implementations must be shareable across worker threads.
pub trait StructureParser: Send + Sync {
    /// Parses a structure from an in-memory buffer.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the buffer is not a well-formed structure description.
    fn parse(&self, bytes: &[u8]) -> Result<ParsedStructure, ParseError>;

    /// Reads and parses the structure file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Io`] if the file cannot be read, otherwise whatever
    /// [`StructureParser::parse`] returns.
    fn parse_path(&self, path: &Path) -> Result<ParsedStructure, ParseError> {
        let bytes = fs::read(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse(&bytes)
    }
}
