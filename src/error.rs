//! Error types for the ingestion pipeline
//!
//! One public taxonomy (`IngestError`) covers everything a `parse` call can
//! report, so callers can match on the failure kind without string
//! inspection. Decoder-internal failures are a separate type
//! (`DecodeError`) and always reach the caller wrapped in
//! `IngestError::MalformedInput` with the format attached.

use std::path::PathBuf;

use thiserror::Error;

use crate::sniff::Format;

/// Result alias used throughout the crate.
pub type IngestResult<T> = Result<T, IngestError>;

/// Top-level failure taxonomy for ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Sniffing found no signature match for a unit's content.
    #[error("unrecognized format{}", fmt_unit(.unit))]
    UnknownFormat {
        /// Filename of the unit that could not be classified, where known.
        unit: Option<String>,
    },

    /// A format was identified but no decoder is registered for it.
    #[error("no decoder registered for {format}")]
    UnsupportedFormat { format: Format },

    /// The decoder rejected the content structurally.
    #[error("malformed {format} input{}: {source}", fmt_unit(.unit))]
    MalformedInput {
        format: Format,
        /// Filename of the failing unit, where known.
        unit: Option<String>,
        #[source]
        source: DecodeError,
    },

    /// A directory's part files cannot be put into a total order.
    #[error("cannot order part files: {0}")]
    AmbiguousPartOrder(String),

    /// Two works in one opus declare the same work number.
    #[error("duplicate work number {0:?} in opus")]
    DuplicateWorkNumber(String),

    /// A lookup by work number or title found no match.
    #[error("no work matching {0:?}")]
    WorkNotFound(String),

    /// Scores with incompatible metadata cannot be merged into one.
    #[error("cannot merge scores: {0}")]
    IncompatibleMerge(String),

    /// Reading the source failed: file I/O, network error, or timeout.
    #[error("failed to read {source_name}: {reason}")]
    FetchError { source_name: String, reason: String },
}

impl IngestError {
    /// Attach a unit filename to an error that was raised before the
    /// pipeline knew which unit it was working on.
    pub(crate) fn with_unit(self, name: Option<&str>) -> Self {
        match self {
            IngestError::MalformedInput {
                format,
                unit: None,
                source,
            } => IngestError::MalformedInput {
                format,
                unit: name.map(str::to_owned),
                source,
            },
            IngestError::UnknownFormat { unit: None } => IngestError::UnknownFormat {
                unit: name.map(str::to_owned),
            },
            other => other,
        }
    }

    /// Build a `FetchError` from an I/O failure on a local path.
    pub(crate) fn fetch_io(path: &PathBuf, err: std::io::Error) -> Self {
        IngestError::FetchError {
            source_name: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

fn fmt_unit(unit: &Option<String>) -> String {
    match unit {
        Some(name) => format!(" in {name}"),
        None => String::new(),
    }
}

/// Failures produced by an individual decoder.
///
/// Line numbers are 1-based and reported only by line-oriented text
/// formats; the binary decoder reports positions inside the message text.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// A token or record that does not follow the format's grammar.
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// Structurally invalid content with no useful line position.
    #[error("{0}")]
    Invalid(String),

    /// The data ends before a required structure is complete.
    #[error("unexpected end of data: {0}")]
    Truncated(String),

    /// Well-formed content using a structure this decoder does not handle.
    #[error("unsupported structure: {0}")]
    Unsupported(String),
}

impl DecodeError {
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        DecodeError::Syntax {
            line,
            message: message.into(),
        }
    }
}
