//! Symbolic music ingestion
//!
//! Turns files, directories, archives, URLs, or raw bytes holding music
//! notation into one unified document model. Format detection is
//! content-first, decoding is pluggable per format, and multi-file
//! sources come back either as one multi-part Score or as an Opus of
//! separate works, decided by declared work identity.
//!
//! ```no_run
//! use partitura::{parse, ScoreOrOpus};
//!
//! let score = parse("chorale.krn")?.into_score()?;
//! for part in &score.parts {
//!     println!("{}: {} events", part.id, part.stream.len());
//! }
//! # Ok::<(), partitura::IngestError>(())
//! ```

pub mod decode;
pub mod error;
pub mod extract;
pub mod formats;
pub mod ingest;
pub mod merge;
pub mod models;
pub mod resolve;
pub mod sniff;

// Re-export the everyday surface at the crate root
pub use error::{DecodeError, IngestError, IngestResult};
pub use ingest::{parse, parse_data, parse_file, parse_url, parse_with, Ingester};
pub use merge::ScoreOrOpus;
pub use models::{
    Element, Entry, EventKind, Metadata, Node, Opus, Part, PartId, Pitch, Quarters, Score, Step,
    Stream,
};
pub use resolve::{ResolveOptions, Source};
pub use sniff::{sniff, Format};
