//! Source resolution: one input, an ordered list of decodable units
//!
//! A caller hands over a path, a URL, or raw bytes. Resolution turns that
//! into `FormatUnit`s: directories fan out to their part files, zip
//! containers (a `.mxl`, a zipped corpus) unwrap to their entries, network
//! sources are fetched once up front. After `resolve` returns, no further
//! I/O happens anywhere in the pipeline.

pub mod archive;
pub mod directory;
pub mod fetch;

use std::path::PathBuf;
use std::time::Duration;

use log::debug;

use crate::error::{IngestError, IngestResult};

/// Leading bytes of a zip local-file header.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// What the caller handed in.
#[derive(Clone, Debug)]
pub enum Source {
    /// A file or directory on disk
    Path(PathBuf),
    /// An HTTP(S) location, fetched with one blocking read
    Url(String),
    /// An in-memory buffer, with an optional filename for extension hints
    Bytes(Vec<u8>, Option<String>),
}

impl Source {
    /// Short human-readable name for error messages.
    pub fn describe(&self) -> String {
        match self {
            Source::Path(p) => p.display().to_string(),
            Source::Url(u) => u.clone(),
            Source::Bytes(b, name) => match name {
                Some(n) => n.clone(),
                None => format!("<{} bytes>", b.len()),
            },
        }
    }
}

impl From<&str> for Source {
    /// Paths and URLs share one string surface; `http(s)://` selects URL.
    fn from(s: &str) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            Source::Url(s.to_owned())
        } else {
            Source::Path(PathBuf::from(s))
        }
    }
}

impl From<PathBuf> for Source {
    fn from(p: PathBuf) -> Self {
        Source::Path(p)
    }
}

/// Knobs threaded explicitly through resolution; no process-wide state.
#[derive(Clone, Debug)]
pub struct ResolveOptions {
    /// Timeout for the single blocking URL fetch
    pub fetch_timeout: Duration,
    /// Exact filenames excluded from directories and archives
    pub excluded_names: Vec<String>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
            excluded_names: vec![".DS_Store".to_owned(), "Thumbs.db".to_owned()],
        }
    }
}

impl ResolveOptions {
    /// True when resolution should skip this directory or archive entry.
    ///
    /// Dotfiles and macOS resource-fork directories are always skipped;
    /// the configured exact names come on top.
    pub fn is_excluded(&self, name: &str) -> bool {
        name.starts_with('.')
            || name == "__MACOSX"
            || self.excluded_names.iter().any(|ex| ex == name)
    }
}

/// One decodable unit: bytes plus where they sat in the source.
#[derive(Clone, Debug)]
pub struct FormatUnit {
    pub bytes: Vec<u8>,
    /// 0-based position in resolution order
    pub position: usize,
    /// Filename (no directories), used for extension tie-breaks and errors
    pub name: Option<String>,
}

/// How the unit order was established; the merger reads this to decide
/// whether filenames count as an explicit part-index convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderingSignal {
    /// One unit, nothing to order
    Single,
    /// Numeric indices embedded in every filename
    NumericIndex,
    /// An embedded manifest declared selection and order
    Manifest,
    /// Plain case-insensitive lexical filename order
    Lexical,
    /// Order as declared by the archive's central directory
    ArchiveOrder,
}

impl OrderingSignal {
    /// Does this ordering amount to explicit part-index metadata?
    pub fn is_part_index_convention(self) -> bool {
        matches!(self, OrderingSignal::NumericIndex | OrderingSignal::Manifest)
    }
}

/// The resolver's full answer.
#[derive(Clone, Debug)]
pub struct Resolution {
    pub units: Vec<FormatUnit>,
    pub ordering: OrderingSignal,
}

impl Resolution {
    fn single(bytes: Vec<u8>, name: Option<String>) -> Self {
        Self {
            units: vec![FormatUnit {
                bytes,
                position: 0,
                name,
            }],
            ordering: OrderingSignal::Single,
        }
    }
}

/// Resolve a source into ordered units.
///
/// All I/O the pipeline will ever do (file reads, the one URL fetch,
/// archive decompression) happens inside this call.
pub fn resolve(source: Source, options: &ResolveOptions) -> IngestResult<Resolution> {
    match source {
        Source::Path(path) => {
            if path.is_dir() {
                return directory::resolve_dir(&path, options);
            }
            let bytes = std::fs::read(&path).map_err(|e| IngestError::fetch_io(&path, e))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned());
            resolve_bytes(bytes, name, options)
        }
        Source::Url(url) => {
            let (bytes, name) = fetch::fetch_url(&url, options)?;
            resolve_bytes(bytes, name, options)
        }
        Source::Bytes(bytes, name) => resolve_bytes(bytes, name, options),
    }
}

/// Unwrap containers; otherwise the buffer is one unit at position 0.
fn resolve_bytes(
    bytes: Vec<u8>,
    name: Option<String>,
    options: &ResolveOptions,
) -> IngestResult<Resolution> {
    if bytes.starts_with(ZIP_MAGIC) {
        debug!(
            "zip container detected ({})",
            name.as_deref().unwrap_or("unnamed buffer")
        );
        return archive::resolve_zip(&bytes, name.as_deref(), options);
    }
    Ok(Resolution::single(bytes, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_bytes_become_one_unit_at_position_zero() {
        let res = resolve(
            Source::Bytes(b"X:1\nT:Tune\n".to_vec(), Some("tune.abc".into())),
            &ResolveOptions::default(),
        )
        .expect("bytes always resolve");
        assert_eq!(res.units.len(), 1);
        assert_eq!(res.units[0].position, 0);
        assert_eq!(res.units[0].name.as_deref(), Some("tune.abc"));
        assert_eq!(res.ordering, OrderingSignal::Single);
    }

    #[test]
    fn string_source_split_between_url_and_path() {
        assert!(matches!(Source::from("https://x.test/a.krn"), Source::Url(_)));
        assert!(matches!(Source::from("scores/a.krn"), Source::Path(_)));
    }

    #[test]
    fn missing_file_is_a_fetch_error() {
        let res = resolve(
            Source::Path(PathBuf::from("/definitely/not/here.xml")),
            &ResolveOptions::default(),
        );
        assert!(matches!(res, Err(IngestError::FetchError { .. })));
    }

    #[test]
    fn exclusion_covers_dotfiles_and_configured_names() {
        let options = ResolveOptions::default();
        assert!(options.is_excluded(".DS_Store"));
        assert!(options.is_excluded(".hidden"));
        assert!(options.is_excluded("Thumbs.db"));
        assert!(options.is_excluded("__MACOSX"));
        assert!(!options.is_excluded("01-soprano.krn"));
    }
}
