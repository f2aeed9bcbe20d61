//! The public entry points: source in, Score or Opus out
//!
//! `Ingester` owns the two pieces of configuration a parse run needs, the
//! decoder registry and the resolve options, and drives the fixed
//! pipeline: resolve the source into units, sniff and decode each unit,
//! normalize to Scores, then let the merger pick the final shape. The
//! free functions cover the common cases with default configuration.

use std::path::Path;

use log::debug;

use crate::decode::{normalize, DecoderRegistry};
use crate::error::{IngestError, IngestResult};
use crate::merge::{merge_units, DecodedUnit, ScoreOrOpus};
use crate::resolve::{resolve, FormatUnit, ResolveOptions, Source};
use crate::sniff::{self, Format};

/// A configured ingestion pipeline.
///
/// Reusable and stateless between calls; decoding one source never
/// affects the next.
#[derive(Debug)]
pub struct Ingester {
    registry: DecoderRegistry,
    options: ResolveOptions,
}

impl Ingester {
    /// An ingester with the built-in decoders and default options.
    pub fn new() -> Self {
        Self {
            registry: DecoderRegistry::with_builtins(),
            options: ResolveOptions::default(),
        }
    }

    /// An ingester over a caller-assembled registry.
    pub fn with_registry(registry: DecoderRegistry) -> Self {
        Self {
            registry,
            options: ResolveOptions::default(),
        }
    }

    /// Replace the resolve options.
    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    /// The registry, for registering or overriding decoders in place.
    pub fn registry_mut(&mut self) -> &mut DecoderRegistry {
        &mut self.registry
    }

    /// Parse one source into a Score or an Opus.
    ///
    /// The hint is advisory: each unit is classified by content first,
    /// and the hint is consulted only when sniffing comes up empty. One
    /// failing unit fails the whole call; there are no partial results.
    pub fn parse(
        &self,
        source: impl Into<Source>,
        hint: Option<Format>,
    ) -> IngestResult<ScoreOrOpus> {
        let source = source.into();
        debug!("resolving {}", source.describe());
        let resolution = resolve(source, &self.options)?;
        let ordering = resolution.ordering;

        let mut decoded = Vec::with_capacity(resolution.units.len());
        for unit in resolution.units {
            decoded.push(self.decode_unit(unit, hint)?);
        }
        merge_units(decoded, ordering)
    }

    fn decode_unit(&self, unit: FormatUnit, hint: Option<Format>) -> IngestResult<DecodedUnit> {
        let FormatUnit {
            bytes,
            position,
            name,
        } = unit;

        let format = match sniff::sniff(&bytes, name.as_deref()) {
            Some(found) => found,
            None => match hint {
                Some(hinted) => hinted,
                None => return Err(IngestError::UnknownFormat { unit: name }),
            },
        };
        debug!(
            "unit {} ({}) classified as {format}",
            position,
            name.as_deref().unwrap_or("unnamed")
        );

        let tree = self
            .registry
            .dispatch(format, &bytes)
            .map_err(|e| e.with_unit(name.as_deref()))?;
        let scores = normalize(format, tree);
        Ok(DecodedUnit { name, scores })
    }
}

impl Default for Ingester {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a path, URL, or similar string-addressed source with defaults.
pub fn parse(source: impl Into<Source>) -> IngestResult<ScoreOrOpus> {
    Ingester::new().parse(source, None)
}

/// Parse with an explicit format hint and resolve options.
pub fn parse_with(
    source: impl Into<Source>,
    hint: Option<Format>,
    options: ResolveOptions,
) -> IngestResult<ScoreOrOpus> {
    Ingester::new().with_options(options).parse(source, hint)
}

/// Parse a file or directory on disk.
pub fn parse_file(path: impl AsRef<Path>) -> IngestResult<ScoreOrOpus> {
    Ingester::new().parse(Source::Path(path.as_ref().to_path_buf()), None)
}

/// Parse an in-memory buffer.
pub fn parse_data(bytes: Vec<u8>) -> IngestResult<ScoreOrOpus> {
    Ingester::new().parse(Source::Bytes(bytes, None), None)
}

/// Fetch and parse an HTTP(S) source.
pub fn parse_url(url: &str) -> IngestResult<ScoreOrOpus> {
    Ingester::new().parse(Source::Url(url.to_owned()), None)
}
