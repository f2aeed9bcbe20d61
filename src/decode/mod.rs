//! Decoder trait, registry, and dispatch
//!
//! A `Decoder` turns raw bytes of one already-identified format into a
//! `DocumentTree`. The registry maps formats to decoders and does nothing
//! else: no inference, no normalization. Re-registering a format replaces
//! the prior decoder, which is how tests (and embedders) override a
//! built-in.

pub mod normalize;
pub mod tree;

use std::collections::HashMap;

use log::debug;

use crate::error::{DecodeError, IngestError, IngestResult};
use crate::sniff::Format;

pub use normalize::normalize;
pub use tree::{DocumentTree, NativeTag, PartTree, TreeEvent, TreeEventKind, WorkTree};

/// Byte-to-tree decoder for one format.
pub trait Decoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DocumentTree, DecodeError>;
}

/// Format-to-decoder dispatch table.
pub struct DecoderRegistry {
    decoders: HashMap<Format, Box<dyn Decoder>>,
}

impl DecoderRegistry {
    /// A registry with no decoders; everything dispatches to
    /// `UnsupportedFormat` until `register` is called.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// A registry with all six built-in decoders installed.
    pub fn with_builtins() -> Self {
        debug_assert!(
            crate::extract::tables_complete(),
            "every format must have an extraction table mapping the title"
        );

        let mut registry = Self::empty();
        registry.register(Format::MusicXml, Box::new(crate::formats::musicxml::MusicXmlDecoder));
        registry.register(Format::Humdrum, Box::new(crate::formats::kern::KernDecoder));
        registry.register(Format::Abc, Box::new(crate::formats::abc::AbcDecoder));
        registry.register(Format::RomanText, Box::new(crate::formats::romantext::RomanTextDecoder));
        registry.register(Format::MuseData, Box::new(crate::formats::musedata::MuseDataDecoder));
        registry.register(Format::Midi, Box::new(crate::formats::midi::MidiDecoder));
        registry
    }

    /// Install a decoder for `format`, replacing any prior one.
    pub fn register(&mut self, format: Format, decoder: Box<dyn Decoder>) {
        if self.decoders.insert(format, decoder).is_some() {
            debug!("decoder for {format} replaced");
        }
    }

    pub fn is_registered(&self, format: Format) -> bool {
        self.decoders.contains_key(&format)
    }

    /// Decode `bytes` with the decoder registered for `format`.
    ///
    /// `UnsupportedFormat` when none is registered; decoder failures come
    /// back as `MalformedInput` with the format attached (the unit name is
    /// filled in by the pipeline, which knows it).
    pub fn dispatch(&self, format: Format, bytes: &[u8]) -> IngestResult<DocumentTree> {
        let decoder = self
            .decoders
            .get(&format)
            .ok_or(IngestError::UnsupportedFormat { format })?;
        decoder.decode(bytes).map_err(|source| IngestError::MalformedInput {
            format,
            unit: None,
            source,
        })
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut formats: Vec<&Format> = self.decoders.keys().collect();
        formats.sort_by_key(|f| f.name());
        f.debug_struct("DecoderRegistry")
            .field("formats", &formats)
            .finish()
    }
}
