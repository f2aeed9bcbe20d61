//! Built-in decoders, one module per supported format
//!
//! Each decoder is deliberately minimal: metadata, notes, rests, and
//! structural markers with exact rational durations. Ornamentation,
//! dynamics, and layout are not transcribed. Anything richer can be
//! installed over a built-in via `DecoderRegistry::register`.

pub mod abc;
pub mod kern;
pub mod midi;
pub mod musedata;
pub mod musicxml;
pub mod romantext;
