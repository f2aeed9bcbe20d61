//! Format-specific decoder output
//!
//! Decoders do not build Scores directly. They emit a `DocumentTree`:
//! works containing parts containing sequential events, with durations and
//! tie flags but (for text formats) no offsets. Normalization assigns
//! offsets and folds tie chains afterwards, so each decoder only has to
//! transcribe what its grammar says.

use crate::models::{Pitch, Quarters};

/// A native metadata tag as the source spelled it, in source order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NativeTag {
    /// Tag name in the format's own vocabulary (e.g. `T`, `OTL`, `work-title`)
    pub name: String,
    pub value: String,
}

impl NativeTag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// What a single tree event represents.
#[derive(Clone, Debug, PartialEq)]
pub enum TreeEventKind {
    /// A pitch; `tied_forward` marks a tie into the following same-pitch note
    Note { pitch: Pitch, tied_forward: bool },

    /// Silence
    Rest,

    /// Simultaneous pitches with one shared duration
    Chord(Vec<Pitch>),

    /// Textual annotation (analysis label, section mark)
    Marker(String),
}

/// One sequential event inside a part.
///
/// `at` is an explicit offset in quarters for decoders that know absolute
/// positions (the binary format); `None` means "wherever the running
/// cursor is", which is all a purely sequential grammar can say.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeEvent {
    pub at: Option<Quarters>,
    pub duration: Quarters,
    pub kind: TreeEventKind,
}

impl TreeEvent {
    /// A cursor-positioned event.
    pub fn sequential(duration: Quarters, kind: TreeEventKind) -> Self {
        Self {
            at: None,
            duration,
            kind,
        }
    }

    /// An event at an explicit absolute offset.
    pub fn at(offset: Quarters, duration: Quarters, kind: TreeEventKind) -> Self {
        Self {
            at: Some(offset),
            duration,
            kind,
        }
    }
}

/// One voice or staff line as decoded, before offset assignment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PartTree {
    /// Declared part name, if the format names parts
    pub name: Option<String>,
    pub events: Vec<TreeEvent>,
}

impl PartTree {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            events: Vec::new(),
        }
    }

    pub fn unnamed() -> Self {
        Self::default()
    }
}

/// One work as decoded: native number, native tags, parts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkTree {
    /// Format-native work key (ABC `X:` value, movement ordinal), if declared
    pub work_number: Option<String>,
    /// Native tags in source order; extraction maps them to canonical fields
    pub tags: Vec<NativeTag>,
    pub parts: Vec<PartTree>,
}

/// Complete decoder output for one unit: one or more works.
///
/// Multi-work units (an ABC tunebook, a RomanText file with several
/// `Movement:` sections) are split by the decoder itself, so every
/// `WorkTree` downstream is exactly one candidate Score.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentTree {
    pub works: Vec<WorkTree>,
}

impl DocumentTree {
    /// Wrap a single work.
    pub fn single(work: WorkTree) -> Self {
        Self { works: vec![work] }
    }
}
