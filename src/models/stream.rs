//! Offset-keyed event containers
//!
//! A `Stream` holds `Element`s and nested `Stream`s keyed by rational
//! offset. Entries are kept sorted by offset at all times; equal offsets
//! preserve insertion order, so decoders that emit chronologically get
//! stable element order for free. Flattening resolves nesting into a
//! borrowed view with absolute offsets and never mutates the tree.

use serde::{Deserialize, Serialize};

use crate::models::timebase::{zero, Quarters};

/// Diatonic letter name of a pitch.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Step {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Step {
    /// Semitone distance above C within one octave.
    pub fn semitones(self) -> i32 {
        match self {
            Step::C => 0,
            Step::D => 2,
            Step::E => 4,
            Step::F => 5,
            Step::G => 7,
            Step::A => 9,
            Step::B => 11,
        }
    }

    /// Parse a letter name, accepting either case.
    pub fn from_letter(letter: char) -> Option<Step> {
        match letter.to_ascii_uppercase() {
            'C' => Some(Step::C),
            'D' => Some(Step::D),
            'E' => Some(Step::E),
            'F' => Some(Step::F),
            'G' => Some(Step::G),
            'A' => Some(Step::A),
            'B' => Some(Step::B),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Step::C => 'C',
            Step::D => 'D',
            Step::E => 'E',
            Step::F => 'F',
            Step::G => 'G',
            Step::A => 'A',
            Step::B => 'B',
        }
    }
}

/// Structural spelled pitch (letter, chromatic alteration, octave).
///
/// Octaves are scientific: middle C is C4. Alteration is in semitones,
/// positive sharp (e.g. `alter: 1` on F is F#).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Pitch {
    pub step: Step,
    pub alter: i8,
    pub octave: i8,
}

impl Pitch {
    pub fn new(step: Step, alter: i8, octave: i8) -> Self {
        Self { step, alter, octave }
    }

    /// Natural pitch at the given octave.
    pub fn natural(step: Step, octave: i8) -> Self {
        Self::new(step, 0, octave)
    }

    /// MIDI key number (C4 = 60). Out-of-range spellings are clamped to 0..=127.
    pub fn midi_number(&self) -> u8 {
        let n = (self.octave as i32 + 1) * 12 + self.step.semitones() + self.alter as i32;
        n.clamp(0, 127) as u8
    }

    /// Spell a MIDI key number, preferring sharps for black keys.
    pub fn from_midi(key: u8) -> Self {
        let (step, alter) = match key % 12 {
            0 => (Step::C, 0),
            1 => (Step::C, 1),
            2 => (Step::D, 0),
            3 => (Step::D, 1),
            4 => (Step::E, 0),
            5 => (Step::F, 0),
            6 => (Step::F, 1),
            7 => (Step::G, 0),
            8 => (Step::G, 1),
            9 => (Step::A, 0),
            10 => (Step::A, 1),
            _ => (Step::B, 0),
        };
        Self {
            step,
            alter,
            octave: (key / 12) as i8 - 1,
        }
    }
}

impl std::fmt::Display for Pitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.step.letter())?;
        let mark = if self.alter >= 0 { '#' } else { 'b' };
        for _ in 0..self.alter.unsigned_abs() {
            write!(f, "{mark}")?;
        }
        write!(f, "{}", self.octave)
    }
}

/// What an `Element` represents on the timeline.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum EventKind {
    /// A single sounding pitch
    Note(Pitch),

    /// Silence occupying the element's duration
    Rest,

    /// Simultaneous pitches sharing one onset and duration
    Chord(Vec<Pitch>),

    /// Zero-width textual annotation (analysis label, section mark)
    Marker(String),
}

/// One timeline event: a duration plus what fills it.
///
/// The offset lives on the enclosing stream entry, not here, so the same
/// element value can be positioned without rewriting it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Element {
    pub duration: Quarters,
    pub kind: EventKind,
}

impl Element {
    pub fn new(duration: Quarters, kind: EventKind) -> Self {
        Self { duration, kind }
    }

    pub fn note(duration: Quarters, pitch: Pitch) -> Self {
        Self::new(duration, EventKind::Note(pitch))
    }

    pub fn rest(duration: Quarters) -> Self {
        Self::new(duration, EventKind::Rest)
    }
}

/// Payload of one stream entry.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Node {
    Element(Element),
    Stream(Stream),
}

/// An offset-keyed slot in a stream.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Entry {
    /// Offset in quarters relative to the enclosing stream's origin
    pub offset: Quarters,
    pub node: Node,
}

/// Ordered, offset-keyed container of elements and nested streams.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Stream {
    entries: Vec<Entry>,
}

/// One element of a flattened stream, with its absolute offset resolved.
#[derive(Clone, Copy, Debug)]
pub struct FlatEvent<'a> {
    pub offset: Quarters,
    pub element: &'a Element,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an element at `offset`, keeping entries sorted.
    ///
    /// Equal offsets keep insertion order. Panics on a negative offset;
    /// decoders must never produce one.
    pub fn push(&mut self, offset: Quarters, element: Element) {
        self.insert_entry(offset, Node::Element(element));
    }

    /// Insert a nested stream whose own offsets are relative to `offset`.
    pub fn push_stream(&mut self, offset: Quarters, stream: Stream) {
        self.insert_entry(offset, Node::Stream(stream));
    }

    fn insert_entry(&mut self, offset: Quarters, node: Node) {
        assert!(offset >= zero(), "stream offsets must be non-negative");
        let at = self.entries.partition_point(|e| e.offset <= offset);
        self.entries.insert(at, Entry { offset, node });
    }

    /// Direct entries in offset order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Number of direct entries (nested streams count as one).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve nesting into a flat, offset-ordered element view.
    ///
    /// Offsets in the result are absolute with respect to this stream's
    /// origin. The view borrows; the stream itself is untouched.
    pub fn flatten(&self) -> Vec<FlatEvent<'_>> {
        let mut out = Vec::new();
        self.flatten_into(zero(), &mut out);
        out.sort_by_key(|ev| ev.offset);
        out
    }

    fn flatten_into<'a>(&'a self, base: Quarters, out: &mut Vec<FlatEvent<'a>>) {
        for entry in &self.entries {
            let at = base + entry.offset;
            match &entry.node {
                Node::Element(el) => out.push(FlatEvent {
                    offset: at,
                    element: el,
                }),
                Node::Stream(inner) => inner.flatten_into(at, out),
            }
        }
    }

    /// Offset just past the last-ending element, zero for an empty stream.
    pub fn end(&self) -> Quarters {
        self.flatten()
            .iter()
            .map(|ev| ev.offset + ev.element.duration)
            .max()
            .unwrap_or_else(zero)
    }
}
