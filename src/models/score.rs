//! Parts and Scores

use serde::{Deserialize, Serialize};

use crate::models::metadata::Metadata;
use crate::models::stream::Stream;

/// Stable identity of a Part, used to align parts across sources.
///
/// A format that names its parts (MusicXML `part-name`, a kern `!!!` label)
/// yields `Name`; positional formats fall back to `Index`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PartId {
    Name(String),
    Index(usize),
}

impl std::fmt::Display for PartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartId::Name(name) => write!(f, "{name}"),
            PartId::Index(i) => write!(f, "part {i}"),
        }
    }
}

/// One performer or voice line.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Part {
    pub id: PartId,
    pub stream: Stream,
}

impl Part {
    pub fn new(id: PartId, stream: Stream) -> Self {
        Self { id, stream }
    }

    /// A part with identity but no events yet.
    pub fn empty(id: PartId) -> Self {
        Self::new(id, Stream::new())
    }
}

/// A complete work: parts sharing one timeline plus one metadata record.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Score {
    pub metadata: Metadata,
    pub parts: Vec<Part>,
}

impl Score {
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata,
            parts: Vec::new(),
        }
    }

    pub fn push_part(&mut self, part: Part) {
        self.parts.push(part);
    }

    /// Work number from the metadata record, if declared.
    pub fn work_number(&self) -> Option<&str> {
        self.metadata.work_number.as_deref()
    }
}
