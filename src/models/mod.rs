//! The unified document model
//!
//! Every decoder, whatever its source format, produces these types:
//! rational-time `Stream`s of `Element`s grouped into `Part`s, `Score`s
//! carrying one `Metadata` record each, and `Opus` for multi-work sources.

pub mod metadata;
pub mod opus;
pub mod score;
pub mod stream;
pub mod timebase;

// Re-export commonly used types
pub use metadata::{CanonicalField, Metadata};
pub use opus::Opus;
pub use score::{Part, PartId, Score};
pub use stream::{Element, Entry, EventKind, FlatEvent, Node, Pitch, Step, Stream};
pub use timebase::{frac, quarters, zero, Quarters};
