//! Tree-to-model normalization
//!
//! Walks each decoded part sequentially, turning duration-only events into
//! offset-keyed Elements in one rational coordinate space (quarter = 1).
//! Tie chains collapse into single Elements spanning their summed
//! duration. Metadata extraction runs here, once per work.

use std::collections::HashMap;

use log::warn;

use crate::decode::tree::{DocumentTree, TreeEvent, TreeEventKind, WorkTree};
use crate::extract;
use crate::models::{zero, Element, EventKind, Part, PartId, Pitch, Quarters, Score, Stream};
use crate::sniff::Format;

/// Turn one decoded unit into candidate Scores, one per work.
pub fn normalize(format: Format, tree: DocumentTree) -> Vec<Score> {
    tree.works
        .into_iter()
        .map(|work| normalize_work(format, work))
        .collect()
}

fn normalize_work(format: Format, work: WorkTree) -> Score {
    let mut metadata = extract::extract(format, &work.tags);
    if metadata.work_number.is_none() {
        metadata.work_number = work.work_number;
    }

    let mut score = Score::new(metadata);
    for (i, part) in work.parts.into_iter().enumerate() {
        let id = match &part.name {
            Some(name) => PartId::Name(name.clone()),
            None => PartId::Index(i),
        };
        score.push_part(Part::new(id, lay_out(part.events)));
    }
    score
}

struct TieChain {
    start: Quarters,
    total: Quarters,
}

/// Assign offsets and fold tie chains for one part's event list.
///
/// Events with an explicit `at` land there; the rest land at the running
/// cursor. Every event, markers included, advances the cursor by its
/// duration from its own offset, so zero-duration annotations are
/// position-transparent.
fn lay_out(events: Vec<TreeEvent>) -> Stream {
    let mut stream = Stream::new();
    let mut cursor = zero();
    let mut chains: HashMap<Pitch, TieChain> = HashMap::new();

    for event in events {
        let offset = event.at.unwrap_or(cursor);
        match event.kind {
            TreeEventKind::Note { pitch, tied_forward } => match chains.remove(&pitch) {
                Some(chain) => {
                    let total = chain.total + event.duration;
                    if tied_forward {
                        chains.insert(
                            pitch,
                            TieChain {
                                start: chain.start,
                                total,
                            },
                        );
                    } else {
                        stream.push(chain.start, Element::note(total, pitch));
                    }
                }
                None => {
                    // a tie-end with no open chain falls here and simply
                    // starts a fresh element
                    if tied_forward {
                        chains.insert(
                            pitch,
                            TieChain {
                                start: offset,
                                total: event.duration,
                            },
                        );
                    } else {
                        stream.push(offset, Element::note(event.duration, pitch));
                    }
                }
            },
            TreeEventKind::Rest => stream.push(offset, Element::rest(event.duration)),
            TreeEventKind::Chord(pitches) => {
                stream.push(offset, Element::new(event.duration, EventKind::Chord(pitches)));
            }
            TreeEventKind::Marker(label) => {
                stream.push(offset, Element::new(event.duration, EventKind::Marker(label)));
            }
        }
        cursor = offset + event.duration;
    }

    let mut dangling: Vec<(Pitch, TieChain)> = chains.into_iter().collect();
    dangling.sort_by_key(|(pitch, chain)| (chain.start, pitch.midi_number()));
    for (pitch, chain) in dangling {
        warn!(
            "tie on {} opened at offset {} never closed; keeping the partial duration",
            pitch, chain.start
        );
        stream.push(chain.start, Element::note(chain.total, pitch));
    }

    stream
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::tree::{NativeTag, PartTree};
    use crate::models::{frac, quarters, Step};

    fn note(duration: Quarters, pitch: Pitch, tied: bool) -> TreeEvent {
        TreeEvent::sequential(
            duration,
            TreeEventKind::Note {
                pitch,
                tied_forward: tied,
            },
        )
    }

    #[test]
    fn sequential_events_accumulate_offsets() {
        let c4 = Pitch::natural(Step::C, 4);
        let events = vec![
            note(quarters(1), c4, false),
            TreeEvent::sequential(quarters(1), TreeEventKind::Rest),
            note(frac(1, 2), c4, false),
        ];
        let stream = lay_out(events);
        let flat = stream.flatten();
        assert_eq!(flat.len(), 3);
        assert_eq!(flat[2].offset, quarters(2));
        assert_eq!(stream.end(), frac(5, 2));
    }

    #[test]
    fn tie_chain_collapses_to_one_element() {
        let g4 = Pitch::natural(Step::G, 4);
        let events = vec![
            note(quarters(2), g4, true),
            note(quarters(1), g4, true),
            note(frac(1, 2), g4, false),
            note(quarters(1), g4, false),
        ];
        let stream = lay_out(events);
        let flat = stream.flatten();
        assert_eq!(flat.len(), 2, "chain plus the following plain note");
        assert_eq!(flat[0].offset, quarters(0));
        assert_eq!(flat[0].element.duration, frac(7, 2));
        assert_eq!(flat[1].offset, frac(7, 2));
    }

    #[test]
    fn unterminated_tie_keeps_partial_duration() {
        let e5 = Pitch::natural(Step::E, 5);
        let events = vec![note(quarters(1), e5, true)];
        let flat_len = lay_out(events).flatten().len();
        assert_eq!(flat_len, 1);
    }

    #[test]
    fn explicit_offsets_override_the_cursor() {
        let c4 = Pitch::natural(Step::C, 4);
        let e4 = Pitch::new(Step::E, 0, 4);
        let events = vec![
            TreeEvent::at(
                quarters(0),
                quarters(2),
                TreeEventKind::Note {
                    pitch: c4,
                    tied_forward: false,
                },
            ),
            TreeEvent::at(
                quarters(0),
                quarters(1),
                TreeEventKind::Note {
                    pitch: e4,
                    tied_forward: false,
                },
            ),
        ];
        let stream = lay_out(events);
        let flat = stream.flatten();
        assert_eq!(flat[0].offset, quarters(0));
        assert_eq!(flat[1].offset, quarters(0));
    }

    #[test]
    fn work_number_from_tree_fills_unset_metadata() {
        let tree = DocumentTree::single(WorkTree {
            work_number: Some("7".into()),
            tags: vec![NativeTag::new("T", "Seven")],
            parts: vec![PartTree::unnamed()],
        });
        let scores = normalize(Format::Abc, tree);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].work_number(), Some("7"));
        assert_eq!(scores[0].metadata.title.as_deref(), Some("Seven"));
        assert_eq!(scores[0].parts.len(), 1, "zero-event parts are preserved");
    }
}
