//! Standard MIDI file decoder, built on `midly`
//!
//! Tracks holding channel note events become parts; meta-only tracks
//! (conductor tracks, markers) contribute no part. Offsets and durations
//! come straight from absolute tick positions divided by the header's
//! ticks-per-quarter, so this is the one decoder that hands normalization
//! explicit offsets instead of relying on the cursor. The first track
//! name in the file is the work's `sequence-name` tag; later track names
//! name their own parts.

use std::collections::HashMap;

use log::warn;
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use crate::decode::tree::{DocumentTree, NativeTag, PartTree, TreeEvent, TreeEventKind, WorkTree};
use crate::decode::Decoder;
use crate::error::DecodeError;
use crate::models::{frac, Pitch};

pub struct MidiDecoder;

impl Decoder for MidiDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DocumentTree, DecodeError> {
        let smf = Smf::parse(bytes)
            .map_err(|e| DecodeError::Invalid(format!("not a readable MIDI file: {e}")))?;
        let ticks_per_quarter = match smf.header.timing {
            Timing::Metrical(t) => i64::from(t.as_int()),
            Timing::Timecode(..) => {
                return Err(DecodeError::Unsupported("SMPTE timecode timing".to_owned()))
            }
        };
        if ticks_per_quarter == 0 {
            return Err(DecodeError::Invalid("zero ticks per quarter".to_owned()));
        }
        if smf.tracks.is_empty() {
            return Err(DecodeError::Invalid("file declares no tracks".to_owned()));
        }

        let mut copyright: Option<String> = None;
        let mut tracks: Vec<(Option<String>, Vec<TreeEvent>)> = Vec::new();

        for track in &smf.tracks {
            let mut abs: i64 = 0;
            let mut open: HashMap<u8, Vec<i64>> = HashMap::new();
            let mut events: Vec<TreeEvent> = Vec::new();
            let mut track_name: Option<String> = None;

            for event in track {
                abs += i64::from(event.delta.as_int());
                match event.kind {
                    TrackEventKind::Midi { message, .. } => match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            open.entry(key.as_int()).or_default().push(abs);
                        }
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            let start = open
                                .get_mut(&key.as_int())
                                .and_then(|starts| starts.pop());
                            if let Some(start) = start {
                                events.push(note_event(start, abs, key.as_int(), ticks_per_quarter));
                            }
                            // an off with no matching on is dropped
                        }
                        _ => {}
                    },
                    TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
                        let name = String::from_utf8_lossy(name).trim().to_owned();
                        if !name.is_empty() && track_name.is_none() {
                            track_name = Some(name);
                        }
                    }
                    TrackEventKind::Meta(MetaMessage::Copyright(text)) => {
                        if copyright.is_none() {
                            copyright = Some(String::from_utf8_lossy(text).trim().to_owned());
                        }
                    }
                    _ => {}
                }
            }

            // notes still sounding at end of track keep what they got
            let mut unclosed: Vec<(u8, i64)> = open
                .into_iter()
                .flat_map(|(key, starts)| starts.into_iter().map(move |s| (key, s)))
                .collect();
            unclosed.sort_by_key(|&(key, start)| (start, key));
            for (key, start) in unclosed {
                warn!("note-on for key {key} never released; closing at end of track");
                events.push(note_event(start, abs, key, ticks_per_quarter));
            }

            tracks.push((track_name, events));
        }

        let first_named = tracks.iter().position(|(name, _)| name.is_some());

        let mut work = WorkTree::default();
        if let Some(i) = first_named {
            if let Some(name) = &tracks[i].0 {
                work.tags.push(NativeTag::new("sequence-name", name.clone()));
            }
        }
        if let Some(text) = copyright {
            work.tags.push(NativeTag::new("copyright", text));
        }

        for (i, (name, events)) in tracks.into_iter().enumerate() {
            if events.is_empty() {
                continue; // meta-only track, no part
            }
            let part_name = match name {
                // the file-level name is not reused as a part name
                Some(_) if Some(i) == first_named => None,
                other => other,
            };
            work.parts.push(PartTree {
                name: part_name,
                events,
            });
        }

        Ok(DocumentTree::single(work))
    }
}

fn note_event(start: i64, end: i64, key: u8, ticks_per_quarter: i64) -> TreeEvent {
    TreeEvent::at(
        frac(start, ticks_per_quarter),
        frac(end - start, ticks_per_quarter),
        TreeEventKind::Note {
            pitch: Pitch::from_midi(key),
            tied_forward: false,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{quarters, Step};
    use midly::{Format, Header, TrackEvent};

    fn on(delta: u32, key: u8) -> TrackEvent<'static> {
        TrackEvent {
            delta: delta.into(),
            kind: TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOn {
                    key: key.into(),
                    vel: 64.into(),
                },
            },
        }
    }

    fn off(delta: u32, key: u8) -> TrackEvent<'static> {
        TrackEvent {
            delta: delta.into(),
            kind: TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOff {
                    key: key.into(),
                    vel: 0.into(),
                },
            },
        }
    }

    fn meta(kind: MetaMessage<'static>) -> TrackEvent<'static> {
        TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(kind),
        }
    }

    fn write(smf: &Smf) -> Vec<u8> {
        let mut out = Vec::new();
        smf.write(&mut out).expect("write smf");
        out
    }

    #[test]
    fn note_tracks_become_parts_and_the_first_name_is_the_title() {
        let smf = Smf {
            header: Header {
                format: Format::Parallel,
                timing: Timing::Metrical(480.into()),
            },
            tracks: vec![
                vec![
                    meta(MetaMessage::TrackName(b"Symphony in Bits")),
                    meta(MetaMessage::EndOfTrack),
                ],
                vec![
                    meta(MetaMessage::TrackName(b"Violin")),
                    on(0, 60),
                    off(960, 60),
                    on(0, 64),
                    off(480, 64),
                    meta(MetaMessage::EndOfTrack),
                ],
            ],
        };

        let tree = MidiDecoder.decode(&write(&smf)).expect("should decode");
        let work = &tree.works[0];
        assert_eq!(work.parts.len(), 1, "meta-only track adds no part");
        assert_eq!(work.parts[0].name.as_deref(), Some("Violin"));
        assert_eq!(work.tags[0].name, "sequence-name");
        assert_eq!(work.tags[0].value, "Symphony in Bits");

        let events = &work.parts[0].events;
        assert_eq!(events[0].at, Some(quarters(0)));
        assert_eq!(events[0].duration, quarters(2));
        match &events[0].kind {
            TreeEventKind::Note { pitch, .. } => {
                assert_eq!((pitch.step, pitch.octave), (Step::C, 4));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(events[1].at, Some(quarters(2)));
        assert_eq!(events[1].duration, quarters(1));
    }

    #[test]
    fn simultaneous_notes_share_an_offset() {
        let smf = Smf {
            header: Header {
                format: Format::SingleTrack,
                timing: Timing::Metrical(240.into()),
            },
            tracks: vec![vec![
                on(0, 60),
                on(0, 64),
                on(0, 67),
                off(240, 60),
                off(0, 64),
                off(0, 67),
                meta(MetaMessage::EndOfTrack),
            ]],
        };
        let tree = MidiDecoder.decode(&write(&smf)).expect("should decode");
        let events = &tree.works[0].parts[0].events;
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|ev| ev.at == Some(quarters(0))));
        assert!(events.iter().all(|ev| ev.duration == quarters(1)));
    }

    #[test]
    fn running_status_zero_velocity_ends_notes() {
        let smf = Smf {
            header: Header {
                format: Format::SingleTrack,
                timing: Timing::Metrical(480.into()),
            },
            tracks: vec![vec![
                on(0, 72),
                TrackEvent {
                    delta: 480.into(),
                    kind: TrackEventKind::Midi {
                        channel: 0.into(),
                        message: MidiMessage::NoteOn {
                            key: 72.into(),
                            vel: 0.into(),
                        },
                    },
                },
                meta(MetaMessage::EndOfTrack),
            ]],
        };
        let tree = MidiDecoder.decode(&write(&smf)).expect("should decode");
        let events = &tree.works[0].parts[0].events;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].duration, quarters(1));
    }

    #[test]
    fn timecode_timing_is_unsupported() {
        let smf = Smf {
            header: Header {
                format: Format::SingleTrack,
                timing: Timing::Timecode(midly::Fps::Fps25, 40),
            },
            tracks: vec![vec![meta(MetaMessage::EndOfTrack)]],
        };
        let err = MidiDecoder.decode(&write(&smf)).expect_err("should reject");
        assert!(matches!(err, DecodeError::Unsupported(_)), "{err}");
    }

    #[test]
    fn truncated_bytes_are_invalid() {
        let err = MidiDecoder
            .decode(b"MThd\x00\x00\x00\x06\x00\x01")
            .expect_err("should reject");
        assert!(matches!(err, DecodeError::Invalid(_)), "{err}");
    }

    #[test]
    fn copyright_is_carried_as_an_unmapped_tag() {
        let smf = Smf {
            header: Header {
                format: Format::SingleTrack,
                timing: Timing::Metrical(120.into()),
            },
            tracks: vec![vec![
                meta(MetaMessage::Copyright(b"(c) 1987 Somebody")),
                on(0, 60),
                off(120, 60),
                meta(MetaMessage::EndOfTrack),
            ]],
        };
        let tree = MidiDecoder.decode(&write(&smf)).expect("should decode");
        let tags = &tree.works[0].tags;
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "copyright");
    }
}
