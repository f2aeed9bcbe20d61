//! MusicXML (partwise) decoder
//!
//! Reads `score-partwise` documents only; a timewise score is well-formed
//! XML but a layout this decoder does not handle. Durations arrive in
//! divisions-of-a-quarter and are rescaled to exact quarters, so offsets
//! survive `divisions` changes between parts. The decoder computes
//! absolute offsets itself (chords share their onset, `backup`/`forward`
//! move the cursor) and hands them to normalization as explicit positions.

use roxmltree::{Document, Node};

use crate::decode::tree::{DocumentTree, NativeTag, PartTree, TreeEvent, TreeEventKind, WorkTree};
use crate::decode::Decoder;
use crate::error::DecodeError;
use crate::models::{frac, zero, Pitch, Quarters, Step};

pub struct MusicXmlDecoder;

impl Decoder for MusicXmlDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DocumentTree, DecodeError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| DecodeError::Invalid("document is not UTF-8".to_owned()))?;
        let doc = Document::parse(text).map_err(xml_error)?;
        let root = doc.root_element();
        match root.tag_name().name() {
            "score-partwise" => {}
            "score-timewise" => {
                return Err(DecodeError::Unsupported(
                    "score-timewise layout".to_owned(),
                ))
            }
            other => {
                return Err(DecodeError::Invalid(format!(
                    "unexpected root element <{other}>"
                )))
            }
        }

        let mut work = WorkTree {
            tags: collect_tags(root),
            ..WorkTree::default()
        };

        let names = part_names(root);
        for part_node in elements(root, "part") {
            let name = part_node
                .attribute("id")
                .and_then(|id| names.iter().find(|(nid, _)| nid == id))
                .map(|(_, name)| name.clone());
            let mut part = PartTree {
                name,
                events: Vec::new(),
            };
            parse_part(part_node, &mut part.events)?;
            work.parts.push(part);
        }
        Ok(DocumentTree::single(work))
    }
}

fn xml_error(e: roxmltree::Error) -> DecodeError {
    DecodeError::Syntax {
        line: e.pos().row as usize,
        message: e.to_string(),
    }
}

fn elements<'a>(node: Node<'a, 'a>, name: &'static str) -> impl Iterator<Item = Node<'a, 'a>> {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn child<'a>(node: Node<'a, 'a>, name: &str) -> Option<Node<'a, 'a>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn child_text<'a>(node: Node<'a, 'a>, name: &str) -> Option<&'a str> {
    child(node, name).and_then(|n| n.text()).map(str::trim)
}

/// Bibliographic elements, in document order, as native tags.
fn collect_tags(root: Node<'_, '_>) -> Vec<NativeTag> {
    let mut tags = Vec::new();
    for node in root.descendants().filter(|n| n.is_element()) {
        let name = node.tag_name().name();
        match name {
            "work-title" | "work-number" | "movement-title" | "movement-number" => {
                tags.push(NativeTag::new(name, node.text().unwrap_or("").trim()));
            }
            "creator" if node.attribute("type") == Some("composer") => {
                tags.push(NativeTag::new("composer", node.text().unwrap_or("").trim()));
            }
            _ => {}
        }
    }
    tags
}

/// `(id, part-name)` pairs from the part-list, in declaration order.
fn part_names(root: Node<'_, '_>) -> Vec<(String, String)> {
    let mut names = Vec::new();
    if let Some(list) = child(root, "part-list") {
        for score_part in elements(list, "score-part") {
            let id = score_part.attribute("id").unwrap_or("").to_owned();
            if let Some(name) = child_text(score_part, "part-name") {
                names.push((id, name.to_owned()));
            }
        }
    }
    names
}

fn parse_part(part_node: Node<'_, '_>, events: &mut Vec<TreeEvent>) -> Result<(), DecodeError> {
    let mut divisions: i64 = 1;
    let mut cursor: Quarters = zero();
    let mut last_onset: Quarters = zero();

    for measure in elements(part_node, "measure") {
        for item in measure.children().filter(|n| n.is_element()) {
            match item.tag_name().name() {
                "attributes" => {
                    if let Some(text) = child_text(item, "divisions") {
                        divisions = parse_int(text, "divisions")?;
                        if divisions <= 0 {
                            return Err(DecodeError::Invalid(
                                "divisions must be positive".to_owned(),
                            ));
                        }
                    }
                }
                "backup" => {
                    cursor = cursor - required_duration(item, divisions)?;
                    if cursor < zero() {
                        return Err(DecodeError::Invalid(
                            "backup before the start of the part".to_owned(),
                        ));
                    }
                }
                "forward" => {
                    cursor = cursor + required_duration(item, divisions)?;
                }
                "note" => {
                    if child(item, "grace").is_some() {
                        continue; // grace notes occupy no time
                    }
                    let duration = required_duration(item, divisions)?;
                    let is_chord = child(item, "chord").is_some();
                    let offset = if is_chord { last_onset } else { cursor };

                    if child(item, "rest").is_some() || child(item, "unpitched").is_some() {
                        events.push(TreeEvent::at(offset, duration, TreeEventKind::Rest));
                    } else {
                        let pitch = parse_pitch(item)?;
                        let tied_forward = elements(item, "tie")
                            .any(|t| t.attribute("type") == Some("start"));
                        events.push(TreeEvent::at(
                            offset,
                            duration,
                            TreeEventKind::Note { pitch, tied_forward },
                        ));
                    }

                    if !is_chord {
                        last_onset = cursor;
                        cursor = cursor + duration;
                    }
                }
                _ => {}
            }
        }
    }
    Ok(())
}

fn parse_int(text: &str, what: &str) -> Result<i64, DecodeError> {
    text.trim()
        .parse()
        .map_err(|_| DecodeError::Invalid(format!("bad {what} value {text:?}")))
}

fn required_duration(node: Node<'_, '_>, divisions: i64) -> Result<Quarters, DecodeError> {
    let text = child_text(node, "duration").ok_or_else(|| {
        DecodeError::Invalid(format!(
            "<{}> element without a duration",
            node.tag_name().name()
        ))
    })?;
    let raw = parse_int(text, "duration")?;
    if raw < 0 {
        return Err(DecodeError::Invalid("negative duration".to_owned()));
    }
    Ok(frac(raw, divisions))
}

fn parse_pitch(note: Node<'_, '_>) -> Result<Pitch, DecodeError> {
    let pitch = child(note, "pitch")
        .ok_or_else(|| DecodeError::Invalid("note has neither pitch nor rest".to_owned()))?;
    let step_text = child_text(pitch, "step")
        .ok_or_else(|| DecodeError::Invalid("pitch without step".to_owned()))?;
    let step = step_text
        .chars()
        .next()
        .and_then(Step::from_letter)
        .ok_or_else(|| DecodeError::Invalid(format!("bad step {step_text:?}")))?;
    let alter = match child_text(pitch, "alter") {
        Some(text) => {
            let value: f32 = text
                .trim()
                .parse()
                .map_err(|_| DecodeError::Invalid(format!("bad alter value {text:?}")))?;
            value.round() as i8
        }
        None => 0,
    };
    let octave_text = child_text(pitch, "octave")
        .ok_or_else(|| DecodeError::Invalid("pitch without octave".to_owned()))?;
    let octave: i8 = octave_text
        .trim()
        .parse()
        .map_err(|_| DecodeError::Invalid(format!("bad octave value {octave_text:?}")))?;
    Ok(Pitch::new(step, alter, octave))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quarters;

    const TWO_PARTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise version="3.1">
  <work>
    <work-title>Little Invention</work-title>
    <work-number>BWV 772</work-number>
  </work>
  <identification>
    <creator type="composer">J. S. Bach</creator>
  </identification>
  <part-list>
    <score-part id="P1"><part-name>Right Hand</part-name></score-part>
    <score-part id="P2"><part-name>Left Hand</part-name></score-part>
  </part-list>
  <part id="P1">
    <measure number="1">
      <attributes><divisions>2</divisions></attributes>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>2</duration></note>
      <note><pitch><step>D</step><octave>4</octave></pitch><duration>2</duration></note>
    </measure>
  </part>
  <part id="P2">
    <measure number="1">
      <attributes><divisions>4</divisions></attributes>
      <note><pitch><step>C</step><octave>3</octave></pitch><duration>8</duration></note>
    </measure>
  </part>
</score-partwise>"#;

    #[test]
    fn parts_names_and_division_scaling() {
        let tree = MusicXmlDecoder
            .decode(TWO_PARTS.as_bytes())
            .expect("should decode");
        let work = &tree.works[0];
        assert_eq!(work.parts.len(), 2);
        assert_eq!(work.parts[0].name.as_deref(), Some("Right Hand"));
        assert_eq!(work.parts[1].name.as_deref(), Some("Left Hand"));

        // divisions=2 makes duration 2 one quarter; divisions=4 makes 8 two
        assert_eq!(work.parts[0].events[0].duration, quarters(1));
        assert_eq!(work.parts[1].events[0].duration, quarters(2));

        let names: Vec<&str> = work.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["work-title", "work-number", "composer"]);
    }

    #[test]
    fn chord_notes_share_their_onset() {
        let xml = r#"<score-partwise><part-list>
            <score-part id="P1"><part-name>Piano</part-name></score-part>
          </part-list>
          <part id="P1"><measure number="1">
            <attributes><divisions>1</divisions></attributes>
            <note><pitch><step>C</step><octave>4</octave></pitch><duration>4</duration></note>
            <note><chord/><pitch><step>E</step><octave>4</octave></pitch><duration>4</duration></note>
            <note><chord/><pitch><step>G</step><octave>4</octave></pitch><duration>4</duration></note>
            <note><pitch><step>C</step><octave>5</octave></pitch><duration>4</duration></note>
          </measure></part></score-partwise>"#;
        let tree = MusicXmlDecoder.decode(xml.as_bytes()).expect("should decode");
        let events = &tree.works[0].parts[0].events;
        assert_eq!(events[0].at, Some(quarters(0)));
        assert_eq!(events[1].at, Some(quarters(0)));
        assert_eq!(events[2].at, Some(quarters(0)));
        assert_eq!(events[3].at, Some(quarters(4)));
    }

    #[test]
    fn backup_rewinds_for_a_second_voice() {
        let xml = r#"<score-partwise><part-list>
            <score-part id="P1"><part-name>Organ</part-name></score-part>
          </part-list>
          <part id="P1"><measure number="1">
            <attributes><divisions>1</divisions></attributes>
            <note><pitch><step>G</step><octave>4</octave></pitch><duration>4</duration></note>
            <backup><duration>4</duration></backup>
            <note><pitch><step>B</step><octave>3</octave></pitch><duration>4</duration></note>
          </measure></part></score-partwise>"#;
        let tree = MusicXmlDecoder.decode(xml.as_bytes()).expect("should decode");
        let events = &tree.works[0].parts[0].events;
        assert_eq!(events[0].at, Some(quarters(0)));
        assert_eq!(events[1].at, Some(quarters(0)));
    }

    #[test]
    fn tie_start_marks_the_note() {
        let xml = r#"<score-partwise><part-list>
            <score-part id="P1"><part-name>Voice</part-name></score-part>
          </part-list>
          <part id="P1"><measure number="1">
            <attributes><divisions>1</divisions></attributes>
            <note><pitch><step>A</step><alter>-1</alter><octave>4</octave></pitch>
              <duration>4</duration><tie type="start"/></note>
          </measure>
          <measure number="2">
            <note><pitch><step>A</step><alter>-1</alter><octave>4</octave></pitch>
              <duration>2</duration><tie type="stop"/></note>
          </measure></part></score-partwise>"#;
        let tree = MusicXmlDecoder.decode(xml.as_bytes()).expect("should decode");
        let events = &tree.works[0].parts[0].events;
        match (&events[0].kind, &events[1].kind) {
            (
                TreeEventKind::Note { pitch, tied_forward: true },
                TreeEventKind::Note { tied_forward: false, .. },
            ) => {
                assert_eq!(pitch.alter, -1);
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn timewise_layout_is_unsupported() {
        let err = MusicXmlDecoder
            .decode(b"<score-timewise><measure number=\"1\"/></score-timewise>")
            .expect_err("should reject");
        assert!(matches!(err, DecodeError::Unsupported(_)), "{err}");
    }

    #[test]
    fn broken_xml_reports_the_line() {
        let err = MusicXmlDecoder
            .decode(b"<score-partwise>\n  <part-list>\n</score-partwise>")
            .expect_err("should reject");
        assert!(matches!(err, DecodeError::Syntax { .. }), "{err}");
    }

    #[test]
    fn movement_title_without_work_title() {
        let xml = r#"<score-partwise>
          <movement-number>2</movement-number>
          <movement-title>Adagio</movement-title>
          <part-list><score-part id="P1"><part-name>Viola</part-name></score-part></part-list>
          <part id="P1"><measure number="1">
            <attributes><divisions>1</divisions></attributes>
            <note><rest/><duration>4</duration></note>
          </measure></part></score-partwise>"#;
        let tree = MusicXmlDecoder.decode(xml.as_bytes()).expect("should decode");
        let work = &tree.works[0];
        let names: Vec<&str> = work.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["movement-number", "movement-title"]);
        assert!(matches!(work.parts[0].events[0].kind, TreeEventKind::Rest));
    }
}
