//! MuseData stage-2 decoder
//!
//! Stage-2 files carry a positional header (the `WK#:`/`MV#:` line, then
//! source, work title, movement title, and part name on the following
//! lines), a `$` attribute record declaring `Q:` divisions per quarter,
//! and one record per line after that. One file holds one part of one
//! work; assembling a multi-part score from sibling files is the
//! merger's job, not the decoder's.

use crate::decode::tree::{DocumentTree, NativeTag, PartTree, TreeEvent, TreeEventKind, WorkTree};
use crate::decode::Decoder;
use crate::error::DecodeError;
use crate::models::{frac, quarters, Pitch, Step};

pub struct MuseDataDecoder;

impl Decoder for MuseDataDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DocumentTree, DecodeError> {
        let text = String::from_utf8_lossy(bytes);
        parse_file(&text).map(DocumentTree::single)
    }
}

/// Lines with comments resolved: `@` lines dropped, `&` toggles block
/// comments. Keeps 1-based line numbers of what survives.
fn content_lines(text: &str) -> Vec<(usize, &str)> {
    let mut lines = Vec::new();
    let mut in_block_comment = false;
    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.starts_with('&') {
            in_block_comment = !in_block_comment;
            continue;
        }
        if in_block_comment || line.starts_with('@') {
            continue;
        }
        lines.push((i + 1, line));
    }
    lines
}

fn parse_file(text: &str) -> Result<WorkTree, DecodeError> {
    let lines = content_lines(text);

    let wk_idx = lines
        .iter()
        .take(6)
        .position(|(_, line)| line.contains("WK#:"))
        .ok_or_else(|| DecodeError::Invalid("no WK#: header line".to_owned()))?;
    if lines.len() < wk_idx + 5 {
        return Err(DecodeError::Truncated(
            "header ends before the part-name line".to_owned(),
        ));
    }

    let mut work = WorkTree::default();
    let (_, wk_line) = lines[wk_idx];
    if let Some(number) = field_after(wk_line, "WK#:") {
        work.work_number = Some(number.clone());
        work.tags.push(NativeTag::new("work-number", number));
    }
    if let Some(movement) = field_after(wk_line, "MV#:") {
        work.tags.push(NativeTag::new("movement-number", movement));
    }

    // positional: source, work title, movement title, part name
    let title = lines[wk_idx + 2].1.trim();
    if !title.is_empty() {
        work.tags.push(NativeTag::new("work-title", title));
    }
    let movement_title = lines[wk_idx + 3].1.trim();
    if !movement_title.is_empty() {
        work.tags.push(NativeTag::new("movement-title", movement_title));
    }
    let part_name = lines[wk_idx + 4].1.trim();
    let mut part = if part_name.is_empty() {
        PartTree::unnamed()
    } else {
        PartTree::named(part_name)
    };

    // the header tail (group memberships, instrumentation) runs to the
    // first $ attribute record; musical records only follow it
    let data_start = lines
        .iter()
        .skip(wk_idx + 5)
        .position(|(_, line)| line.starts_with('$'))
        .map(|p| wk_idx + 5 + p)
        .ok_or_else(|| {
            DecodeError::Invalid("no $ attribute record after the header".to_owned())
        })?;

    let mut divisions: Option<i64> = None;
    for &(line_no, line) in lines.iter().skip(data_start) {
        if line.trim().is_empty() {
            continue;
        }
        let first = match line.chars().next() {
            Some(c) => c,
            None => continue,
        };
        match first {
            '$' => {
                for token in line[1..].split_whitespace() {
                    if let Some(q) = token.strip_prefix("Q:") {
                        let q: i64 = q.parse().map_err(|_| {
                            DecodeError::syntax(line_no, format!("bad Q: value {q:?}"))
                        })?;
                        if q <= 0 {
                            return Err(DecodeError::syntax(
                                line_no,
                                "Q: divisions must be positive".to_owned(),
                            ));
                        }
                        divisions = Some(q);
                    }
                }
            }
            'A'..='G' => {
                let q = divisions.ok_or_else(|| {
                    DecodeError::Invalid("note before any Q: divisions record".to_owned())
                })?;
                part.events.push(parse_note(line, line_no, q)?);
            }
            'r' => {
                let q = divisions.ok_or_else(|| {
                    DecodeError::Invalid("rest before any Q: divisions record".to_owned())
                })?;
                let dur = duration_token(line, line_no, q)?;
                part.events.push(TreeEvent::sequential(dur, TreeEventKind::Rest));
            }
            'm' if line.starts_with("measure") => {
                part.events.push(TreeEvent::sequential(
                    quarters(0),
                    TreeEventKind::Marker(line.trim().to_owned()),
                ));
            }
            'b' if line.starts_with("back") => {} // voice rewinds are not transcribed
            'f' if line.starts_with("forward") => {}
            '/' => break, // /END
            '*' | 'P' | 'S' | 'i' | 'g' => {} // directions, print and sound
            other => {
                return Err(DecodeError::syntax(
                    line_no,
                    format!("unrecognized record starting with {other:?}"),
                ))
            }
        }
    }

    work.parts.push(part);
    Ok(work)
}

/// Value following a `NAME:` marker, up to whitespace.
fn field_after(line: &str, marker: &str) -> Option<String> {
    let at = line.find(marker)?;
    let rest = line[at + marker.len()..].trim_start();
    let value: String = rest.chars().take_while(|c| !c.is_whitespace()).collect();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_note(
    line: &str,
    line_no: usize,
    divisions: i64,
) -> Result<TreeEvent, DecodeError> {
    let mut tokens = line.split_whitespace();
    let pitch_token = tokens
        .next()
        .ok_or_else(|| DecodeError::syntax(line_no, "empty note record".to_owned()))?;
    let pitch = parse_pitch(pitch_token, line_no)?;
    let duration = match tokens.next() {
        Some(_) => duration_token(line, line_no, divisions)?,
        None => {
            return Err(DecodeError::syntax(
                line_no,
                format!("note {pitch_token:?} has no duration column"),
            ))
        }
    };
    // column nine carries the tie dash
    let tied_forward = line.as_bytes().get(8) == Some(&b'-');
    Ok(TreeEvent::sequential(
        duration,
        TreeEventKind::Note { pitch, tied_forward },
    ))
}

/// Second whitespace column as a duration in divisions.
fn duration_token(
    line: &str,
    line_no: usize,
    divisions: i64,
) -> Result<crate::models::Quarters, DecodeError> {
    let token = line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| DecodeError::syntax(line_no, "record has no duration column".to_owned()))?;
    let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
    let raw: i64 = digits
        .parse()
        .map_err(|_| DecodeError::syntax(line_no, format!("bad duration {token:?}")))?;
    Ok(frac(raw, divisions))
}

/// MuseData pitch spelling: letter, then `#` sharps or `f` flats or `n`
/// natural, then the octave digit (octave 4 holds middle C).
fn parse_pitch(token: &str, line_no: usize) -> Result<Pitch, DecodeError> {
    let mut chars = token.chars().peekable();
    let letter = chars
        .next()
        .ok_or_else(|| DecodeError::syntax(line_no, "empty pitch".to_owned()))?;
    let step = Step::from_letter(letter)
        .ok_or_else(|| DecodeError::syntax(line_no, format!("bad pitch letter {letter:?}")))?;

    let mut alter: i8 = 0;
    loop {
        match chars.peek() {
            Some('#') => {
                alter += 1;
                chars.next();
            }
            Some('f') => {
                alter -= 1;
                chars.next();
            }
            Some('n') => {
                alter = 0;
                chars.next();
            }
            _ => break,
        }
    }

    let octave_digits: String = chars.collect();
    let octave: i8 = octave_digits
        .parse()
        .map_err(|_| DecodeError::syntax(line_no, format!("bad octave in {token:?}")))?;
    Ok(Pitch::new(step, alter, octave))
}
