//! ABC tune notation decoder
//!
//! An ABC file is a tunebook: every `X:`-introduced block is an
//! independent tune and becomes its own work, so a single file can yield
//! many candidate Scores. Headers run until the first `K:` field; the
//! tune body follows. Only the minimal body vocabulary is transcribed:
//! notes with accidentals and octave marks, multiplied durations, rests,
//! barlines as markers, and `-` ties.

use std::iter::Peekable;
use std::str::Chars;

use crate::decode::tree::{DocumentTree, NativeTag, PartTree, TreeEvent, TreeEventKind, WorkTree};
use crate::decode::Decoder;
use crate::error::DecodeError;
use crate::models::{frac, quarters, Pitch, Quarters, Step};

pub struct AbcDecoder;

impl Decoder for AbcDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DocumentTree, DecodeError> {
        let text = String::from_utf8_lossy(bytes);
        let blocks = split_tunes(&text)?;
        let works = blocks
            .into_iter()
            .map(parse_tune)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DocumentTree { works })
    }
}

/// Lines of one tune, each keeping its 1-based position in the file.
struct TuneBlock<'a> {
    lines: Vec<(usize, &'a str)>,
}

/// Cut the file at its `X:` lines. Free text before the first tune (file
/// headers, `%abc` directives) is ignored.
fn split_tunes(text: &str) -> Result<Vec<TuneBlock<'_>>, DecodeError> {
    let mut blocks: Vec<TuneBlock> = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        if raw.trim_start().starts_with("X:") {
            blocks.push(TuneBlock { lines: Vec::new() });
        }
        if let Some(block) = blocks.last_mut() {
            block.lines.push((line_no, raw));
        }
    }
    if blocks.is_empty() {
        return Err(DecodeError::Invalid(
            "no X: reference field found".to_owned(),
        ));
    }
    Ok(blocks)
}

/// Everything from the first `%` on is comment.
fn strip_comment(line: &str) -> &str {
    line.split('%').next().unwrap_or(line)
}

/// `"T"` + `": value"` shape shared by all header fields.
fn header_field(line: &str) -> Option<(char, &str)> {
    let mut chars = line.chars();
    let letter = chars.next()?;
    if !letter.is_ascii_alphabetic() || chars.next()? != ':' {
        return None;
    }
    Some((letter, line[2..].trim()))
}

fn parse_tune(block: TuneBlock<'_>) -> Result<WorkTree, DecodeError> {
    let mut work = WorkTree::default();
    let mut part = PartTree::unnamed();
    // default unit note length is 1/8, i.e. half a quarter
    let mut unit: Quarters = frac(1, 2);
    let mut in_body = false;

    for (line_no, raw) in &block.lines {
        let line = strip_comment(raw).trim_end();
        if line.trim().is_empty() {
            continue;
        }

        if let Some((letter, value)) = header_field(line.trim_start()) {
            match letter {
                'X' => {
                    work.work_number = Some(value.to_owned());
                    work.tags.push(NativeTag::new("X", value));
                }
                'L' => unit = parse_unit_length(value, *line_no)?,
                'M' => {
                    work.tags.push(NativeTag::new("M", value));
                    part.events.push(marker(format!("M:{value}")));
                }
                'K' => {
                    part.events.push(marker(format!("K:{value}")));
                    in_body = true;
                }
                'w' if in_body => {} // lyrics line, not transcribed
                _ if in_body => {}   // mid-tune field changes are not transcribed
                _ => work
                    .tags
                    .push(NativeTag::new(letter.to_string(), value)),
            }
            continue;
        }

        if !in_body {
            return Err(DecodeError::syntax(
                *line_no,
                format!("expected a header field, found {line:?}"),
            ));
        }
        parse_body_line(line, *line_no, unit, &mut part.events)?;
    }

    if !in_body {
        return Err(DecodeError::Truncated(format!(
            "tune {} never reaches a K: field",
            work.work_number.as_deref().unwrap_or("?")
        )));
    }

    work.parts.push(part);
    Ok(work)
}

fn marker(label: String) -> TreeEvent {
    TreeEvent::sequential(quarters(0), TreeEventKind::Marker(label))
}

/// `L:` value, e.g. `1/8`, as a fraction of a whole note in quarters.
fn parse_unit_length(value: &str, line_no: usize) -> Result<Quarters, DecodeError> {
    let (num, den) = value
        .split_once('/')
        .ok_or_else(|| DecodeError::syntax(line_no, format!("bad unit note length {value:?}")))?;
    let num: i64 = num.trim().parse().map_err(|_| {
        DecodeError::syntax(line_no, format!("bad unit note length {value:?}"))
    })?;
    let den: i64 = den.trim().parse().map_err(|_| {
        DecodeError::syntax(line_no, format!("bad unit note length {value:?}"))
    })?;
    if num <= 0 || den <= 0 {
        return Err(DecodeError::syntax(
            line_no,
            format!("bad unit note length {value:?}"),
        ));
    }
    Ok(quarters(4) * frac(num, den))
}

fn parse_body_line(
    line: &str,
    line_no: usize,
    unit: Quarters,
    events: &mut Vec<TreeEvent>,
) -> Result<(), DecodeError> {
    let mut chars = line.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '`' | '\\' => {
                chars.next();
            }
            '|' | ':' | '[' | ']' => {
                let mut bar = String::new();
                while let Some(&b) = chars.peek() {
                    if matches!(b, '|' | ':' | '[' | ']') {
                        bar.push(b);
                        chars.next();
                    } else {
                        break;
                    }
                }
                events.push(marker(bar));
            }
            '-' => {
                chars.next();
                let tied = events.iter_mut().rev().find_map(|ev| match &mut ev.kind {
                    TreeEventKind::Note { tied_forward, .. } => Some(tied_forward),
                    _ => None,
                });
                match tied {
                    Some(flag) => *flag = true,
                    None => {
                        return Err(DecodeError::syntax(
                            line_no,
                            "tie with no preceding note".to_owned(),
                        ))
                    }
                }
            }
            'z' | 'x' => {
                chars.next();
                let duration = unit * parse_multiplier(&mut chars);
                events.push(TreeEvent::sequential(duration, TreeEventKind::Rest));
            }
            '^' | '_' | '=' | 'A'..='G' | 'a'..='g' => {
                let event = parse_note(&mut chars, line_no, unit)?;
                events.push(event);
            }
            other => {
                return Err(DecodeError::syntax(
                    line_no,
                    format!("unexpected character {other:?} in tune body"),
                ))
            }
        }
    }
    Ok(())
}

fn parse_note(
    chars: &mut Peekable<Chars<'_>>,
    line_no: usize,
    unit: Quarters,
) -> Result<TreeEvent, DecodeError> {
    let mut alter: i8 = 0;
    loop {
        match chars.peek() {
            Some('^') => {
                alter += 1;
                chars.next();
            }
            Some('_') => {
                alter -= 1;
                chars.next();
            }
            Some('=') => {
                alter = 0;
                chars.next();
            }
            _ => break,
        }
    }

    let letter = chars
        .next()
        .ok_or_else(|| DecodeError::syntax(line_no, "accidental with no note".to_owned()))?;
    let step = Step::from_letter(letter).ok_or_else(|| {
        DecodeError::syntax(line_no, format!("accidental before non-note {letter:?}"))
    })?;
    // uppercase letters sit in the middle-C octave, lowercase one above
    let mut octave: i8 = if letter.is_ascii_uppercase() { 4 } else { 5 };
    loop {
        match chars.peek() {
            Some('\'') => {
                octave += 1;
                chars.next();
            }
            Some(',') => {
                octave -= 1;
                chars.next();
            }
            _ => break,
        }
    }

    let duration = unit * parse_multiplier(chars);
    Ok(TreeEvent::sequential(
        duration,
        TreeEventKind::Note {
            pitch: Pitch::new(step, alter, octave),
            tied_forward: false,
        },
    ))
}

/// Duration multiplier after a note or rest: `2`, `3/2`, `/` (half),
/// `//` (quarter), `/4`. Absent means 1.
fn parse_multiplier(chars: &mut Peekable<Chars<'_>>) -> Quarters {
    let mut num: i64 = take_digits(chars).unwrap_or(1);
    let mut den: i64 = 1;
    while let Some('/') = chars.peek() {
        chars.next();
        match take_digits(chars) {
            Some(d) if d > 0 => den = den.saturating_mul(d),
            Some(_) => den = den.saturating_mul(2),
            None => den = den.saturating_mul(2),
        }
    }
    if num <= 0 {
        num = 1;
    }
    frac(num, den)
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> Option<i64> {
    let mut value: Option<i64> = None;
    while let Some(c) = chars.peek() {
        if let Some(d) = c.to_digit(10) {
            let next = value
                .unwrap_or(0)
                .saturating_mul(10)
                .saturating_add(d as i64);
            value = Some(next);
            chars.next();
        } else {
            break;
        }
    }
    value
}
