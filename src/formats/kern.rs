//! Humdrum kern decoder
//!
//! A kern file is tab-separated spines, so one file is inherently
//! multi-part: every `**kern` column becomes a Part, other exclusive
//! interpretations are ignored. `!!!KEY: value` reference records feed the
//! native tag list. Data tokens carry recip durations (`4c`, `8.dd`),
//! rests, `=`-prefixed barlines, and `[`/`_`/`]` ties.

use crate::decode::tree::{DocumentTree, NativeTag, PartTree, TreeEvent, TreeEventKind, WorkTree};
use crate::decode::Decoder;
use crate::error::DecodeError;
use crate::models::{frac, quarters, Pitch, Quarters, Step};

pub struct KernDecoder;

impl Decoder for KernDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DocumentTree, DecodeError> {
        let text = String::from_utf8_lossy(bytes);
        parse_file(&text).map(DocumentTree::single)
    }
}

/// Column layout declared by the exclusive interpretation line.
struct Spines {
    /// For each column, the part index it feeds, or `None` for non-kern
    /// spines
    columns: Vec<Option<usize>>,
}

fn parse_file(text: &str) -> Result<WorkTree, DecodeError> {
    let mut work = WorkTree::default();
    let mut spines: Option<Spines> = None;
    let mut parts: Vec<PartTree> = Vec::new();

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("!!!") {
            if let Some((name, value)) = rest.split_once(':') {
                work.tags.push(NativeTag::new(name.trim(), value.trim()));
            }
            continue;
        }
        if line.starts_with('!') {
            continue; // local or global comment
        }

        if line.starts_with("**") {
            let columns: Vec<&str> = line.split('\t').collect();
            let mut layout = Vec::with_capacity(columns.len());
            let mut part_count = 0;
            for col in &columns {
                if *col == "**kern" {
                    layout.push(Some(part_count));
                    parts.push(PartTree::unnamed());
                    part_count += 1;
                } else {
                    layout.push(None);
                }
            }
            if part_count == 0 {
                return Err(DecodeError::syntax(
                    line_no,
                    "no **kern spine declared".to_owned(),
                ));
            }
            spines = Some(Spines { columns: layout });
            continue;
        }

        let spines = match &spines {
            Some(s) => s,
            None => {
                return Err(DecodeError::syntax(
                    line_no,
                    "data before the exclusive interpretation line".to_owned(),
                ))
            }
        };

        let fields: Vec<&str> = line.split('\t').collect();

        if line.starts_with('*') {
            for (col, field) in fields.iter().enumerate() {
                if *field == "*^" || *field == "*v" {
                    return Err(DecodeError::Unsupported(
                        "spine splits and merges".to_owned(),
                    ));
                }
                // instrument labels name their parts
                if let Some(name) = field.strip_prefix("*I\"") {
                    if let Some(Some(part_idx)) = spines.columns.get(col) {
                        parts[*part_idx].name = Some(name.trim().to_owned());
                    }
                }
            }
            continue;
        }

        if fields.len() != spines.columns.len() {
            return Err(DecodeError::syntax(
                line_no,
                format!(
                    "expected {} spine tokens, found {}",
                    spines.columns.len(),
                    fields.len()
                ),
            ));
        }

        for (col, field) in fields.iter().enumerate() {
            let part_idx = match spines.columns[col] {
                Some(idx) => idx,
                None => continue,
            };
            if let Some(event) = parse_token(field, line_no)? {
                parts[part_idx].events.push(event);
            }
        }
    }

    if parts.is_empty() {
        return Err(DecodeError::Truncated(
            "no spines before end of data".to_owned(),
        ));
    }
    work.parts = parts;
    Ok(work)
}

/// One kern data token to at most one event. `.` null tokens and pure
/// editorial content yield nothing.
fn parse_token(token: &str, line_no: usize) -> Result<Option<TreeEvent>, DecodeError> {
    let token = token.trim();
    if token == "." || token.is_empty() {
        return Ok(None);
    }
    if let Some(label) = token.strip_prefix('=') {
        let label = if label.is_empty() { "=" } else { label };
        return Ok(Some(TreeEvent::sequential(
            quarters(0),
            TreeEventKind::Marker(label.to_owned()),
        )));
    }
    if token.contains(' ') {
        return Err(DecodeError::Unsupported("chord tokens".to_owned()));
    }

    let mut chars = token.chars().peekable();
    let tie_open = matches!(chars.peek(), Some('['));
    if tie_open {
        chars.next();
    }

    let mut recip: i64 = 0;
    let mut saw_digit = false;
    while let Some(c) = chars.peek() {
        if let Some(d) = c.to_digit(10) {
            recip = recip.saturating_mul(10).saturating_add(d as i64);
            saw_digit = true;
            chars.next();
        } else {
            break;
        }
    }
    if !saw_digit {
        return Err(DecodeError::syntax(
            line_no,
            format!("token {token:?} has no duration digits"),
        ));
    }
    let mut duration: Quarters = if recip == 0 {
        quarters(8) // breve
    } else {
        frac(4, recip)
    };
    while let Some('.') = chars.peek() {
        duration = duration * frac(3, 2);
        chars.next();
    }

    if let Some('r') = chars.peek() {
        return Ok(Some(TreeEvent::sequential(duration, TreeEventKind::Rest)));
    }

    let mut letters = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_alphabetic() && Step::from_letter(c).is_some() {
            letters.push(c);
            chars.next();
        } else {
            break;
        }
    }
    if letters.is_empty() {
        return Err(DecodeError::syntax(
            line_no,
            format!("token {token:?} has no pitch or rest"),
        ));
    }
    let first = letters.chars().next().unwrap_or('c');
    if !letters.chars().all(|c| c == first) {
        return Err(DecodeError::syntax(
            line_no,
            format!("mixed pitch letters in token {token:?}"),
        ));
    }
    let step = match Step::from_letter(first) {
        Some(s) => s,
        None => {
            return Err(DecodeError::syntax(
                line_no,
                format!("bad pitch letter in token {token:?}"),
            ))
        }
    };
    // c is the middle-C octave, cc one above, C one below, CC two below
    let count = letters.len() as i8;
    let octave = if first.is_ascii_lowercase() {
        3 + count
    } else {
        4 - count
    };

    let mut alter: i8 = 0;
    let mut tie_close = false;
    let mut tie_continue = false;
    for c in chars {
        match c {
            '#' => alter += 1,
            '-' => alter -= 1,
            'n' => alter = 0,
            ']' => tie_close = true,
            '_' => tie_continue = true,
            'L' | 'J' | '(' | ')' => {} // beaming and slurs, not transcribed
            other => {
                return Err(DecodeError::syntax(
                    line_no,
                    format!("unexpected {other:?} in token {token:?}"),
                ))
            }
        }
    }

    let tied_forward = (tie_open || tie_continue) && !tie_close;
    Ok(Some(TreeEvent::sequential(
        duration,
        TreeEventKind::Note {
            pitch: Pitch::new(step, alter, octave),
            tied_forward,
        },
    )))
}
