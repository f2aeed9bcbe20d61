//! RomanText analysis decoder
//!
//! RomanText is header tags plus `m<N>` measure lines of roman-numeral
//! analysis. Measure lines become markers spanning whole measures, with
//! the current time signature fixing the measure length. A file that
//! declares two or more `Movement:` tags is a multi-movement analysis and
//! splits into one work per movement, each inheriting the headers that
//! precede the first movement.

use log::warn;

use crate::decode::tree::{DocumentTree, NativeTag, PartTree, TreeEvent, TreeEventKind, WorkTree};
use crate::decode::Decoder;
use crate::error::DecodeError;
use crate::models::{frac, quarters, Quarters};

pub struct RomanTextDecoder;

impl Decoder for RomanTextDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DocumentTree, DecodeError> {
        let text = String::from_utf8_lossy(bytes);
        let items = tokenize(&text)?;
        Ok(assemble(items))
    }
}

enum Item {
    Tag(NativeTag),
    /// A measure line: how many measures it spans and its full text
    Measure(i64, String),
}

fn tokenize(text: &str) -> Result<Vec<Item>, DecodeError> {
    let mut items = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('%') {
            continue;
        }

        if let Some(count) = measure_span(line) {
            items.push(Item::Measure(count, line.to_owned()));
            continue;
        }

        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphabetic() || c == ' ')
            {
                items.push(Item::Tag(NativeTag::new(name, value.trim())));
                continue;
            }
        }

        return Err(DecodeError::syntax(
            line_no,
            format!("neither a header tag nor a measure line: {line:?}"),
        ));
    }
    Ok(items)
}

/// `m3` spans one measure, `m8-10` spans three; anything else is not a
/// measure line.
fn measure_span(line: &str) -> Option<i64> {
    let rest = line.strip_prefix('m')?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let start: i64 = digits.parse().ok()?;
    let after = &rest[digits.len()..];
    if let Some(range) = after.strip_prefix('-') {
        let end_digits: String = range.chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(end) = end_digits.parse::<i64>() {
            if end >= start {
                return Some(end - start + 1);
            }
        }
    }
    Some(1)
}

/// Quarters per measure for a `Time Signature:` value.
fn measure_quarters(value: &str) -> Option<Quarters> {
    match value.trim() {
        "C" | "Cut" => Some(quarters(4)),
        other => {
            let (num, den) = other.split_once('/')?;
            let num: i64 = num.trim().parse().ok()?;
            let den: i64 = den.trim().parse().ok()?;
            if num <= 0 || den <= 0 {
                return None;
            }
            Some(frac(num * 4, den))
        }
    }
}

fn assemble(items: Vec<Item>) -> DocumentTree {
    let movements = items
        .iter()
        .filter(|item| matches!(item, Item::Tag(tag) if tag.name == "Movement"))
        .count();
    if movements < 2 {
        return DocumentTree::single(build_work(None, Vec::new(), quarters(4), items));
    }

    // multi-movement: headers before the first Movement tag are shared
    let mut shared_tags: Vec<NativeTag> = Vec::new();
    let mut shared_measure: Quarters = quarters(4);
    let mut segments: Vec<(String, Vec<Item>)> = Vec::new();

    for item in items {
        match item {
            Item::Tag(tag) if tag.name == "Movement" => {
                segments.push((tag.value.clone(), vec![Item::Tag(tag)]));
            }
            item => match segments.last_mut() {
                Some((_, segment)) => segment.push(item),
                None => match item {
                    Item::Tag(tag) => {
                        if tag.name == "Time Signature" {
                            if let Some(q) = measure_quarters(&tag.value) {
                                shared_measure = q;
                            }
                        }
                        shared_tags.push(tag);
                    }
                    Item::Measure(_, text) => {
                        warn!("measure line before any Movement tag dropped: {text}");
                    }
                },
            },
        }
    }

    let works = segments
        .into_iter()
        .map(|(number, segment)| {
            build_work(
                Some(number),
                shared_tags.clone(),
                shared_measure,
                segment,
            )
        })
        .collect();
    DocumentTree { works }
}

fn build_work(
    number: Option<String>,
    shared_tags: Vec<NativeTag>,
    initial_measure: Quarters,
    items: Vec<Item>,
) -> WorkTree {
    let mut work = WorkTree {
        work_number: number,
        tags: shared_tags,
        ..WorkTree::default()
    };
    let mut part = PartTree::unnamed();
    let mut measure = initial_measure;

    for item in items {
        match item {
            Item::Tag(tag) => {
                if tag.name == "Time Signature" {
                    if let Some(q) = measure_quarters(&tag.value) {
                        measure = q;
                    }
                }
                work.tags.push(tag);
            }
            Item::Measure(count, text) => {
                part.events.push(TreeEvent::sequential(
                    measure * quarters(count),
                    TreeEventKind::Marker(text),
                ));
            }
        }
    }

    work.parts.push(part);
    work
}
