//! Native-tag to canonical-field extraction
//!
//! Each format gets one fixed, ordered rule table. A rule names a native
//! tag, which occurrence of it to read (ABC's second `T:` line means
//! something different from its first), and the canonical field it feeds.
//! Rules fire in table order and only ever fill a still-unset field, so
//! earlier rules encode priority and later ones encode fallbacks. Native
//! tags no rule mentions are dropped; nothing is ever defaulted in.

use crate::decode::tree::NativeTag;
use crate::models::{CanonicalField, Metadata};
use crate::sniff::Format;

/// One extraction rule: read the `occurrence`-th tag named `name` into
/// `field` if that field is still unset.
#[derive(Clone, Copy, Debug)]
pub struct TagRule {
    pub name: &'static str,
    pub occurrence: usize,
    pub field: CanonicalField,
}

const fn rule(name: &'static str, occurrence: usize, field: CanonicalField) -> TagRule {
    TagRule {
        name,
        occurrence,
        field,
    }
}

static ABC_TABLE: &[TagRule] = &[
    rule("T", 0, CanonicalField::Title),
    rule("T", 1, CanonicalField::AlternativeTitle),
    rule("C", 0, CanonicalField::Composer),
    rule("X", 0, CanonicalField::WorkNumber),
];

static HUMDRUM_TABLE: &[TagRule] = &[
    rule("OTL", 0, CanonicalField::Title),
    rule("OTA", 0, CanonicalField::AlternativeTitle),
    rule("COM", 0, CanonicalField::Composer),
    rule("OMV", 0, CanonicalField::MovementNumber),
    rule("ONM", 0, CanonicalField::WorkNumber),
];

static MUSICXML_TABLE: &[TagRule] = &[
    rule("work-title", 0, CanonicalField::Title),
    // movement-title backfills the title when no work-title exists and
    // always lands in the alternative slot
    rule("movement-title", 0, CanonicalField::Title),
    rule("movement-title", 0, CanonicalField::AlternativeTitle),
    rule("composer", 0, CanonicalField::Composer),
    rule("movement-number", 0, CanonicalField::MovementNumber),
    rule("work-number", 0, CanonicalField::WorkNumber),
];

static ROMANTEXT_TABLE: &[TagRule] = &[
    rule("Title", 0, CanonicalField::Title),
    rule("Piece", 0, CanonicalField::AlternativeTitle),
    rule("Work", 0, CanonicalField::AlternativeTitle),
    rule("Madrigal", 0, CanonicalField::AlternativeTitle),
    rule("Composer", 0, CanonicalField::Composer),
    rule("Movement", 0, CanonicalField::MovementNumber),
];

static MUSEDATA_TABLE: &[TagRule] = &[
    rule("work-title", 0, CanonicalField::Title),
    rule("movement-title", 0, CanonicalField::AlternativeTitle),
    rule("movement-number", 0, CanonicalField::MovementNumber),
    rule("work-number", 0, CanonicalField::WorkNumber),
];

static MIDI_TABLE: &[TagRule] = &[rule("sequence-name", 0, CanonicalField::Title)];

/// The extraction table for a format.
pub fn table_for(format: Format) -> &'static [TagRule] {
    match format {
        Format::Abc => ABC_TABLE,
        Format::Humdrum => HUMDRUM_TABLE,
        Format::MusicXml => MUSICXML_TABLE,
        Format::RomanText => ROMANTEXT_TABLE,
        Format::MuseData => MUSEDATA_TABLE,
        Format::Midi => MIDI_TABLE,
    }
}

/// Every format has a table and every table feeds the title field.
pub fn tables_complete() -> bool {
    Format::ALL.iter().all(|format| {
        let table = table_for(*format);
        !table.is_empty() && table.iter().any(|r| r.field == CanonicalField::Title)
    })
}

/// Run a format's table over a unit's native tags.
pub fn extract(format: Format, tags: &[NativeTag]) -> Metadata {
    let mut metadata = Metadata::new();
    for rule in table_for(format) {
        if metadata.get(rule.field).is_some() {
            continue;
        }
        let hit = tags
            .iter()
            .filter(|tag| tag.name == rule.name)
            .nth(rule.occurrence);
        if let Some(tag) = hit {
            metadata.set(rule.field, tag.value.clone());
        }
    }
    metadata
}
