//! Canonical bibliographic metadata attached to each Score
//!
//! Every format's native tag vocabulary is mapped onto this one record.
//! All fields are optional; `None` (the source never declared the tag) is
//! deliberately distinct from `Some("")` (the source declared it empty).

use serde::{Deserialize, Serialize};

/// The canonical field set shared by all formats.
///
/// Extraction tables map native tag names onto these; merge rules fill
/// them field by field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    Title,
    AlternativeTitle,
    Composer,
    MovementNumber,
    WorkNumber,
}

/// Bibliographic record for one work.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Primary title of the work
    pub title: Option<String>,

    /// Secondary title (subtitle, popular name, movement title)
    pub alternative_title: Option<String>,

    /// Composer as the source spells it
    pub composer: Option<String>,

    /// Movement position within a larger work (kept as declared, e.g. "2")
    pub movement_number: Option<String>,

    /// Format-native work key (catalog or sequence number, e.g. "1", "BWV 66")
    pub work_number: Option<String>,
}

impl Metadata {
    /// An all-unset record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a field by canonical name.
    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        match field {
            CanonicalField::Title => self.title.as_deref(),
            CanonicalField::AlternativeTitle => self.alternative_title.as_deref(),
            CanonicalField::Composer => self.composer.as_deref(),
            CanonicalField::MovementNumber => self.movement_number.as_deref(),
            CanonicalField::WorkNumber => self.work_number.as_deref(),
        }
    }

    /// Write a field by canonical name, replacing any prior value.
    pub fn set(&mut self, field: CanonicalField, value: String) {
        let slot = match field {
            CanonicalField::Title => &mut self.title,
            CanonicalField::AlternativeTitle => &mut self.alternative_title,
            CanonicalField::Composer => &mut self.composer,
            CanonicalField::MovementNumber => &mut self.movement_number,
            CanonicalField::WorkNumber => &mut self.work_number,
        };
        *slot = Some(value);
    }

    /// Fill unset-or-empty fields of `self` from `other`.
    ///
    /// Applied left to right over a sequence of records this yields
    /// first-non-empty-wins semantics: a field already holding a non-empty
    /// value is never overwritten, and empty values in `other` never
    /// clobber anything.
    pub fn fill_missing_from(&mut self, other: &Metadata) {
        for field in ALL_FIELDS {
            let have = self.get(field).is_some_and(|v| !v.is_empty());
            if have {
                continue;
            }
            if let Some(v) = other.get(field) {
                if !v.is_empty() {
                    self.set(field, v.to_owned());
                }
            }
        }
    }

    /// True when every field is unset.
    pub fn is_empty(&self) -> bool {
        ALL_FIELDS.iter().all(|f| self.get(*f).is_none())
    }
}

const ALL_FIELDS: [CanonicalField; 5] = [
    CanonicalField::Title,
    CanonicalField::AlternativeTitle,
    CanonicalField::Composer,
    CanonicalField::MovementNumber,
    CanonicalField::WorkNumber,
];
