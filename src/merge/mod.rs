//! Deciding the caller-facing shape of a decode run
//!
//! After every unit of a source has decoded, the pipeline holds one or
//! more Scores per unit. This module decides whether those are companion
//! parts of a single work (a directory of per-part kern files, the
//! rootfiles of an `.mxl` container) or independent works that belong in
//! an Opus. The tie-break runs in fixed order: an explicit part-index
//! convention from the resolver wins, then matching titles, then matching
//! work numbers; with no positive evidence the units stay separate works,
//! because gluing unrelated pieces into one score is the worse mistake.

use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::IngestResult;
use crate::models::{Metadata, Opus, Part, PartId, Score};
use crate::resolve::OrderingSignal;

/// What one resolved unit decoded to. A unit usually holds exactly one
/// Score; tunebook-style formats may split into several.
#[derive(Clone, Debug)]
pub struct DecodedUnit {
    /// Filename of the unit, when the source had one.
    pub name: Option<String>,
    pub scores: Vec<Score>,
}

/// The two shapes a `parse` call can produce.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum ScoreOrOpus {
    Score(Score),
    Opus(Opus),
}

impl ScoreOrOpus {
    pub fn is_score(&self) -> bool {
        matches!(self, ScoreOrOpus::Score(_))
    }

    pub fn is_opus(&self) -> bool {
        matches!(self, ScoreOrOpus::Opus(_))
    }

    pub fn as_score(&self) -> Option<&Score> {
        match self {
            ScoreOrOpus::Score(s) => Some(s),
            ScoreOrOpus::Opus(_) => None,
        }
    }

    pub fn as_opus(&self) -> Option<&Opus> {
        match self {
            ScoreOrOpus::Score(_) => None,
            ScoreOrOpus::Opus(o) => Some(o),
        }
    }

    /// Collapse to a single Score.
    ///
    /// A Score passes through whole. An Opus of one work yields that work
    /// with all its parts. A larger Opus goes through
    /// [`Opus::merge_scores`], so works with incompatible titles surface
    /// `IncompatibleMerge` rather than being concatenated blindly.
    pub fn into_score(self) -> IngestResult<Score> {
        match self {
            ScoreOrOpus::Score(score) => Ok(score),
            ScoreOrOpus::Opus(opus) => {
                if opus.len() > 1 {
                    return opus.merge_scores();
                }
                let mut scores = opus.into_scores();
                match scores.pop() {
                    Some(score) => Ok(score),
                    None => Ok(Score::new(Metadata::new())),
                }
            }
        }
    }

    /// Lift to an Opus. A lone Score becomes a one-work Opus.
    pub fn into_opus(self) -> IngestResult<Opus> {
        match self {
            ScoreOrOpus::Opus(opus) => Ok(opus),
            ScoreOrOpus::Score(score) => Opus::new(vec![score]),
        }
    }
}

/// Outcome of comparing one identity field across units.
enum Identity {
    Same,
    Distinct,
    /// The field is absent somewhere, so it carries no evidence.
    Unknown,
}

/// Combine per-unit decode results into the final Score or Opus.
///
/// Units that are companion parts of one work merge into a single Score,
/// parts appended in resolver order with no part dropped. Anything else
/// becomes an Opus in ingestion order, including a single unit that split
/// into several works.
pub fn merge_units(units: Vec<DecodedUnit>, ordering: OrderingSignal) -> IngestResult<ScoreOrOpus> {
    let mut units = units;
    let one_score_each = units.iter().all(|u| u.scores.len() == 1);
    let companion = ordering.is_part_index_convention();

    if one_score_each && units.len() == 1 && !companion {
        if let Some(unit) = units.pop() {
            if let Some(score) = unit.scores.into_iter().next() {
                return Ok(ScoreOrOpus::Score(score));
            }
        }
    }

    if one_score_each && (companion || shared_identity(&units)) {
        debug!("assembling {} units as parts of one score", units.len());
        return Ok(ScoreOrOpus::Score(assemble_parts(units)));
    }

    let scores: Vec<Score> = units.into_iter().flat_map(|u| u.scores).collect();
    debug!("bundling {} works into an opus", scores.len());
    Ok(ScoreOrOpus::Opus(Opus::new(scores)?))
}

/// Do all units declare the same work identity?
///
/// Titles are consulted first: present-and-equal merges, present-and-
/// different keeps the units apart even when work numbers agree. Only
/// when titles carry no evidence do work numbers get a say.
fn shared_identity(units: &[DecodedUnit]) -> bool {
    match identity_of(units, |s| s.metadata.title.as_deref()) {
        Identity::Same => true,
        Identity::Distinct => false,
        Identity::Unknown => matches!(
            identity_of(units, |s| s.work_number()),
            Identity::Same
        ),
    }
}

fn identity_of<'a, F>(units: &'a [DecodedUnit], get: F) -> Identity
where
    F: Fn(&'a Score) -> Option<&'a str>,
{
    let mut values: Vec<&str> = Vec::with_capacity(units.len());
    for unit in units {
        let value = unit.scores.first().and_then(|s| get(s)).map(str::trim);
        match value {
            Some(v) if !v.is_empty() => values.push(v),
            _ => return Identity::Unknown,
        }
    }
    if values.windows(2).all(|w| w[0] == w[1]) {
        Identity::Same
    } else {
        Identity::Distinct
    }
}

/// Concatenate every unit's parts into one Score, in unit order.
///
/// Unnamed parts take their unit's filename stem as a name; metadata
/// merges field-wise, first non-empty value winning. A unit whose score
/// has no parts still contributes one empty part, keeping position N of
/// the source at position N of the result.
fn assemble_parts(units: Vec<DecodedUnit>) -> Score {
    let mut merged = Score::new(Metadata::new());
    for unit in units {
        let stem = unit.name.as_deref().map(file_stem);
        for score in unit.scores {
            merged.metadata.fill_missing_from(&score.metadata);
            if score.parts.is_empty() {
                let id = match &stem {
                    Some(stem) => PartId::Name(stem.clone()),
                    None => PartId::Index(merged.parts.len()),
                };
                merged.push_part(Part::empty(id));
                continue;
            }
            for mut part in score.parts {
                if let PartId::Index(_) = part.id {
                    part.id = match &stem {
                        Some(stem) => PartId::Name(stem.clone()),
                        None => PartId::Index(merged.parts.len()),
                    };
                }
                merged.push_part(part);
            }
        }
    }
    merged
}

/// Filename minus its final extension, for part naming.
fn file_stem(name: &str) -> String {
    match Path::new(name).file_stem() {
        Some(stem) => stem.to_string_lossy().into_owned(),
        None => name.to_owned(),
    }
}
