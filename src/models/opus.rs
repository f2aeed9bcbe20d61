//! Opus: an ordered collection of Scores keyed by work number
//!
//! Work numbers are format-native strings (an ABC `X:` value, a RomanText
//! movement number, a catalog tag). Construction guarantees every
//! contained Score carries one and that they are unique, so the lookup
//! surface never has to deal with half-keyed collections.

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, IngestResult};
use crate::models::metadata::Metadata;
use crate::models::score::{Part, PartId, Score};

/// Ordered collection of Scores, each tagged with a unique work number.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Opus {
    scores: Vec<Score>,
}

impl Opus {
    /// Build an Opus from Scores in ingestion order.
    ///
    /// A Score without a declared work number is assigned its 1-based
    /// position as the number. A collision between numbers, declared or
    /// assigned, is `DuplicateWorkNumber`; nothing is renumbered to hide
    /// it.
    pub fn new(scores: Vec<Score>) -> IngestResult<Self> {
        let mut scores = scores;
        for (i, score) in scores.iter_mut().enumerate() {
            if score.metadata.work_number.is_none() {
                score.metadata.work_number = Some((i + 1).to_string());
            }
        }

        let mut seen: Vec<&str> = Vec::with_capacity(scores.len());
        for score in &scores {
            let n = score.work_number().unwrap_or_default();
            if seen.contains(&n) {
                return Err(IngestError::DuplicateWorkNumber(n.to_owned()));
            }
            seen.push(n);
        }

        Ok(Self { scores })
    }

    /// Contained Scores in ingestion order.
    pub fn scores(&self) -> &[Score] {
        &self.scores
    }

    /// Consume the Opus, yielding its Scores in ingestion order.
    pub fn into_scores(self) -> Vec<Score> {
        self.scores
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// All work numbers, in ingestion order.
    pub fn numbers(&self) -> Vec<&str> {
        self.scores
            .iter()
            .map(|s| s.work_number().unwrap_or_default())
            .collect()
    }

    /// Exact-match lookup on the work number.
    pub fn score_by_number(&self, number: &str) -> IngestResult<&Score> {
        self.scores
            .iter()
            .find(|s| s.work_number() == Some(number))
            .ok_or_else(|| IngestError::WorkNotFound(number.to_owned()))
    }

    /// Exact-match scan over titles, first match wins.
    pub fn score_by_title(&self, title: &str) -> IngestResult<&Score> {
        self.scores
            .iter()
            .find(|s| s.metadata.title.as_deref() == Some(title))
            .ok_or_else(|| IngestError::WorkNotFound(title.to_owned()))
    }

    /// Collapse the Opus into one Score with one Part per contained Score.
    ///
    /// Every Score must expose a compatible title (equal after trimming,
    /// or all titles unset); each contributes its first Part, or an empty
    /// Part when it has none, so the result's Part count always equals
    /// `self.len()`. Remaining metadata fields merge first-non-empty in
    /// ingestion order.
    pub fn merge_scores(&self) -> IngestResult<Score> {
        let reference: Option<&str> = self
            .scores
            .first()
            .and_then(|s| s.metadata.title.as_deref())
            .map(str::trim);
        for score in &self.scores {
            let title = score.metadata.title.as_deref().map(str::trim);
            if title != reference {
                return Err(IngestError::IncompatibleMerge(format!(
                    "title {title:?} does not match {reference:?}"
                )));
            }
        }

        let mut merged = Score::new(Metadata::new());
        for (i, score) in self.scores.iter().enumerate() {
            merged.metadata.fill_missing_from(&score.metadata);
            let part = match score.parts.first() {
                Some(p) => p.clone(),
                None => Part::empty(PartId::Index(i)),
            };
            merged.push_part(part);
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::stream::{Element, Pitch, Step, Stream};
    use crate::models::timebase::quarters;

    fn score(title: Option<&str>, number: Option<&str>) -> Score {
        let mut s = Score::new(Metadata {
            title: title.map(str::to_owned),
            work_number: number.map(str::to_owned),
            ..Metadata::default()
        });
        let mut stream = Stream::new();
        stream.push(
            quarters(0),
            Element::note(quarters(1), Pitch::natural(Step::C, 4)),
        );
        s.push_part(Part::new(PartId::Index(0), stream));
        s
    }

    #[test]
    fn unnumbered_scores_get_ordinal_numbers() {
        let opus = Opus::new(vec![
            score(None, Some("12")),
            score(None, None),
            score(None, None),
        ])
        .expect("construction should succeed");
        assert_eq!(opus.numbers(), vec!["12", "2", "3"]);
    }

    #[test]
    fn ordinal_clash_with_declared_number_is_an_error() {
        // second score is unnumbered and sits at position 2, which the
        // first score already declared
        let result = Opus::new(vec![score(None, Some("2")), score(None, None)]);
        assert!(matches!(
            result,
            Err(IngestError::DuplicateWorkNumber(ref n)) if n == "2"
        ));
    }

    #[test]
    fn lookup_by_number_and_title() {
        let opus = Opus::new(vec![
            score(Some("Aus meines Herzens Grunde"), Some("1")),
            score(Some("Ich dank dir, lieber Herre"), Some("2")),
        ])
        .expect("construction should succeed");

        let second = opus.score_by_number("2").expect("number 2 exists");
        assert_eq!(
            second.metadata.title.as_deref(),
            Some("Ich dank dir, lieber Herre")
        );
        let first = opus
            .score_by_title("Aus meines Herzens Grunde")
            .expect("title exists");
        assert_eq!(first.work_number(), Some("1"));
        assert!(matches!(
            opus.score_by_number("9"),
            Err(IngestError::WorkNotFound(_))
        ));
    }

    #[test]
    fn title_scan_returns_first_match() {
        let opus = Opus::new(vec![
            score(Some("Round"), Some("a")),
            score(Some("Round"), Some("b")),
        ])
        .expect("construction should succeed");
        let found = opus.score_by_title("Round").expect("title exists");
        assert_eq!(found.work_number(), Some("a"));
    }

    #[test]
    fn merge_scores_keeps_one_part_per_score() {
        let mut empty = Score::new(Metadata {
            title: Some("Mass".into()),
            ..Metadata::default()
        });
        empty.metadata.work_number = Some("4".into());

        let opus = Opus::new(vec![
            score(Some("Mass"), Some("1")),
            score(Some("Mass  "), Some("2")),
            score(Some("Mass"), Some("3")),
            empty,
        ])
        .expect("construction should succeed");

        let merged = opus.merge_scores().expect("titles are compatible");
        assert_eq!(merged.parts.len(), 4);
        assert!(merged.parts[3].stream.is_empty());
        assert_eq!(merged.metadata.title.as_deref(), Some("Mass"));
    }

    #[test]
    fn merge_scores_rejects_mismatched_titles() {
        let opus = Opus::new(vec![
            score(Some("Kyrie"), Some("1")),
            score(Some("Gloria"), Some("2")),
        ])
        .expect("construction should succeed");
        assert!(matches!(
            opus.merge_scores(),
            Err(IngestError::IncompatibleMerge(_))
        ));
    }

    #[test]
    fn all_unset_titles_merge_cleanly() {
        let opus = Opus::new(vec![score(None, Some("1")), score(None, Some("2"))])
            .expect("construction should succeed");
        let merged = opus.merge_scores().expect("unset titles are compatible");
        assert_eq!(merged.parts.len(), 2);
        assert_eq!(merged.metadata.title, None);
    }
}
