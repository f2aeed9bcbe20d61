//! Directory resolution with numeric-aware filename ordering
//!
//! A directory of part files must yield a total order, because unit order
//! becomes part order in the merged Score. Filenames that all embed a
//! numeric index sort naturally (`2-alto` before `10-bass`); filenames
//! with no digits at all sort lexically; a mixture has no defensible
//! order and is rejected rather than guessed at.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::WalkDir;

use crate::error::{IngestError, IngestResult};
use crate::resolve::{FormatUnit, OrderingSignal, Resolution, ResolveOptions};

/// One run of a filename: digits compare as numbers, the rest as
/// lowercased text. Variant order makes numbers sort ahead of text.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Piece {
    Number(u128),
    Text(String),
}

/// Split a filename into comparable runs (`"10-alto.krn"` becomes
/// `[10, "-alto.krn"]`).
fn natural_key(name: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut digits = String::new();
    let mut text = String::new();

    for c in name.chars() {
        if c.is_ascii_digit() {
            if !text.is_empty() {
                pieces.push(Piece::Text(std::mem::take(&mut text).to_lowercase()));
            }
            digits.push(c);
        } else {
            if !digits.is_empty() {
                pieces.push(number_piece(&std::mem::take(&mut digits)));
            }
            text.push(c);
        }
    }
    if !digits.is_empty() {
        pieces.push(number_piece(&digits));
    }
    if !text.is_empty() {
        pieces.push(Piece::Text(text.to_lowercase()));
    }
    pieces
}

fn number_piece(digits: &str) -> Piece {
    let trimmed = digits.trim_start_matches('0');
    // leading zeros alone mean zero
    if trimmed.is_empty() {
        return Piece::Number(0);
    }
    Piece::Number(trimmed.parse().unwrap_or(u128::MAX))
}

/// Does the name's stem (extension stripped) embed a numeric index?
pub(crate) fn stem_has_index(name: &str) -> bool {
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    stem.chars().any(|c| c.is_ascii_digit())
}

/// Resolve a directory into its regular files, ordered.
pub fn resolve_dir(path: &Path, options: &ResolveOptions) -> IngestResult<Resolution> {
    let mut names: Vec<(String, PathBuf)> = Vec::new();
    for entry in WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping unreadable directory entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if options.is_excluded(&name) {
            debug!("excluding {name}");
            continue;
        }
        names.push((name, entry.path().to_path_buf()));
    }

    if names.is_empty() {
        return Err(IngestError::FetchError {
            source_name: path.display().to_string(),
            reason: "directory contains no part files".to_owned(),
        });
    }

    let indexed = names.iter().filter(|(n, _)| stem_has_index(n)).count();
    let ordering = if indexed == names.len() {
        names.sort_by(|(a, _), (b, _)| natural_key(a).cmp(&natural_key(b)));
        OrderingSignal::NumericIndex
    } else if indexed == 0 {
        names.sort_by_key(|(n, _)| n.to_lowercase());
        OrderingSignal::Lexical
    } else {
        let with = names
            .iter()
            .find(|(n, _)| stem_has_index(n))
            .map(|(n, _)| n.clone())
            .unwrap_or_default();
        let without = names
            .iter()
            .find(|(n, _)| !stem_has_index(n))
            .map(|(n, _)| n.clone())
            .unwrap_or_default();
        return Err(IngestError::AmbiguousPartOrder(format!(
            "directory mixes indexed and unindexed filenames ({with:?} vs {without:?})"
        )));
    };

    let mut units = Vec::with_capacity(names.len());
    for (position, (name, file_path)) in names.into_iter().enumerate() {
        let bytes =
            std::fs::read(&file_path).map_err(|e| IngestError::fetch_io(&file_path, e))?;
        units.push(FormatUnit {
            bytes,
            position,
            name: Some(name),
        });
    }

    debug!("directory resolved to {} units ({ordering:?})", units.len());
    Ok(Resolution { units, ordering })
}
