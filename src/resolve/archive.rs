//! Zip container resolution
//!
//! Covers `.mxl` (compressed MusicXML) and plain zipped bundles of part
//! files. Entries keep the archive's declared order; a
//! `META-INF/container.xml` manifest, when present, overrides both which
//! entries count and their order, the way `.mxl` readers are expected to
//! honor it.

use std::io::{Cursor, Read};

use log::{debug, warn};
use zip::ZipArchive;

use crate::error::{IngestError, IngestResult};
use crate::resolve::directory::stem_has_index;
use crate::resolve::{FormatUnit, OrderingSignal, Resolution, ResolveOptions};

const CONTAINER_MANIFEST: &str = "META-INF/container.xml";

fn archive_error(name: Option<&str>, reason: impl std::fmt::Display) -> IngestError {
    IngestError::FetchError {
        source_name: name.unwrap_or("zip archive").to_owned(),
        reason: reason.to_string(),
    }
}

/// Path components decide exclusion, so `__MACOSX/._score.xml` and
/// friends are dropped wherever they nest.
fn excluded_path(path: &str, options: &ResolveOptions) -> bool {
    path.split('/').any(|component| options.is_excluded(component))
}

fn basename(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_owned()
}

/// Resolve a zip container's bytes into ordered units.
pub fn resolve_zip(
    bytes: &[u8],
    source_name: Option<&str>,
    options: &ResolveOptions,
) -> IngestResult<Resolution> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| archive_error(source_name, e))?;

    // one pass in central-directory order; the manifest, if any, is
    // captured alongside the candidate entries
    let mut entries: Vec<(String, Vec<u8>)> = Vec::new();
    let mut manifest: Option<Vec<u8>> = None;
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| archive_error(source_name, e))?;
        if file.is_dir() {
            continue;
        }
        let path = file.name().to_owned();

        let mut buf = Vec::with_capacity(file.size() as usize);
        if path == CONTAINER_MANIFEST {
            file.read_to_end(&mut buf)
                .map_err(|e| archive_error(source_name, e))?;
            manifest = Some(buf);
            continue;
        }
        if path.starts_with("META-INF/") || excluded_path(&path, options) {
            debug!("excluding archive entry {path}");
            continue;
        }
        file.read_to_end(&mut buf)
            .map_err(|e| archive_error(source_name, e))?;
        entries.push((path, buf));
    }

    match manifest {
        Some(manifest_bytes) => {
            let rootfiles = parse_container_manifest(&manifest_bytes, source_name)?;
            let mut units = Vec::with_capacity(rootfiles.len());
            for (position, path) in rootfiles.into_iter().enumerate() {
                let found = entries.iter().find(|(name, _)| *name == path);
                let bytes = match found {
                    Some((_, bytes)) => bytes.clone(),
                    None => {
                        return Err(archive_error(
                            source_name,
                            format!("manifest references missing entry {path:?}"),
                        ))
                    }
                };
                units.push(FormatUnit {
                    bytes,
                    position,
                    name: Some(basename(&path)),
                });
            }
            Ok(Resolution {
                units,
                ordering: OrderingSignal::Manifest,
            })
        }
        None => {
            if entries.is_empty() {
                return Err(archive_error(source_name, "archive contains no entries"));
            }
            let all_indexed = entries
                .iter()
                .all(|(path, _)| stem_has_index(&basename(path)));
            let ordering = if entries.len() == 1 {
                OrderingSignal::Single
            } else if all_indexed {
                OrderingSignal::NumericIndex
            } else {
                OrderingSignal::ArchiveOrder
            };
            let units = entries
                .into_iter()
                .enumerate()
                .map(|(position, (path, bytes))| FormatUnit {
                    bytes,
                    position,
                    name: Some(basename(&path)),
                })
                .collect();
            Ok(Resolution { units, ordering })
        }
    }
}

/// Pull the ordered rootfile paths out of `META-INF/container.xml`.
fn parse_container_manifest(bytes: &[u8], source_name: Option<&str>) -> IngestResult<Vec<String>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| archive_error(source_name, "container manifest is not UTF-8"))?;
    let doc = roxmltree::Document::parse(text)
        .map_err(|e| archive_error(source_name, format!("container manifest: {e}")))?;

    let paths: Vec<String> = doc
        .descendants()
        .filter(|node| node.tag_name().name() == "rootfile")
        .filter_map(|node| node.attribute("full-path"))
        .map(str::to_owned)
        .collect();

    if paths.is_empty() {
        return Err(archive_error(source_name, "manifest declares no rootfiles"));
    }
    if paths.len() > 1 {
        warn!("manifest declares {} rootfiles; keeping all in order", paths.len());
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, bytes) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .expect("start_file");
            writer.write_all(bytes).expect("write entry");
        }
        writer.finish().expect("finish zip").into_inner()
    }

    #[test]
    fn entries_keep_archive_declared_order() {
        let bytes = build_zip(&[("zebra.abc", b"X:1\n"), ("apple.abc", b"X:2\n")]);
        let res = resolve_zip(&bytes, None, &ResolveOptions::default()).expect("resolves");
        let order: Vec<&str> = res.units.iter().filter_map(|u| u.name.as_deref()).collect();
        assert_eq!(order, vec!["zebra.abc", "apple.abc"], "no lexical re-sort");
        assert_eq!(res.ordering, OrderingSignal::ArchiveOrder);
    }

    #[test]
    fn manifest_overrides_selection_and_order() {
        let manifest = br#"<?xml version="1.0" encoding="UTF-8"?>
<container>
  <rootfiles>
    <rootfile full-path="scores/late.xml"/>
    <rootfile full-path="scores/early.xml"/>
  </rootfiles>
</container>"#;
        let bytes = build_zip(&[
            ("mimetype", b"application/vnd.recordare.musicxml"),
            ("scores/early.xml", b"<score-partwise/>"),
            ("scores/late.xml", b"<score-partwise/>"),
            ("META-INF/container.xml", manifest),
        ]);
        let res = resolve_zip(&bytes, Some("work.mxl"), &ResolveOptions::default())
            .expect("resolves");
        let order: Vec<&str> = res.units.iter().filter_map(|u| u.name.as_deref()).collect();
        assert_eq!(order, vec!["late.xml", "early.xml"]);
        assert_eq!(res.ordering, OrderingSignal::Manifest);
        assert_eq!(res.units[0].position, 0);
    }

    #[test]
    fn manifest_referencing_missing_entry_fails() {
        let manifest = br#"<container><rootfiles>
            <rootfile full-path="gone.xml"/>
        </rootfiles></container>"#;
        let bytes = build_zip(&[("META-INF/container.xml", manifest)]);
        let res = resolve_zip(&bytes, Some("broken.mxl"), &ResolveOptions::default());
        assert!(matches!(res, Err(IngestError::FetchError { .. })));
    }

    #[test]
    fn macos_droppings_are_excluded() {
        let bytes = build_zip(&[
            ("__MACOSX/._01.krn", b"junk"),
            (".DS_Store", b"junk"),
            ("01.krn", b"**kern\n"),
            ("02.krn", b"**kern\n"),
        ]);
        let res = resolve_zip(&bytes, None, &ResolveOptions::default()).expect("resolves");
        assert_eq!(res.units.len(), 2);
        assert_eq!(res.ordering, OrderingSignal::NumericIndex);
    }

    #[test]
    fn garbage_bytes_are_a_fetch_error() {
        let res = resolve_zip(b"PK\x03\x04not really", Some("fake.zip"), &ResolveOptions::default());
        assert!(matches!(res, Err(IngestError::FetchError { .. })));
    }
}
