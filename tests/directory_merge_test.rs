// Directory sources: per-part files assembled into one Score, ordering
// rules, and the cases that must refuse to guess.

use std::fs;
use std::path::Path;

use partitura::{parse_file, IngestError, PartId};

fn write_file(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).expect("test file should write");
}

fn kern_part(title: Option<&str>, notes: &str) -> String {
    let mut text = String::new();
    if let Some(title) = title {
        text.push_str(&format!("!!!OTL: {title}\n"));
    }
    text.push_str("**kern\n");
    for note in notes.split_whitespace() {
        text.push_str(note);
        text.push('\n');
    }
    text.push_str("*-\n");
    text
}

#[test]
fn test_numbered_part_files_merge_in_filename_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "1.krn", &kern_part(Some("Trio"), "4c 4d 4e"));
    write_file(dir.path(), "2.krn", &kern_part(None, "4e 4f 4g"));
    write_file(dir.path(), "3.krn", &kern_part(None, "4g 4a 4b"));

    let score = parse_file(dir.path())
        .expect("directory should parse")
        .into_score()
        .expect("parts of one work");

    assert_eq!(score.parts.len(), 3);
    assert_eq!(score.parts[0].id, PartId::Name("1".into()));
    assert_eq!(score.parts[1].id, PartId::Name("2".into()));
    assert_eq!(score.parts[2].id, PartId::Name("3".into()));
    assert_eq!(
        score.metadata.title.as_deref(),
        Some("Trio"),
        "title comes from the first unit that has one"
    );
}

#[test]
fn test_natural_order_puts_ten_after_two() {
    let dir = tempfile::tempdir().expect("tempdir");
    for name in ["10.krn", "2.krn", "1.krn"] {
        write_file(dir.path(), name, &kern_part(None, "4c"));
    }

    let score = parse_file(dir.path())
        .expect("directory should parse")
        .into_score()
        .expect("parts of one work");
    let order: Vec<String> = score.parts.iter().map(|p| p.id.to_string()).collect();
    assert_eq!(order, vec!["1", "2", "10"]);
}

#[test]
fn test_zero_event_part_keeps_its_slot() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "1.krn", &kern_part(Some("Duet"), "4c 4d"));
    // a part file with a header and terminator but no notes yet
    write_file(dir.path(), "2.krn", "**kern\n*-\n");

    let score = parse_file(dir.path())
        .expect("directory should parse")
        .into_score()
        .expect("parts of one work");
    assert_eq!(score.parts.len(), 2);
    assert_eq!(score.parts[1].id, PartId::Name("2".into()));
    assert!(
        score.parts[1].stream.is_empty(),
        "empty part is kept, not dropped"
    );
}

#[test]
fn test_mixed_indexed_and_plain_names_are_ambiguous() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "1.krn", &kern_part(None, "4c"));
    write_file(dir.path(), "partA.krn", &kern_part(None, "4d"));

    let err = parse_file(dir.path()).expect_err("mixed naming should refuse to order");
    assert!(matches!(err, IngestError::AmbiguousPartOrder(_)), "{err}");
}

#[test]
fn test_lexical_names_with_shared_title_merge() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "alto.krn", &kern_part(Some("Motet"), "4e 4f"));
    write_file(dir.path(), "bass.krn", &kern_part(Some("Motet"), "4C 4D"));

    let score = parse_file(dir.path())
        .expect("directory should parse")
        .into_score()
        .expect("same title, one work");
    assert_eq!(score.parts.len(), 2);
    assert_eq!(score.parts[0].id, PartId::Name("alto".into()));
    assert_eq!(score.parts[1].id, PartId::Name("bass".into()));
}

#[test]
fn test_lexical_names_with_distinct_titles_stay_separate() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "jig.abc", "X:1\nT:Morrison's Jig\nK:Edor\nEBE|\n");
    write_file(dir.path(), "reel.abc", "X:2\nT:The Silver Spear\nK:D\nFAd|\n");

    let opus = parse_file(dir.path())
        .expect("directory should parse")
        .into_opus()
        .expect("distinct works");
    assert_eq!(opus.len(), 2);
    assert!(opus.score_by_title("Morrison's Jig").is_ok());
    assert!(opus.score_by_title("The Silver Spear").is_ok());
}

#[test]
fn test_metadata_merges_field_by_field() {
    let dir = tempfile::tempdir().expect("tempdir");
    // title on the first file, composer only on the second
    write_file(
        dir.path(),
        "1.krn",
        "!!!OTL: Chorale 7\n**kern\n4c\n*-\n",
    );
    write_file(
        dir.path(),
        "2.krn",
        "!!!COM: Bach, Johann Sebastian\n**kern\n4e\n*-\n",
    );

    let score = parse_file(dir.path())
        .expect("directory should parse")
        .into_score()
        .expect("parts of one work");
    assert_eq!(score.metadata.title.as_deref(), Some("Chorale 7"));
    assert_eq!(
        score.metadata.composer.as_deref(),
        Some("Bach, Johann Sebastian"),
        "later unit fills the field the first left unset"
    );
}

#[test]
fn test_system_files_are_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "1.krn", &kern_part(None, "4c"));
    write_file(dir.path(), "2.krn", &kern_part(None, "4d"));
    write_file(dir.path(), ".DS_Store", "junk");
    write_file(dir.path(), "Thumbs.db", "junk");

    let score = parse_file(dir.path())
        .expect("directory should parse")
        .into_score()
        .expect("parts of one work");
    assert_eq!(score.parts.len(), 2, "system files contribute nothing");
}

#[test]
fn test_empty_directory_is_a_fetch_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = parse_file(dir.path()).expect_err("nothing to parse");
    assert!(matches!(err, IngestError::FetchError { .. }), "{err}");
}
