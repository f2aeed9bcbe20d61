//! Content-first format detection
//!
//! `sniff` looks at the bytes before it ever looks at the filename: binary
//! magic first, then structural text signatures in a bounded prefix, and
//! only when those are inconclusive does the extension break the tie. A
//! recognizable body therefore always beats a mislabeled extension, and an
//! unknown input yields `None` instead of a guess.

use once_cell::sync::Lazy;

/// The closed set of supported notation formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    MusicXml,
    Humdrum,
    Abc,
    RomanText,
    MuseData,
    Midi,
}

impl Format {
    /// Every supported format, in sniffing priority order.
    pub const ALL: [Format; 6] = [
        Format::Midi,
        Format::MusicXml,
        Format::Humdrum,
        Format::Abc,
        Format::RomanText,
        Format::MuseData,
    ];

    /// Short lowercase name used in messages and logs.
    pub fn name(self) -> &'static str {
        match self {
            Format::MusicXml => "musicxml",
            Format::Humdrum => "humdrum",
            Format::Abc => "abc",
            Format::RomanText => "romantext",
            Format::MuseData => "musedata",
            Format::Midi => "midi",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How many leading bytes the text probes may inspect.
const PROBE_BYTES: usize = 4096;

/// Known filename extensions, lowercase, without the dot.
static EXTENSIONS: Lazy<Vec<(&'static str, Format)>> = Lazy::new(|| {
    vec![
        ("xml", Format::MusicXml),
        ("musicxml", Format::MusicXml),
        ("mxl", Format::MusicXml),
        ("krn", Format::Humdrum),
        ("kern", Format::Humdrum),
        ("abc", Format::Abc),
        ("rntxt", Format::RomanText),
        ("rntext", Format::RomanText),
        ("romantext", Format::RomanText),
        ("rtxt", Format::RomanText),
        ("md", Format::MuseData),
        ("musedata", Format::MuseData),
        ("mid", Format::Midi),
        ("midi", Format::Midi),
    ]
});

/// Classify a unit's bytes, with the filename as tie-break only.
///
/// Returns `None` when neither content nor extension identifies a
/// supported format. Never panics, whatever the bytes.
pub fn sniff(bytes: &[u8], filename_hint: Option<&str>) -> Option<Format> {
    if let Some(format) = sniff_content(bytes) {
        return Some(format);
    }
    filename_hint.and_then(extension_hint)
}

/// Content-only detection, extension ignored entirely.
pub fn sniff_content(bytes: &[u8]) -> Option<Format> {
    if bytes.starts_with(b"MThd") {
        return Some(Format::Midi);
    }

    let prefix = String::from_utf8_lossy(&bytes[..bytes.len().min(PROBE_BYTES)]);

    if prefix.contains("<score-partwise") || prefix.contains("<score-timewise") {
        return Some(Format::MusicXml);
    }
    if looks_like_humdrum(&prefix) {
        return Some(Format::Humdrum);
    }
    if looks_like_abc(&prefix) {
        return Some(Format::Abc);
    }
    if looks_like_romantext(&prefix) {
        return Some(Format::RomanText);
    }
    if looks_like_musedata(&prefix) {
        return Some(Format::MuseData);
    }
    None
}

/// Map a filename's extension to a format, case-insensitively.
pub fn extension_hint(filename: &str) -> Option<Format> {
    let ext = filename.rsplit_once('.')?.1.to_ascii_lowercase();
    EXTENSIONS
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, format)| *format)
}

fn looks_like_humdrum(prefix: &str) -> bool {
    prefix
        .lines()
        .map(str::trim_end)
        .any(|line| line.starts_with("**kern") || line.starts_with("!!!"))
}

fn looks_like_abc(prefix: &str) -> bool {
    prefix
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('%'))
        .any(|line| {
            line.strip_prefix("X:")
                .map(str::trim_start)
                .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
        })
}

fn looks_like_romantext(prefix: &str) -> bool {
    let mut has_measure = false;
    let mut has_header = false;
    for line in prefix.lines().map(str::trim) {
        if line.starts_with("Composer:") || line.starts_with("Title:") || line.starts_with("Piece:")
        {
            has_header = true;
        }
        if let Some(rest) = line.strip_prefix('m') {
            if rest.starts_with(|c: char| c.is_ascii_digit()) {
                has_measure = true;
            }
        }
        if has_measure && has_header {
            return true;
        }
    }
    false
}

fn looks_like_musedata(prefix: &str) -> bool {
    prefix
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('@') && !line.starts_with('&'))
        .any(|line| line.starts_with("WK#:") || line.contains(" WK#:"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_beat_contradicting_extension() {
        let midi = b"MThd\x00\x00\x00\x06\x00\x00\x00\x01\x01\xe0";
        assert_eq!(sniff(midi, Some("tune.abc")), Some(Format::Midi));
    }

    #[test]
    fn structural_text_beats_contradicting_extension() {
        let abc = b"X:1\nT:Test\nK:C\nCDEF|\n";
        assert_eq!(sniff(abc, Some("tune.mid")), Some(Format::Abc));
    }

    #[test]
    fn xml_declaration_alone_needs_extension_tiebreak() {
        let xml = b"<?xml version=\"1.0\"?>\n<something-else/>\n";
        assert_eq!(sniff(xml, None), None);
        assert_eq!(sniff(xml, Some("score.xml")), Some(Format::MusicXml));
    }

    #[test]
    fn partwise_root_is_conclusive_without_hint() {
        let xml = b"<?xml version=\"1.0\"?>\n<score-partwise version=\"3.1\">\n";
        assert_eq!(sniff(xml, None), Some(Format::MusicXml));
    }

    #[test]
    fn kern_spine_and_reference_records_detect_humdrum() {
        assert_eq!(sniff(b"**kern\n4c\n*-\n", None), Some(Format::Humdrum));
        assert_eq!(
            sniff(b"!!!OTL: Some Title\n**kern\n", None),
            Some(Format::Humdrum)
        );
    }

    #[test]
    fn romantext_needs_both_header_and_measure_line() {
        let headers_only = b"Composer: Monteverdi\nTitle: Cruda Amarilli\n";
        assert_eq!(sniff(headers_only, None), None);
        let full = b"Composer: Monteverdi\nTime Signature: 4/4\nm1 G: I\n";
        assert_eq!(sniff(full, None), Some(Format::RomanText));
    }

    #[test]
    fn musedata_work_number_header() {
        let md = b"05/18/09 E. Correia\nWK#:581       MV#:3c\nBreitkopf & Haertel\n";
        assert_eq!(sniff(md, None), Some(Format::MuseData));
    }

    #[test]
    fn abc_comment_lines_are_skipped() {
        let abc = b"% a comment first\n% another\nX: 2\nT:After comments\n";
        assert_eq!(sniff(abc, None), Some(Format::Abc));
    }

    #[test]
    fn unknown_content_yields_none() {
        assert_eq!(sniff(b"", None), None);
        assert_eq!(sniff(b"hello world", None), None);
        assert_eq!(sniff(b"\xff\xfe\x00\x01binary soup", None), None);
        assert_eq!(sniff(b"hello world", Some("notes.txt")), None);
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert_eq!(extension_hint("SCORE.XML"), Some(Format::MusicXml));
        assert_eq!(extension_hint("chorale.KRN"), Some(Format::Humdrum));
        assert_eq!(extension_hint("noext"), None);
    }
}
