//! FFmpeg metadata generation for M4B chapter markers.

use super::timeline::ChapterMark;
use std::fmt::Write as _;
use std::path::Path;

/// Global tags of the finished audiobook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerTags {
    pub title: String,
    /// Voice label shown as the artist
    pub artist: String,
    pub album: String,
}

impl ContainerTags {
    /// Tags for a book narrated by `voice_label`; the album repeats the title.
    pub fn for_book(title: &str, voice_label: &str) -> Self {
        Self {
            title: title.to_string(),
            artist: voice_label.to_string(),
            album: title.to_string(),
        }
    }
}

/// Render an FFMETADATA1 document with one millisecond-timebase block per mark.
pub fn render_ffmetadata(tags: &ContainerTags, marks: &[ChapterMark]) -> String {
    let mut doc = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(doc, ";FFMETADATA1");
    let _ = writeln!(doc, "title={}", escape_metadata_value(&tags.title));
    let _ = writeln!(doc, "artist={}", escape_metadata_value(&tags.artist));
    let _ = writeln!(doc, "album={}", escape_metadata_value(&tags.album));
    let _ = writeln!(doc, "genre=Audiobook");

    for mark in marks {
        let _ = writeln!(doc);
        let _ = writeln!(doc, "[CHAPTER]");
        let _ = writeln!(doc, "TIMEBASE=1/1000");
        let _ = writeln!(doc, "START={}", mark.start_ms());
        let _ = writeln!(doc, "END={}", mark.end_ms());
        let _ = writeln!(doc, "title={}", escape_metadata_value(&mark.title));
    }

    doc
}

/// Write the metadata document to `path`.
pub fn write_ffmetadata(
    path: &Path,
    tags: &ContainerTags,
    marks: &[ChapterMark],
) -> std::io::Result<()> {
    std::fs::write(path, render_ffmetadata(tags, marks))
}

/// Escape special characters in metadata values.
///
/// FFmpeg metadata values need to escape: = ; # \ and newlines
fn escape_metadata_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());

    for c in value.chars() {
        match c {
            '=' | ';' | '#' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            _ => escaped.push(c),
        }
    }

    escaped
}
