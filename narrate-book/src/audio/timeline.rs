//! Book timeline: concatenated chapter audio plus chapter marks.

use super::assembler::ChapterAudio;
use super::segment::{AudioSegment, frames_to_duration};
use crate::error::AudioError;
use std::time::Duration;

/// A chapter's span within the finished book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterMark {
    pub start: Duration,
    pub end: Duration,
    pub title: String,
}

impl ChapterMark {
    pub fn start_ms(&self) -> u64 {
        self.start.as_millis() as u64
    }

    pub fn end_ms(&self) -> u64 {
        self.end.as_millis() as u64
    }
}

/// Full-book waveform with its chapter marks.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub audio: AudioSegment,
    pub marks: Vec<ChapterMark>,
}

impl Timeline {
    pub fn duration(&self) -> Duration {
        self.audio.duration()
    }
}

/// Concatenate chapter audio in order, with no gaps, and mark each non-empty chapter.
///
/// Marks are derived from cumulative frame counts, so consecutive marks
/// share their boundary exactly and the last mark ends at the book's end.
/// A chapter too short to span a whole millisecond gets no mark of its own:
/// its audio extends the previous mark, or the next one when it comes first.
pub fn build(chapters: Vec<ChapterAudio>) -> Result<Timeline, AudioError> {
    let mut audio = AudioSegment::empty();
    let mut marks: Vec<ChapterMark> = Vec::new();
    let mut running_frames: u64 = 0;

    for chapter in chapters {
        let frames = chapter.audio.frames();
        if frames == 0 {
            log::debug!("No audio for \"{}\", no chapter mark", chapter.title);
            continue;
        }

        audio.append(chapter.audio)?;
        running_frames += frames;

        // append() fixed the format on the first non-empty chapter
        let rate = audio.format().map(|f| f.sample_rate).unwrap_or_default();
        let start = marks.last().map(|m| m.end).unwrap_or(Duration::ZERO);
        let end = frames_to_duration(running_frames, rate);

        if start.as_millis() == end.as_millis() {
            log::debug!("\"{}\" is shorter than 1 ms, merged", chapter.title);
            if let Some(previous) = marks.last_mut() {
                previous.end = end;
            }
            continue;
        }

        marks.push(ChapterMark {
            start,
            end,
            title: chapter.title,
        });
    }

    Ok(Timeline { audio, marks })
}
