//! Chapter assembly: sentence-by-sentence synthesis into one chapter waveform.

use super::segment::AudioSegment;
use crate::error::{PipelineError, Result, SynthesisError};
use crate::extract::Chapter;
use crate::text;
use crate::tts::{ReferenceVoice, SynthesisEngine, SynthesisRequest};
use std::path::Path;
use std::time::Duration;

/// Synthesized audio for one chapter.
#[derive(Debug, Clone)]
pub struct ChapterAudio {
    pub title: String,
    pub audio: AudioSegment,
}

impl ChapterAudio {
    pub fn new(title: impl Into<String>, audio: AudioSegment) -> Self {
        Self {
            title: title.into(),
            audio,
        }
    }

    /// Chapter length, or `None` when the chapter produced no audio and gets no mark.
    pub fn duration(&self) -> Option<Duration> {
        if self.audio.is_empty() {
            None
        } else {
            Some(self.audio.duration())
        }
    }
}

/// Drives segmentation and synthesis for chapters, one sentence at a time.
pub struct ChapterAssembler<'a> {
    engine: &'a dyn SynthesisEngine,
    voice: &'a ReferenceVoice,
    language: &'a str,
    /// Directory receiving per-sentence scratch files
    scratch_dir: &'a Path,
    max_sentence_chars: usize,
}

impl<'a> ChapterAssembler<'a> {
    pub fn new(
        engine: &'a dyn SynthesisEngine,
        voice: &'a ReferenceVoice,
        language: &'a str,
        scratch_dir: &'a Path,
        max_sentence_chars: usize,
    ) -> Self {
        Self {
            engine,
            voice,
            language,
            scratch_dir,
            max_sentence_chars,
        }
    }

    /// Synthesize one chapter. `index` only names scratch files.
    pub async fn assemble(&self, index: usize, chapter: &Chapter) -> Result<ChapterAudio> {
        let sentences = text::segment(&chapter.text, self.max_sentence_chars);
        log::debug!("\"{}\": {} sentences", chapter.title, sentences.len());

        let mut audio = AudioSegment::empty();

        for (sentence_index, sentence) in sentences.iter().enumerate() {
            if sentence.trim().is_empty() {
                continue;
            }

            let clip = self
                .synthesize_sentence(index, sentence_index, sentence)
                .await?
                .map_err(|source| PipelineError::Synthesis {
                    chapter: chapter.title.clone(),
                    source,
                })?;
            audio.append(clip)?;
        }

        Ok(ChapterAudio::new(chapter.title.clone(), audio))
    }

    /// Synthesize every chapter in order. `on_progress` gets the completed fraction and the chapter.
    pub async fn assemble_all(
        &self,
        chapters: &[Chapter],
        mut on_progress: impl FnMut(f32, &ChapterAudio),
    ) -> Result<Vec<ChapterAudio>> {
        let total = chapters.len();
        let mut assembled = Vec::with_capacity(total);

        for (i, chapter) in chapters.iter().enumerate() {
            let chapter_audio = self.assemble(i, chapter).await?;
            on_progress((i + 1) as f32 / total as f32, &chapter_audio);
            assembled.push(chapter_audio);
        }

        Ok(assembled)
    }

    /// One engine call. The scratch file is removed when this returns, whatever the outcome.
    ///
    /// The outer error is a filesystem failure, the inner one an engine failure.
    async fn synthesize_sentence(
        &self,
        chapter_index: usize,
        sentence_index: usize,
        sentence: &str,
    ) -> Result<std::result::Result<AudioSegment, SynthesisError>> {
        let scratch = tempfile::Builder::new()
            .prefix(&format!("ch{:03}_s{:04}_", chapter_index, sentence_index))
            .suffix(".wav")
            .tempfile_in(self.scratch_dir)
            .map_err(|e| PipelineError::io(self.scratch_dir, e))?
            .into_temp_path();

        let request = SynthesisRequest {
            text: sentence,
            voice: self.voice,
            language: self.language,
        };
        if let Err(e) = self.engine.synthesize(&request, &scratch).await {
            return Ok(Err(e));
        }

        let clip = AudioSegment::read_wav(&scratch).map_err(SynthesisError::from);
        if let Err(e) = scratch.close() {
            log::warn!("Failed to remove scratch file: {}", e);
        }
        Ok(clip)
    }
}
