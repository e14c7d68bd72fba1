//! Run orchestration: extraction, synthesis, timeline and muxing in sequence.
//!
//! Each run owns a fresh scratch directory that is removed when the run
//! ends, whatever the outcome. Nothing is written to the output path until
//! the chaptered container is complete.

use crate::audio::{ChapterAssembler, ContainerMuxer, ContainerTags, FfmpegTool, timeline};
use crate::config::NarrateConfig;
use crate::document::Document;
use crate::error::{PipelineError, Result};
use crate::extract::extract;
use crate::progress::{Phase, ProgressTracker};
use crate::tts::{self, EngineProvider, ReferenceVoice};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Extracting,
    Synthesizing,
    Muxing,
    Done,
    Failed,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Extracting => "extracting text",
            PipelineState::Synthesizing => "synthesizing",
            PipelineState::Muxing => "muxing",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Notifications sent to the front end while a run is in progress.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    State(PipelineState),
    /// Overall progress in percent, never decreasing within a run
    Progress(u8),
    ChapterAssembled {
        index: usize,
        title: String,
        /// `None` when the chapter produced no audio
        duration: Option<Duration>,
    },
}

/// What to narrate and where to put it.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub document: PathBuf,
    pub voice: PathBuf,
    /// Output file or directory; defaults to the title-derived name in the output directory
    pub output: Option<PathBuf>,
}

/// Per-run settings taken from the configuration.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub language: String,
    pub voice_label: String,
    pub max_sentence_chars: usize,
    /// Parent of the per-run scratch directories (system temp if unset)
    pub work_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
}

impl RunSettings {
    pub fn from_config(config: &NarrateConfig) -> Self {
        Self {
            language: config.language.clone(),
            voice_label: config.voice_label.clone(),
            max_sentence_chars: config.max_sentence_chars,
            work_dir: config.work_dir.clone(),
            output_dir: PathBuf::from("."),
        }
    }
}

pub struct Pipeline {
    provider: Box<dyn EngineProvider>,
    muxer: ContainerMuxer,
    settings: RunSettings,
    events: UnboundedSender<PipelineEvent>,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(
        provider: Box<dyn EngineProvider>,
        muxer: ContainerMuxer,
        settings: RunSettings,
        events: UnboundedSender<PipelineEvent>,
    ) -> Self {
        Self {
            provider,
            muxer,
            settings,
            events,
            state: PipelineState::Idle,
        }
    }

    /// Build a pipeline with the engine and mux tool named in the configuration.
    pub fn from_config(
        config: &NarrateConfig,
        events: UnboundedSender<PipelineEvent>,
    ) -> anyhow::Result<Self> {
        let provider = tts::create_provider(config)?;
        let muxer = ContainerMuxer::new(
            Box::new(FfmpegTool::new(config.ffmpeg.clone())),
            config.bitrate.clone(),
        );
        Ok(Self::new(
            provider,
            muxer,
            RunSettings::from_config(config),
            events,
        ))
    }

    #[cfg(test)]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Narrate the EPUB named in `request`. Returns the output path.
    pub async fn run(&mut self, request: &RunRequest) -> Result<PathBuf> {
        let document_path = request.document.clone();
        let load = async move {
            let path = document_path.clone();
            tokio::task::spawn_blocking(move || Document::open(&path))
                .await
                .map_err(|e| PipelineError::Document {
                    path: document_path,
                    message: format!("loader task failed: {}", e),
                })?
        };
        self.drive(load, &request.voice, request.output.as_deref())
            .await
    }

    /// Narrate an already loaded document.
    #[cfg(test)]
    pub async fn run_document(
        &mut self,
        document: Document,
        voice: &Path,
        output: Option<&Path>,
    ) -> Result<PathBuf> {
        self.drive(async move { Ok(document) }, voice, output)
            .await
    }

    async fn drive(
        &mut self,
        load: impl Future<Output = Result<Document>>,
        voice: &Path,
        output: Option<&Path>,
    ) -> Result<PathBuf> {
        let mut progress = ProgressTracker::new(self.events.clone());
        let result = self.execute(load, voice, output, &mut progress).await;

        match &result {
            Ok(path) => {
                progress.complete();
                self.transition(PipelineState::Done);
                log::info!("Wrote {}", path.display());
            }
            Err(e) => {
                log::error!("Run failed: {}", e);
                self.transition(PipelineState::Failed);
            }
        }

        self.transition(PipelineState::Idle);
        result
    }

    async fn execute(
        &mut self,
        load: impl Future<Output = Result<Document>>,
        voice: &Path,
        output: Option<&Path>,
        progress: &mut ProgressTracker,
    ) -> Result<PathBuf> {
        // No engine is touched without a voice to clone
        let voice = ReferenceVoice::locate(voice)?;

        self.transition(PipelineState::Extracting);
        let document = load.await?;
        let chapters = extract(&document, |fraction| {
            progress.report(Phase::Extracting, fraction)
        })?;
        log::info!("\"{}\": {} chapters", document.title, chapters.len());

        let output = self.resolve_output(&document, output);
        let run_dir = self.create_run_dir()?;
        log::debug!("Run directory {}", run_dir.path().display());

        let engine = self.provider.acquire().await.map_err(PipelineError::Engine)?;
        log::info!("Synthesizing with {}", engine.name());

        self.transition(PipelineState::Synthesizing);
        let assembler = ChapterAssembler::new(
            engine.as_ref(),
            &voice,
            &self.settings.language,
            run_dir.path(),
            self.settings.max_sentence_chars,
        );
        let events = self.events.clone();
        let mut index = 0;
        let chapter_audio = assembler
            .assemble_all(&chapters, |fraction, audio| {
                progress.report(Phase::Synthesizing, fraction);
                let _ = events.send(PipelineEvent::ChapterAssembled {
                    index,
                    title: audio.title.clone(),
                    duration: audio.duration(),
                });
                index += 1;
            })
            .await?;

        let timeline = timeline::build(chapter_audio)?;
        if timeline.marks.is_empty() {
            return Err(PipelineError::NoAudio);
        }
        log::info!(
            "Timeline {:.1}s with {} chapter marks",
            timeline.duration().as_secs_f64(),
            timeline.marks.len()
        );

        self.transition(PipelineState::Muxing);
        let tags = ContainerTags::for_book(&document.title, &self.settings.voice_label);
        let muxed = self.muxer.encode(&timeline, &tags, run_dir.path()).await?;
        progress.report(Phase::Muxing, 1.0);

        // Model state is released once the container exists
        drop(engine);

        publish(&muxed, &output)?;

        if let Err(e) = run_dir.close() {
            log::warn!("Failed to remove run directory: {}", e);
        }

        Ok(output)
    }

    fn transition(&mut self, state: PipelineState) {
        log::debug!("{} -> {}", self.state, state);
        self.state = state;
        let _ = self.events.send(PipelineEvent::State(state));
    }

    fn resolve_output(&self, document: &Document, requested: Option<&Path>) -> PathBuf {
        match requested {
            Some(path) if path.is_dir() => path.join(document.output_file_name()),
            Some(path) => path.to_path_buf(),
            None => self.settings.output_dir.join(document.output_file_name()),
        }
    }

    fn create_run_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("narrate-");
        match &self.settings.work_dir {
            Some(parent) => builder
                .tempdir_in(parent)
                .map_err(|e| PipelineError::io(parent, e)),
            None => builder
                .tempdir()
                .map_err(|e| PipelineError::io(std::env::temp_dir(), e)),
        }
    }
}

/// Move the finished container to its destination.
fn publish(from: &Path, to: &Path) -> Result<()> {
    publish_with(from, to, |a, b| std::fs::rename(a, b), |p| std::fs::remove_file(p))
}

fn publish_with(
    from: &Path,
    to: &Path,
    rename: impl Fn(&Path, &Path) -> std::io::Result<()>,
    remove: impl Fn(&Path) -> std::io::Result<()>,
) -> Result<()> {
    if rename(from, to).is_ok() {
        return Ok(());
    }

    // Rename fails across filesystems
    if let Err(e) = std::fs::copy(from, to) {
        let _ = std::fs::remove_file(to);
        return Err(PipelineError::io(to, e));
    }

    // The output is in place; the run directory goes away regardless
    if let Err(e) = remove(from) {
        log::warn!("Could not remove {}: {}", from.display(), e);
    }
    Ok(())
}
