//! TTS engine traits and types.

pub mod command;
pub mod tone;
#[cfg(feature = "xtts")]
pub mod xtts;

use crate::config::{EngineKind, NarrateConfig};
use crate::error::{PipelineError, SynthesisError};
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Languages accepted by XTTS v2.
pub const XTTS_LANGUAGES: &[&str] = &[
    "en", "es", "fr", "de", "it", "pt", "pl", "tr", "ru", "nl", "cs", "ar", "zh-cn", "hu", "ko",
    "ja", "hi",
];

/// Reject language codes the XTTS model cannot speak.
pub fn check_language(language: &str) -> std::result::Result<(), SynthesisError> {
    if XTTS_LANGUAGES.contains(&language) {
        Ok(())
    } else {
        Err(SynthesisError::UnsupportedLanguage(language.to_string()))
    }
}

/// Reference recording the cloned voice is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceVoice {
    path: PathBuf,
}

impl ReferenceVoice {
    /// Confirm the reference recording exists and is not empty.
    pub fn locate(path: &Path) -> std::result::Result<Self, PipelineError> {
        let metadata = match std::fs::metadata(path) {
            Ok(m) if m.is_file() => m,
            _ => return Err(PipelineError::MissingVoice(path.to_path_buf())),
        };

        if metadata.len() == 0 {
            return Err(PipelineError::Engine(SynthesisError::Voice {
                path: path.to_path_buf(),
                message: "file is empty".to_string(),
            }));
        }

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One sentence to narrate.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    pub text: &'a str,
    pub voice: &'a ReferenceVoice,
    pub language: &'a str,
}

/// A loaded TTS engine. Every call writes exactly one WAV file at `output_path`.
#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    async fn synthesize(
        &self,
        request: &SynthesisRequest<'_>,
        output_path: &Path,
    ) -> std::result::Result<(), SynthesisError>;

    /// Engine name for display.
    fn name(&self) -> &str;
}

/// Loads engine state. The returned handle owns the model until dropped.
#[async_trait]
pub trait EngineProvider: Send + Sync {
    async fn acquire(&self) -> std::result::Result<Box<dyn SynthesisEngine>, SynthesisError>;
}

/// Create the engine provider selected by the configuration.
pub fn create_provider(config: &NarrateConfig) -> Result<Box<dyn EngineProvider>> {
    match config.engine {
        EngineKind::Command => Ok(Box::new(command::CommandProvider::new(
            config.tts_command.clone(),
            config.model_name.clone(),
            config.device.clone(),
        ))),
        EngineKind::Tone => Ok(Box::new(tone::ToneProvider::default())),
        #[cfg(feature = "xtts")]
        EngineKind::Xtts => Ok(Box::new(xtts::XttsProvider::new(
            config.model_name.clone(),
            config.device.clone(),
        ))),
        #[cfg(not(feature = "xtts"))]
        EngineKind::Xtts => anyhow::bail!(
            "The xtts engine is not compiled in. Rebuild with `--features xtts` or use `--engine command`."
        ),
    }
}
