//! narrate configuration management.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Reference voice looked up in the working directory when nothing else is set.
pub const DEFAULT_VOICE_REF: &str = "reference_voice.wav";
const DEFAULT_MODEL: &str = "tts_models/multilingual/multi-dataset/xtts_v2";

/// Which synthesis backend narrates the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Coqui `tts` command line tool
    Command,
    /// Coqui XTTS embedded through Python (needs the `xtts` feature)
    Xtts,
    /// Deterministic test tone, no model required
    Tone,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EngineKind::Command => "command",
            EngineKind::Xtts => "xtts",
            EngineKind::Tone => "tone",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrateConfig {
    /// Reference voice audio used for cloning
    #[serde(default = "default_voice_ref")]
    pub voice_ref: PathBuf,

    /// Artist tag written to the audiobook
    #[serde(default = "default_voice_label")]
    pub voice_label: String,

    /// Language code passed to the TTS engine
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_engine")]
    pub engine: EngineKind,

    /// Executable for the `command` engine
    #[serde(default = "default_tts_command")]
    pub tts_command: String,

    /// Model name for the `command` and `xtts` engines
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Device to use (cuda, cpu). None means let the backend decide.
    #[serde(default)]
    pub device: Option<String>,

    /// FFmpeg executable used for encoding and chapter muxing
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,

    /// AAC bitrate of the output
    #[serde(default = "default_bitrate")]
    pub bitrate: String,

    /// Longest sentence handed to the engine in one request
    #[serde(default = "default_max_sentence_chars")]
    pub max_sentence_chars: usize,

    /// Parent directory for per-run scratch directories (system temp if unset)
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

fn default_voice_ref() -> PathBuf {
    PathBuf::from(DEFAULT_VOICE_REF)
}

fn default_voice_label() -> String {
    "Cloned Voice".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_engine() -> EngineKind {
    EngineKind::Command
}

fn default_tts_command() -> String {
    "tts".to_string()
}

fn default_model_name() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_bitrate() -> String {
    "128k".to_string()
}

fn default_max_sentence_chars() -> usize {
    250
}

impl Default for NarrateConfig {
    fn default() -> Self {
        Self {
            voice_ref: default_voice_ref(),
            voice_label: default_voice_label(),
            language: default_language(),
            engine: default_engine(),
            tts_command: default_tts_command(),
            model_name: default_model_name(),
            device: None,
            ffmpeg: default_ffmpeg(),
            bitrate: default_bitrate(),
            max_sentence_chars: default_max_sentence_chars(),
            work_dir: None,
        }
    }
}

impl NarrateConfig {
    /// Get the config file path: ~/.config/cli-programs/narrate.toml
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
        Ok(home.join(".config").join("cli-programs").join("narrate.toml"))
    }

    /// Load config from file, returning default if file doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: NarrateConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }
}
