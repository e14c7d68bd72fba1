//! Error types for the narration pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Broad failure classes reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Extraction,
    Synthesis,
    Mux,
    Resource,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Extraction => "Extraction error",
            ErrorKind::Synthesis => "Synthesis error",
            ErrorKind::Mux => "Mux error",
            ErrorKind::Resource => "Resource error",
        };
        f.write_str(name)
    }
}

/// Failures raised by a synthesis engine.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("Reference voice {path} is unusable: {message}")]
    Voice { path: PathBuf, message: String },

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("TTS backend error: {0}")]
    Backend(String),

    #[error("Could not read synthesized audio: {0}")]
    Audio(#[from] AudioError),
}

/// Failures raised while reading, writing or merging waveforms.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error(
        "Audio format mismatch: expected {expected_rate} Hz / {expected_channels} ch, got {found_rate} Hz / {found_channels} ch"
    )]
    FormatMismatch {
        expected_rate: u32,
        expected_channels: u16,
        found_rate: u32,
        found_channels: u16,
    },

    #[error("Unsupported WAV sample format: {bits}-bit {format}")]
    UnsupportedFormat { bits: u16, format: &'static str },
}

/// Failures raised by the container mux tool.
#[derive(Error, Debug)]
pub enum MuxError {
    #[error("Failed to launch {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {}: {stderr}", status.map(|c| format!("status {}", c)).unwrap_or_else(|| "a signal".to_string()))]
    ToolFailed {
        tool: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("Could not prepare mux inputs: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not write base audio: {0}")]
    Audio(#[from] AudioError),
}

/// Fatal errors of a narration run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to open document {path}: {message}")]
    Document { path: PathBuf, message: String },

    #[error("No text found in \"{0}\"")]
    NoContent(String),

    #[error("Synthesis failed in \"{chapter}\": {source}")]
    Synthesis {
        chapter: String,
        #[source]
        source: SynthesisError,
    },

    #[error("Could not load TTS engine: {0}")]
    Engine(#[source] SynthesisError),

    #[error("Synthesis produced no audio for any chapter")]
    NoAudio,

    #[error("Audio assembly failed: {0}")]
    Audio(#[from] AudioError),

    #[error("Muxing failed: {0}")]
    Mux(#[from] MuxError),

    #[error("Reference voice not found: {0}")]
    MissingVoice(PathBuf),

    #[error("Filesystem error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Classify this error into the user-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Document { .. } | PipelineError::NoContent(_) => ErrorKind::Extraction,
            PipelineError::Synthesis { .. }
            | PipelineError::Engine(_)
            | PipelineError::NoAudio
            | PipelineError::Audio(_) => ErrorKind::Synthesis,
            // Scratch files the muxer could not write are a filesystem problem
            PipelineError::Mux(MuxError::Io(_) | MuxError::Audio(_)) => ErrorKind::Resource,
            PipelineError::Mux(_) => ErrorKind::Mux,
            PipelineError::MissingVoice(_) | PipelineError::Io { .. } => ErrorKind::Resource,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Bytes of tool stderr kept in error messages.
const STDERR_TAIL: usize = 600;

/// Last part of a tool's stderr, trimmed and cut on a char boundary.
pub(crate) fn stderr_tail(stderr: &str) -> &str {
    tail(stderr, STDERR_TAIL)
}

fn tail(text: &str, max: usize) -> &str {
    let text = text.trim();
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            PipelineError::NoContent("Book".into()).kind(),
            ErrorKind::Extraction
        );
        assert_eq!(
            PipelineError::MissingVoice(PathBuf::from("voice.wav")).kind(),
            ErrorKind::Resource
        );
        assert_eq!(PipelineError::NoAudio.kind(), ErrorKind::Synthesis);
        let mux = MuxError::ToolFailed {
            tool: "ffmpeg".into(),
            status: Some(1),
            stderr: "boom".into(),
        };
        assert_eq!(PipelineError::from(mux).kind(), ErrorKind::Mux);
    }

    #[test]
    fn test_mux_scratch_failures_are_resource_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err = PipelineError::from(MuxError::Io(io));
        assert_eq!(err.kind(), ErrorKind::Resource);

        let launch = MuxError::Launch {
            tool: "ffmpeg".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(PipelineError::from(launch).kind(), ErrorKind::Mux);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::Mux.to_string(), "Mux error");
        assert_eq!(ErrorKind::Resource.to_string(), "Resource error");
    }

    #[test]
    fn test_tail() {
        assert_eq!(tail("  short  ", 10), "short");
        assert_eq!(tail("abcdefghij", 3), "hij");
        assert_eq!(tail("aé", 1), "");
        assert_eq!(stderr_tail(&"x".repeat(1000)).len(), STDERR_TAIL);
    }

    #[test]
    fn test_tool_failed_message() {
        let err = MuxError::ToolFailed {
            tool: "ffmpeg".into(),
            status: Some(1),
            stderr: "Invalid data".into(),
        };
        assert_eq!(err.to_string(), "ffmpeg exited with status 1: Invalid data");

        let err = MuxError::ToolFailed {
            tool: "ffmpeg".into(),
            status: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("a signal"));
    }
}
