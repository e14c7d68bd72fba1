//! Coqui `tts` command line backend.
//!
//! Each sentence is one invocation of the CLI with the XTTS model, the
//! reference voice as `--speaker_wav` and the output written to the scratch
//! path chosen by the caller.

use super::{EngineProvider, SynthesisEngine, SynthesisRequest, check_language};
use crate::error::{SynthesisError, stderr_tail};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    model_name: String,
    device: Option<String>,
}

impl CommandEngine {
    pub fn new(program: String, model_name: String, device: Option<String>) -> Self {
        Self {
            program,
            model_name,
            device,
        }
    }

    /// Arguments for one synthesis call.
    fn build_args(&self, request: &SynthesisRequest<'_>, output_path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--text".into(),
            request.text.into(),
            "--model_name".into(),
            self.model_name.clone().into(),
            "--speaker_wav".into(),
            request.voice.path().into(),
            "--language_idx".into(),
            request.language.into(),
            "--out_path".into(),
            output_path.into(),
        ];
        if let Some(ref device) = self.device {
            args.push("--device".into());
            args.push(device.into());
        }
        args
    }
}

#[async_trait]
impl SynthesisEngine for CommandEngine {
    async fn synthesize(
        &self,
        request: &SynthesisRequest<'_>,
        output_path: &Path,
    ) -> Result<(), SynthesisError> {
        check_language(request.language)?;

        let output = Command::new(&self.program)
            .args(self.build_args(request, output_path))
            .output()
            .await
            .map_err(|e| SynthesisError::Backend(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SynthesisError::Backend(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr_tail(&stderr)
            )));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        &self.program
    }
}

#[derive(Debug, Clone)]
pub struct CommandProvider {
    engine: CommandEngine,
}

impl CommandProvider {
    pub fn new(program: String, model_name: String, device: Option<String>) -> Self {
        Self {
            engine: CommandEngine::new(program, model_name, device),
        }
    }
}

#[async_trait]
impl EngineProvider for CommandProvider {
    async fn acquire(&self) -> Result<Box<dyn SynthesisEngine>, SynthesisError> {
        // The CLI loads the model per call; acquiring only checks the tool can be launched.
        Command::new(&self.engine.program)
            .arg("--help")
            .output()
            .await
            .map_err(|e| {
                SynthesisError::Backend(format!("cannot run {}: {}", self.engine.program, e))
            })?;
        log::info!("Using {} with model {}", self.engine.program, self.engine.model_name);
        Ok(Box::new(self.engine.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tts::ReferenceVoice;
    use tempfile::TempDir;

    fn voice(dir: &TempDir) -> ReferenceVoice {
        let path = dir.path().join("voice.wav");
        std::fs::write(&path, b"RIFF").unwrap();
        ReferenceVoice::locate(&path).unwrap()
    }

    #[test]
    fn test_build_args() {
        let dir = TempDir::new().unwrap();
        let voice = voice(&dir);
        let engine = CommandEngine::new("tts".into(), "xtts".into(), Some("cuda".into()));
        let request = SynthesisRequest {
            text: "Hello.",
            voice: &voice,
            language: "en",
        };

        let args = engine.build_args(&request, Path::new("/tmp/out.wav"));
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args[0..2], ["--text", "Hello."]);
        assert!(args.windows(2).any(|w| w == ["--language_idx", "en"]));
        assert!(args.windows(2).any(|w| w == ["--out_path", "/tmp/out.wav"]));
        assert_eq!(args[args.len() - 2..], ["--device", "cuda"]);
    }

    #[tokio::test]
    async fn test_unsupported_language_fails_before_launch() {
        let dir = TempDir::new().unwrap();
        let voice = voice(&dir);
        let engine = CommandEngine::new("/nonexistent/tts".into(), "xtts".into(), None);
        let request = SynthesisRequest {
            text: "Hello.",
            voice: &voice,
            language: "tlh",
        };
        let err = engine
            .synthesize(&request, &dir.path().join("out.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::UnsupportedLanguage(_)));
    }

    #[tokio::test]
    async fn test_missing_program_is_backend_error() {
        let provider = CommandProvider::new("/nonexistent/tts".into(), "xtts".into(), None);
        let err = provider.acquire().await.err().unwrap();
        assert!(matches!(err, SynthesisError::Backend(_)));
    }
}
