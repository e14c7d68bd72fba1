//! Container muxing: encode the book waveform and embed chapter metadata.

use super::metadata::{ContainerTags, write_ffmetadata};
use super::timeline::Timeline;
use crate::error::{MuxError, stderr_tail};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::process::Command;

/// External media tool. A nonzero exit is reported as `MuxError::ToolFailed`.
#[async_trait]
pub trait MuxTool: Send + Sync {
    async fn run(&self, args: &[OsString]) -> Result<(), MuxError>;

    fn name(&self) -> &str;
}

/// FFmpeg invoked as a subprocess.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    program: String,
}

impl FfmpegTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl MuxTool for FfmpegTool {
    async fn run(&self, args: &[OsString]) -> Result<(), MuxError> {
        log::debug!("{} {:?}", self.program, args);
        let output = Command::new(&self.program)
            .args(["-hide_banner", "-loglevel", "error"])
            .args(args)
            .output()
            .await
            .map_err(|source| MuxError::Launch {
                tool: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MuxError::ToolFailed {
                tool: self.program.clone(),
                status: output.status.code(),
                stderr: stderr_tail(&stderr).to_string(),
            });
        }

        Ok(())
    }

    fn name(&self) -> &str {
        &self.program
    }
}

/// Produces the chaptered M4B from a timeline.
pub struct ContainerMuxer {
    tool: Box<dyn MuxTool>,
    bitrate: String,
}

impl ContainerMuxer {
    pub fn new(tool: Box<dyn MuxTool>, bitrate: impl Into<String>) -> Self {
        Self {
            tool,
            bitrate: bitrate.into(),
        }
    }

    /// Encode `timeline` into a chaptered container inside `work_dir` and return its path.
    ///
    /// The PCM dump, base container and metadata document are removed before
    /// returning, on success and on failure. The returned file is the
    /// caller's to move or delete.
    pub async fn encode(
        &self,
        timeline: &Timeline,
        tags: &ContainerTags,
        work_dir: &Path,
    ) -> Result<PathBuf, MuxError> {
        // Step 1: base AAC container
        let pcm = scratch(work_dir, "book_", ".wav")?;
        timeline.audio.write_wav(&pcm)?;

        let base = scratch(work_dir, "base_", ".m4a")?;
        let encode_args: Vec<OsString> = vec![
            "-y".into(),
            "-i".into(),
            pcm.as_os_str().into(),
            "-vn".into(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            self.bitrate.as_str().into(),
            base.as_os_str().into(),
        ];
        self.tool.run(&encode_args).await?;
        drop(pcm);

        // Step 2: chapter metadata
        let metadata = scratch(work_dir, "metadata_", ".txt")?;
        write_ffmetadata(&metadata, tags, &timeline.marks)?;

        // Step 3: merge metadata into the base container
        let chaptered = scratch(work_dir, "chaptered_", ".m4b")?;
        let mux_args: Vec<OsString> = vec![
            "-y".into(),
            "-i".into(),
            base.as_os_str().into(),
            "-i".into(),
            metadata.as_os_str().into(),
            "-map".into(),
            "0:a".into(),
            "-map_metadata".into(),
            "1".into(),
            "-map_chapters".into(),
            "1".into(),
            "-c".into(),
            "copy".into(),
            "-f".into(),
            "mp4".into(),
            chaptered.as_os_str().into(),
        ];
        self.tool.run(&mux_args).await?;

        log::info!(
            "Muxed {} chapters with {}",
            timeline.marks.len(),
            self.tool.name()
        );

        chaptered.keep().map_err(|e| MuxError::Io(e.error))
    }
}

/// An empty file in `dir` that is deleted when dropped.
fn scratch(dir: &Path, prefix: &str, suffix: &str) -> Result<TempPath, MuxError> {
    Ok(tempfile::Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile_in(dir)?
        .into_temp_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::segment::{AudioFormat, AudioSegment};
    use crate::audio::timeline::ChapterMark;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Writes its output argument, optionally failing on one call, and records what it saw.
    struct FakeTool {
        fail_on_call: Option<usize>,
        calls: Mutex<Vec<Vec<String>>>,
        metadata_seen: Mutex<Option<String>>,
    }

    impl FakeTool {
        fn new(fail_on_call: Option<usize>) -> Self {
            Self {
                fail_on_call,
                calls: Mutex::new(Vec::new()),
                metadata_seen: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl MuxTool for &'static FakeTool {
        async fn run(&self, args: &[OsString]) -> Result<(), MuxError> {
            let args: Vec<String> = args
                .iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect();
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(args.clone());
                calls.len() - 1
            };

            if let Some(meta) = args.iter().find(|a| a.ends_with(".txt")) {
                *self.metadata_seen.lock().unwrap() = std::fs::read_to_string(meta).ok();
            }

            let output = args.last().unwrap();
            std::fs::write(output, b"container").unwrap();

            if self.fail_on_call == Some(call) {
                return Err(MuxError::ToolFailed {
                    tool: "fake".into(),
                    status: Some(1),
                    stderr: "muxing failed".into(),
                });
            }
            Ok(())
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn timeline() -> Timeline {
        Timeline {
            audio: AudioSegment::new(AudioFormat::mono(1000), vec![0; 3000]),
            marks: vec![
                ChapterMark {
                    start: Duration::ZERO,
                    end: Duration::from_secs(1),
                    title: "One".into(),
                },
                ChapterMark {
                    start: Duration::from_secs(1),
                    end: Duration::from_secs(3),
                    title: "Two".into(),
                },
            ],
        }
    }

    fn leak(tool: FakeTool) -> &'static FakeTool {
        Box::leak(Box::new(tool))
    }

    fn entries(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_encode_leaves_only_chaptered_container() {
        let dir = TempDir::new().unwrap();
        let tool = leak(FakeTool::new(None));
        let muxer = ContainerMuxer::new(Box::new(tool), "96k");

        let out = muxer
            .encode(&timeline(), &ContainerTags::for_book("Book", "Voice"), dir.path())
            .await
            .unwrap();

        assert!(out.exists());
        assert_eq!(out.extension().and_then(|e| e.to_str()), Some("m4b"));
        assert_eq!(entries(dir.path()).len(), 1);

        let calls = tool.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].windows(2).any(|w| w == ["-b:a", "96k"]));
        assert!(calls[1].windows(2).any(|w| w == ["-map_metadata", "1"]));

        let metadata = tool.metadata_seen.lock().unwrap().clone().unwrap();
        assert!(metadata.contains("artist=Voice"));
        assert!(metadata.contains("START=1000\nEND=3000\ntitle=Two"));
    }

    #[tokio::test]
    async fn test_failed_mux_removes_intermediates() {
        let dir = TempDir::new().unwrap();
        let tool = leak(FakeTool::new(Some(1)));
        let muxer = ContainerMuxer::new(Box::new(tool), "128k");

        let err = muxer
            .encode(&timeline(), &ContainerTags::for_book("Book", "Voice"), dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, MuxError::ToolFailed { status: Some(1), .. }));
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_failed_encode_removes_intermediates() {
        let dir = TempDir::new().unwrap();
        let tool = leak(FakeTool::new(Some(0)));
        let muxer = ContainerMuxer::new(Box::new(tool), "128k");

        assert!(
            muxer
                .encode(&timeline(), &ContainerTags::for_book("Book", "Voice"), dir.path())
                .await
                .is_err()
        );
        assert!(entries(dir.path()).is_empty());
        assert_eq!(tool.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_is_launch_error() {
        let tool = FfmpegTool::new("/nonexistent/ffmpeg");
        let err = tool.run(&["-version".into()]).await.unwrap_err();
        assert!(matches!(err, MuxError::Launch { .. }));
    }

    #[tokio::test]
    async fn test_missing_work_dir_is_resource_error() {
        let dir = TempDir::new().unwrap();
        let tool = leak(FakeTool::new(None));
        let muxer = ContainerMuxer::new(Box::new(tool), "128k");

        let err = muxer
            .encode(
                &timeline(),
                &ContainerTags::for_book("Book", "Voice"),
                &dir.path().join("missing"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, MuxError::Io(_)));
        assert_eq!(
            crate::error::PipelineError::from(err).kind(),
            crate::error::ErrorKind::Resource
        );
        assert!(tool.calls.lock().unwrap().is_empty());
    }
}
