//! narrate - Narrate EPUB files into chaptered M4B audiobooks with a cloned voice

mod audio;
mod config;
mod document;
mod error;
mod extract;
mod pipeline;
mod progress;
mod text;
mod tts;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{EngineKind, NarrateConfig};
use env_logger::Env;
use error::ErrorKind;
use indicatif::{ProgressBar, ProgressStyle};
use pipeline::{Pipeline, PipelineEvent, RunRequest};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};

#[derive(Parser, Debug)]
#[command(name = "narrate")]
#[command(about = "Narrate EPUB files into chaptered M4B audiobooks with a cloned voice", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the EPUB file
    epub_file: Option<PathBuf>,

    /// Output file or directory (default: <title>.m4b in the current directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to the reference voice WAV to clone
    #[arg(long)]
    voice: Option<PathBuf>,

    /// Language code of the book (e.g. en, de, fr)
    #[arg(long)]
    language: Option<String>,

    /// TTS engine to use
    #[arg(long, value_enum)]
    engine: Option<EngineKind>,

    /// Enable debug output
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set default voice reference
    SetVoice {
        /// Path to voice reference audio
        path: PathBuf,
    },
    /// Set the artist tag written to audiobooks
    SetVoiceLabel {
        /// Label, e.g. "Johnny Cash Voice"
        label: String,
    },
    /// Set default language
    SetLanguage {
        /// Language code
        code: String,
    },
    /// Set default TTS engine
    SetEngine {
        #[arg(value_enum)]
        engine: EngineKind,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    if let Some(Commands::Config { action }) = &args.command {
        return handle_config_command(action);
    }

    let epub_path = args
        .epub_file
        .clone()
        .ok_or_else(|| anyhow::anyhow!("EPUB file path is required. Run 'narrate --help' for usage."))?;

    if !epub_path.exists() {
        anyhow::bail!("EPUB file not found: {}", epub_path.display());
    }

    let mut config = NarrateConfig::load().context("Failed to load configuration")?;
    if let Some(language) = &args.language {
        config.language = language.clone();
    }
    if let Some(engine) = args.engine {
        config.engine = engine;
    }
    let voice = args.voice.clone().unwrap_or_else(|| config.voice_ref.clone());

    if args.debug {
        eprintln!("EPUB: {}", epub_path.display());
        eprintln!("Voice ref: {}", voice.display());
        eprintln!("Engine: {}", config.engine);
        eprintln!("Language: {}", config.language);
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let mut pipeline = Pipeline::from_config(&config, tx)?;
    let renderer = tokio::spawn(render_progress(rx));

    eprintln!("Narrating {} with {}", epub_path.display(), voice.display());

    let request = RunRequest {
        document: epub_path.clone(),
        voice,
        output: args.output.clone(),
    };
    let result = pipeline.run(&request).await;

    // Closes the event channel so the renderer finishes
    drop(pipeline);
    if let Err(e) = renderer.await {
        log::warn!("Progress display stopped: {}", e);
    }

    let output_path = result.map_err(|e| {
        let context = failure_context(e.kind(), &epub_path);
        anyhow::Error::new(e).context(context)
    })?;

    let metadata = std::fs::metadata(&output_path)?;
    let size_mb = metadata.len() as f64 / (1024.0 * 1024.0);
    eprintln!("Output: {} ({:.1} MB)", output_path.display(), size_mb);

    Ok(())
}

/// Draw pipeline events until the channel closes.
async fn render_progress(mut events: UnboundedReceiver<PipelineEvent>) {
    let pb = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    while let Some(event) = events.recv().await {
        match event {
            PipelineEvent::State(state) => pb.set_message(state.to_string()),
            PipelineEvent::Progress(percent) => pb.set_position(percent as u64),
            PipelineEvent::ChapterAssembled {
                index,
                title,
                duration,
            } => match duration {
                Some(d) => pb.println(format!("  {:>3}. {} ({})", index + 1, title, format_duration(d))),
                None => pb.println(format!("  {:>3}. {} (no audio)", index + 1, title)),
            },
        }
    }

    pb.finish_and_clear();
}

/// First line of the terminal error: failure class and book.
fn failure_context(kind: ErrorKind, epub_path: &Path) -> String {
    format!("{} while narrating {}", kind, epub_path.display())
}

/// Format as h:mm:ss.
fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Handle config subcommands
fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = NarrateConfig::load()?;
            println!("Configuration file: {:?}", NarrateConfig::config_path()?);
            println!();
            println!("voice_ref = \"{}\"", config.voice_ref.display());
            println!("voice_label = \"{}\"", config.voice_label);
            println!("language = \"{}\"", config.language);
            println!("engine = \"{}\"", config.engine);
            println!("tts_command = \"{}\"", config.tts_command);
            println!("model_name = \"{}\"", config.model_name);
            if let Some(device) = &config.device {
                println!("device = \"{}\"", device);
            } else {
                println!("device = (auto-detect)");
            }
            println!("ffmpeg = \"{}\"", config.ffmpeg);
            println!("bitrate = \"{}\"", config.bitrate);
            println!("max_sentence_chars = {}", config.max_sentence_chars);
            if let Some(work_dir) = &config.work_dir {
                println!("work_dir = \"{}\"", work_dir.display());
            } else {
                println!("work_dir = (system temp)");
            }
        }
        ConfigAction::SetVoice { path } => {
            let mut config = NarrateConfig::load()?;
            config.voice_ref = path.clone();
            config.save()?;
            println!("Default voice reference set to: {}", path.display());
        }
        ConfigAction::SetVoiceLabel { label } => {
            let mut config = NarrateConfig::load()?;
            config.voice_label = label.clone();
            config.save()?;
            println!("Voice label set to: {}", label);
        }
        ConfigAction::SetLanguage { code } => {
            tts::check_language(code)?;
            let mut config = NarrateConfig::load()?;
            config.language = code.clone();
            config.save()?;
            println!("Default language set to: {}", code);
        }
        ConfigAction::SetEngine { engine } => {
            let mut config = NarrateConfig::load()?;
            config.engine = *engine;
            config.save()?;
            println!("Default engine set to: {}", engine);
        }
    }
    Ok(())
}
