//! Deterministic tone engine for dry runs and tests.
//!
//! Produces a sine tone whose length depends only on the sentence length,
//! so repeated runs yield identical timelines.

use super::{EngineProvider, SynthesisEngine, SynthesisRequest};
use crate::audio::{AudioFormat, AudioSegment};
use crate::error::SynthesisError;
use async_trait::async_trait;
use std::f32::consts::TAU;
use std::path::Path;

const SAMPLE_RATE: u32 = 24000;
const FREQUENCY_HZ: f32 = 220.0;
const AMPLITUDE: f32 = 0.2;

#[derive(Debug, Clone, Copy)]
pub struct ToneEngine {
    /// Milliseconds of tone per character of input
    ms_per_char: u32,
}

impl Default for ToneEngine {
    fn default() -> Self {
        Self { ms_per_char: 60 }
    }
}

impl ToneEngine {
    #[cfg(test)]
    pub fn new(ms_per_char: u32) -> Self {
        Self { ms_per_char }
    }

    /// Render the tone for a sentence.
    pub fn render(&self, text: &str) -> AudioSegment {
        let chars = text.chars().filter(|c| !c.is_whitespace()).count() as u64;
        let frames = chars * self.ms_per_char as u64 * SAMPLE_RATE as u64 / 1000;
        let samples = (0..frames)
            .map(|n| {
                let t = n as f32 / SAMPLE_RATE as f32;
                ((TAU * FREQUENCY_HZ * t).sin() * AMPLITUDE * i16::MAX as f32) as i16
            })
            .collect();
        AudioSegment::new(AudioFormat::mono(SAMPLE_RATE), samples)
    }
}

#[async_trait]
impl SynthesisEngine for ToneEngine {
    async fn synthesize(
        &self,
        request: &SynthesisRequest<'_>,
        output_path: &Path,
    ) -> Result<(), SynthesisError> {
        self.render(request.text).write_wav(output_path)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "tone"
    }
}

#[derive(Debug, Default)]
pub struct ToneProvider {
    engine: ToneEngine,
}

#[async_trait]
impl EngineProvider for ToneProvider {
    async fn acquire(&self) -> Result<Box<dyn SynthesisEngine>, SynthesisError> {
        Ok(Box::new(self.engine))
    }
}
