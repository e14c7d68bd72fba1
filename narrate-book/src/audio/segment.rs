//! In-memory PCM waveforms.

use crate::error::AudioError;
use std::path::Path;
use std::time::Duration;

/// Sample rate and channel layout shared by every segment of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    /// Format written for segments that never received audio.
    pub const FALLBACK: AudioFormat = AudioFormat {
        sample_rate: 24000,
        channels: 1,
    };

    pub fn mono(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
        }
    }
}

/// Interleaved 16-bit samples. The format is fixed by the first non-empty append.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioSegment {
    format: Option<AudioFormat>,
    samples: Vec<i16>,
}

impl AudioSegment {
    /// A zero-length segment with no format yet.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(format: AudioFormat, samples: Vec<i16>) -> Self {
        Self {
            format: Some(format),
            samples,
        }
    }

    /// Read a WAV file, converting integer and float samples to 16-bit.
    pub fn read_wav(path: &Path) -> Result<Self, AudioError> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();

        let samples = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 16) => reader
                .samples::<i16>()
                .collect::<Result<Vec<_>, _>>()?,
            (hound::SampleFormat::Int, bits @ 17..=32) => {
                let shift = bits - 16;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| (v >> shift) as i16))
                    .collect::<Result<Vec<_>, _>>()?
            }
            (hound::SampleFormat::Float, 32) => reader
                .samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
                .collect::<Result<Vec<_>, _>>()?,
            (hound::SampleFormat::Int, bits) => {
                return Err(AudioError::UnsupportedFormat { bits, format: "integer" });
            }
            (hound::SampleFormat::Float, bits) => {
                return Err(AudioError::UnsupportedFormat { bits, format: "float" });
            }
        };

        Ok(Self::new(
            AudioFormat {
                sample_rate: spec.sample_rate,
                channels: spec.channels,
            },
            samples,
        ))
    }

    /// Write as 16-bit PCM WAV.
    pub fn write_wav(&self, path: &Path) -> Result<(), AudioError> {
        let format = self.format.unwrap_or(AudioFormat::FALLBACK);
        let spec = hound::WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }

    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    #[cfg(test)]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> u64 {
        match self.format {
            Some(f) if f.channels > 0 => (self.samples.len() / f.channels as usize) as u64,
            _ => 0,
        }
    }

    pub fn duration(&self) -> Duration {
        match self.format {
            Some(f) => frames_to_duration(self.frames(), f.sample_rate),
            None => Duration::ZERO,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Append another segment's samples. Empty segments are ignored; formats must match.
    pub fn append(&mut self, other: AudioSegment) -> Result<(), AudioError> {
        if other.is_empty() {
            return Ok(());
        }
        let Some(incoming) = other.format else {
            return Ok(());
        };

        match self.format {
            None => {
                self.format = Some(incoming);
                self.samples = other.samples;
            }
            Some(current) if current == incoming => self.samples.extend(other.samples),
            Some(current) => {
                return Err(AudioError::FormatMismatch {
                    expected_rate: current.sample_rate,
                    expected_channels: current.channels,
                    found_rate: incoming.sample_rate,
                    found_channels: incoming.channels,
                });
            }
        }

        Ok(())
    }
}

/// Exact frame offset to time conversion. Equal frame counts always give equal durations.
pub fn frames_to_duration(frames: u64, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    let nanos = frames as u128 * 1_000_000_000 / sample_rate as u128;
    Duration::from_nanos(nanos as u64)
}
