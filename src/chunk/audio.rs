//! Decoded audio clips and fixed-duration audio chunking.

use crate::error::{Result, VoxbridgeError};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;
use std::time::Duration;

/// Interleaved 16-bit PCM audio with its format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    /// Interleaved samples (`frames * channels` values).
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioClip {
    /// Creates a clip from interleaved samples.
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels: channels.max(1),
        }
    }

    /// Decodes a WAV stream of any integer or float sample format to 16-bit PCM.
    pub fn from_wav_reader<R: Read>(reader: R, origin: &str) -> Result<Self> {
        let decode_err = |e: hound::Error| VoxbridgeError::AudioDecode {
            path: origin.to_string(),
            message: e.to_string(),
        };

        let mut wav_reader = hound::WavReader::new(reader).map_err(decode_err)?;
        let spec = wav_reader.spec();

        let samples: Vec<i16> = match spec.sample_format {
            hound::SampleFormat::Int if spec.bits_per_sample <= 16 => {
                let shift = 16 - spec.bits_per_sample;
                wav_reader
                    .samples::<i16>()
                    .map(|s| s.map(|v| v << shift))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(decode_err)?
            }
            hound::SampleFormat::Int => {
                let shift = spec.bits_per_sample - 16;
                wav_reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| (v >> shift) as i16))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(decode_err)?
            }
            hound::SampleFormat::Float => wav_reader
                .samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
                .collect::<std::result::Result<_, _>>()
                .map_err(decode_err)?,
        };

        Ok(Self::new(samples, spec.sample_rate, spec.channels))
    }

    /// Decodes a WAV file from disk.
    pub fn from_wav_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_wav_reader(BufReader::new(file), &path.display().to_string())
    }

    /// Encodes the clip as a 16-bit PCM WAV file in memory.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        let encode_err = |e: hound::Error| VoxbridgeError::AudioEncode {
            message: e.to_string(),
        };

        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(encode_err)?;
        for &sample in &self.samples {
            writer.write_sample(sample).map_err(encode_err)?;
        }
        writer.finalize().map_err(encode_err)?;
        Ok(cursor.into_inner())
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Playback duration.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }
}

/// Splits `clip` into contiguous, non-overlapping segments of at most
/// `max_duration` each, in playback order.
///
/// A clip no longer than `max_duration` comes back as a single segment equal
/// to the whole clip. Segment boundaries are frame-aligned, so channels are
/// never split apart.
pub fn chunk_audio(clip: &AudioClip, max_duration: Duration) -> Vec<AudioClip> {
    let frames_per_segment =
        ((max_duration.as_millis() * clip.sample_rate as u128) / 1000).max(1) as usize;

    if clip.frames() <= frames_per_segment {
        return vec![clip.clone()];
    }

    let samples_per_segment = frames_per_segment * clip.channels as usize;
    clip.samples
        .chunks(samples_per_segment)
        .map(|samples| AudioClip::new(samples.to_vec(), clip.sample_rate, clip.channels))
        .collect()
}
