// WAV source - hound-backed PCM decoding
//
// Multi-channel files are down-mixed to mono by averaging channels. Integer
// samples are normalized to [-1, 1] by their bit depth.

use std::path::{Path, PathBuf};

use super::{AudioSource, MemorySource};
use crate::error::CompileError;

/// Fully decoded WAV file
#[derive(Debug, Clone)]
pub struct WavSource {
    path: PathBuf,
    frames: MemorySource,
}

impl WavSource {
    /// Decode a WAV file
    ///
    /// # Errors
    /// `AudioRead` if the file cannot be opened or decoded
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CompileError> {
        let path = path.as_ref();
        let read_error = |reason: String| CompileError::AudioRead {
            path: path.to_path_buf(),
            reason,
        };

        let mut reader = hound::WavReader::open(path).map_err(|err| read_error(err.to_string()))?;
        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(read_error("zero channels".to_string()));
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<Vec<f32>, _>>()
                .map_err(|err| read_error(err.to_string()))?,
            hound::SampleFormat::Int => {
                if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                    return Err(read_error(format!(
                        "unsupported bits_per_sample={}",
                        spec.bits_per_sample
                    )));
                }
                let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|v| v as f32 * scale))
                    .collect::<Result<Vec<f32>, _>>()
                    .map_err(|err| read_error(err.to_string()))?
            }
        };

        let channels = spec.channels as usize;
        let samples = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        };

        log::debug!(
            "[WavSource] {:?}: {} frames at {} Hz ({} channels)",
            path,
            samples.len(),
            spec.sample_rate,
            spec.channels
        );

        Ok(Self {
            path: path.to_path_buf(),
            frames: MemorySource::new(samples, spec.sample_rate as f64),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AudioSource for WavSource {
    fn sample_rate(&self) -> f64 {
        self.frames.sample_rate()
    }

    fn frame_count(&self) -> usize {
        self.frames.frame_count()
    }

    fn read_frames(&mut self, buffer: &mut [f32]) -> usize {
        self.frames.read_frames(buffer)
    }

    fn seek(&mut self, frame: usize) {
        self.frames.seek(frame)
    }

    fn take_samples(&mut self) -> Option<Vec<f32>> {
        self.frames.take_samples()
    }
}
