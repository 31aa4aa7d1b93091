// Audio module - sample sources for offline feature compilation
//
// The compiler reads whole files through the `AudioSource` trait so tests can
// feed synthetic buffers and the CLI can decode WAV files with `hound`.

pub mod wav;

pub use wav::WavSource;

use crate::error::CompileError;

/// Mono sample source
pub trait AudioSource {
    /// Sampling frequency in Hz
    fn sample_rate(&self) -> f64;

    /// Total number of mono frames
    fn frame_count(&self) -> usize;

    /// Copy frames from the cursor into `buffer`
    ///
    /// # Returns
    /// Number of frames written, 0 at end of stream
    fn read_frames(&mut self, buffer: &mut [f32]) -> usize;

    /// Move the cursor to an absolute frame
    fn seek(&mut self, frame: usize);

    /// Hand over every decoded frame, leaving the source empty
    ///
    /// Sources that hold their whole file in memory return it without a
    /// copy. Streaming sources keep the default and are read frame by frame.
    fn take_samples(&mut self) -> Option<Vec<f32>> {
        None
    }
}

/// Read every frame of a source into one owned buffer
///
/// Starts from frame 0. The returned buffer may be shorter than
/// `frame_count()` if the source ends early. In-memory sources give up their
/// buffer and are empty afterwards.
pub fn read_all(source: &mut dyn AudioSource) -> Vec<f32> {
    if let Some(samples) = source.take_samples() {
        return samples;
    }
    source.seek(0);
    let mut data = vec![0.0; source.frame_count()];
    let mut filled = 0;
    while filled < data.len() {
        let read = source.read_frames(&mut data[filled..]);
        if read == 0 {
            break;
        }
        filled += read;
    }
    data.truncate(filled);
    data
}

/// Check a source against the configured sampling frequency
pub fn check_sample_rate(
    source: &dyn AudioSource,
    expected: f64,
    path: &std::path::Path,
) -> Result<(), CompileError> {
    if (source.sample_rate() - expected).abs() > f64::EPSILON * expected {
        return Err(CompileError::SampleRateMismatch {
            path: path.to_path_buf(),
            actual: source.sample_rate(),
            expected,
        });
    }
    Ok(())
}

/// In-memory mono source
#[derive(Debug, Clone)]
pub struct MemorySource {
    samples: Vec<f32>,
    sample_rate: f64,
    cursor: usize,
}

impl MemorySource {
    pub fn new(samples: Vec<f32>, sample_rate: f64) -> Self {
        Self {
            samples,
            sample_rate,
            cursor: 0,
        }
    }
}

impl AudioSource for MemorySource {
    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn frame_count(&self) -> usize {
        self.samples.len()
    }

    fn read_frames(&mut self, buffer: &mut [f32]) -> usize {
        let remaining = &self.samples[self.cursor.min(self.samples.len())..];
        let count = remaining.len().min(buffer.len());
        buffer[..count].copy_from_slice(&remaining[..count]);
        self.cursor += count;
        count
    }

    fn seek(&mut self, frame: usize) {
        self.cursor = frame.min(self.samples.len());
    }

    fn take_samples(&mut self) -> Option<Vec<f32>> {
        self.cursor = 0;
        Some(std::mem::take(&mut self.samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_memory_source_reads_in_chunks() {
        let mut source = MemorySource::new((0..10).map(|i| i as f32).collect(), 8000.0);
        let mut buffer = [0.0; 4];
        assert_eq!(source.read_frames(&mut buffer), 4);
        assert_eq!(buffer, [0.0, 1.0, 2.0, 3.0]);
        source.seek(8);
        assert_eq!(source.read_frames(&mut buffer), 2);
        assert_eq!(&buffer[..2], &[8.0, 9.0]);
        assert_eq!(source.read_frames(&mut buffer), 0);
    }

    #[test]
    fn test_read_all_rewinds() {
        let mut source = MemorySource::new(vec![0.5; 100], 8000.0);
        source.seek(60);
        assert_eq!(read_all(&mut source).len(), 100);
    }

    #[test]
    fn test_read_all_takes_memory_buffer() {
        let samples = vec![0.25; 4096];
        let address = samples.as_ptr();
        let mut source = MemorySource::new(samples, 8000.0);

        let data = read_all(&mut source);
        assert_eq!(data.as_ptr(), address);
        assert_eq!(data.len(), 4096);
        assert_eq!(source.frame_count(), 0);
    }

    /// Yields at most three frames per read
    struct TrickleSource {
        remaining: usize,
    }

    impl AudioSource for TrickleSource {
        fn sample_rate(&self) -> f64 {
            8000.0
        }

        fn frame_count(&self) -> usize {
            10
        }

        fn read_frames(&mut self, buffer: &mut [f32]) -> usize {
            let count = self.remaining.min(3).min(buffer.len());
            buffer[..count].fill(1.0);
            self.remaining -= count;
            count
        }

        fn seek(&mut self, frame: usize) {
            self.remaining = 10 - frame.min(10);
        }
    }

    #[test]
    fn test_read_all_streams_other_sources() {
        let mut source = TrickleSource { remaining: 4 };
        assert_eq!(read_all(&mut source), vec![1.0; 10]);
    }

    #[test]
    fn test_sample_rate_check() {
        let source = MemorySource::new(vec![], 48000.0);
        let err = check_sample_rate(&source, 44100.0, Path::new("x.wav")).unwrap_err();
        assert!(matches!(err, CompileError::SampleRateMismatch { .. }));
        assert!(check_sample_rate(&source, 48000.0, Path::new("x.wav")).is_ok());
    }
}
