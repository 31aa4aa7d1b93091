//! Deterministic synthetic signals for DSP tests.

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f64::consts::PI;
use std::path::Path;

/// Sine wave that completes exactly `bin` cycles per `window_size` samples
///
/// With a periodic Hamming window the energy of such a sine lands in bins
/// `bin - 1 ..= bin + 1` only.
pub fn on_bin_sine(len: usize, window_size: usize, bin: usize, amplitude: f32) -> Vec<f32> {
    (0..len)
        .map(|n| {
            let phase = 2.0 * PI * bin as f64 * n as f64 / window_size as f64;
            amplitude * phase.sin() as f32
        })
        .collect()
}

/// Sine wave at a frequency in Hz
pub fn sine(len: usize, sample_rate: f64, frequency: f64, amplitude: f32) -> Vec<f32> {
    (0..len)
        .map(|n| amplitude * (2.0 * PI * frequency * n as f64 / sample_rate).sin() as f32)
        .collect()
}

/// Seeded uniform white noise in [-1, 1)
pub fn white_noise(len: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

/// Write mono 16-bit PCM
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()
}

/// Sample-wise sum of equally long signals
pub fn mix(signals: &[Vec<f32>]) -> Vec<f32> {
    let len = signals.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = vec![0.0; len];
    for signal in signals {
        for (o, s) in out.iter_mut().zip(signal) {
            *o += s;
        }
    }
    out
}
