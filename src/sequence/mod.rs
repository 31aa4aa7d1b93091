// Sequence module - ordered (Feature, Label) windows over a whole file
//
// Both builders share `WindowedAudio`, which owns the decoded samples and the
// feature builder and drives the hop loop:
//
//   offsets: step, 2·step, ..., <= total - W
//   prev = samples[offset - step .. offset - step + W]
//   cur  = samples[offset .. offset + W]
//
// Files shorter than one window plus one hop produce no windows.

mod noise;
mod poly;

pub use noise::NoiseSequenceBuilder;
pub use poly::PolySequenceBuilder;

use std::path::{Path, PathBuf};

use crate::analysis::{Feature, FeatureBuilder};
use crate::audio::{check_sample_rate, read_all, AudioSource};
use crate::config::Configuration;
use crate::error::CompileError;
use crate::events::Event;
use crate::labels::Label;

/// One analysis window with its targets
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// First sample of the current window
    pub start: usize,
    pub label: Label,
    pub feature: Feature,
}

/// Produces the windows of one audio file
pub trait SequenceBuilder {
    /// Ground-truth events of the file, sorted by start
    fn events(&self) -> &[Event];

    /// Call `action` for every window in file order
    ///
    /// # Returns
    /// Number of windows produced
    fn for_each_window(
        &mut self,
        action: &mut dyn FnMut(Window) -> Result<(), CompileError>,
    ) -> Result<usize, CompileError>;
}

/// Decoded audio plus the feature builder that walks it
pub struct WindowedAudio {
    path: PathBuf,
    config: Configuration,
    feature_builder: FeatureBuilder,
    samples: Vec<f32>,
}

impl WindowedAudio {
    /// Read a whole source
    ///
    /// # Errors
    /// `SampleRateMismatch` if the source rate differs from the configuration
    pub fn read(
        source: &mut dyn AudioSource,
        path: &Path,
        config: &Configuration,
    ) -> Result<Self, CompileError> {
        check_sample_rate(source, config.sampling_frequency, path)?;
        let samples = read_all(source);

        Ok(Self {
            path: path.to_path_buf(),
            config: config.clone(),
            feature_builder: FeatureBuilder::new(config),
            samples,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Start offsets of every window
    pub fn window_offsets(&self) -> std::iter::StepBy<std::ops::RangeInclusive<usize>> {
        let window = self.config.window_size;
        let step = self.config.step_size;
        // last = 0 leaves step..=0 empty
        let last = if self.samples.len() >= window + step {
            self.samples.len() - window
        } else {
            0
        };
        (step..=last).step_by(step)
    }

    /// Drive the hop loop
    ///
    /// # Arguments
    /// * `label_for` - Label for the window starting at the given offset
    /// * `action` - Receives each finished window
    pub fn for_each_window(
        &mut self,
        mut label_for: impl FnMut(usize) -> Result<Label, CompileError>,
        action: &mut dyn FnMut(Window) -> Result<(), CompileError>,
    ) -> Result<usize, CompileError> {
        let window = self.config.window_size;
        let step = self.config.step_size;

        if self.samples.len() < window + step {
            log::info!(
                "[Sequence] Skipping {:?}: {} samples is shorter than one window plus one hop",
                self.path,
                self.samples.len()
            );
            return Ok(0);
        }

        self.feature_builder.reset();
        let mut count = 0;
        for offset in self.window_offsets() {
            let prev = &self.samples[offset - step..offset - step + window];
            let cur = &self.samples[offset..offset + window];

            let feature = self.feature_builder.generate(prev, cur);
            if !feature.is_finite() {
                return Err(CompileError::NonFiniteFeature {
                    window_start: offset,
                });
            }
            let label = label_for(offset)?;

            action(Window {
                start: offset,
                label,
                feature,
            })?;
            count += 1;
        }

        Ok(count)
    }
}
