// NoiseSequenceBuilder - unlabeled windows for background noise files

use std::path::Path;

use super::{SequenceBuilder, Window, WindowedAudio};
use crate::audio::AudioSource;
use crate::config::Configuration;
use crate::error::CompileError;
use crate::events::Event;
use crate::labels::Label;

/// Noise sequence: every label is all zeros and there are no events
pub struct NoiseSequenceBuilder {
    audio: WindowedAudio,
    note_count: usize,
}

impl NoiseSequenceBuilder {
    pub fn new(
        source: &mut dyn AudioSource,
        path: &Path,
        config: &Configuration,
    ) -> Result<Self, CompileError> {
        Ok(Self {
            audio: WindowedAudio::read(source, path, config)?,
            note_count: config.note_count(),
        })
    }

    pub fn path(&self) -> &Path {
        self.audio.path()
    }
}

impl SequenceBuilder for NoiseSequenceBuilder {
    fn events(&self) -> &[Event] {
        &[]
    }

    fn for_each_window(
        &mut self,
        action: &mut dyn FnMut(Window) -> Result<(), CompileError>,
    ) -> Result<usize, CompileError> {
        let note_count = self.note_count;
        self.audio
            .for_each_window(|_| Ok(Label::new(note_count)), action)
    }
}
