// PolySequenceBuilder - windows labeled from ground-truth note events

use std::path::Path;
use std::sync::Arc;

use super::{SequenceBuilder, Window, WindowedAudio};
use crate::audio::AudioSource;
use crate::config::Configuration;
use crate::error::CompileError;
use crate::events::{sort_events, Event};
use crate::labels::{DecayModel, Labeler};

/// Event-labeled sequence over one audio file
pub struct PolySequenceBuilder {
    audio: WindowedAudio,
    events: Vec<Event>,
    labeler: Labeler,
}

impl PolySequenceBuilder {
    /// Create a builder for one file
    ///
    /// # Arguments
    /// * `source` - Audio to read in full
    /// * `path` - Audio path, reported in errors and logs
    /// * `events` - Ground-truth events in sample units, any order
    /// * `model` - Shared decay model
    /// * `config` - Analysis parameters
    pub fn new(
        source: &mut dyn AudioSource,
        path: &Path,
        mut events: Vec<Event>,
        model: Arc<DecayModel>,
        config: &Configuration,
    ) -> Result<Self, CompileError> {
        let labeler = Labeler::new(config, model)?;
        let audio = WindowedAudio::read(source, path, config)?;
        sort_events(&mut events);

        Ok(Self {
            audio,
            events,
            labeler,
        })
    }

    pub fn path(&self) -> &Path {
        self.audio.path()
    }
}

impl SequenceBuilder for PolySequenceBuilder {
    fn events(&self) -> &[Event] {
        &self.events
    }

    fn for_each_window(
        &mut self,
        action: &mut dyn FnMut(Window) -> Result<(), CompileError>,
    ) -> Result<usize, CompileError> {
        let events = &self.events;
        let labeler = &self.labeler;
        self.audio
            .for_each_window(|offset| labeler.label(events, offset), action)
    }
}
