// Polyphony Features - training-data compiler and onset tracker
// Windowed spectral features and decay-weighted note labels from annotated audio

// Module declarations
pub mod analysis;
pub mod audio;
pub mod compiler;
pub mod config;
pub mod error;
pub mod events;
pub mod labels;
pub mod note;
pub mod sequence;
pub mod storage;
pub mod testing;
pub mod tracker;

// Re-exports for convenience
pub use analysis::{Feature, FeatureBuilder};
pub use compiler::{CompileInput, CompileOptions, CompileSummary, FeatureCompiler};
pub use config::{Configuration, NoteRange, TrackerConfig};
pub use error::{CompileError, ErrorCode, StorageError};
pub use events::Event;
pub use labels::{DecayModel, Label};
pub use note::Note;
pub use storage::{FeatureDatabase, TableName};
pub use tracker::{Onset, Tracker};
