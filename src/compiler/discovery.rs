// Input discovery - audio files and their sibling annotations

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CompileError;
use crate::events::EventFormat;

/// Audio extensions picked up by discovery
pub const AUDIO_EXTENSIONS: [&str; 1] = ["wav"];

/// Annotation extensions, in lookup order
const ANNOTATION_EXTENSIONS: [&str; 3] = ["mid", "midi", "csv"];

/// One file to compile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileInput {
    pub audio: PathBuf,
    /// Event file; `None` compiles the audio as unlabeled noise
    pub annotation: Option<PathBuf>,
}

impl CompileInput {
    pub fn labeled(audio: impl Into<PathBuf>, annotation: impl Into<PathBuf>) -> Self {
        Self {
            audio: audio.into(),
            annotation: Some(annotation.into()),
        }
    }

    pub fn noise(audio: impl Into<PathBuf>) -> Self {
        Self {
            audio: audio.into(),
            annotation: None,
        }
    }
}

fn is_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|audio| audio.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Sibling annotation with the same stem, if any
pub fn annotation_for(audio: &Path) -> Option<PathBuf> {
    ANNOTATION_EXTENSIONS
        .iter()
        .map(|ext| audio.with_extension(ext))
        .find(|candidate| candidate.is_file() && EventFormat::from_path(candidate).is_some())
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), CompileError> {
    let read_error = |err: std::io::Error| CompileError::AudioRead {
        path: dir.to_path_buf(),
        reason: err.to_string(),
    };

    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(read_error)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()
        .map_err(read_error)?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            walk(&path, out)?;
        } else if is_audio(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn audio_files(root: &Path) -> Result<Vec<PathBuf>, CompileError> {
    if root.is_file() {
        return Ok(if is_audio(root) {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        });
    }
    let mut files = Vec::new();
    walk(root, &mut files)?;
    Ok(files)
}

/// Recursively find annotated audio under `root`
///
/// Audio without a sibling `.mid`/`.midi`/`.csv` file is skipped.
pub fn discover_labeled(root: &Path) -> Result<Vec<CompileInput>, CompileError> {
    let mut inputs = Vec::new();
    for audio in audio_files(root)? {
        match annotation_for(&audio) {
            Some(annotation) => inputs.push(CompileInput::labeled(audio, annotation)),
            None => log::info!("[Compiler] Skipping {:?}: no annotation found", audio),
        }
    }
    log::debug!("[Compiler] Found {} annotated files under {:?}", inputs.len(), root);
    Ok(inputs)
}

/// Recursively find audio under `root` to compile as noise
pub fn discover_noise(root: &Path) -> Result<Vec<CompileInput>, CompileError> {
    let inputs: Vec<CompileInput> = audio_files(root)?
        .into_iter()
        .map(CompileInput::noise)
        .collect();
    log::debug!("[Compiler] Found {} noise files under {:?}", inputs.len(), root);
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_discover_labeled_pairs_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("a.wav"));
        touch(&root.join("a.csv"));
        touch(&root.join("nested/b.WAV"));
        touch(&root.join("nested/b.mid"));
        touch(&root.join("nested/unlabeled.wav"));
        touch(&root.join("notes.txt"));

        let inputs = discover_labeled(root).unwrap();
        assert_eq!(
            inputs,
            vec![
                CompileInput::labeled(root.join("a.wav"), root.join("a.csv")),
                CompileInput::labeled(root.join("nested/b.WAV"), root.join("nested/b.mid")),
            ]
        );
    }

    #[test]
    fn test_discover_noise_takes_all_audio() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("hum.wav"));
        touch(&dir.path().join("x/fan.wav"));
        touch(&dir.path().join("x/fan.csv"));

        let inputs = discover_noise(dir.path()).unwrap();
        assert_eq!(inputs.len(), 2);
        assert!(inputs.iter().all(|input| input.annotation.is_none()));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_labeled(&dir.path().join("absent")).is_err());
    }
}
