//! End-to-end tests: annotated WAV files through the compiler into a
//! dataset, then a shuffle over the compiled rows.

use std::fs;
use std::path::Path;

use polyphony_features::compiler::{discover_labeled, discover_noise, FILE_LIST};
use polyphony_features::storage::{shuffle, ShuffleOptions};
use polyphony_features::testing::scores::write_decay_table;
use polyphony_features::testing::signals::{mix, sine, white_noise, write_wav};
use polyphony_features::{
    CompileError, CompileOptions, Configuration, FeatureCompiler, FeatureDatabase, TableName,
};

fn config() -> Configuration {
    Configuration {
        window_size: 2048,
        step_size: 512,
        ..Configuration::default()
    }
}

/// Two chords and a noise file
fn write_corpus(root: &Path, config: &Configuration) {
    let fs_hz = config.sampling_frequency;
    let rate = fs_hz as u32;
    fs::create_dir_all(root.join("takes/chords")).unwrap();
    fs::create_dir_all(root.join("noise")).unwrap();

    let c_major = mix(&[
        sine(22_050, fs_hz, 261.63, 0.3),
        sine(22_050, fs_hz, 329.63, 0.3),
        sine(22_050, fs_hz, 392.00, 0.3),
    ]);
    write_wav(&root.join("takes/chords/c_major.wav"), &c_major, rate).unwrap();
    fs::write(
        root.join("takes/chords/c_major.csv"),
        "60,0,20000,90\n64,0,20000,90\n67,0,20000,90\n",
    )
    .unwrap();

    let a_minor = mix(&[
        sine(16_384, fs_hz, 220.00, 0.3),
        sine(16_384, fs_hz, 261.63, 0.3),
        sine(16_384, fs_hz, 329.63, 0.3),
    ]);
    write_wav(&root.join("takes/a_minor.wav"), &a_minor, rate).unwrap();
    fs::write(
        root.join("takes/a_minor.csv"),
        "57,1024,12000\n60,1024,12000\n64,1024,12000\n",
    )
    .unwrap();

    write_wav(&root.join("noise/room.wav"), &white_noise(12_288, 5), rate).unwrap();
    write_decay_table(&root.join("decay.json"), config.representable_note_range).unwrap();
}

fn compile(root: &Path, config: &Configuration, chunk_rows: usize) -> FeatureDatabase {
    let mut inputs = discover_labeled(&root.join("takes")).unwrap();
    inputs.extend(discover_noise(&root.join("noise")).unwrap());

    let options = CompileOptions {
        decay_table: Some(root.join("decay.json")),
        jobs: 2,
        chunk_rows,
        ..CompileOptions::new(root.join("dataset"))
    };
    let compiler = FeatureCompiler::new(config.clone(), options).unwrap();
    let summary = compiler.compile(&inputs).unwrap();
    assert_eq!(summary.files, 3);

    FeatureDatabase::open(&root.join("dataset")).unwrap()
}

#[test]
fn test_compiled_labels_follow_annotations() {
    let dir = tempfile::tempdir().unwrap();
    let config = config();
    write_corpus(dir.path(), &config);
    let db = compile(dir.path(), &config, 8);

    // a_minor: 28 windows, chords/c_major: 39 windows, room: 20 windows
    assert_eq!(db.window_count(), 28 + 39 + 20);
    assert_eq!(db.event_count(), 6);

    let note_count = config.note_count();
    let notes = db
        .read_rows::<f32>(TableName::LabelsNotes, 0, db.window_count())
        .unwrap();
    let polyphony = db
        .read_rows::<f32>(TableName::LabelsPolyphony, 0, db.window_count())
        .unwrap();

    let column = |note: i32| (note - config.representable_note_range.start) as usize;
    let active = |row: usize, note: i32| notes[row * note_count + column(note)] > 0.0;

    // Middle of the a minor take
    assert!(active(10, 57) && active(10, 60) && active(10, 64));
    assert!(!active(10, 67));
    assert_eq!(polyphony[10], 3.0);

    // Middle of the c major take
    let c_row = 28 + 15;
    assert!(active(c_row, 60) && active(c_row, 64) && active(c_row, 67));
    assert!(!active(c_row, 57));

    // Noise rows are blank
    for row in 67..87 {
        assert_eq!(polyphony[row], 0.0);
        assert!(notes[row * note_count..(row + 1) * note_count]
            .iter()
            .all(|&v| v == 0.0));
    }

    let spectrum = db
        .read_rows::<f32>(TableName::FeaturesSpectrum, 0, db.window_count())
        .unwrap();
    assert!(spectrum.iter().all(|v| v.is_finite() && *v >= 0.0));
}

#[test]
fn test_file_list_matches_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let config = config();
    write_corpus(dir.path(), &config);
    let db = compile(dir.path(), &config, 8);

    let list = fs::read_to_string(dir.path().join("dataset").join(FILE_LIST)).unwrap();
    let total: usize = list
        .lines()
        .map(|line| line.rsplit('\t').next().unwrap().parse::<usize>().unwrap())
        .sum();
    assert_eq!(total, db.window_count());
    assert!(list.lines().next().unwrap().contains("a_minor.wav"));
}

/// Every window row as raw bits across label and feature columns, sorted
fn row_keys(db: &FeatureDatabase) -> Vec<Vec<u32>> {
    let rows = db.window_count();
    let columns: Vec<(Vec<f32>, usize)> = TableName::LABELS
        .into_iter()
        .chain(TableName::FEATURES)
        .map(|name| {
            let width = db.table(name).row_len();
            (db.read_rows::<f32>(name, 0, rows).unwrap(), width)
        })
        .collect();

    let mut keys: Vec<Vec<u32>> = (0..rows)
        .map(|row| {
            columns
                .iter()
                .flat_map(|(values, width)| values[row * width..(row + 1) * width].iter())
                .map(|v| v.to_bits())
                .collect()
        })
        .collect();
    keys.sort();
    keys
}

#[test]
fn test_shuffle_keeps_rows_together() {
    let dir = tempfile::tempdir().unwrap();
    let config = config();
    write_corpus(dir.path(), &config);
    let mut db = compile(dir.path(), &config, 8);

    let rows = db.window_count();
    let before_keys = row_keys(&db);
    let before_spectrum = db
        .read_rows::<f32>(TableName::FeaturesSpectrum, 0, rows)
        .unwrap();

    let options = ShuffleOptions {
        chunk_rows: 8,
        passes: 3,
        seed: Some(2024),
    };
    let stats = shuffle(&mut db, &options, |_| {}).unwrap();
    assert_eq!(stats.iterations, 3 * rows / 8);

    // Same rows, each still whole across every column, in a new order
    assert_eq!(row_keys(&db), before_keys);
    let after_spectrum = db
        .read_rows::<f32>(TableName::FeaturesSpectrum, 0, rows)
        .unwrap();
    assert_ne!(after_spectrum, before_spectrum);

    // Events are untouched
    assert_eq!(db.event_count(), 6);
    assert_eq!(
        db.read_rows::<i64>(TableName::EventsNote, 0, 6).unwrap(),
        vec![57, 60, 64, 60, 64, 67]
    );
}

#[test]
fn test_bad_annotation_names_file_and_line() {
    let dir = tempfile::tempdir().unwrap();
    let config = config();
    write_corpus(dir.path(), &config);
    fs::write(
        dir.path().join("takes/a_minor.csv"),
        "57,1024,12000\n60,abc,12000\n",
    )
    .unwrap();

    let inputs = discover_labeled(&dir.path().join("takes")).unwrap();
    let options = CompileOptions {
        decay_table: Some(dir.path().join("decay.json")),
        jobs: 1,
        ..CompileOptions::new(dir.path().join("dataset"))
    };
    let err = FeatureCompiler::new(config, options)
        .unwrap()
        .compile(&inputs)
        .unwrap_err();
    match err {
        CompileError::MalformedEvents { path, line, .. } => {
            assert!(path.ends_with("a_minor.csv"));
            assert_eq!(line, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}
