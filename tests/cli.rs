use std::fs;
use std::path::Path;
use std::process::Command;

use polyphony_features::testing::scores::write_decay_table;
use polyphony_features::testing::signals::{sine, write_wav};
use polyphony_features::{Configuration, FeatureDatabase};
use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_feature_cli"))
}

fn write_inputs(root: &Path, config: &Configuration) {
    fs::create_dir_all(root.join("takes")).unwrap();
    let samples = sine(8192, config.sampling_frequency, 440.0, 0.4);
    write_wav(
        &root.join("takes/a4.wav"),
        &samples,
        config.sampling_frequency as u32,
    )
    .unwrap();
    fs::write(root.join("takes/a4.csv"), "69,0,8000\n").unwrap();
    write_decay_table(&root.join("decay.json"), config.representable_note_range).unwrap();
    fs::write(root.join("config.json"), config.to_json_pretty()).unwrap();
}

#[test]
fn config_prints_defaults() {
    let output = cli().arg("config").output().expect("failed to run feature_cli config");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let config: Configuration = serde_json::from_str(stdout.trim()).expect("configuration JSON");
    assert_eq!(config, Configuration::default());

    let output = cli()
        .args(["config", "--tracker"])
        .output()
        .expect("failed to run feature_cli config --tracker");
    let json: Value = serde_json::from_slice(&output.stdout).expect("tracker JSON");
    assert_eq!(json["lookahead"], 3);
}

#[test]
fn compile_then_shuffle_and_info() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let config = Configuration {
        window_size: 1024,
        step_size: 256,
        ..Configuration::default()
    };
    write_inputs(root, &config);
    let dataset = root.join("dataset");

    let output = cli()
        .arg("compile")
        .arg("--input")
        .arg(root.join("takes"))
        .arg("--output")
        .arg(&dataset)
        .arg("--decay-table")
        .arg(root.join("decay.json"))
        .arg("--config")
        .arg(root.join("config.json"))
        .args(["--jobs", "1", "--chunk-rows", "4"])
        .output()
        .expect("failed to run feature_cli compile");
    assert!(
        output.status.success(),
        "compile failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: Value = serde_json::from_slice(&output.stdout).expect("compile report JSON");
    // (8192 - 1024) / 256 windows after the first hop
    assert_eq!(report["windows"], 28);
    assert_eq!(report["events"], 1);

    let output = cli()
        .arg("shuffle")
        .arg("--dataset")
        .arg(&dataset)
        .args(["--chunk-rows", "4", "--seed", "3"])
        .output()
        .expect("failed to run feature_cli shuffle");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Shuffled 28 rows"));

    let output = cli()
        .arg("info")
        .arg("--dataset")
        .arg(&dataset)
        .output()
        .expect("failed to run feature_cli info");
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("/labels/notes"));
    assert_eq!(stdout.lines().count(), 12);

    assert_eq!(FeatureDatabase::open(&dataset).unwrap().window_count(), 28);
}

#[test]
fn track_reports_cursor_moves() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let range = Configuration::default().representable_note_range;

    fs::write(root.join("reference.csv"), "60,0,100\n62,44100,100\n64,88200,100\n").unwrap();

    let step = |onset: f32, note: i32| {
        let mut notes = vec![0.0f32; range.count()];
        notes[(note - range.start) as usize] = 1.0;
        serde_json::json!({ "onset": onset, "notes": notes }).to_string()
    };
    let lines = [
        step(0.9, 60),
        step(0.0, 60),
        step(0.9, 64),
        step(0.0, 64),
    ];
    fs::write(root.join("predictions.jsonl"), lines.join("\n")).unwrap();

    let output = cli()
        .arg("track")
        .arg("--reference")
        .arg(root.join("reference.csv"))
        .arg("--predictions")
        .arg(root.join("predictions.jsonl"))
        .output()
        .expect("failed to run feature_cli track");
    assert!(
        output.status.success(),
        "track failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout).unwrap();
    let moves: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(moves.len(), 1);
    assert_eq!(moves[0]["index"], 2);
    assert_eq!(moves[0]["beat"], 2.0);
}

#[test]
fn missing_dataset_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = cli()
        .arg("info")
        .arg("--dataset")
        .arg(dir.path().join("absent"))
        .output()
        .expect("failed to run feature_cli info");
    assert_eq!(output.status.code(), Some(1));
}
