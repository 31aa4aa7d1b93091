use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use polyphony_features::compiler::{discover_labeled, discover_noise, CompileOptions};
use polyphony_features::events::{load_events, read_midi, EventFormat};
use polyphony_features::storage::{shuffle, ShuffleOptions, DEFAULT_CHUNK_ROWS};
use polyphony_features::tracker::{
    onsets_from_events, onsets_from_midi, prediction_queue, Onset, Prediction, DEFAULT_QUEUE_CAPACITY,
};
use polyphony_features::{
    Configuration, FeatureCompiler, FeatureDatabase, TableName, Tracker, TrackerConfig,
};
use serde::Serialize;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(
    name = "feature_cli",
    about = "Compile polyphonic training features and follow reference onsets"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile annotated audio (and optional noise) into a dataset
    Compile(CompileArgs),
    /// Shuffle the window rows of a dataset in place
    Shuffle(ShuffleArgs),
    /// Follow a reference score with a JSON-lines prediction stream
    Track(TrackArgs),
    /// Print table row counts of a dataset
    Info {
        #[arg(long)]
        dataset: PathBuf,
    },
    /// Print the default configuration
    Config {
        /// Print tracker parameters instead
        #[arg(long)]
        tracker: bool,
    },
}

#[derive(Args, Debug)]
struct CompileArgs {
    /// Directory searched recursively for audio with a sibling .mid/.csv
    #[arg(long, required = true)]
    input: Vec<PathBuf>,
    /// Directory of unlabeled noise audio
    #[arg(long)]
    noise: Vec<PathBuf>,
    /// Dataset directory
    #[arg(long)]
    output: PathBuf,
    /// Decay-curve table JSON
    #[arg(long)]
    decay_table: PathBuf,
    /// Configuration JSON (defaults when omitted)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Worker threads (defaults to available parallelism)
    #[arg(long)]
    jobs: Option<usize>,
    #[arg(long, default_value_t = DEFAULT_CHUNK_ROWS)]
    chunk_rows: usize,
    /// Add to an existing dataset
    #[arg(long)]
    append: bool,
}

#[derive(Args, Debug)]
struct ShuffleArgs {
    #[arg(long)]
    dataset: PathBuf,
    #[arg(long, default_value_t = DEFAULT_CHUNK_ROWS)]
    chunk_rows: usize,
    #[arg(long, default_value_t = 1)]
    passes: usize,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct TrackArgs {
    /// Reference score (.mid or .csv)
    #[arg(long)]
    reference: PathBuf,
    /// JSON lines of {"onset": f32, "notes": [f32]}
    #[arg(long)]
    predictions: PathBuf,
    /// Configuration JSON, for the note range and sampling frequency
    #[arg(long)]
    config: Option<PathBuf>,
    /// Tracker parameters JSON
    #[arg(long)]
    tracker_config: Option<PathBuf>,
    /// Initial cursor position
    #[arg(long, default_value_t = 0)]
    start: usize,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Compile(args) => run_compile(args),
        Commands::Shuffle(args) => run_shuffle(args),
        Commands::Track(args) => run_track(args),
        Commands::Info { dataset } => run_info(&dataset),
        Commands::Config { tracker } => run_config(tracker),
    }
}

fn load_configuration(path: Option<&Path>) -> Result<Configuration> {
    match path {
        Some(path) => Configuration::from_file(path)
            .with_context(|| format!("loading configuration {}", path.display())),
        None => Ok(Configuration::default()),
    }
}

fn run_compile(args: CompileArgs) -> Result<ExitCode> {
    let config = load_configuration(args.config.as_deref())?;

    let mut inputs = Vec::new();
    for dir in &args.input {
        inputs.extend(
            discover_labeled(dir).with_context(|| format!("scanning {}", dir.display()))?,
        );
    }
    for dir in &args.noise {
        inputs.extend(discover_noise(dir).with_context(|| format!("scanning {}", dir.display()))?);
    }
    if inputs.is_empty() {
        bail!("no annotated audio found");
    }

    let mut options = CompileOptions::new(&args.output);
    options.decay_table = Some(args.decay_table.clone());
    options.chunk_rows = args.chunk_rows;
    options.append = args.append;
    if let Some(jobs) = args.jobs {
        options.jobs = jobs;
    }

    let compiler = FeatureCompiler::new(config, options).with_context(|| {
        format!("loading decay table {}", args.decay_table.display())
    })?;
    let summary = compiler
        .compile(&inputs)
        .with_context(|| format!("compiling into {}", args.output.display()))?;

    println!("{}", serde_json::to_string_pretty(&CompileReport::from(summary))?);
    Ok(ExitCode::SUCCESS)
}

fn run_shuffle(args: ShuffleArgs) -> Result<ExitCode> {
    let mut database = FeatureDatabase::open(&args.dataset)
        .with_context(|| format!("opening {}", args.dataset.display()))?;
    let options = ShuffleOptions {
        chunk_rows: args.chunk_rows,
        passes: args.passes,
        seed: args.seed,
    };

    let mut last_percent = 0;
    let stats = shuffle(&mut database, &options, |fraction| {
        let percent = (fraction * 100.0) as u32;
        if percent >= last_percent + 10 {
            last_percent = percent;
            tracing::info!(percent, "shuffling");
        }
    })
    .with_context(|| format!("shuffling {}", args.dataset.display()))?;

    println!(
        "Shuffled {} rows in {} iterations",
        stats.rows, stats.iterations
    );
    Ok(ExitCode::SUCCESS)
}

fn load_onsets(path: &Path, config: &Configuration) -> Result<Vec<Onset>> {
    match EventFormat::from_path(path) {
        Some(EventFormat::Midi) => Ok(onsets_from_midi(&read_midi(path)?)),
        Some(EventFormat::Csv) => {
            let events = load_events(path, config.sampling_frequency)?;
            Ok(onsets_from_events(&events, config.sampling_frequency))
        }
        None => bail!("unrecognized reference format: {}", path.display()),
    }
}

fn run_track(args: TrackArgs) -> Result<ExitCode> {
    let config = load_configuration(args.config.as_deref())?;
    let tracker_config = args
        .tracker_config
        .as_ref()
        .map(TrackerConfig::load_from_file)
        .unwrap_or_default();

    let onsets = load_onsets(&args.reference, &config)
        .with_context(|| format!("reading reference {}", args.reference.display()))?;
    if onsets.is_empty() {
        bail!("reference {} has no notes", args.reference.display());
    }

    let file = fs::File::open(&args.predictions)
        .with_context(|| format!("opening {}", args.predictions.display()))?;
    let note_count = config.note_count();

    let mut tracker = Tracker::new(onsets, config.representable_note_range, tracker_config);
    let beats: Vec<f64> = tracker.onsets().iter().map(|onset| onset.start).collect();
    tracker.set_cursor_moved_callback(move |index| {
        println!(
            "{}",
            serde_json::json!({ "index": index, "beat": beats.get(index) })
        );
    });
    tracker.start(args.start);

    let (mut sender, mut receiver) = prediction_queue(DEFAULT_QUEUE_CAPACITY);
    let reader = thread::spawn(move || -> Result<usize> {
        let mut sent = 0;
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let prediction: Prediction = serde_json::from_str(&line)
                .with_context(|| format!("prediction line {}", number + 1))?;
            if prediction.notes.len() != note_count {
                bail!(
                    "prediction line {} has {} notes, expected {}",
                    number + 1,
                    prediction.notes.len(),
                    note_count
                );
            }
            if !sender.push(prediction) {
                break;
            }
            sent += 1;
        }
        Ok(sent)
    });

    let consumed = receiver.run(&mut tracker);
    let sent = reader
        .join()
        .map_err(|_| anyhow::anyhow!("prediction reader panicked"))??;

    tracing::info!(sent, consumed, index = tracker.index(), "tracking finished");
    Ok(ExitCode::SUCCESS)
}

fn run_info(dataset: &Path) -> Result<ExitCode> {
    let database = FeatureDatabase::open(dataset)
        .with_context(|| format!("opening {}", dataset.display()))?;
    for name in TableName::ALL {
        let table = database.table(name);
        println!(
            "{:<28} {:>4} x {:<4} {:>10} rows",
            name.path(),
            table.element_type().name(),
            table.row_len(),
            table.row_count()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn run_config(tracker: bool) -> Result<ExitCode> {
    if tracker {
        println!("{}", serde_json::to_string_pretty(&TrackerConfig::default())?);
    } else {
        println!("{}", Configuration::default().to_json_pretty());
    }
    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompileReport {
    files: usize,
    skipped: usize,
    windows: usize,
    events: usize,
}

impl From<polyphony_features::CompileSummary> for CompileReport {
    fn from(summary: polyphony_features::CompileSummary) -> Self {
        Self {
            files: summary.files,
            skipped: summary.skipped,
            windows: summary.windows,
            events: summary.events,
        }
    }
}
