// Compiler module - turn annotated audio into a feature dataset
//
// Threading:
//   workers (jobs)  --(bounded mpsc, blocking_send)-->  writer (caller thread)
//
// Each worker claims the next input index, builds a fresh sequence builder
// for the file and sends every window of the file in one message. The
// writer owns the FeatureDatabase and stores results in input order, so the
// dataset does not depend on scheduling. A worker starts on input `i` only
// while `i < written + channel_capacity`, which bounds the finished files
// held for reordering.

pub mod discovery;

pub use discovery::{annotation_for, discover_labeled, discover_noise, CompileInput};

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use tokio::sync::mpsc;

use crate::audio::WavSource;
use crate::config::Configuration;
use crate::error::{log_compile_error, CompileError, StorageError};
use crate::events::{load_events, Event};
use crate::labels::DecayModel;
use crate::sequence::{NoiseSequenceBuilder, PolySequenceBuilder, SequenceBuilder, Window};
use crate::storage::{DatasetShape, FeatureDatabase, DEFAULT_CHUNK_ROWS};

pub const FILE_LIST: &str = "file_list.txt";
pub const CONFIGURATION_FILE: &str = "configuration.json";

/// Options for one compile run
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    /// Dataset directory
    pub output: PathBuf,
    /// Decay-curve table, required for annotated inputs
    pub decay_table: Option<PathBuf>,
    /// Worker threads
    pub jobs: usize,
    pub chunk_rows: usize,
    /// Finished files that may wait for the writer
    pub channel_capacity: usize,
    /// Add to an existing dataset instead of replacing it
    pub append: bool,
}

impl CompileOptions {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            decay_table: None,
            jobs: thread::available_parallelism().map_or(1, |n| n.get()),
            chunk_rows: DEFAULT_CHUNK_ROWS,
            channel_capacity: 4,
            append: false,
        }
    }
}

/// Totals of one compile run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompileSummary {
    pub files: usize,
    /// Files too short to produce a window
    pub skipped: usize,
    pub windows: usize,
    pub events: usize,
}

/// Every window and event of one file
#[derive(Debug)]
struct FileResult {
    audio: PathBuf,
    events: Vec<Event>,
    windows: Vec<Window>,
}

type Message = (usize, Result<FileResult, CompileError>);

/// Writer totals plus the deepest the reorder buffer got
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PipelineRun {
    summary: CompileSummary,
    peak_waiting: usize,
}

/// Compiles inputs into a dataset
pub struct FeatureCompiler {
    config: Configuration,
    options: CompileOptions,
    model: Option<Arc<DecayModel>>,
}

impl FeatureCompiler {
    /// Create a compiler, loading the decay table if one is given
    ///
    /// # Errors
    /// * `InvalidConfiguration` - inconsistent configuration or options
    /// * `DecayModelUnavailable` - unreadable decay table
    pub fn new(config: Configuration, options: CompileOptions) -> Result<Self, CompileError> {
        config.validate()?;
        if options.jobs == 0 || options.chunk_rows == 0 || options.channel_capacity == 0 {
            return Err(CompileError::InvalidConfiguration {
                reason: "jobs, chunk rows and channel capacity must be greater than 0"
                    .to_string(),
            });
        }

        let model = match &options.decay_table {
            Some(path) => Some(Arc::new(DecayModel::from_file(path)?)),
            None => None,
        };

        Ok(Self {
            config,
            options,
            model,
        })
    }

    /// Use an already loaded decay model
    pub fn with_model(mut self, model: Arc<DecayModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    fn shape(&self) -> DatasetShape {
        DatasetShape {
            note_count: self.config.note_count(),
            band_count: self.config.band_count(),
            chunk_rows: self.options.chunk_rows,
        }
    }

    fn open_database(&self) -> Result<FeatureDatabase, CompileError> {
        let root = &self.options.output;
        if !self.options.append || !root.join(crate::storage::MANIFEST_FILE).exists() {
            return Ok(FeatureDatabase::create(root, self.shape())?);
        }

        let database = FeatureDatabase::open(root)?;
        let (found, expected) = (database.shape(), self.shape());
        if found.note_count != expected.note_count || found.band_count != expected.band_count {
            return Err(StorageError::DatasetNotCompatible {
                name: root.display().to_string(),
                reason: format!(
                    "dataset has {} notes and {} bands, configuration has {} and {}",
                    found.note_count, found.band_count, expected.note_count, expected.band_count
                ),
            }
            .into());
        }
        Ok(database)
    }

    fn open_file_list(&self) -> Result<BufWriter<File>, CompileError> {
        let path = self.options.output.join(FILE_LIST);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(self.options.append)
            .truncate(!self.options.append)
            .open(&path)
            .map_err(|err| StorageError::io(&path, err))?;
        Ok(BufWriter::new(file))
    }

    /// Compile every input into the output dataset
    ///
    /// # Returns
    /// Totals for the run; the first fatal error from any file aborts it
    pub fn compile(&self, inputs: &[CompileInput]) -> Result<CompileSummary, CompileError> {
        let mut database = self.open_database()?;
        let mut file_list = self.open_file_list()?;

        let config_path = self.options.output.join(CONFIGURATION_FILE);
        fs::write(&config_path, self.config.to_json_pretty())
            .map_err(|err| StorageError::io(&config_path, err))?;

        let run = self.run_pipeline(inputs, &mut database, &mut file_list, |input| {
            self.compile_file(input)
        })?;
        let summary = run.summary;
        log::debug!(
            "[Compiler] At most {} finished files waited for the writer",
            run.peak_waiting
        );

        database.flush()?;
        file_list
            .flush()
            .map_err(|err| StorageError::io(&self.options.output.join(FILE_LIST), err))?;

        log::info!(
            "[Compiler] Compiled {} files ({} skipped): {} windows, {} events",
            summary.files,
            summary.skipped,
            summary.windows,
            summary.events
        );
        Ok(summary)
    }

    /// Run the workers and the writer over `inputs`
    ///
    /// `compile_one` turns one input into its windows and events. It runs on
    /// the worker threads; the calling thread writes.
    fn run_pipeline<F>(
        &self,
        inputs: &[CompileInput],
        database: &mut FeatureDatabase,
        file_list: &mut BufWriter<File>,
        compile_one: F,
    ) -> Result<PipelineRun, CompileError>
    where
        F: Fn(&CompileInput) -> Result<FileResult, CompileError> + Sync,
    {
        let jobs = self.options.jobs.min(inputs.len()).max(1);
        log::info!(
            "[Compiler] Compiling {} files into {:?} with {} workers",
            inputs.len(),
            self.options.output,
            jobs
        );

        let next_input = AtomicUsize::new(0);
        let gate = ClaimGate::new(self.options.channel_capacity);
        thread::scope(|scope| {
            let (tx, mut rx) = mpsc::channel::<Message>(self.options.channel_capacity);
            let next_input = &next_input;
            let gate = &gate;
            let compile_one = &compile_one;

            let handles: Vec<_> = (0..jobs)
                .map(|worker| {
                    let tx = tx.clone();
                    scope.spawn(move || {
                        run_worker(worker, inputs, next_input, gate, compile_one, tx)
                    })
                })
                .collect();
            drop(tx);

            let written = self.write_results(&mut rx, inputs, gate, database, file_list);
            // Unblocks workers still waiting to claim or send after a failure
            gate.close();
            drop(rx);

            let panicked = handles
                .into_iter()
                .map(|handle| handle.join())
                .filter(|joined| joined.is_err())
                .count();
            match written {
                Ok(_) if panicked > 0 => Err(CompileError::WorkerFailed {
                    reason: format!("{} worker thread(s) panicked", panicked),
                }),
                other => other,
            }
        })
    }

    fn compile_file(&self, input: &CompileInput) -> Result<FileResult, CompileError> {
        let mut source = WavSource::open(&input.audio)?;

        let mut builder: Box<dyn SequenceBuilder> = match &input.annotation {
            Some(annotation) => {
                let model = self.model.as_ref().ok_or_else(|| {
                    CompileError::DecayModelUnavailable {
                        path: input.audio.clone(),
                        reason: "annotated input needs a decay table".to_string(),
                    }
                })?;
                let events = load_events(annotation, self.config.sampling_frequency)?;
                Box::new(PolySequenceBuilder::new(
                    &mut source,
                    &input.audio,
                    events,
                    Arc::clone(model),
                    &self.config,
                )?)
            }
            None => Box::new(NoiseSequenceBuilder::new(
                &mut source,
                &input.audio,
                &self.config,
            )?),
        };

        let mut windows = Vec::new();
        builder.for_each_window(&mut |window| {
            windows.push(window);
            Ok(())
        })?;

        let events = builder.events().to_vec();
        tracing::debug!(windows = windows.len(), events = events.len(), "file compiled");

        Ok(FileResult {
            audio: input.audio.clone(),
            events,
            windows,
        })
    }

    fn write_results(
        &self,
        rx: &mut mpsc::Receiver<Message>,
        inputs: &[CompileInput],
        gate: &ClaimGate,
        database: &mut FeatureDatabase,
        file_list: &mut BufWriter<File>,
    ) -> Result<PipelineRun, CompileError> {
        let mut summary = CompileSummary::default();
        let mut waiting: BTreeMap<usize, FileResult> = BTreeMap::new();
        let mut peak_waiting = 0;
        let mut next_index = 0;

        while let Some((index, result)) = rx.blocking_recv() {
            waiting.insert(index, result?);
            peak_waiting = peak_waiting.max(waiting.len());

            while let Some(file) = waiting.remove(&next_index) {
                if let Err(err) = self.write_file(&file, database, file_list, &mut summary) {
                    log_compile_error(&err, "write_file");
                    return Err(err);
                }
                next_index += 1;
                gate.advance(next_index);
            }
        }

        if next_index != inputs.len() {
            return Err(CompileError::WorkerFailed {
                reason: format!(
                    "{} of {} files were not compiled",
                    inputs.len() - next_index,
                    inputs.len()
                ),
            });
        }
        Ok(PipelineRun {
            summary,
            peak_waiting,
        })
    }

    fn write_file(
        &self,
        file: &FileResult,
        database: &mut FeatureDatabase,
        file_list: &mut BufWriter<File>,
        summary: &mut CompileSummary,
    ) -> Result<(), CompileError> {
        let first_row = database.window_count();
        for window in &file.windows {
            database.append_window(window)?;
        }
        database.append_events(&file.events)?;

        writeln!(
            file_list,
            "{}\t{}\t{}",
            file.audio.display(),
            first_row,
            file.windows.len()
        )
        .map_err(|err| StorageError::io(&self.options.output.join(FILE_LIST), err))?;

        summary.files += 1;
        summary.windows += file.windows.len();
        summary.events += file.events.len();
        if file.windows.is_empty() {
            summary.skipped += 1;
        }
        log::debug!(
            "[Compiler] Wrote {:?}: rows {}..{}",
            file.audio,
            first_row,
            first_row + file.windows.len()
        );
        Ok(())
    }
}

fn run_worker<F>(
    worker: usize,
    inputs: &[CompileInput],
    next_input: &AtomicUsize,
    gate: &ClaimGate,
    compile_one: &F,
    tx: mpsc::Sender<Message>,
) where
    F: Fn(&CompileInput) -> Result<FileResult, CompileError>,
{
    let _release = ReleaseOnPanic(gate);
    loop {
        let index = next_input.fetch_add(1, Ordering::Relaxed);
        let Some(input) = inputs.get(index) else {
            break;
        };
        if !gate.admit(index) {
            break;
        }

        let span = tracing::info_span!("compile_file", worker, index, audio = %input.audio.display());
        let _entered = span.enter();

        let result = compile_one(input);
        let failed = match &result {
            Ok(_) => false,
            Err(err) => {
                log_compile_error(err, "compile_file");
                true
            }
        };
        if tx.blocking_send((index, result)).is_err() || failed {
            break;
        }
    }
}

/// Keeps workers within `capacity` files of the writer
///
/// A worker holding input `index` starts on it only once fewer than
/// `capacity` files separate it from the next file the writer needs, so the
/// reorder buffer never holds more than `capacity` finished files.
struct ClaimGate {
    capacity: usize,
    state: Mutex<GateState>,
    advanced: Condvar,
}

#[derive(Debug, Default)]
struct GateState {
    written: usize,
    closed: bool,
}

impl ClaimGate {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(GateState::default()),
            advanced: Condvar::new(),
        }
    }

    /// Block until `index` may be compiled
    ///
    /// # Returns
    /// false once the writer has stopped
    fn admit(&self, index: usize) -> bool {
        let Ok(state) = self.state.lock() else {
            return false;
        };
        let capacity = self.capacity;
        match self.advanced.wait_while(state, |state| {
            !state.closed && index >= state.written + capacity
        }) {
            Ok(state) => !state.closed,
            Err(_) => false,
        }
    }

    /// Record that every file before `written` is stored
    fn advance(&self, written: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.written = written;
        }
        self.advanced.notify_all();
    }

    fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.closed = true;
        }
        self.advanced.notify_all();
    }
}

/// Closes the gate if a worker unwinds, so no other worker waits for a file
/// that will never be written
struct ReleaseOnPanic<'a>(&'a ClaimGate);

impl Drop for ReleaseOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.close();
        }
    }
}

/// Parse one `file_list.txt` line into (audio path, first row, row count)
pub fn parse_file_list_line(line: &str) -> Option<(PathBuf, usize, usize)> {
    let mut fields = line.rsplitn(3, '\t');
    let count = fields.next()?.parse().ok()?;
    let first = fields.next()?.parse().ok()?;
    let path = Path::new(fields.next()?).to_path_buf();
    Some((path, first, count))
}
