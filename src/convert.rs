//! Batch conversion of whole directory trees.
//!
//! Walks a source tree for files with a given extension and converts each
//! one into the mirrored location under the destination tree:
//!
//! ```text
//! from/                          to/
//! ├── white.data         →       ├── white.png
//! └── Gameplay/                  └── Gameplay/
//!     └── tilesets/                  └── tilesets/
//!         └── dirt.DATA  →               └── dirt.png
//! ```
//!
//! ## Scheduling
//!
//! Every task is built before any worker starts. A dedicated rayon pool of
//! exactly `workers` threads drains one shared task list; whichever worker is
//! free claims the next task, so completion order is unspecified. The call
//! returns only after every task has finished.
//!
//! ## Failures
//!
//! A failing file never stops its siblings. Task errors are collected in the
//! order they were observed; the batch fails with [`BatchError::Tasks`],
//! whose message is the first failure and which still carries all of them.
//!
//! ## Progress
//!
//! Progress is reported as [`ConvertEvent`]s over an optional channel. The
//! receiving end is the single place that prints, so lines from different
//! workers never interleave.

use crate::codec::{self, CodecError, ConvertOutcome, DecodeStatus};
use crate::config::{ConverterConfig, effective_workers};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("error scanning directory: {0}")]
    Scan(#[from] walkdir::Error),
    #[error("failed to create output directory '{}': {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("{}", primary_message(.0))]
    Tasks(Vec<TaskError>),
}

fn primary_message(failures: &[TaskError]) -> String {
    match failures {
        [] => "no task failures".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

impl BatchError {
    /// Every task failure, in the order workers reported them.
    pub fn failures(&self) -> &[TaskError] {
        match self {
            BatchError::Tasks(failures) => failures,
            _ => &[],
        }
    }

    /// The first task failure observed, if the batch failed on tasks.
    pub fn primary(&self) -> Option<&TaskError> {
        self.failures().first()
    }
}

/// A single file that could not be converted.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("failed to create output directory '{}': {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to open input file '{}': {source}", .path.display())]
    OpenInput {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to create output file '{}': {source}", .path.display())]
    CreateOutput {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to convert file '{}': {source}", .rel_path.display())]
    Convert {
        rel_path: PathBuf,
        source: CodecError,
    },
    #[error("failed to write output file '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One file to convert. Built up front, consumed by exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionTask {
    /// 1-based position in the batch, for progress display.
    pub index: usize,
    pub total: usize,
    /// Path relative to the source root.
    pub rel_path: PathBuf,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

/// Progress reported while a batch runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertEvent {
    BatchStarted {
        label: String,
        from: PathBuf,
        to: PathBuf,
        file_count: usize,
    },
    FileStarted {
        index: usize,
        total: usize,
        rel_path: PathBuf,
    },
    FileConverted {
        index: usize,
        total: usize,
        rel_path: PathBuf,
        outcome: ConvertOutcome,
    },
    FileFailed {
        index: usize,
        total: usize,
        rel_path: PathBuf,
        message: String,
    },
}

/// Summary of a successful batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub converted: usize,
    /// Relative paths of inputs whose body ended early.
    pub truncated: Vec<PathBuf>,
}

/// Converts directory trees between DATA and PNG on a fixed worker pool.
pub struct BatchConverter {
    workers: usize,
    data_ext: String,
    png_ext: String,
    events: Option<Sender<ConvertEvent>>,
}

impl BatchConverter {
    /// A converter with `workers` threads (at least one) and the stock extensions.
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            data_ext: ".data".to_string(),
            png_ext: ".png".to_string(),
            events: None,
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(effective_workers(&config.processing))
            .with_extensions(&config.extensions.data, &config.extensions.png)
    }

    pub fn with_extensions(mut self, data_ext: &str, png_ext: &str) -> Self {
        self.data_ext = data_ext.to_string();
        self.png_ext = png_ext.to_string();
        self
    }

    /// Report progress over `events`.
    pub fn with_events(mut self, events: Sender<ConvertEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Convert every DATA file under `from` into a PNG under `to`.
    pub fn data_to_png(&self, from: &Path, to: &Path) -> Result<BatchReport, BatchError> {
        self.run(
            "DATA -> PNG",
            from,
            to,
            &self.data_ext,
            &self.png_ext,
            codec::data_to_png,
        )
    }

    /// Convert every PNG file under `from` into a DATA file under `to`.
    pub fn png_to_data(&self, from: &Path, to: &Path) -> Result<BatchReport, BatchError> {
        self.run(
            "PNG -> DATA",
            from,
            to,
            &self.png_ext,
            &self.data_ext,
            codec::png_to_data,
        )
    }

    /// Convert every file under `from` whose name ends in `from_ext`.
    ///
    /// Outputs land at the same relative path under `to`, with `to_ext` in
    /// place of `from_ext`. Existing outputs are overwritten.
    pub fn convert<F>(
        &self,
        from: &Path,
        to: &Path,
        from_ext: &str,
        to_ext: &str,
        convert_fn: F,
    ) -> Result<BatchReport, BatchError>
    where
        F: Fn(&mut dyn Read, &mut dyn Write) -> Result<ConvertOutcome, CodecError> + Sync,
    {
        let label = format!("{from_ext} -> {to_ext}");
        self.run(&label, from, to, from_ext, to_ext, convert_fn)
    }

    fn run<F>(
        &self,
        label: &str,
        from: &Path,
        to: &Path,
        from_ext: &str,
        to_ext: &str,
        convert_fn: F,
    ) -> Result<BatchReport, BatchError>
    where
        F: Fn(&mut dyn Read, &mut dyn Write) -> Result<ConvertOutcome, CodecError> + Sync,
    {
        log::info!("Converting {label}");
        log::debug!("From directory: {}", from.display());
        log::debug!("To directory: {}", to.display());

        let tasks = plan_tasks(from, to, from_ext, to_ext)?;
        log::info!("{} files to convert", tasks.len());
        self.emit(ConvertEvent::BatchStarted {
            label: label.to_string(),
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            file_count: tasks.len(),
        });
        if tasks.is_empty() {
            return Ok(BatchReport::default());
        }

        fs::create_dir_all(to).map_err(|source| BatchError::CreateDir {
            path: to.to_path_buf(),
            source,
        })?;

        let total = tasks.len();
        let state = BatchState {
            queue: Mutex::new(tasks.into_iter()),
            failures: Mutex::new(Vec::new()),
            truncated: Mutex::new(Vec::new()),
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("convert-{i}"))
            .build()?;
        // The scope returns once every worker has drained the queue.
        pool.scope(|scope| {
            for _ in 0..self.workers {
                scope.spawn(|_| self.drain(&state, &convert_fn));
            }
        });

        let failures = state
            .failures
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        if !failures.is_empty() {
            log::debug!("{} of {total} files failed", failures.len());
            return Err(BatchError::Tasks(failures));
        }

        let mut truncated = state
            .truncated
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        truncated.sort();
        Ok(BatchReport {
            converted: total,
            truncated,
        })
    }

    /// Worker loop: claim tasks until the queue is empty.
    fn drain<F>(&self, state: &BatchState, convert_fn: &F)
    where
        F: Fn(&mut dyn Read, &mut dyn Write) -> Result<ConvertOutcome, CodecError> + Sync,
    {
        while let Some(task) = state.claim() {
            log::debug!(
                "[{}/{}] converting {}",
                task.index,
                task.total,
                task.rel_path.display()
            );
            self.emit(ConvertEvent::FileStarted {
                index: task.index,
                total: task.total,
                rel_path: task.rel_path.clone(),
            });

            match run_task(&task, convert_fn) {
                Ok(outcome) => {
                    if let DecodeStatus::Truncated { .. } = outcome.status {
                        lock(&state.truncated).push(task.rel_path.clone());
                    }
                    self.emit(ConvertEvent::FileConverted {
                        index: task.index,
                        total: task.total,
                        rel_path: task.rel_path,
                        outcome,
                    });
                }
                Err(err) => {
                    log::debug!("{err}");
                    self.emit(ConvertEvent::FileFailed {
                        index: task.index,
                        total: task.total,
                        rel_path: task.rel_path,
                        message: err.to_string(),
                    });
                    lock(&state.failures).push(err);
                }
            }
        }
    }

    fn emit(&self, event: ConvertEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is listening.
            tx.send(event).ok();
        }
    }
}

/// Shared between the workers of one batch.
struct BatchState {
    queue: Mutex<std::vec::IntoIter<ConversionTask>>,
    failures: Mutex<Vec<TaskError>>,
    truncated: Mutex<Vec<PathBuf>>,
}

impl BatchState {
    fn claim(&self) -> Option<ConversionTask> {
        lock(&self.queue).next()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Find every matching file under `from` and build its task.
///
/// Tasks are numbered `1..=N` in file-name order.
pub fn plan_tasks(
    from: &Path,
    to: &Path,
    from_ext: &str,
    to_ext: &str,
) -> Result<Vec<ConversionTask>, BatchError> {
    let mut rel_paths = Vec::new();
    for entry in WalkDir::new(from).follow_links(true).sort_by_file_name() {
        let path = match entry {
            Ok(entry) if entry.file_type().is_file() => entry.into_path(),
            Ok(_) => continue,
            // Below the root, a broken link or unreadable directory only
            // affects itself. Matching names still become tasks and fail alone.
            Err(err) if err.depth() > 0 => {
                let Some(path) = err.path().filter(|p| has_extension(p, from_ext)) else {
                    log::warn!("Skipping unreadable entry: {err}");
                    continue;
                };
                path.to_path_buf()
            }
            Err(err) => return Err(err.into()),
        };
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            log::debug!("Skipping non-UTF-8 file name: {}", path.display());
            continue;
        };
        if strip_extension(name, from_ext).is_none() {
            continue;
        }
        if let Ok(rel) = path.strip_prefix(from) {
            rel_paths.push(rel.to_path_buf());
        }
    }

    let total = rel_paths.len();
    Ok(rel_paths
        .into_iter()
        .enumerate()
        .map(|(i, rel_path)| ConversionTask {
            index: i + 1,
            total,
            input_path: from.join(&rel_path),
            output_path: to.join(rename_extension(&rel_path, from_ext, to_ext)),
            rel_path,
        })
        .collect())
}

/// `name` without a trailing `ext`, compared ASCII case-insensitively.
fn strip_extension<'a>(name: &'a str, ext: &str) -> Option<&'a str> {
    let split = name.len().checked_sub(ext.len())?;
    let (stem, tail) = (name.get(..split)?, name.get(split..)?);
    tail.eq_ignore_ascii_case(ext).then_some(stem)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| strip_extension(name, ext).is_some())
}

fn rename_extension(rel_path: &Path, from_ext: &str, to_ext: &str) -> PathBuf {
    let name = rel_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let stem = strip_extension(name, from_ext).unwrap_or(name);
    rel_path.with_file_name(format!("{stem}{to_ext}"))
}

/// Convert one file. Read, convert and write happen strictly in sequence.
fn run_task<F>(task: &ConversionTask, convert_fn: &F) -> Result<ConvertOutcome, TaskError>
where
    F: Fn(&mut dyn Read, &mut dyn Write) -> Result<ConvertOutcome, CodecError>,
{
    if let Some(dir) = task.output_path.parent() {
        fs::create_dir_all(dir).map_err(|source| TaskError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let input = File::open(&task.input_path).map_err(|source| TaskError::OpenInput {
        path: task.input_path.clone(),
        source,
    })?;
    let output = File::create(&task.output_path).map_err(|source| TaskError::CreateOutput {
        path: task.output_path.clone(),
        source,
    })?;

    let mut reader = BufReader::new(input);
    let mut writer = BufWriter::new(output);
    let result = convert_fn(&mut reader, &mut writer)
        .map_err(|source| TaskError::Convert {
            rel_path: task.rel_path.clone(),
            source,
        })
        .and_then(|outcome| {
            writer.flush().map_err(|source| TaskError::Write {
                path: task.output_path.clone(),
                source,
            })?;
            Ok(outcome)
        });

    if result.is_err() {
        // Don't leave a half-written output behind.
        drop(writer);
        fs::remove_file(&task.output_path).ok();
    }
    result
}
