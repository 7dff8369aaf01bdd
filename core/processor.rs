use crate::stripper::{self, ParseFailurePolicy, PipelineConfig, StripError};
use std::fs;
use std::io::{ErrorKind, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

pub const OUTPUT_SUFFIX: &str = "_no_comments";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStage {
    Pending,
    Reading,
    Transforming,
    Writing,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    #[default]
    Overwrite,
    /// Leave the existing file alone and fail this input instead.
    KeepExisting,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorOptions {
    pub pipeline: PipelineConfig,
    pub on_parse_failure: ParseFailurePolicy,
    pub overwrite: OverwritePolicy,
}

#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    #[error("file does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("not a Python source file: {}", .0.display())]
    WrongKind(PathBuf),

    #[error("{stage:?} failed for {}: {source}", path.display())]
    Io {
        stage: FileStage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("output already exists and overwriting is disabled: {}", .0.display())]
    OutputExists(PathBuf),

    #[error("could not transform {}: {source}", path.display())]
    Strip {
        path: PathBuf,
        #[source]
        source: StripError,
    },

    #[error("unexpected failure while processing {}: {message}", path.display())]
    Unexpected { path: PathBuf, message: String },
}

impl ProcessError {
    pub fn is_failure(&self) -> bool {
        !matches!(self, ProcessError::WrongKind(_))
    }

    pub fn stage(&self) -> FileStage {
        match self {
            ProcessError::NotFound(_) | ProcessError::WrongKind(_) => FileStage::Pending,
            ProcessError::Io { stage, .. } => *stage,
            ProcessError::Strip { .. } | ProcessError::Unexpected { .. } => {
                FileStage::Transforming
            }
            ProcessError::OutputExists(_) => FileStage::Writing,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub input_size: u64,
    pub output_size: u64,
    pub protected_docstrings: usize,
    pub docstrings_protected: bool,
    pub unterminated_blocks: Vec<usize>,
}

impl FileReport {
    pub fn size_reduction_percent(&self) -> f64 {
        if self.input_size == 0 {
            return 0.0;
        }
        (self.input_size as f64 - self.output_size as f64) / self.input_size as f64 * 100.0
    }
}

#[derive(Debug)]
pub enum FileOutcome {
    Done(FileReport),
    Skipped(ProcessError),
    Failed(ProcessError),
}

#[derive(Debug)]
pub struct ProcessedFileResult {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

#[derive(Debug)]
pub struct BatchSummary {
    pub results: Vec<ProcessedFileResult>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub stopped: bool,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn unprocessed(&self) -> usize {
        self.total - self.results.len()
    }
}

pub fn is_supported_source(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("py"))
}

/// `dir/name.py` -> `dir/name_no_comments.py`.
pub fn output_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{}{}.{}", stem, OUTPUT_SUFFIX, ext.to_string_lossy()),
        None => format!("{}{}", stem, OUTPUT_SUFFIX),
    };
    path.with_file_name(file_name)
}

fn enter(path: &Path, stage: FileStage) -> FileStage {
    trace!("{} -> {:?}", path.display(), stage);
    stage
}

fn io_failure(stage: FileStage, path: &Path) -> impl Fn(std::io::Error) -> ProcessError {
    let path = path.to_path_buf();
    move |source| ProcessError::Io {
        stage,
        path: path.clone(),
        source,
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

fn isolate_panics<T>(path: &Path, work: impl FnOnce() -> T) -> Result<T, ProcessError> {
    panic::catch_unwind(AssertUnwindSafe(work)).map_err(|payload| ProcessError::Unexpected {
        path: path.to_path_buf(),
        message: panic_message(payload),
    })
}

fn write_output(
    output: &Path,
    contents: &str,
    overwrite: OverwritePolicy,
) -> Result<(), ProcessError> {
    let stage = FileStage::Writing;
    if overwrite == OverwritePolicy::KeepExisting && output.exists() {
        return Err(ProcessError::OutputExists(output.to_path_buf()));
    }

    let parent_dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::Builder::new()
        .prefix(".pystrip_")
        .suffix(".tmp")
        .tempfile_in(parent_dir)
        .map_err(io_failure(stage, output))?;
    temp_file
        .write_all(contents.as_bytes())
        .map_err(io_failure(stage, output))?;

    let persisted = match overwrite {
        OverwritePolicy::Overwrite => temp_file.persist(output),
        OverwritePolicy::KeepExisting => temp_file.persist_noclobber(output),
    };
    persisted.map(|_| ()).map_err(|persist_error| {
        if persist_error.error.kind() == ErrorKind::AlreadyExists {
            ProcessError::OutputExists(output.to_path_buf())
        } else {
            io_failure(stage, output)(persist_error.error)
        }
    })
}

pub fn process_file(path: &Path, options: &ProcessorOptions) -> Result<FileReport, ProcessError> {
    enter(path, FileStage::Pending);
    if !path.exists() {
        return Err(ProcessError::NotFound(path.to_path_buf()));
    }
    if !is_supported_source(path) {
        return Err(ProcessError::WrongKind(path.to_path_buf()));
    }

    let stage = enter(path, FileStage::Reading);
    let original = fs::read_to_string(path).map_err(io_failure(stage, path))?;
    let input_size = original.len() as u64;
    info!("input size: {:.2} KB", input_size as f64 / 1024.0);

    enter(path, FileStage::Transforming);
    let transformed = isolate_panics(path, || {
        stripper::strip_source(&original, &options.pipeline, options.on_parse_failure)
    })?;
    let stripped = transformed.map_err(|source| ProcessError::Strip {
        path: path.to_path_buf(),
        source,
    })?;

    let multi_line = options.pipeline.strip_multi_line_comments;
    if let Some(err) = stripped.parse_failure.as_ref().filter(|_| multi_line) {
        warn!("{}: {}; docstrings were not protected", path.display(), err);
    }
    if !stripped.unterminated_blocks.is_empty() {
        warn!(
            "{}: unterminated triple-quoted block(s) left in place at line(s) {:?}",
            path.display(),
            stripped.unterminated_blocks
        );
    }

    enter(path, FileStage::Writing);
    let output = output_path_for(path);
    write_output(&output, &stripped.text, options.overwrite)?;

    enter(path, FileStage::Done);
    Ok(FileReport {
        input: path.to_path_buf(),
        output,
        input_size,
        output_size: stripped.text.len() as u64,
        protected_docstrings: stripped.protected_docstrings,
        docstrings_protected: stripped.parse_failure.is_none(),
        unterminated_blocks: stripped.unterminated_blocks,
    })
}

/// `stop` is checked before each file; a file already in progress always completes.
pub fn process_files(
    files: Vec<PathBuf>,
    options: &ProcessorOptions,
    stop: &AtomicBool,
) -> BatchSummary {
    let started = Instant::now();
    let total = files.len();
    let mut results = Vec::with_capacity(total);
    let mut stopped = false;

    if total == 0 {
        info!("no files to process");
    } else {
        info!("processing {} files", total);
    }

    for (index, path) in files.into_iter().enumerate() {
        if stop.load(Ordering::Relaxed) {
            warn!("stop requested; {} file(s) left unprocessed", total - index);
            stopped = true;
            break;
        }

        let progress = (index + 1) * 100 / total;
        info!("[{}%] processing {}", progress, path.display());

        let outcome = match process_file(&path, options) {
            Ok(report) => {
                info!(
                    "done: {} (size reduced by {:.1}%)",
                    report.output.display(),
                    report.size_reduction_percent()
                );
                FileOutcome::Done(report)
            }
            Err(err) if !err.is_failure() => {
                warn!("skipping: {}", err);
                FileOutcome::Skipped(err)
            }
            Err(err) => {
                enter(&path, FileStage::Failed);
                error!("{}", err);
                debug!("failed at stage {:?}", err.stage());
                FileOutcome::Failed(err)
            }
        };
        results.push(ProcessedFileResult { path, outcome });
    }

    let succeeded = results
        .iter()
        .filter(|r| matches!(r.outcome, FileOutcome::Done(_)))
        .count();
    let skipped = results
        .iter()
        .filter(|r| matches!(r.outcome, FileOutcome::Skipped(_)))
        .count();
    let failed = results.len() - succeeded - skipped;
    let elapsed = started.elapsed();

    let seconds = elapsed.as_secs();
    info!(
        "finished: {} total, {} succeeded, {} failed, {} skipped in {}m {}s",
        total,
        succeeded,
        failed,
        skipped,
        seconds / 60,
        seconds % 60
    );
    if failed > 0 {
        warn!("{} file(s) failed; see the errors above", failed);
    }

    BatchSummary {
        results,
        total,
        succeeded,
        failed,
        skipped,
        stopped,
        elapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("src/app.py", "src/app_no_comments.py")]
    #[case("app.PY", "app_no_comments.PY")]
    #[case("archive.tar.py", "archive.tar_no_comments.py")]
    #[case("script", "script_no_comments")]
    fn derives_sibling_output_path(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(output_path_for(Path::new(input)), PathBuf::from(expected));
    }

    #[rstest]
    #[case("a.py", true)]
    #[case("a.Py", true)]
    #[case("a.pyc", false)]
    #[case("a.txt", false)]
    #[case("py", false)]
    fn recognises_python_sources(#[case] path: &str, #[case] supported: bool) {
        assert_eq!(is_supported_source(Path::new(path)), supported);
    }

    #[test]
    fn size_reduction_handles_empty_input() {
        let report = FileReport {
            input: PathBuf::from("a.py"),
            output: PathBuf::from("a_no_comments.py"),
            input_size: 0,
            output_size: 0,
            protected_docstrings: 0,
            docstrings_protected: true,
            unterminated_blocks: Vec::new(),
        };
        assert_eq!(report.size_reduction_percent(), 0.0);

        let report = FileReport {
            input_size: 200,
            output_size: 150,
            ..report
        };
        assert_eq!(report.size_reduction_percent(), 25.0);
    }

    #[rstest]
    #[case::str_payload(Box::new("boom"), "boom")]
    #[case::string_payload(Box::new(String::from("bad index")), "bad index")]
    #[case::other_payload(Box::new(42_u32), "panic with non-string payload")]
    fn panic_payloads_become_messages(
        #[case] payload: Box<dyn std::any::Any + Send>,
        #[case] expected: &str,
    ) {
        assert_eq!(panic_message(payload), expected);
    }

    #[test]
    fn panics_during_transformation_are_unexpected_failures() {
        let path = Path::new("boom.py");
        let err = isolate_panics(path, || -> usize { panic!("tokenizer exploded") }).unwrap_err();
        match &err {
            ProcessError::Unexpected { path: failed, message } => {
                assert_eq!(failed, path);
                assert_eq!(message, "tokenizer exploded");
            }
            other => panic!("expected Unexpected, got {:?}", other),
        }
        assert!(err.is_failure());
        assert_eq!(err.stage(), FileStage::Transforming);
        assert_eq!(isolate_panics(path, || 7).unwrap(), 7);
    }

    #[test]
    fn wrong_kind_is_not_a_failure() {
        assert!(!ProcessError::WrongKind(PathBuf::from("a.txt")).is_failure());
        assert!(ProcessError::NotFound(PathBuf::from("a.py")).is_failure());
    }
}
