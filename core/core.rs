pub mod file_finder;
pub mod processor;
pub mod stripper;

pub use file_finder::{CliArgs, Command, CompletionArgs, PystripArgs, find_files};

pub use processor::{
    BatchSummary, FileOutcome, FileReport, FileStage, OverwritePolicy, ProcessError,
    ProcessedFileResult, ProcessorOptions, output_path_for, process_file, process_files,
};
pub use stripper::{ParseFailurePolicy, PipelineConfig, StripError, Stripped, strip_source};

#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: ignore::Error,
    },

    #[error("invalid include/exclude overrides: {0}")]
    Overrides(#[from] ignore::Error),
}
