use crate::CoreError;
use crate::processor::{OUTPUT_SUFFIX, OverwritePolicy, ProcessorOptions, is_supported_source};
use crate::stripper::{ParseFailurePolicy, PipelineConfig};
use clap::{Parser, Subcommand};
use ignore::overrides::{Override, OverrideBuilder};
use ignore::{DirEntry, WalkBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    about = "Strip comments from Python sources (main arguments)",
    long_about = "These are the main arguments for comment stripping."
)]
pub struct PystripArgs {
    #[clap(
        help = "Files or directories to process [directories are searched for *.py]",
        default_value = "."
    )]
    pub paths: Vec<PathBuf>,

    #[clap(long, help = "Keep single-line (#) comments")]
    pub keep_single_line: bool,

    #[clap(long, help = "Keep freestanding triple-quoted blocks")]
    pub keep_multi_line: bool,

    #[clap(long, help = "Keep runs of blank lines and trailing blank lines")]
    pub keep_blank_lines: bool,

    #[clap(long, help = "Fail a file instead of replacing an existing *_no_comments output")]
    pub no_overwrite: bool,

    #[clap(
        long,
        help = "Reject files that cannot be parsed instead of stripping them without docstring protection"
    )]
    pub strict_docstrings: bool,

    #[clap(long, help = "Skip the confirmation prompt")]
    pub no_confirm: bool,

    #[clap(
        long,
        value_name = "GLOB",
        action = clap::ArgAction::Append,
        help = "Only strip walked files matching this glob (repeatable)"
    )]
    pub include: Vec<String>,

    #[clap(
        long,
        value_name = "GLOB",
        action = clap::ArgAction::Append,
        help = "Skip walked files or directories matching this glob (repeatable)"
    )]
    pub exclude: Vec<String>,

    #[clap(short, long, action = clap::ArgAction::Count, help = "More log output (-v debug, -vv trace)")]
    pub verbose: u8,
}

impl Default for PystripArgs {
    fn default() -> Self {
        PystripArgs {
            paths: vec![PathBuf::from(".")],
            keep_single_line: false,
            keep_multi_line: false,
            keep_blank_lines: false,
            no_overwrite: false,
            strict_docstrings: false,
            no_confirm: false,
            include: Vec::new(),
            exclude: Vec::new(),
            verbose: 0,
        }
    }
}

impl PystripArgs {
    pub fn processor_options(&self) -> ProcessorOptions {
        ProcessorOptions {
            pipeline: PipelineConfig {
                strip_single_line_comments: !self.keep_single_line,
                strip_multi_line_comments: !self.keep_multi_line,
                compact_blank_lines: !self.keep_blank_lines,
            },
            on_parse_failure: if self.strict_docstrings {
                ParseFailurePolicy::FailClosed
            } else {
                ParseFailurePolicy::FailOpen
            },
            overwrite: if self.no_overwrite {
                OverwritePolicy::KeepExisting
            } else {
                OverwritePolicy::Overwrite
            },
        }
    }
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    #[clap(about = "Generate shell completion scripts")]
    Completion(CompletionArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct CompletionArgs {
    #[clap(value_parser = clap::value_parser!(clap_complete::Shell))]
    pub shell: clap_complete::Shell,
}

#[derive(Debug, Parser, Clone)]
#[clap(
    name = "pystrip",
    version = "0.1.0",
    about = "Python comment stripper",
    long_about = "Removes # comments and freestanding triple-quoted blocks from Python files while keeping docstrings and indentation intact.\nResults are written next to each input as <name>_no_comments.py.",
    propagate_version = true,
    args_conflicts_with_subcommands = true
)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub command: Option<Command>,

    #[clap(flatten)]
    pub main_opts: PystripArgs,
}

pub fn is_generated_output(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.ends_with(OUTPUT_SUFFIX))
}

pub fn find_files(args: &PystripArgs) -> Result<Vec<PathBuf>, CoreError> {
    let mut files = Vec::new();
    let mut seen = HashSet::new();

    for root in &args.paths {
        if !root.is_dir() {
            if !root.exists() {
                tracing::warn!("path not found: {}", root.display());
            }
            if seen.insert(root.clone()) {
                files.push(root.clone());
            }
            continue;
        }

        for path in walk_directory(root, args)? {
            if seen.insert(path.clone()) {
                files.push(path);
            }
        }
    }
    Ok(files)
}

fn glob_overrides(root: &Path, args: &PystripArgs) -> Result<Override, CoreError> {
    let mut builder = OverrideBuilder::new(root);
    let excluded = args.exclude.iter().map(|glob| (format!("!{}", glob), glob));
    let included = args.include.iter().map(|glob| (glob.clone(), glob));
    for (line, glob) in excluded.chain(included) {
        builder.add(&line).map_err(|source| CoreError::Pattern {
            pattern: glob.clone(),
            source,
        })?;
    }
    Ok(builder.build()?)
}

fn walk_directory(root: &Path, args: &PystripArgs) -> Result<Vec<PathBuf>, CoreError> {
    let mut walker = WalkBuilder::new(root);
    walker
        .standard_filters(true)
        .hidden(false)
        .overrides(glob_overrides(root, args)?);

    let mut sources: Vec<PathBuf> = walker
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!("skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(is_target_entry)
        .map(DirEntry::into_path)
        .collect();

    if sources.is_empty() {
        tracing::info!("no Python files under {}", root.display());
    }
    sources.sort();
    Ok(sources)
}

fn is_target_entry(entry: &DirEntry) -> bool {
    entry.file_type().is_some_and(|kind| kind.is_file())
        && is_supported_source(entry.path())
        && !is_generated_output(entry.path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, "x = 1\n").unwrap();
        path
    }

    #[test]
    fn walks_directories_for_python_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "a.py");
        let b = touch(dir.path(), "pkg/b.py");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "a_no_comments.py");

        let args = PystripArgs {
            paths: vec![dir.path().to_path_buf()],
            ..PystripArgs::default()
        };
        assert_eq!(find_files(&args).unwrap(), vec![a, b]);
    }

    #[test]
    fn explicit_and_missing_paths_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let txt = touch(dir.path(), "notes.txt");
        let missing = dir.path().join("gone.py");

        let args = PystripArgs {
            paths: vec![txt.clone(), missing.clone(), txt.clone()],
            ..PystripArgs::default()
        };
        assert_eq!(find_files(&args).unwrap(), vec![txt, missing]);
    }

    #[test]
    fn exclude_patterns_apply_to_walks() {
        let dir = tempfile::tempdir().unwrap();
        let kept = touch(dir.path(), "keep.py");
        touch(dir.path(), "skip/me.py");

        let args = PystripArgs {
            paths: vec![dir.path().to_path_buf()],
            exclude: vec!["skip/**".to_string()],
            ..PystripArgs::default()
        };
        assert_eq!(find_files(&args).unwrap(), vec![kept]);
    }

    #[test]
    fn flags_map_onto_processor_options() {
        let options = PystripArgs {
            keep_multi_line: true,
            no_overwrite: true,
            strict_docstrings: true,
            ..PystripArgs::default()
        }
        .processor_options();
        assert!(options.pipeline.strip_single_line_comments);
        assert!(!options.pipeline.strip_multi_line_comments);
        assert!(options.pipeline.compact_blank_lines);
        assert_eq!(options.on_parse_failure, ParseFailurePolicy::FailClosed);
        assert_eq!(options.overwrite, OverwritePolicy::KeepExisting);
        assert_eq!(
            PystripArgs::default().processor_options(),
            ProcessorOptions::default()
        );
    }
}
