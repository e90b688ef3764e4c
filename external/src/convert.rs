//! Batch conversion between `.puz` and `.txt`.

use crate::error::{ExternalError, Result};
use crate::format::FileFormat;
use log::{info, warn};
use std::path::{Path, PathBuf};
use xword_core::LoadWarning;

/// Highest suffix tried when renaming around existing files.
const MAX_RENAME: u32 = 999;

#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Write next to each input when `None`.
    pub output_dir: Option<PathBuf>,
    pub overwrite: bool,
    /// Treat load warnings (bad checksums, damaged sections) as failures.
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug)]
pub enum ConversionStatus {
    Done,
    DoneWithWarnings(Vec<LoadWarning>),
    Failed(ExternalError),
}

impl ConversionStatus {
    pub fn is_done(&self) -> bool {
        !matches!(self, ConversionStatus::Failed(_))
    }
}

#[derive(Debug)]
pub struct ConversionOutcome {
    pub job: ConversionJob,
    pub status: ConversionStatus,
}

/// The input with the opposite extension: `.puz` becomes `.txt`, anything
/// else becomes `.puz`.
pub fn output_path(input: &Path, options: &ConvertOptions) -> PathBuf {
    let extension = match FileFormat::from_path(input) {
        Some(FileFormat::Puz) => FileFormat::Txt,
        _ => FileFormat::Puz,
    }
    .extension();
    let dir = match &options.output_dir {
        Some(dir) => dir.clone(),
        None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    let mut name = input.file_stem().unwrap_or(input.as_os_str()).to_os_string();
    name.push(".");
    name.push(extension);
    dir.join(name)
}

fn rename_free(path: PathBuf, taken: impl Fn(&Path) -> bool) -> PathBuf {
    if !taken(&path) {
        return path;
    }
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut candidate = path.clone();
    for i in 1..=MAX_RENAME {
        candidate = path.with_file_name(format!("{stem}_{i}.{extension}"));
        if !taken(&candidate) {
            break;
        }
    }
    candidate
}

/// Pair every input with an output path. Without `overwrite`, outputs that
/// collide with an existing file or an earlier job get a `_N` suffix.
pub fn plan_jobs<P: AsRef<Path>>(inputs: &[P], options: &ConvertOptions) -> Vec<ConversionJob> {
    let mut jobs: Vec<ConversionJob> = Vec::with_capacity(inputs.len());
    for input in inputs {
        let input = input.as_ref().to_path_buf();
        let mut output = output_path(&input, options);
        if !options.overwrite {
            output = rename_free(output, |candidate| {
                candidate.exists() || jobs.iter().any(|job| job.output == candidate)
            });
        }
        jobs.push(ConversionJob { input, output });
    }
    jobs
}

fn run(job: &ConversionJob, options: &ConvertOptions) -> Result<Vec<LoadWarning>> {
    // Unknown extensions are read as text.
    let format = FileFormat::from_path(&job.input)
        .filter(|format| format.can_load())
        .unwrap_or(FileFormat::Txt);
    let bytes = std::fs::read(&job.input).map_err(|err| ExternalError::file(&job.input, err))?;
    let mut puzzle = crate::load_bytes(&bytes, format)?;

    let warnings = std::mem::take(&mut puzzle.warnings);
    if options.strict {
        if let Some(first) = warnings.first() {
            return Err(ExternalError::malformed(first.to_string()));
        }
    }

    if let Some(dir) = job.output.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|err| ExternalError::file(dir, err))?;
    }
    crate::save(&puzzle, &job.output, None)?;
    Ok(warnings)
}

pub fn convert(job: &ConversionJob, options: &ConvertOptions) -> ConversionStatus {
    match run(job, options) {
        Ok(warnings) if warnings.is_empty() => ConversionStatus::Done,
        Ok(warnings) => ConversionStatus::DoneWithWarnings(warnings),
        Err(err) => ConversionStatus::Failed(err),
    }
}

/// Convert every input in order. A failed job never stops the ones after it.
pub fn convert_batch<P: AsRef<Path>>(
    inputs: &[P],
    options: &ConvertOptions,
) -> Vec<ConversionOutcome> {
    plan_jobs(inputs, options)
        .into_iter()
        .map(|job| {
            let status = convert(&job, options);
            match &status {
                ConversionStatus::Done => {
                    info!("{} -> {}", job.input.display(), job.output.display());
                }
                ConversionStatus::DoneWithWarnings(warnings) => info!(
                    "{} -> {} ({} warnings)",
                    job.input.display(),
                    job.output.display(),
                    warnings.len()
                ),
                ConversionStatus::Failed(err) => {
                    warn!("{} failed: {err}", job.input.display());
                }
            }
            ConversionOutcome { job, status }
        })
        .collect()
}
