mod convert;
pub use convert::{
    ConversionJob, ConversionOutcome, ConversionStatus, ConvertOptions, convert, convert_batch,
    output_path, plan_jobs,
};

mod error;
pub use error::{ExternalError, Result};

mod format;
pub use format::{FileFormat, file_filters};

mod json;
pub use json::PuzzleFile;

mod jpz;
mod puz;
mod txt;

use log::debug;
use std::path::Path;
use xword_core::Puzzle;

fn resolve_format(path: &Path, hint: Option<&str>) -> Result<FileFormat> {
    let extension = match hint {
        Some(hint) => hint.to_string(),
        None => path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    FileFormat::from_extension(&extension).ok_or(ExternalError::MissingHandler(extension))
}

/// Parse a puzzle from memory.
pub fn load_bytes(bytes: &[u8], format: FileFormat) -> Result<Puzzle> {
    match format {
        FileFormat::Puz => puz::load(bytes),
        FileFormat::Txt => txt::load(bytes),
        FileFormat::Json => json::load(bytes),
        FileFormat::Jpz => jpz::load(bytes),
    }
}

/// Serialize a puzzle without touching the file system.
pub fn save_bytes(puzzle: &Puzzle, format: FileFormat) -> Result<Vec<u8>> {
    match format {
        FileFormat::Puz => puz::save(puzzle),
        FileFormat::Txt => txt::save(puzzle),
        FileFormat::Json => json::save(puzzle),
        FileFormat::Jpz => Err(ExternalError::MissingHandler(format.extension().to_string())),
    }
}

/// Load a puzzle, picking the handler from `hint` or the file extension.
///
/// Recoverable problems such as checksum mismatches are reported in
/// [`Puzzle::warnings`] instead of failing the load.
pub fn load<P: AsRef<Path>>(path: P, hint: Option<&str>) -> Result<Puzzle> {
    let path = path.as_ref();
    let format = resolve_format(path, hint)?;
    let bytes = std::fs::read(path).map_err(|err| ExternalError::file(path, err))?;
    debug!("loading {} as {:?}", path.display(), format);
    load_bytes(&bytes, format)
}

/// Save a puzzle. Nothing is written when serialization fails.
pub fn save<P: AsRef<Path>>(puzzle: &Puzzle, path: P, hint: Option<&str>) -> Result<()> {
    let path = path.as_ref();
    let format = resolve_format(path, hint)?;
    let bytes = save_bytes(puzzle, format)?;
    std::fs::write(path, bytes).map_err(|err| ExternalError::file(path, err))?;
    debug!("saved {} as {:?}", path.display(), format);
    Ok(())
}

pub fn can_load(extension: &str) -> bool {
    FileFormat::from_extension(extension).is_some_and(FileFormat::can_load)
}

pub fn can_save(extension: &str) -> bool {
    FileFormat::from_extension(extension).is_some_and(FileFormat::can_save)
}
