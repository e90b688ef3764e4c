use crate::error::{ExternalError, Result};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use xword_core::Puzzle;

pub const FORMAT_VERSION: &str = "1.0";

/// Native snapshot of a puzzle, including play state and unknown sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PuzzleFile {
    pub version: String,
    pub saved_at: DateTime<Utc>,
    pub puzzle: Puzzle,
}

impl PuzzleFile {
    pub fn new(puzzle: Puzzle) -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            saved_at: Utc::now(),
            puzzle,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let file: PuzzleFile = serde_json::from_slice(bytes)?;
        if file.version.split('.').next() != Some("1") {
            return Err(ExternalError::UnsupportedVersion(file.version));
        }
        debug!("json snapshot v{} saved {}", file.version, file.saved_at);
        Ok(file)
    }
}

pub fn load(bytes: &[u8]) -> Result<Puzzle> {
    PuzzleFile::from_bytes(bytes).map(|file| file.puzzle)
}

pub fn save(puzzle: &Puzzle) -> Result<Vec<u8>> {
    PuzzleFile::new(puzzle.clone()).to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use xword_core::{Grid, Section, SquareFlags, Timer};

    fn puzzle() -> Puzzle {
        let mut puzzle = Puzzle::new(Grid::from_rows(&["AB", "CD"]).unwrap());
        puzzle.title = "Snapshot".into();
        puzzle
            .set_clues(vec!["a1".into(), "d1".into(), "d2".into(), "a3".into()])
            .unwrap();
        puzzle
    }

    #[test]
    fn test_snapshot_keeps_play_state() {
        let mut original = puzzle();
        original.grid.set_text(3, "D").unwrap();
        original.grid.add_flag(3, SquareFlags::PENCIL).unwrap();
        original.timer = Some(Timer {
            seconds: 12,
            paused: true,
        });
        original
            .format
            .sections
            .push(Section::new(*b"XTRA", vec![1, 2, 3]));

        let back = load(&save(&original).unwrap()).unwrap();
        assert_eq!(back, original);
        assert_eq!(back.down()[1].text, "d2");
    }

    #[test]
    fn test_future_version_rejected() {
        let mut file = PuzzleFile::new(puzzle());
        file.version = "2.0".into();
        let bytes = file.to_bytes().unwrap();
        assert!(matches!(
            PuzzleFile::from_bytes(&bytes),
            Err(ExternalError::UnsupportedVersion(v)) if v == "2.0"
        ));
    }

    #[test]
    fn test_garbage_is_json_error() {
        assert!(matches!(load(b"not json"), Err(ExternalError::Json(_))));
    }
}
