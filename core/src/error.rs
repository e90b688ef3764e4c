use crate::Direction;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PuzzleError {
    #[error("Invalid grid size: {width}x{height}")]
    InvalidGrid { width: usize, height: usize },

    #[error("Invalid direction: {0}")]
    InvalidDirection(String),

    #[error("Square ({row}, {col}) has no {direction} word")]
    NoWord {
        row: usize,
        col: usize,
        direction: Direction,
    },

    #[error("Position ({row}, {col}) is out of bounds")]
    OutOfBounds { row: usize, col: usize },

    #[error("Invalid grid cell ({row}, {col}): {reason}")]
    InvalidGridCell {
        row: usize,
        col: usize,
        reason: String,
    },

    #[error("Invalid characters in {0:?}")]
    InvalidString(String),

    #[error("Text cannot be encoded: {0:?}")]
    InvalidEncoding(String),

    #[error("Clue count mismatch: grid expects {expected}, found {found}")]
    InvalidClues { expected: usize, found: usize },

    #[error("Invalid scramble key {0}: expected a 4-digit number")]
    InvalidKey(u16),

    #[error("Cannot scramble: {0}")]
    CannotScramble(String),
}
