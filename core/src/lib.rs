pub mod checksum;
pub mod clue;
pub mod direction;
pub mod error;
pub mod grid;
pub mod puzzle;
pub mod scramble;
pub mod square;
pub mod text;

pub use checksum::{ChecksumInput, Checksums, checksum_region, compute_checksums};
pub use clue::Clue;
pub use direction::{Direction, Step};
pub use error::PuzzleError;
pub use grid::{FindOptions, Grid, GridFlags, GridType, Word};
pub use puzzle::{FormatData, LoadWarning, Puzzle, Section, Timer};
pub use square::{ClueFlags, Square, SquareFlags};
pub use text::TextEncoding;
