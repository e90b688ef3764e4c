use crate::text::fits_windows1252;
use crate::{Clue, Direction, Grid, PuzzleError, scramble};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    pub seconds: u32,
    pub paused: bool,
}

/// An extension section kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: [u8; 4],
    pub data: Vec<u8>,
}

impl Section {
    pub fn new(name: [u8; 4], data: Vec<u8>) -> Self {
        Self { name, data }
    }

    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// Binary format details that have no meaning in the puzzle model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatData {
    pub version: [u8; 4],
    /// Header bytes 0x1C-0x1D and 0x20-0x2B.
    pub reserved: [u8; 14],
    /// Sections the engine did not understand, in file order.
    pub sections: Vec<Section>,
    /// Raw bytes of the known sections that were decoded, in file order.
    /// Saving reuses them while they still describe the puzzle.
    pub decoded: Vec<Section>,
    /// The file ended after the last clue, without a notes string.
    pub omit_notes: bool,
}

impl Default for FormatData {
    fn default() -> Self {
        Self {
            version: *b"1.3\0",
            reserved: [0; 14],
            sections: Vec::new(),
            decoded: Vec::new(),
            omit_notes: false,
        }
    }
}

/// Problems found while loading that did not stop the load.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    #[error("file checksums don't match")]
    ChecksumMismatch,

    #[error("checksum does not match for {0} section")]
    SectionChecksum(String),

    #[error("{name} section could not be read: {reason}")]
    SectionDamaged { name: String, reason: String },

    #[error("{0} bytes of trailing data ignored")]
    TrailingData(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PuzzleSnapshot", into = "PuzzleSnapshot")]
pub struct Puzzle {
    pub title: String,
    pub author: String,
    pub copyright: String,
    pub notes: String,
    /// Edits that change the black/white pattern leave the across/down
    /// lists stale; follow them with [`Puzzle::set_clues`] or
    /// [`Puzzle::derive_clues`].
    pub grid: Grid,
    clues: Vec<String>,
    across: Vec<Clue>,
    down: Vec<Clue>,
    pub timer: Option<Timer>,
    pub format: FormatData,
    pub warnings: Vec<LoadWarning>,
}

impl Puzzle {
    pub fn new(grid: Grid) -> Self {
        Self {
            title: String::new(),
            author: String::new(),
            copyright: String::new(),
            notes: String::new(),
            grid,
            clues: Vec::new(),
            across: Vec::new(),
            down: Vec::new(),
            timer: None,
            format: FormatData::default(),
            warnings: Vec::new(),
        }
    }

    /// Clue texts in file order: by number, across before down.
    pub fn clues(&self) -> &[String] {
        &self.clues
    }

    pub fn across(&self) -> &[Clue] {
        &self.across
    }

    pub fn down(&self) -> &[Clue] {
        &self.down
    }

    pub fn clues_by_direction(&self, direction: Direction) -> &[Clue] {
        match direction {
            Direction::Across => &self.across,
            Direction::Down => &self.down,
        }
    }

    /// Replace the flat clue list and split it by direction.
    pub fn set_clues(&mut self, clues: Vec<String>) -> Result<(), PuzzleError> {
        let (across, down) = split_clues(&self.grid, &clues)?;
        self.clues = clues;
        self.across = across;
        self.down = down;
        Ok(())
    }

    /// Re-split the current flat list, e.g. after the grid pattern changed.
    pub fn derive_clues(&mut self) -> Result<(), PuzzleError> {
        let (across, down) = split_clues(&self.grid, &self.clues)?;
        self.across = across;
        self.down = down;
        Ok(())
    }

    pub fn set_clues_by_direction(
        &mut self,
        mut across: Vec<Clue>,
        mut down: Vec<Clue>,
    ) -> Result<(), PuzzleError> {
        across.sort();
        down.sort();
        let (expected_across, expected_down) = clue_numbers(&self.grid);
        let found = across.len() + down.len();
        let expected = expected_across.len() + expected_down.len();
        let numbers = |clues: &[Clue]| clues.iter().map(|c| c.number).collect::<Vec<_>>();
        if found != expected
            || numbers(&across) != expected_across
            || numbers(&down) != expected_down
        {
            return Err(PuzzleError::InvalidClues { expected, found });
        }

        let mut flat = Vec::with_capacity(found);
        let (mut a, mut d) = (across.iter().peekable(), down.iter().peekable());
        for square in self.grid.squares() {
            let number = square.number();
            if let Some(clue) = a.next_if(|clue| clue.number == number) {
                flat.push(clue.text.clone());
            }
            if let Some(clue) = d.next_if(|clue| clue.number == number) {
                flat.push(clue.text.clone());
            }
        }
        self.clues = flat;
        self.across = across;
        self.down = down;
        Ok(())
    }

    /// The clue of the word running through a square.
    pub fn word_clue(&self, index: usize, direction: Direction) -> Option<&Clue> {
        let start = self.grid.word_start(index, direction)?;
        let number = self.grid.square(start)?.number();
        self.clues_by_direction(direction)
            .iter()
            .find(|clue| clue.number == number)
    }

    pub fn is_complete(&self) -> bool {
        if self.grid.is_scrambled() {
            return scramble::check_user_grid(&self.grid);
        }
        self.grid.check_grid(false).is_empty()
    }

    pub fn is_scrambled(&self) -> bool {
        self.grid.is_scrambled()
    }

    pub fn scramble(&mut self, key: Option<u16>) -> Result<u16, PuzzleError> {
        scramble::scramble(&mut self.grid, key)
    }

    pub fn unscramble(&mut self, key: u16) -> bool {
        scramble::unscramble(&mut self.grid, key)
    }

    /// Whether every string and rebus fits the legacy single-byte encoding.
    pub fn fits_windows1252(&self) -> bool {
        [&self.title, &self.author, &self.copyright, &self.notes]
            .into_iter()
            .chain(&self.clues)
            .all(|text| fits_windows1252(text))
            && self
                .grid
                .squares()
                .iter()
                .all(|square| fits_windows1252(square.solution()) && fits_windows1252(square.text()))
    }

    /// Binary format version to write: a loaded version is kept when the
    /// text still fits its encoding.
    pub fn save_version(&self) -> [u8; 4] {
        let loaded = self.format.version;
        match loaded[0] {
            b'2' => loaded,
            _ if !self.fits_windows1252() => *b"2.0\0",
            b'1' => loaded,
            _ => *b"1.3\0",
        }
    }
}

fn clue_numbers(grid: &Grid) -> (Vec<u16>, Vec<u16>) {
    let numbers = |direction| {
        grid.squares()
            .iter()
            .filter(|square| square.has_clue(direction))
            .map(|square| square.number())
            .collect()
    };
    (numbers(Direction::Across), numbers(Direction::Down))
}

fn split_clues(grid: &Grid, clues: &[String]) -> Result<(Vec<Clue>, Vec<Clue>), PuzzleError> {
    let (across_count, down_count) = grid.count_clues();
    let expected = across_count + down_count;
    if clues.len() != expected {
        return Err(PuzzleError::InvalidClues {
            expected,
            found: clues.len(),
        });
    }

    let mut texts = clues.iter();
    let mut across = Vec::with_capacity(across_count);
    let mut down = Vec::with_capacity(down_count);
    for square in grid.squares() {
        for (direction, list) in [(Direction::Across, &mut across), (Direction::Down, &mut down)] {
            if square.has_clue(direction) {
                if let Some(text) = texts.next() {
                    list.push(Clue::new(square.number(), text.clone()));
                }
            }
        }
    }
    Ok((across, down))
}

#[derive(Serialize, Deserialize)]
struct PuzzleSnapshot {
    title: String,
    author: String,
    copyright: String,
    notes: String,
    grid: Grid,
    clues: Vec<String>,
    timer: Option<Timer>,
    #[serde(default)]
    format: FormatData,
}

impl From<Puzzle> for PuzzleSnapshot {
    fn from(puzzle: Puzzle) -> Self {
        Self {
            title: puzzle.title,
            author: puzzle.author,
            copyright: puzzle.copyright,
            notes: puzzle.notes,
            grid: puzzle.grid,
            clues: puzzle.clues,
            timer: puzzle.timer,
            format: puzzle.format,
        }
    }
}

impl TryFrom<PuzzleSnapshot> for Puzzle {
    type Error = PuzzleError;

    fn try_from(snapshot: PuzzleSnapshot) -> Result<Self, Self::Error> {
        let mut puzzle = Puzzle::new(snapshot.grid);
        puzzle.title = snapshot.title;
        puzzle.author = snapshot.author;
        puzzle.copyright = snapshot.copyright;
        puzzle.notes = snapshot.notes;
        puzzle.timer = snapshot.timer;
        puzzle.format = snapshot.format;
        puzzle.set_clues(snapshot.clues)?;
        Ok(puzzle)
    }
}
