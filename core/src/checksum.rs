//! The rolling 16-bit checksum of the binary puzzle format.
//!
//! A file carries four of them: one over the header's core information block
//! (CIB), a primary checksum over everything, and an eight byte "masked" value
//! that mixes the CIB, solution, grid text and string checksums with the
//! letters of `ICHEATED`.

use crate::{Grid, Puzzle, PuzzleError, TextEncoding};

const MASK: &[u8; 8] = b"ICHEATED";

/// Rotate right one bit, add the byte, keep 16 bits.
pub fn checksum_region(bytes: &[u8], seed: u16) -> u16 {
    bytes
        .iter()
        .fold(seed, |cksum, byte| cksum.rotate_right(1).wrapping_add(u16::from(*byte)))
}

/// Numeric format version: `b"1.3\0"` is 13.
pub fn version_number(version: &[u8; 4]) -> u8 {
    let digit = |b: u8| b.wrapping_sub(b'0').min(9);
    digit(version[0]) * 10 + digit(version[2])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksums {
    pub cib: u16,
    pub primary: u16,
    pub masked: [u8; 8],
}

impl Checksums {
    pub fn validate(&self, declared: &Checksums) -> bool {
        self == declared
    }
}

/// Raw bytes the checksums are computed over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumInput {
    pub cib: [u8; 8],
    pub solution: Vec<u8>,
    pub grid_text: Vec<u8>,
    pub title: Vec<u8>,
    pub author: Vec<u8>,
    pub copyright: Vec<u8>,
    pub clues: Vec<Vec<u8>>,
    pub notes: Vec<u8>,
    pub version: u8,
}

impl ChecksumInput {
    pub fn from_puzzle(
        puzzle: &Puzzle,
        encoding: TextEncoding,
        version: u8,
    ) -> Result<Self, PuzzleError> {
        let grid = &puzzle.grid;
        Ok(Self {
            cib: cib_bytes(grid, puzzle.clues().len())?,
            solution: solution_bytes(grid),
            grid_text: text_bytes(grid),
            title: encoding.encode(&puzzle.title)?,
            author: encoding.encode(&puzzle.author)?,
            copyright: encoding.encode(&puzzle.copyright)?,
            clues: puzzle
                .clues()
                .iter()
                .map(|clue| encoding.encode(clue))
                .collect::<Result<_, _>>()?,
            notes: encoding.encode(&puzzle.notes)?,
            version,
        })
    }

    pub fn cib_checksum(&self) -> u16 {
        checksum_region(&self.cib, 0)
    }

    /// Checksum over the strings, continuing from `seed`.
    pub fn parts_checksum(&self, seed: u16) -> u16 {
        let mut cksum = seed;
        for part in [&self.title, &self.author, &self.copyright] {
            if !part.is_empty() {
                cksum = checksum_region(part, cksum);
                cksum = checksum_region(&[0], cksum);
            }
        }
        for clue in &self.clues {
            cksum = checksum_region(clue, cksum);
        }
        // Notes only count from version 1.3 on.
        if self.version >= 13 && !self.notes.is_empty() {
            cksum = checksum_region(&self.notes, cksum);
            cksum = checksum_region(&[0], cksum);
        }
        cksum
    }

    pub fn compute(&self) -> Checksums {
        let cib = self.cib_checksum();
        let solution = checksum_region(&self.solution, 0);
        let grid = checksum_region(&self.grid_text, 0);
        let parts = self.parts_checksum(0);

        let mut primary = checksum_region(&self.solution, cib);
        primary = checksum_region(&self.grid_text, primary);
        primary = self.parts_checksum(primary);

        let low = [cib, solution, grid, parts].map(|c| c as u8);
        let high = [cib, solution, grid, parts].map(|c| (c >> 8) as u8);
        let mut masked = [0u8; 8];
        for i in 0..4 {
            masked[i] = MASK[i] ^ low[i];
            masked[i + 4] = MASK[i + 4] ^ high[i];
        }

        Checksums {
            cib,
            primary,
            masked,
        }
    }
}

/// Checksums of a puzzle as it would be saved.
pub fn compute_checksums(puzzle: &Puzzle) -> Result<Checksums, PuzzleError> {
    let version = puzzle.save_version();
    let input = ChecksumInput::from_puzzle(
        puzzle,
        TextEncoding::for_version(&version),
        version_number(&version),
    )?;
    Ok(input.compute())
}

/// Width, height, clue count, grid type and grid flags, little endian.
pub fn cib_bytes(grid: &Grid, clue_count: usize) -> Result<[u8; 8], PuzzleError> {
    let width = u8::try_from(grid.width()).map_err(|_| invalid_size(grid))?;
    let height = u8::try_from(grid.height()).map_err(|_| invalid_size(grid))?;
    let clues = u16::try_from(clue_count).map_err(|_| PuzzleError::InvalidClues {
        expected: usize::from(u16::MAX),
        found: clue_count,
    })?;
    let grid_type = u16::from(grid.grid_type()).to_le_bytes();
    let flags = grid.grid_flags().bits().to_le_bytes();
    let clues = clues.to_le_bytes();
    Ok([
        width,
        height,
        clues[0],
        clues[1],
        grid_type[0],
        grid_type[1],
        flags[0],
        flags[1],
    ])
}

fn invalid_size(grid: &Grid) -> PuzzleError {
    PuzzleError::InvalidGrid {
        width: grid.width(),
        height: grid.height(),
    }
}

fn plain_byte(ch: Option<char>) -> u8 {
    match ch {
        Some(ch) if ch.is_ascii() => ch as u8,
        Some(_) => b'?',
        None => b'-',
    }
}

fn black_byte(grid: &Grid) -> u8 {
    if grid.is_diagramless() { b':' } else { b'.' }
}

/// One byte per square: `.` for black (`:` in diagramless grids), the plain
/// solution otherwise.
pub fn solution_bytes(grid: &Grid) -> Vec<u8> {
    let black = black_byte(grid);
    grid.squares()
        .iter()
        .map(|square| {
            if square.is_black() {
                black
            } else {
                plain_byte(square.plain_solution())
            }
        })
        .collect()
}

/// Like [`solution_bytes`], with `-` for blank squares.
pub fn text_bytes(grid: &Grid) -> Vec<u8> {
    let black = black_byte(grid);
    grid.squares()
        .iter()
        .map(|square| {
            if square.is_black() {
                black
            } else {
                plain_byte(square.plain_text())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Clue;

    #[test]
    fn test_checksum_region() {
        assert_eq!(checksum_region(b"", 0), 0);
        assert_eq!(checksum_region(b"A", 0), 0x41);
        assert_eq!(checksum_region(b"ACROSS&DOWN", 0), 0x265d);
        assert_eq!(checksum_region(&[0x01, 0x02], 0x1234), 0x848f);
    }

    #[test]
    fn test_version_number() {
        assert_eq!(version_number(b"1.3\0"), 13);
        assert_eq!(version_number(b"1.2c"), 12);
        assert_eq!(version_number(b"2.0\0"), 20);
    }

    fn mini() -> Puzzle {
        let mut puzzle = Puzzle::new(Grid::from_rows(&["CAT", "A.O", "BOW"]).unwrap());
        puzzle.title = "Mini".into();
        puzzle.author = "Tester".into();
        puzzle.copyright = "© 2024 Example".into();
        puzzle
            .set_clues_by_direction(
                vec![Clue::new(1, "Feline pet"), Clue::new(3, "Bend at the waist")],
                vec![Clue::new(1, "Taxi"), Clue::new(2, "Pull a boat")],
            )
            .unwrap();
        puzzle
    }

    #[test]
    fn test_mini_checksums() {
        let checksums = compute_checksums(&mini()).unwrap();
        assert_eq!(checksums.cib, 0x5200);
        assert_eq!(checksums.primary, 0x60b6);
        assert_eq!(checksums.masked, [73, 220, 17, 61, 19, 137, 166, 94]);
    }

    #[test]
    fn test_notes_depend_on_version() {
        let mut puzzle = mini();
        puzzle.notes = "Have fun".into();
        let mut input =
            ChecksumInput::from_puzzle(&puzzle, TextEncoding::Windows1252, 13).unwrap();
        let v13 = input.compute();
        assert_eq!(v13.primary, 0x6599);
        assert_eq!(v13.masked, [73, 220, 17, 51, 19, 137, 166, 2]);

        input.version = 12;
        let v12 = input.compute();
        assert_eq!(v12.primary, 0x60b6);
        assert!(!v12.validate(&v13));
    }

    #[test]
    fn test_diagramless_black_bytes() {
        let mut grid = Grid::from_rows(&["AB", ".C"]).unwrap();
        assert_eq!(solution_bytes(&grid), b"AB.C");
        grid.set_grid_type(crate::GridType::Diagramless);
        assert_eq!(solution_bytes(&grid), b"AB:C");
        assert_eq!(text_bytes(&grid), b"--:-");
    }
}
