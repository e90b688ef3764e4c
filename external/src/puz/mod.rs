//! Across Lite binary format (`.puz`).

mod header;
mod sections;

use crate::error::{ExternalError, Result};
use header::Header;
use log::{debug, warn};
use std::io::{Cursor, Read};
use xword_core::checksum::version_number;
use xword_core::square::is_valid_char;
use xword_core::{
    ChecksumInput, Grid, GridFlags, LoadWarning, Puzzle, PuzzleError, SquareFlags, TextEncoding,
};

pub fn load(bytes: &[u8]) -> Result<Puzzle> {
    let mut r = Cursor::new(bytes);
    let header = Header::read(&mut r)?;
    let encoding = TextEncoding::for_version(&header.version);
    debug!(
        "puz v{} {}x{}, {} clues",
        String::from_utf8_lossy(&header.version[..3]),
        header.width,
        header.height,
        header.num_clues
    );

    let mut grid = Grid::new(usize::from(header.width), usize::from(header.height))?;
    grid.set_grid_type(header.grid_type.into());
    grid.set_grid_flags(GridFlags::from_bits_retain(header.flags));
    grid.set_cksum(header.scrambled_cksum);

    let solution = read_block(&mut r, grid.len(), "solution")?;
    let grid_text = read_block(&mut r, grid.len(), "grid text")?;
    let title = read_string(&mut r, "title")?;
    let author = read_string(&mut r, "author")?;
    let copyright = read_string(&mut r, "copyright")?;
    let clues = (0..header.num_clues)
        .map(|_| read_string(&mut r, "clue"))
        .collect::<Result<_>>()?;
    // Notes may be missing entirely when nothing follows them.
    let omit_notes = r.position() as usize >= bytes.len();
    let notes = if omit_notes {
        Vec::new()
    } else {
        read_string(&mut r, "notes")?
    };
    let mut input = ChecksumInput {
        cib: header.cib(),
        solution,
        grid_text,
        title,
        author,
        copyright,
        clues,
        notes,
        version: version_number(&header.version),
    };

    fill_grid(&mut grid, &input.solution, &input.grid_text)?;

    let mut puzzle = Puzzle::new(grid);
    puzzle.title = encoding.decode(&input.title);
    puzzle.author = encoding.decode(&input.author);
    puzzle.copyright = encoding.decode(&input.copyright);
    puzzle.notes = encoding.decode(&input.notes);
    puzzle.set_clues(input.clues.iter().map(|clue| encoding.decode(clue)).collect())?;
    puzzle.format.version = header.version;
    puzzle.format.reserved = header.reserved;
    puzzle.format.omit_notes = omit_notes;

    // Everything essential is read; problems past this point are warnings.
    let mut warnings = Vec::new();
    let found = sections::read_sections(&mut r, &mut warnings);
    sections::apply_sections(&mut puzzle, found, encoding, &mut warnings);

    if !input.compute().validate(&header.checksums) {
        // Some files with notes declare the wrong version.
        input.version = if input.version == 13 { 12 } else { 13 };
        if !input.compute().validate(&header.checksums) {
            warn!("file checksums don't match");
            warnings.push(LoadWarning::ChecksumMismatch);
        }
    }
    puzzle.warnings = warnings;
    Ok(puzzle)
}

fn read_block(r: &mut Cursor<&[u8]>, len: usize, what: &str) -> Result<Vec<u8>> {
    let mut block = vec![0u8; len];
    r.read_exact(&mut block)
        .map_err(|_| ExternalError::malformed(format!("file ends inside the {what}")))?;
    Ok(block)
}

/// A nul-terminated string, without the terminator.
fn read_string(r: &mut Cursor<&[u8]>, what: &str) -> Result<Vec<u8>> {
    let start = r.position() as usize;
    let rest = &r.get_ref()[start.min(r.get_ref().len())..];
    let end = rest
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| ExternalError::malformed(format!("unterminated {what}")))?;
    let value = rest[..end].to_vec();
    r.set_position((start + end + 1) as u64);
    Ok(value)
}

fn cell_error(grid: &Grid, index: usize, reason: String) -> ExternalError {
    let (row, col) = grid.position(index);
    PuzzleError::InvalidGridCell { row, col, reason }.into()
}

fn fill_grid(grid: &mut Grid, solution: &[u8], text: &[u8]) -> Result<()> {
    let mut solutions = Vec::with_capacity(solution.len());
    for (i, byte) in solution.iter().enumerate() {
        let value = match byte {
            b'.' | b':' => ".".to_string(),
            b'-' => String::new(),
            _ => {
                let ch = TextEncoding::Windows1252.decode(&[*byte]);
                if !ch.chars().all(is_valid_char) {
                    return Err(cell_error(grid, i, format!("invalid solution {ch:?}")));
                }
                ch
            }
        };
        solutions.push(value);
    }
    grid.set_solutions(solutions.iter().enumerate().map(|(i, s)| (i, s.as_str())))?;

    let diagramless = grid.is_diagramless();
    for (i, byte) in text.iter().enumerate() {
        if grid.square(i).is_some_and(|square| square.is_black()) {
            continue;
        }
        match byte {
            b'-' | 0 => {}
            b'.' | b':' if diagramless => {}
            _ => {
                let entry = TextEncoding::Windows1252.decode(&[*byte]);
                grid.set_text(i, &entry)
                    .map_err(|err| cell_error(grid, i, err.to_string()))?;
                if byte.is_ascii_lowercase() {
                    grid.add_flag(i, SquareFlags::PENCIL)?;
                }
            }
        }
    }
    Ok(())
}

pub fn save(puzzle: &Puzzle) -> Result<Vec<u8>> {
    let grid = &puzzle.grid;
    if grid.has_solution() {
        if let Some(i) = grid
            .squares()
            .iter()
            .position(|square| square.is_white() && !square.has_solution())
        {
            let (row, col) = grid.position(i);
            return Err(ExternalError::Conversion(format!(
                "square ({row}, {col}) has no solution"
            )));
        }
    }

    let version = puzzle.save_version();
    let encoding = TextEncoding::for_version(&version);
    let input = ChecksumInput::from_puzzle(puzzle, encoding, version_number(&version))?;
    let cib = input.cib;
    let header = Header {
        checksums: input.compute(),
        version,
        reserved: puzzle.format.reserved,
        scrambled_cksum: grid.cksum(),
        width: cib[0],
        height: cib[1],
        num_clues: u16::from_le_bytes([cib[2], cib[3]]),
        grid_type: u16::from_le_bytes([cib[4], cib[5]]),
        flags: u16::from_le_bytes([cib[6], cib[7]]),
    };

    let mut out = Vec::new();
    header.write(&mut out)?;
    out.extend_from_slice(&input.solution);
    out.extend_from_slice(&input.grid_text);
    for part in [&input.title, &input.author, &input.copyright] {
        out.extend_from_slice(part);
        out.push(0);
    }
    for clue in &input.clues {
        out.extend_from_slice(clue);
        out.push(0);
    }
    let mut tail = Vec::new();
    sections::write_sections(&mut tail, puzzle, encoding)?;
    if !(puzzle.format.omit_notes && input.notes.is_empty() && tail.is_empty()) {
        out.extend_from_slice(&input.notes);
        out.push(0);
    }
    out.extend(tail);
    debug!("wrote {} bytes of puz v{}", out.len(), String::from_utf8_lossy(&version[..3]));
    Ok(out)
}
