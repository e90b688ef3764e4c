//! Across Lite text format.
//!
//! ```text
//! <ACROSS PUZZLE>
//! <TITLE>
//! ...
//! <SIZE>
//! 15x15
//! <GRID>
//! ```
//!
//! The V2 variant adds an optional `<REBUS>` table after the grid. Only V1 is
//! written; puzzles that need V2 features fail to save.

use crate::error::{ExternalError, Result};
use log::debug;
use std::collections::HashMap;
use xword_core::text::{decode_guess, fits_windows1252};
use xword_core::{Direction, Grid, GridType, Puzzle, SquareFlags, TextEncoding};

const HEADER_V1: &str = "<ACROSS PUZZLE>";
const HEADER_V2: &str = "<ACROSS PUZZLE V2>";
const GRID_SYMBOLS: &str = "@#$%&+?";

fn is_grid_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '.' || ch == ':' || GRID_SYMBOLS.contains(ch)
}

/// Line reader that remembers where it is for error messages.
struct Lines<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().collect(),
            pos: 0,
        }
    }

    /// 1-based number of the line read last.
    fn line(&self) -> usize {
        self.pos
    }

    fn next(&mut self) -> Option<&'a str> {
        let line = *self.lines.get(self.pos)?;
        self.pos += 1;
        Some(line.trim())
    }

    fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.pos).copied().map(str::trim)
    }

    fn rest(&mut self) -> Vec<&'a str> {
        let rest = self.lines[self.pos..].to_vec();
        self.pos = self.lines.len();
        rest
    }

    fn expect_tag(&mut self, tag: &str) -> Result<()> {
        match self.next() {
            Some(line) if line == tag => Ok(()),
            _ => Err(ExternalError::MissingTag {
                tag: tag.to_string(),
                line: self.line().max(1),
            }),
        }
    }

    fn value(&mut self, what: &str) -> Result<&'a str> {
        self.next().ok_or_else(|| self.error(format!("missing {what}")))
    }

    fn error(&self, message: impl std::fmt::Display) -> ExternalError {
        ExternalError::malformed(format!("{message} at line {}", self.line().max(1)))
    }
}

fn parse_size(lines: &Lines, size: &str) -> Result<(usize, usize)> {
    let Some((width, height)) = size.split_once(['x', 'X']) else {
        return Err(lines.error("missing 'x' in size"));
    };
    match (width.trim().parse(), height.trim().parse()) {
        (Ok(width), Ok(height)) => Ok((width, height)),
        _ => Err(lines.error(format!("bad size {size:?}"))),
    }
}

fn read_grid(lines: &mut Lines, width: usize, height: usize) -> Result<Vec<char>> {
    lines.expect_tag("<GRID>")?;
    let mut cells = Vec::with_capacity(width * height);
    for _ in 0..height {
        let row = lines.value("grid row")?;
        let count = row.chars().count();
        if count < width {
            return Err(lines.error("missing letters in grid"));
        }
        if count > width {
            return Err(lines.error("extra letters in grid"));
        }
        if let Some(bad) = row.chars().find(|ch| !is_grid_char(*ch)) {
            return Err(lines.error(format!("invalid character in grid: {bad:?}")));
        }
        cells.extend(row.chars());
    }
    Ok(cells)
}

#[derive(Debug, Default)]
struct RebusTable {
    mark: bool,
    entries: HashMap<char, (String, char)>,
}

/// The optional V2 `<REBUS>` section: a flag line and `c:LONG:S` markers.
fn read_rebus(lines: &mut Lines) -> Result<RebusTable> {
    let mut table = RebusTable::default();
    if lines.peek() != Some("<REBUS>") {
        return Ok(table);
    }
    lines.next();

    match lines.peek() {
        Some(line) if line.contains(';') => {
            lines.next();
            table.mark = line
                .split([';', ' '])
                .any(|flag| flag == "MARK");
        }
        Some(line) if line.contains(':') => {}
        _ => {
            lines.next();
            return Err(lines.error("no entries in <REBUS>"));
        }
    }

    while let Some(line) = lines.peek().filter(|line| line.contains(':')) {
        lines.next();
        let parts: Vec<&str> = line
            .split([':', ' '])
            .filter(|part| !part.is_empty())
            .collect();
        let [marker, long, short] = parts.as_slice() else {
            return Err(lines.error("rebus marker needs three entries"));
        };
        let mut marker_chars = marker.chars();
        let (Some(key), None) = (marker_chars.next(), marker_chars.next()) else {
            return Err(lines.error("rebus marker must be one character"));
        };
        if !is_grid_char(key) || key == '.' || key == ':' {
            return Err(lines.error(format!("invalid rebus marker {key:?}")));
        }
        let plain = short.chars().next().filter(char::is_ascii_uppercase);
        let Some(plain) = plain else {
            return Err(lines.error("rebus short solution must be upper case"));
        };
        table.entries.insert(key, (long.to_string(), plain));
    }
    Ok(table)
}

fn fill_grid(
    lines: &Lines,
    grid: &mut Grid,
    cells: &[char],
    rebus: &RebusTable,
) -> Result<()> {
    let solutions: Vec<String> = cells
        .iter()
        .map(|ch| match (ch, rebus.entries.get(ch)) {
            (_, Some((long, _))) => long.clone(),
            ('.' | ':', None) => ".".to_string(),
            (ch, None) => ch.to_string(),
        })
        .collect();
    grid.set_solutions(solutions.iter().enumerate().map(|(i, s)| (i, s.as_str())))
        .map_err(|err| lines.error(err))?;

    for (i, ch) in cells.iter().enumerate() {
        if let Some((long, plain)) = rebus.entries.get(ch) {
            grid.set_rebus_solution(i, long, *plain)
                .map_err(|err| lines.error(err))?;
        }
        if rebus.mark && ch.is_ascii_lowercase() {
            grid.add_flag(i, SquareFlags::CIRCLED)?;
        }
    }
    Ok(())
}

fn read_clues(
    lines: &mut Lines,
    tag: &str,
    count: usize,
    stop: Option<&str>,
) -> Result<Vec<String>> {
    lines.expect_tag(tag)?;
    let mut clues = Vec::with_capacity(count);
    for _ in 0..count {
        match lines.next() {
            Some(clue) if !clue.is_empty() && Some(clue) != stop => clues.push(clue.to_string()),
            _ => {
                let which = tag.trim_matches(['<', '>']).to_lowercase();
                return Err(lines.error(format!("missing some {which} clues")));
            }
        }
    }
    Ok(clues)
}

pub fn load(bytes: &[u8]) -> Result<Puzzle> {
    let text = decode_guess(bytes);
    let mut lines = Lines::new(&text);

    let version = match lines.next().map(|line| line.trim_start_matches('\u{feff}')) {
        Some(HEADER_V1) => 1,
        Some(HEADER_V2) => 2,
        _ => {
            return Err(ExternalError::MissingTag {
                tag: HEADER_V1.to_string(),
                line: 1,
            });
        }
    };

    lines.expect_tag("<TITLE>")?;
    let title = lines.value("title")?.to_string();
    lines.expect_tag("<AUTHOR>")?;
    let author = lines.value("author")?.to_string();
    lines.expect_tag("<COPYRIGHT>")?;
    let mut copyright = lines.value("copyright")?.to_string();
    if !copyright.is_empty() {
        copyright.insert_str(0, "© ");
    }

    lines.expect_tag("<SIZE>")?;
    let size = lines.value("size")?;
    let (width, height) = parse_size(&lines, size)?;
    let mut grid = Grid::new(width, height).map_err(|err| lines.error(err))?;

    let cells = read_grid(&mut lines, width, height)?;
    let rebus = if version == 2 {
        read_rebus(&mut lines)?
    } else {
        RebusTable::default()
    };
    fill_grid(&lines, &mut grid, &cells, &rebus)?;
    debug!(
        "txt v{version} {width}x{height}, {} rebus entries",
        rebus.entries.len()
    );

    let (across_count, down_count) = grid.count_clues();
    let across = read_clues(&mut lines, "<ACROSS>", across_count, Some("<DOWN>"))?;
    let down = read_clues(&mut lines, "<DOWN>", down_count, None)?;

    // Flat order: scan order, across before down.
    let (mut across, mut down) = (across.into_iter(), down.into_iter());
    let mut clues = Vec::with_capacity(across_count + down_count);
    for square in grid.squares() {
        if square.has_clue(Direction::Across) {
            clues.extend(across.next());
        }
        if square.has_clue(Direction::Down) {
            clues.extend(down.next());
        }
    }

    let mut puzzle = Puzzle::new(grid);
    puzzle.title = title;
    puzzle.author = author;
    puzzle.copyright = copyright;
    puzzle.set_clues(clues)?;

    while lines.peek() == Some("") {
        lines.next();
    }
    match lines.next() {
        None => {}
        Some("<NOTEPAD>") => puzzle.notes = lines.rest().join("\n"),
        Some(_) => return Err(lines.error("unrecognized line at end of file")),
    }
    Ok(puzzle)
}

fn cannot_hold(what: &str) -> ExternalError {
    ExternalError::Conversion(format!("text puzzles cannot hold {what}"))
}

/// Each field becomes one trimmed line on load, and clue lines cannot be empty.
fn check_line(what: &str, text: &str, allow_empty: bool) -> Result<()> {
    if text.contains(['\n', '\r']) {
        return Err(cannot_hold(&format!("a line break in the {what}")));
    }
    if text.trim() != text {
        return Err(cannot_hold(&format!("leading or trailing spaces in the {what}")));
    }
    if text.is_empty() && !allow_empty {
        return Err(cannot_hold(&format!("an empty {what}")));
    }
    Ok(())
}

fn check_saveable(puzzle: &Puzzle) -> Result<()> {
    let grid = &puzzle.grid;
    if grid.is_scrambled() {
        return Err(ExternalError::Conversion("puzzle is scrambled".into()));
    }
    let squares = grid.squares();
    if !grid.has_solution() || squares.iter().any(|s| s.is_white() && !s.has_solution()) {
        return Err(ExternalError::Conversion("puzzle has no solution".into()));
    }
    if grid.grid_type() != GridType::Normal || !grid.grid_flags().is_empty() {
        return Err(cannot_hold("special grid types"));
    }
    if squares.iter().any(|s| s.has_solution_rebus()) {
        return Err(cannot_hold("rebus squares"));
    }
    if squares.iter().any(|s| s.has_flag(SquareFlags::CIRCLED)) {
        return Err(cannot_hold("circled squares"));
    }
    if squares.iter().any(|s| s.is_white() && !s.flags().is_empty()) {
        return Err(cannot_hold("square markings"));
    }
    let marked_black = puzzle.format.decoded.iter().any(|section| {
        matches!(&section.name, b"GEXT" | b"CHKD") && section.data.iter().any(|byte| *byte != 0)
    });
    if marked_black {
        return Err(cannot_hold("square markings"));
    }
    if squares.iter().any(|s| !s.is_blank()) {
        return Err(cannot_hold("player entries"));
    }
    if puzzle.timer.is_some() {
        return Err(cannot_hold("a timer"));
    }
    if let Some(section) = puzzle.format.sections.first() {
        return Err(cannot_hold(&format!("the {} section", section.name_str())));
    }

    check_line("title", &puzzle.title, true)?;
    check_line("author", &puzzle.author, true)?;
    let copyright = puzzle
        .copyright
        .strip_prefix("© ")
        .unwrap_or(&puzzle.copyright);
    check_line("copyright", copyright, true)?;
    for clue in puzzle.clues() {
        check_line("clue", clue, false)?;
    }
    if puzzle.across().iter().any(|clue| clue.text == "<DOWN>") {
        return Err(cannot_hold("an across clue reading <DOWN>"));
    }
    if puzzle.notes.contains('\r') {
        return Err(cannot_hold("carriage returns in the notes"));
    }
    Ok(())
}

pub fn save(puzzle: &Puzzle) -> Result<Vec<u8>> {
    check_saveable(puzzle)?;
    let grid = &puzzle.grid;
    let copyright = puzzle
        .copyright
        .strip_prefix("© ")
        .unwrap_or(&puzzle.copyright);

    let mut out = String::new();
    let mut line = |text: &str| {
        out.push_str(text);
        out.push('\n');
    };
    line(HEADER_V1);
    line("<TITLE>");
    line(&puzzle.title);
    line("<AUTHOR>");
    line(&puzzle.author);
    line("<COPYRIGHT>");
    line(copyright);
    line("<SIZE>");
    line(&format!("{}x{}", grid.width(), grid.height()));
    line("<GRID>");
    for row in grid.squares().chunks(grid.width()) {
        let text: String = row
            .iter()
            .map(|square| {
                if square.is_black() {
                    '.'
                } else {
                    square.plain_solution().unwrap_or('?')
                }
            })
            .collect();
        line(&text);
    }
    line("<ACROSS>");
    for clue in puzzle.across() {
        line(&clue.text);
    }
    line("<DOWN>");
    for clue in puzzle.down() {
        line(&clue.text);
    }
    if !puzzle.notes.is_empty() {
        line("<NOTEPAD>");
        line(&puzzle.notes);
    }

    if fits_windows1252(&out) {
        Ok(TextEncoding::Windows1252.encode(&out)?)
    } else {
        Ok(out.into_bytes())
    }
}
