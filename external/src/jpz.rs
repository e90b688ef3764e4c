//! Crossword Compiler XML (`.jpz`).
//!
//! Only uncompressed files are read. Cells missing from the grid are black,
//! and clue text is taken as plain text.

use crate::error::{ExternalError, Result};
use log::debug;
use quick_xml::de::from_str;
use serde::Deserialize;
use xword_core::text::decode_guess;
use xword_core::{Clue, Direction, Grid, GridFlags, Puzzle, SquareFlags, Timer};

pub fn load(bytes: &[u8]) -> Result<Puzzle> {
    let text = decode_guess(bytes);
    let text = text.trim_start_matches('\u{feff}');
    if !text.contains("<crossword-compiler") {
        return Err(ExternalError::FileType("jpz"));
    }
    let applet: Applet =
        from_str(text).map_err(|err| ExternalError::malformed(format!("bad jpz: {err}")))?;
    let RectangularPuzzle {
        metadata,
        instructions,
        crossword,
    } = applet.puzzle;

    let grid = read_grid(&crossword.grid)?;
    let (across, down) = read_clues(&crossword.clues)?;
    debug!(
        "jpz {}x{}, {} across and {} down clues",
        grid.width(),
        grid.height(),
        across.len(),
        down.len()
    );

    let mut puzzle = Puzzle::new(grid);
    let field = |value: Option<String>| value.map(|v| v.trim().to_string()).unwrap_or_default();
    puzzle.title = field(metadata.title);
    puzzle.author = field(metadata.creator);
    puzzle.copyright = field(metadata.copyright);
    puzzle.notes = field(instructions);
    puzzle.set_clues_by_direction(across, down)?;

    if let Some(timer) = applet.settings.and_then(|settings| settings.timer) {
        let running = timer.start_on_load.as_deref() == Some("true");
        if timer.initial_value > 0 || running {
            puzzle.timer = Some(Timer {
                seconds: timer.initial_value,
                paused: !running,
            });
        }
    }
    Ok(puzzle)
}

fn cell_index(grid: &Grid, cell: &XmlCell) -> Result<usize> {
    if cell.x.contains('-') || cell.y.contains('-') {
        return Err(ExternalError::malformed("spanned cells are not supported"));
    }
    let coordinate = |value: &str| value.trim().parse::<usize>().ok().filter(|v| *v >= 1);
    let (Some(x), Some(y)) = (coordinate(&cell.x), coordinate(&cell.y)) else {
        return Err(ExternalError::malformed(format!(
            "bad cell position ({}, {})",
            cell.x, cell.y
        )));
    };
    grid.index(y - 1, x - 1)
        .ok_or_else(|| ExternalError::malformed(format!("cell ({x}, {y}) is out of range")))
}

fn read_grid(xml: &XmlGrid) -> Result<Grid> {
    let mut grid = Grid::new(xml.width, xml.height)?;
    let mut solutions = vec![String::from("."); grid.len()];
    let mut letters = Vec::new();
    for cell in &xml.cells {
        let index = cell_index(&grid, cell)?;
        match cell.kind.as_deref() {
            Some("block" | "void") => {}
            Some("clue") => {
                return Err(ExternalError::malformed(
                    "clues inside squares are not supported",
                ));
            }
            _ => {
                if let Some(slot) = solutions.get_mut(index) {
                    *slot = cell.solution.clone().unwrap_or_default();
                }
                letters.push((index, cell));
            }
        }
    }
    grid.set_solutions(solutions.iter().enumerate().map(|(i, s)| (i, s.as_str())))?;
    if letters.iter().any(|(index, _)| {
        grid.square(*index)
            .is_some_and(|square| !square.has_solution())
    }) {
        grid.set_grid_flags(grid.grid_flags() | GridFlags::NO_SOLUTION);
    }

    for (index, cell) in letters {
        let status = cell.solve_status.as_deref();
        let revealed = status == Some("revealed") || cell.hint.as_deref() == Some("true");
        let text = if revealed {
            cell.solution.as_deref().unwrap_or_default()
        } else {
            cell.solve_state.as_deref().unwrap_or_default()
        };
        grid.set_text(index, text)?;

        let mut flags = SquareFlags::empty();
        if cell.background_shape.as_deref() == Some("circle") {
            flags |= SquareFlags::CIRCLED;
        }
        if status == Some("revealed") {
            flags |= SquareFlags::REVEALED;
        }
        if status == Some("pencil") {
            flags |= SquareFlags::PENCIL;
        }
        grid.add_flag(index, flags)?;
    }
    Ok(grid)
}

/// The list title names the direction; untitled lists are across, then down.
fn list_direction(list: &ClueList, position: usize) -> Result<Direction> {
    let title = list
        .title
        .as_ref()
        .map(|title| {
            [&title.bold, &title.text]
                .into_iter()
                .flatten()
                .map(|part| part.to_lowercase())
                .collect::<String>()
        })
        .unwrap_or_default();
    if title.contains("across") {
        return Ok(Direction::Across);
    }
    if title.contains("down") {
        return Ok(Direction::Down);
    }
    u8::try_from(position)
        .ok()
        .and_then(|position| Direction::try_from(position).ok())
        .ok_or_else(|| ExternalError::malformed(format!("unexpected clue list {title:?}")))
}

fn read_clues(lists: &[ClueList]) -> Result<(Vec<Clue>, Vec<Clue>)> {
    let (mut across, mut down) = (Vec::new(), Vec::new());
    for (position, list) in lists.iter().enumerate() {
        let target = match list_direction(list, position)? {
            Direction::Across => &mut across,
            Direction::Down => &mut down,
        };
        for item in &list.clues {
            let number = item.number.trim().parse::<u16>().map_err(|_| {
                ExternalError::malformed(format!("bad clue number {:?}", item.number))
            })?;
            let mut text = item.text.as_deref().unwrap_or_default().trim().to_string();
            if let Some(format) = item.format.as_deref().filter(|format| !format.is_empty()) {
                text = format!("{text} ({format})");
            }
            target.push(Clue::new(number, text));
        }
    }
    Ok((across, down))
}

// `crossword-compiler-applet` and `crossword-compiler` share this layout.
#[derive(Debug, Deserialize)]
struct Applet {
    #[serde(rename = "applet-settings")]
    settings: Option<Settings>,
    #[serde(rename = "rectangular-puzzle")]
    puzzle: RectangularPuzzle,
}

#[derive(Debug, Deserialize)]
struct Settings {
    timer: Option<TimerSettings>,
}

#[derive(Debug, Deserialize)]
struct TimerSettings {
    #[serde(rename = "@initial-value", default)]
    initial_value: u32,
    #[serde(rename = "@start-on-load")]
    start_on_load: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RectangularPuzzle {
    #[serde(default)]
    metadata: Metadata,
    instructions: Option<String>,
    crossword: Crossword,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    title: Option<String>,
    creator: Option<String>,
    copyright: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Crossword {
    grid: XmlGrid,
    #[serde(default)]
    clues: Vec<ClueList>,
}

#[derive(Debug, Deserialize)]
struct XmlGrid {
    #[serde(rename = "@width")]
    width: usize,
    #[serde(rename = "@height")]
    height: usize,
    #[serde(rename = "cell", default)]
    cells: Vec<XmlCell>,
}

#[derive(Debug, Deserialize)]
struct XmlCell {
    #[serde(rename = "@x")]
    x: String,
    #[serde(rename = "@y")]
    y: String,
    #[serde(rename = "@type")]
    kind: Option<String>,
    #[serde(rename = "@solution")]
    solution: Option<String>,
    #[serde(rename = "@solve-state")]
    solve_state: Option<String>,
    #[serde(rename = "@solve-status")]
    solve_status: Option<String>,
    #[serde(rename = "@background-shape")]
    background_shape: Option<String>,
    #[serde(rename = "@hint")]
    hint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClueList {
    title: Option<ListTitle>,
    #[serde(rename = "clue", default)]
    clues: Vec<ClueItem>,
}

#[derive(Debug, Deserialize)]
struct ListTitle {
    #[serde(rename = "b")]
    bold: Option<String>,
    #[serde(rename = "$text")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClueItem {
    #[serde(rename = "@number")]
    number: String,
    #[serde(rename = "@format")]
    format: Option<String>,
    #[serde(rename = "$text")]
    text: Option<String>,
}
