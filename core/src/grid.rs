use crate::square::{BLACK, ClueFlags, Square, SquareFlags};
use crate::{Direction, PuzzleError, Step};
use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Grid-level flags from the binary header. Unknown bits are retained.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GridFlags: u16 {
        const NO_SOLUTION = 0x0002;
        const SCRAMBLED = 0x0004;
    }
}

/// Largest width or height; the binary format stores each in one byte.
pub const MAX_SIZE: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GridType {
    #[default]
    Normal,
    Diagramless,
    Other(u16),
}

impl From<u16> for GridType {
    fn from(value: u16) -> Self {
        match value {
            0x0001 => GridType::Normal,
            0x0401 => GridType::Diagramless,
            other => GridType::Other(other),
        }
    }
}

impl From<GridType> for u16 {
    fn from(value: GridType) -> Self {
        match value {
            GridType::Normal => 0x0001,
            GridType::Diagramless => 0x0401,
            GridType::Other(other) => other,
        }
    }
}

/// Cross references of one square, all indices into the grid's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Links {
    next: [[Option<usize>; 2]; 2],
    is_last: [[bool; 2]; 2],
    word_start: [Option<usize>; 2],
    word_end: [Option<usize>; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Word {
    pub start: usize,
    pub end: usize,
    pub direction: Direction,
}

impl Word {
    pub fn squares<'a>(&self, grid: &'a Grid) -> WordSquares<'a> {
        WordSquares {
            grid,
            current: Some(self.start),
            end: self.end,
            direction: self.direction,
        }
    }
}

/// Squares of a word from start to end, following the grid links.
pub struct WordSquares<'a> {
    grid: &'a Grid,
    current: Option<usize>,
    end: usize,
    direction: Direction,
}

impl Iterator for WordSquares<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let current = self.current?;
        self.current = if current == self.end {
            None
        } else {
            self.grid.next(current, self.direction)
        };
        Some(current)
    }
}

/// Walks every square once in across or down order.
pub struct Traverse<'a> {
    grid: &'a Grid,
    current: Option<usize>,
    direction: Direction,
}

impl Iterator for Traverse<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let current = self.current?;
        self.current = self.grid.next(current, self.direction);
        Some(current)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindOptions {
    /// Never match black squares.
    pub skip_black: bool,
    /// Continue onto the next row/column instead of stopping at the edge.
    pub wrap_lines: bool,
    /// Test the starting square too.
    pub include_start: bool,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            skip_black: true,
            wrap_lines: true,
            include_start: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GridSnapshot", into = "GridSnapshot")]
pub struct Grid {
    width: usize,
    height: usize,
    squares: Vec<Square>,
    links: Vec<Links>,
    grid_type: GridType,
    flags: GridFlags,
    key: Option<u16>,
    cksum: u16,
}

impl Grid {
    /// A grid of black squares.
    pub fn new(width: usize, height: usize) -> Result<Self, PuzzleError> {
        let mut grid = Self {
            width: 0,
            height: 0,
            squares: Vec::new(),
            links: Vec::new(),
            grid_type: GridType::Normal,
            flags: GridFlags::empty(),
            key: None,
            cksum: 0,
        };
        grid.resize(width, height)?;
        Ok(grid)
    }

    /// Build a grid from solution rows, one character per square and `.` for black.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self, PuzzleError> {
        let height = rows.len();
        let width = rows.first().map(|row| row.as_ref().chars().count()).unwrap_or(0);
        let mut grid = Grid::new(width, height)?;
        let mut solutions = Vec::with_capacity(width * height);
        for (row, line) in rows.iter().enumerate() {
            let line = line.as_ref();
            if line.chars().count() != width {
                return Err(PuzzleError::InvalidGridCell {
                    row,
                    col: line.chars().count().min(width),
                    reason: format!("expected {width} squares in row"),
                });
            }
            solutions.extend(line.chars().map(|ch| ch.to_string()));
        }
        grid.set_solutions(solutions.iter().enumerate().map(|(i, s)| (i, s.as_str())))?;
        Ok(grid)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.squares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.squares.is_empty()
    }

    pub fn index(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.height && col < self.width).then(|| row * self.width + col)
    }

    pub fn position(&self, index: usize) -> (usize, usize) {
        (index / self.width, index % self.width)
    }

    pub fn square(&self, index: usize) -> Option<&Square> {
        self.squares.get(index)
    }

    pub fn at(&self, row: usize, col: usize) -> Option<&Square> {
        self.index(row, col).and_then(|index| self.square(index))
    }

    /// All squares in row-major (across) order.
    pub fn squares(&self) -> &[Square] {
        &self.squares
    }

    pub fn resize(&mut self, width: usize, height: usize) -> Result<(), PuzzleError> {
        if !(1..=MAX_SIZE).contains(&width) || !(1..=MAX_SIZE).contains(&height) {
            return Err(PuzzleError::InvalidGrid { width, height });
        }
        self.width = width;
        self.height = height;
        self.squares = (0..width * height)
            .map(|i| Square::new(i / width, i % width))
            .collect();
        self.rebuild_links();
        self.assign_numbers();
        Ok(())
    }

    /// Recompute the traversal links from the geometry.
    pub fn rebuild_links(&mut self) {
        let (w, h) = (self.width, self.height);
        let n = w * h;
        self.links = (0..n)
            .map(|i| {
                let (row, col) = (i / w, i % w);
                let mut links = Links::default();

                links.next[0][1] = (i + 1 < n).then_some(i + 1);
                links.next[0][0] = i.checked_sub(1);
                links.next[1][1] = if row + 1 < h {
                    Some(i + w)
                } else if col + 1 < w {
                    Some(col + 1)
                } else {
                    None
                };
                links.next[1][0] = if row > 0 {
                    Some(i - w)
                } else if col > 0 {
                    Some((h - 1) * w + col - 1)
                } else {
                    None
                };

                links.is_last[0][0] = col == 0;
                links.is_last[0][1] = col + 1 == w;
                links.is_last[1][0] = row == 0;
                links.is_last[1][1] = row + 1 == h;
                links
            })
            .collect();
    }

    /// Number the grid and recompute word bounds from the black/white pattern.
    pub fn assign_numbers(&mut self) {
        let mut number = 0u16;
        for i in 0..self.squares.len() {
            if self.squares[i].is_black() {
                self.squares[i].set_numbering(0, ClueFlags::empty());
                continue;
            }
            let mut clues = ClueFlags::empty();
            for direction in Direction::ALL {
                if self.starts_word(i, direction) {
                    clues |= ClueFlags::from(direction);
                }
            }
            if clues.is_empty() {
                self.squares[i].set_numbering(0, clues);
            } else {
                number += 1;
                self.squares[i].set_numbering(number, clues);
            }
        }

        for direction in Direction::ALL {
            let d = direction.index();
            for links in &mut self.links {
                links.word_start[d] = None;
                links.word_end[d] = None;
            }
            for i in 0..self.squares.len() {
                if !self.starts_word(i, direction) {
                    continue;
                }
                let mut end = i;
                while !self.is_last(end, direction, Step::Next) {
                    match self.next(end, direction) {
                        Some(next) if self.squares[next].is_white() => end = next,
                        _ => break,
                    }
                }
                let word = Word { start: i, end, direction };
                let members: Vec<usize> = word.squares(self).collect();
                for member in members {
                    self.links[member].word_start[d] = Some(i);
                    self.links[member].word_end[d] = Some(end);
                }
            }
        }
    }

    fn starts_word(&self, index: usize, direction: Direction) -> bool {
        let white = |i: Option<usize>| i.is_some_and(|i| self.squares[i].is_white());
        if !self.squares[index].is_white() {
            return false;
        }
        let prev_open = self.is_last(index, direction, Step::Prev)
            || !white(self.prev(index, direction));
        let next_white =
            !self.is_last(index, direction, Step::Next) && white(self.next(index, direction));
        prev_open && next_white
    }

    pub fn next(&self, index: usize, direction: Direction) -> Option<usize> {
        self.step(index, direction, Step::Next)
    }

    pub fn prev(&self, index: usize, direction: Direction) -> Option<usize> {
        self.step(index, direction, Step::Prev)
    }

    pub fn step(&self, index: usize, direction: Direction, step: Step) -> Option<usize> {
        self.links.get(index)?.next[direction.index()][step.index()]
    }

    /// Whether the square sits on the edge of its row/column in that direction.
    pub fn is_last(&self, index: usize, direction: Direction, step: Step) -> bool {
        self.links
            .get(index)
            .is_some_and(|links| links.is_last[direction.index()][step.index()])
    }

    pub fn first(&self) -> usize {
        0
    }

    pub fn last(&self) -> usize {
        self.squares.len().saturating_sub(1)
    }

    pub fn first_white(&self) -> Option<usize> {
        self.squares.iter().position(Square::is_white)
    }

    pub fn last_white(&self) -> Option<usize> {
        self.squares.iter().rposition(Square::is_white)
    }

    pub fn word_start(&self, index: usize, direction: Direction) -> Option<usize> {
        self.links.get(index)?.word_start[direction.index()]
    }

    pub fn word_end(&self, index: usize, direction: Direction) -> Option<usize> {
        self.links.get(index)?.word_end[direction.index()]
    }

    pub fn word(&self, index: usize, direction: Direction) -> Result<Word, PuzzleError> {
        match (self.word_start(index, direction), self.word_end(index, direction)) {
            (Some(start), Some(end)) => Ok(Word { start, end, direction }),
            _ => {
                let (row, col) = self.position(index);
                Err(PuzzleError::NoWord { row, col, direction })
            }
        }
    }

    /// Word text using the player's entries, `-` for blanks.
    pub fn word_text(&self, word: &Word) -> String {
        word.squares(self)
            .map(|i| match self.squares[i].text() {
                "" => "-",
                text => text,
            })
            .collect()
    }

    pub fn find<F>(
        &self,
        start: usize,
        direction: Direction,
        step: Step,
        options: FindOptions,
        predicate: F,
    ) -> Option<usize>
    where
        F: Fn(&Square) -> bool,
    {
        let matches = |i: usize| {
            let square = &self.squares[i];
            !(options.skip_black && square.is_black()) && predicate(square)
        };
        if start >= self.squares.len() {
            return None;
        }
        if options.include_start && matches(start) {
            return Some(start);
        }
        let mut current = start;
        loop {
            if !options.wrap_lines && self.is_last(current, direction, step) {
                return None;
            }
            current = self.step(current, direction, step)?;
            if matches(current) {
                return Some(current);
            }
        }
    }

    pub fn iter_across(&self) -> Traverse<'_> {
        self.traverse(Direction::Across)
    }

    pub fn iter_down(&self) -> Traverse<'_> {
        self.traverse(Direction::Down)
    }

    fn traverse(&self, direction: Direction) -> Traverse<'_> {
        Traverse {
            grid: self,
            current: (!self.squares.is_empty()).then_some(0),
            direction,
        }
    }

    pub fn check_square(&self, index: usize, allow_blank: bool) -> bool {
        self.squares
            .get(index)
            .is_some_and(|square| square.check(allow_blank))
    }

    /// Squares of the word that fail the check.
    pub fn check_word(&self, word: &Word, allow_blank: bool) -> Vec<usize> {
        word.squares(self)
            .filter(|i| !self.squares[*i].check(allow_blank))
            .collect()
    }

    pub fn check_grid(&self, allow_blank: bool) -> Vec<usize> {
        (0..self.squares.len())
            .filter(|i| !self.squares[*i].check(allow_blank))
            .collect()
    }

    /// Number of (across, down) clues the pattern calls for.
    pub fn count_clues(&self) -> (usize, usize) {
        self.squares.iter().fold((0, 0), |(across, down), square| {
            (
                across + square.has_clue(Direction::Across) as usize,
                down + square.has_clue(Direction::Down) as usize,
            )
        })
    }

    fn square_mut(&mut self, index: usize) -> Result<&mut Square, PuzzleError> {
        let width = self.width.max(1);
        self.squares
            .get_mut(index)
            .ok_or(PuzzleError::OutOfBounds {
                row: index / width,
                col: index % width,
            })
    }

    pub fn set_text(&mut self, index: usize, text: &str) -> Result<(), PuzzleError> {
        self.square_mut(index)?.set_text(text)
    }

    pub fn clear_text(&mut self) {
        for square in &mut self.squares {
            // Only fails for text on black squares.
            let _ = square.set_text("");
        }
    }

    pub fn set_flag(&mut self, index: usize, flags: SquareFlags) -> Result<(), PuzzleError> {
        self.square_mut(index)?.set_flags(flags);
        Ok(())
    }

    pub fn add_flag(&mut self, index: usize, flag: SquareFlags) -> Result<(), PuzzleError> {
        let square = self.square_mut(index)?;
        let flags = square.flags() | flag;
        square.set_flags(flags);
        Ok(())
    }

    pub fn remove_flag(&mut self, index: usize, flag: SquareFlags) -> Result<(), PuzzleError> {
        let square = self.square_mut(index)?;
        let flags = square.flags() - flag;
        square.set_flags(flags);
        Ok(())
    }

    pub fn toggle_flag(&mut self, index: usize, flag: SquareFlags) -> Result<(), PuzzleError> {
        let square = self.square_mut(index)?;
        let flags = square.flags() ^ flag;
        square.set_flags(flags);
        Ok(())
    }

    /// Set one solution; a change between black and white renumbers the grid.
    pub fn set_solution(&mut self, index: usize, solution: &str) -> Result<(), PuzzleError> {
        if self.square_mut(index)?.set_solution(solution)? {
            self.assign_numbers();
        }
        Ok(())
    }

    /// A rebus solution whose plain character is stored separately.
    pub fn set_rebus_solution(
        &mut self,
        index: usize,
        solution: &str,
        plain: char,
    ) -> Result<(), PuzzleError> {
        if self.square_mut(index)?.set_solution_with_plain(solution, plain)? {
            self.assign_numbers();
        }
        Ok(())
    }

    /// Set many solutions and renumber once.
    pub fn set_solutions<'a, I>(&mut self, solutions: I) -> Result<(), PuzzleError>
    where
        I: IntoIterator<Item = (usize, &'a str)>,
    {
        let mut changed = false;
        let mut result = Ok(());
        for (index, solution) in solutions {
            match self
                .square_mut(index)
                .and_then(|square| square.set_solution(solution))
            {
                Ok(pattern_changed) => changed |= pattern_changed,
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        if changed {
            self.assign_numbers();
        }
        result
    }

    pub(crate) fn set_plain_solution(&mut self, index: usize, plain: char) {
        if let Some(square) = self.squares.get_mut(index) {
            square.set_plain_solution(plain);
        }
    }

    pub fn grid_type(&self) -> GridType {
        self.grid_type
    }

    pub fn set_grid_type(&mut self, grid_type: GridType) {
        self.grid_type = grid_type;
    }

    pub fn grid_flags(&self) -> GridFlags {
        self.flags
    }

    pub fn set_grid_flags(&mut self, flags: GridFlags) {
        self.flags = flags;
    }

    pub fn is_diagramless(&self) -> bool {
        self.grid_type == GridType::Diagramless
    }

    pub fn is_scrambled(&self) -> bool {
        self.flags.contains(GridFlags::SCRAMBLED)
    }

    pub fn has_solution(&self) -> bool {
        !self.flags.contains(GridFlags::NO_SOLUTION)
    }

    pub fn key(&self) -> Option<u16> {
        self.key
    }

    pub fn set_key(&mut self, key: Option<u16>) {
        self.key = key;
    }

    /// Checksum of the unscrambled down reading, 0 when not scrambled.
    pub fn cksum(&self) -> u16 {
        self.cksum
    }

    pub fn set_cksum(&mut self, cksum: u16) {
        self.cksum = cksum;
    }
}

/// Serialized form of a grid; links are rebuilt when it is read back.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GridSnapshot {
    width: usize,
    height: usize,
    grid_type: u16,
    flags: u16,
    key: Option<u16>,
    cksum: u16,
    squares: Vec<Square>,
}

impl From<Grid> for GridSnapshot {
    fn from(grid: Grid) -> Self {
        Self {
            width: grid.width,
            height: grid.height,
            grid_type: grid.grid_type.into(),
            flags: grid.flags.bits(),
            key: grid.key,
            cksum: grid.cksum,
            squares: grid.squares,
        }
    }
}

impl TryFrom<GridSnapshot> for Grid {
    type Error = PuzzleError;

    fn try_from(snapshot: GridSnapshot) -> Result<Self, Self::Error> {
        let mut grid = Grid::new(snapshot.width, snapshot.height)?;
        if snapshot.squares.len() != grid.squares.len() {
            return Err(PuzzleError::InvalidGrid {
                width: snapshot.width,
                height: snapshot.height,
            });
        }
        for (i, stored) in snapshot.squares.iter().enumerate() {
            if (stored.row(), stored.col()) != grid.position(i) {
                return Err(PuzzleError::InvalidGridCell {
                    row: stored.row(),
                    col: stored.col(),
                    reason: format!("stored at index {i}"),
                });
            }
            restore_square(&mut grid.squares[i], stored)?;
        }
        grid.grid_type = snapshot.grid_type.into();
        grid.flags = GridFlags::from_bits_retain(snapshot.flags);
        grid.key = snapshot.key;
        grid.cksum = snapshot.cksum;
        grid.assign_numbers();
        Ok(grid)
    }
}

/// Replay a deserialized square through the setters so the usual
/// invariants hold for it.
fn restore_square(square: &mut Square, stored: &Square) -> Result<(), PuzzleError> {
    let invalid = |reason: &str| PuzzleError::InvalidGridCell {
        row: stored.row(),
        col: stored.col(),
        reason: reason.to_string(),
    };
    if stored.is_black() != (stored.solution() == BLACK) {
        return Err(invalid("black flag disagrees with the solution"));
    }
    if stored.has_solution_rebus() {
        let plain = stored
            .plain_solution()
            .ok_or_else(|| invalid("rebus without a plain solution"))?;
        square.set_solution_with_plain(stored.solution(), plain)?;
    } else {
        square.set_solution(stored.solution())?;
    }
    if square.plain_solution() != stored.plain_solution() {
        return Err(invalid("plain solution disagrees with the solution"));
    }
    if stored.is_black() && stored.flags() != SquareFlags::BLACK {
        return Err(invalid("black squares carry no flags"));
    }
    square.set_text(stored.text())?;
    square.set_flags(stored.flags());
    Ok(())
}
