use crate::{Direction, PuzzleError};
use serde::{Deserialize, Serialize};

/// Solution marker for black squares.
pub const BLACK: &str = ".";

bitflags::bitflags! {
    /// Per-square state. The low byte matches the binary format's GEXT byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct SquareFlags: u16 {
        const PENCIL = 0x0008;
        const PREVIOUSLY_INCORRECT = 0x0010;
        const INCORRECT = 0x0020;
        const REVEALED = 0x0040;
        const CIRCLED = 0x0080;
        const BLACK = 0x0100;
        /// Checked by the player and found correct.
        const MARKED = 0x0200;
    }
}

impl SquareFlags {
    pub const GEXT_MASK: u16 = 0x00ff;

    pub fn gext_byte(self) -> u8 {
        (self.bits() & Self::GEXT_MASK) as u8
    }
}

bitflags::bitflags! {
    /// Which directions a numbered square starts a clue in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ClueFlags: u8 {
        const ACROSS = 0x01;
        const DOWN = 0x02;
    }
}

impl From<Direction> for ClueFlags {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Across => ClueFlags::ACROSS,
            Direction::Down => ClueFlags::DOWN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Square {
    row: usize,
    col: usize,
    solution: String,
    plain_solution: Option<char>,
    text: String,
    flags: SquareFlags,
    number: u16,
    clues: ClueFlags,
}

impl Square {
    pub(crate) fn new(row: usize, col: usize) -> Self {
        Self {
            row,
            col,
            solution: BLACK.to_string(),
            plain_solution: Some('.'),
            text: String::new(),
            flags: SquareFlags::BLACK,
            number: 0,
            clues: ClueFlags::empty(),
        }
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn col(&self) -> usize {
        self.col
    }

    pub fn is_black(&self) -> bool {
        self.flags.contains(SquareFlags::BLACK)
    }

    pub fn is_white(&self) -> bool {
        !self.is_black()
    }

    /// Full solution, possibly a rebus. Empty when the solution is unknown.
    pub fn solution(&self) -> &str {
        &self.solution
    }

    pub fn plain_solution(&self) -> Option<char> {
        self.plain_solution
    }

    pub fn has_solution(&self) -> bool {
        !self.solution.is_empty()
    }

    pub fn has_solution_rebus(&self) -> bool {
        self.is_white() && self.solution.chars().count() > 1
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn plain_text(&self) -> Option<char> {
        self.text.chars().next().map(fold_char)
    }

    pub fn has_text_rebus(&self) -> bool {
        self.text.chars().count() > 1
    }

    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }

    pub fn flags(&self) -> SquareFlags {
        self.flags
    }

    pub fn has_flag(&self, flag: SquareFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn number(&self) -> u16 {
        self.number
    }

    pub fn clue_flags(&self) -> ClueFlags {
        self.clues
    }

    pub fn has_clue(&self, direction: Direction) -> bool {
        self.clues.contains(direction.into())
    }

    /// Black squares always pass; blank squares pass unless `allow_blank` is false.
    pub fn check(&self, allow_blank: bool) -> bool {
        if self.is_black() {
            return true;
        }
        if self.is_blank() {
            return allow_blank;
        }
        if self.has_text_rebus() {
            return self.text == self.solution;
        }
        self.plain_text() == self.plain_solution
    }

    /// Returns true when the black/white pattern changed.
    pub(crate) fn set_solution(&mut self, solution: &str) -> Result<bool, PuzzleError> {
        let was_black = self.is_black();
        if solution == BLACK {
            self.make_black();
        } else {
            let normalized = normalize_entry(solution)?;
            self.plain_solution = normalized.chars().next().map(fold_char);
            self.solution = normalized;
            self.flags.remove(SquareFlags::BLACK);
        }
        Ok(was_black != self.is_black())
    }

    /// Keep a rebus solution but replace its plain character.
    pub(crate) fn set_solution_with_plain(
        &mut self,
        solution: &str,
        plain: char,
    ) -> Result<bool, PuzzleError> {
        let changed = self.set_solution(solution)?;
        if self.is_white() {
            let plain = normalize_entry(&plain.to_string())?;
            self.plain_solution = plain.chars().next();
        }
        Ok(changed)
    }

    /// Replace the plain character only; a single-character solution follows it.
    pub(crate) fn set_plain_solution(&mut self, plain: char) {
        if self.is_black() {
            return;
        }
        if !self.has_solution_rebus() {
            self.solution = plain.to_string();
        }
        self.plain_solution = Some(plain);
    }

    pub(crate) fn set_text(&mut self, text: &str) -> Result<(), PuzzleError> {
        if self.is_black() {
            if text.is_empty() {
                return Ok(());
            }
            return Err(self.black_error("black squares take no text"));
        }
        self.text = normalize_entry(text)?;
        Ok(())
    }

    pub(crate) fn set_flags(&mut self, flags: SquareFlags) {
        if self.is_black() {
            return;
        }
        self.flags = flags - SquareFlags::BLACK;
    }

    pub(crate) fn set_numbering(&mut self, number: u16, clues: ClueFlags) {
        self.number = number;
        self.clues = clues;
    }

    fn make_black(&mut self) {
        self.solution = BLACK.to_string();
        self.plain_solution = Some('.');
        self.text.clear();
        self.flags = SquareFlags::BLACK;
        self.number = 0;
        self.clues = ClueFlags::empty();
    }

    fn black_error(&self, reason: &str) -> PuzzleError {
        PuzzleError::InvalidGridCell {
            row: self.row,
            col: self.col,
            reason: reason.to_string(),
        }
    }
}

const SYMBOLS: &[char] = &['@', '#', '$', '%', '&', '+', '?'];

/// Characters a solution or entry may contain.
pub fn is_valid_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || SYMBOLS.contains(&ch) || (!ch.is_ascii() && ch.is_alphabetic())
}

/// Uppercase an entry and reject characters outside the allowed set.
pub fn normalize_entry(entry: &str) -> Result<String, PuzzleError> {
    if let Some(bad) = entry.chars().find(|ch| !is_valid_char(*ch)) {
        log::debug!("rejecting entry {entry:?}: {bad:?}");
        return Err(PuzzleError::InvalidString(entry.to_string()));
    }
    Ok(entry.to_uppercase())
}

/// Fold a character to the single-byte form stored in binary grids.
pub fn fold_char(ch: char) -> char {
    if ch.is_ascii() {
        return ch.to_ascii_uppercase();
    }
    let upper = ch.to_uppercase().next().unwrap_or(ch);
    if upper.is_ascii() {
        return upper;
    }
    match upper {
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Æ' => 'A',
        'Ç' => 'C',
        'È' | 'É' | 'Ê' | 'Ë' => 'E',
        'Ì' | 'Í' | 'Î' | 'Ï' => 'I',
        'Ð' => 'D',
        'Ñ' => 'N',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'Œ' => 'O',
        'Š' => 'S',
        'Ù' | 'Ú' | 'Û' | 'Ü' => 'U',
        'Ý' | 'Ÿ' => 'Y',
        'Ž' => 'Z',
        _ => '?',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_square_is_black() {
        let square = Square::new(1, 2);
        assert!(square.is_black());
        assert_eq!(square.solution(), BLACK);
        assert_eq!(square.number(), 0);
    }

    #[test]
    fn test_rebus_solution_folds_plain() {
        let mut square = Square::new(0, 0);
        assert!(square.set_solution("heart").unwrap());
        assert_eq!(square.solution(), "HEART");
        assert_eq!(square.plain_solution(), Some('H'));
        assert!(square.has_solution_rebus());

        square.set_solution("É").unwrap();
        assert_eq!(square.plain_solution(), Some('E'));
    }

    #[test]
    fn test_check_entries() {
        let mut square = Square::new(0, 0);
        square.set_solution("A").unwrap();
        assert!(square.check(true));
        assert!(!square.check(false));

        square.set_text("a").unwrap();
        assert!(square.check(false));
        square.set_text("B").unwrap();
        assert!(!square.check(true));

        square.set_solution("HEART").unwrap();
        square.set_text("H").unwrap();
        assert!(square.check(true));
        square.set_text("HEARS").unwrap();
        assert!(!square.check(true));
        square.set_text("HEART").unwrap();
        assert!(square.check(true));
    }

    #[test]
    fn test_black_square_rejects_text() {
        let mut square = Square::new(3, 4);
        assert!(matches!(
            square.set_text("A"),
            Err(PuzzleError::InvalidGridCell { row: 3, col: 4, .. })
        ));
        assert!(square.set_text("").is_ok());
    }

    #[test]
    fn test_invalid_characters() {
        assert!(normalize_entry("AB*").is_err());
        assert!(normalize_entry("A B").is_err());
        assert_eq!(normalize_entry("a1@").unwrap(), "A1@");
    }

    #[test]
    fn test_gext_byte() {
        let flags = SquareFlags::CIRCLED | SquareFlags::MARKED | SquareFlags::PENCIL;
        assert_eq!(flags.gext_byte(), 0x88);
    }
}
