//! Keyed scrambling of a grid's solution.
//!
//! The solution is read in down order (white squares only), shifted and
//! shuffled once per key digit, and written back in the same order. Only the
//! plain character of each square changes, so rebus solutions survive.

use crate::checksum::checksum_region;
use crate::grid::GridFlags;
use crate::{Grid, PuzzleError};

/// Shortest down reading that can be scrambled.
pub const MIN_SCRAMBLE_LEN: usize = 12;

type Key = [u8; 4];

fn key_digits(key: u16) -> Result<Key, PuzzleError> {
    if !(1000..=9999).contains(&key) {
        return Err(PuzzleError::InvalidKey(key));
    }
    Ok([
        (key / 1000) as u8,
        (key / 100 % 10) as u8,
        (key / 10 % 10) as u8,
        (key % 10) as u8,
    ])
}

/// Random key with every digit in 1..=9.
pub fn random_key() -> u16 {
    (0..4).fold(0u16, |key, _| key * 10 + fastrand::u16(1..=9))
}

/// Plain solution characters of the white squares in down order.
pub fn down_reading(grid: &Grid) -> String {
    grid.iter_down()
        .filter_map(|i| grid.square(i))
        .filter(|square| square.is_white())
        .map(|square| square.plain_solution().unwrap_or('-'))
        .collect()
}

fn user_down_reading(grid: &Grid) -> Option<String> {
    grid.iter_down()
        .filter_map(|i| grid.square(i))
        .filter(|square| square.is_white())
        .map(|square| square.plain_text())
        .collect()
}

fn write_down_reading(grid: &mut Grid, reading: &[u8]) {
    let whites: Vec<usize> = grid
        .iter_down()
        .filter(|i| grid.square(*i).is_some_and(|square| square.is_white()))
        .collect();
    for (index, byte) in whites.into_iter().zip(reading) {
        grid.set_plain_solution(index, char::from(*byte));
    }
}

fn is_uppercase_letters(text: &str) -> bool {
    text.bytes().all(|b| b.is_ascii_uppercase())
}

/// Source position for each output position of one round's shuffle.
fn permutation(len: usize, rotation: usize) -> Vec<usize> {
    let mid = len / 2;
    (0..len)
        .map(|o| {
            let source = if o % 2 == 0 { mid + o / 2 } else { o / 2 };
            (source + rotation) % len
        })
        .collect()
}

fn shift(letters: &mut [u8], key: &Key, forward: bool) {
    for (j, letter) in letters.iter_mut().enumerate() {
        let offset = key[j % 4];
        let value = letter.wrapping_sub(b'A');
        let shifted = if forward {
            (value + offset) % 26
        } else {
            (value + 26 - offset) % 26
        };
        *letter = b'A' + shifted;
    }
}

fn scramble_bytes(reading: &[u8], key: &Key) -> Vec<u8> {
    let mut letters = reading.to_vec();
    for digit in key {
        shift(&mut letters, key, true);
        let perm = permutation(letters.len(), usize::from(*digit));
        letters = perm.iter().map(|source| letters[*source]).collect();
    }
    letters
}

fn unscramble_bytes(reading: &[u8], key: &Key) -> Vec<u8> {
    let mut letters = reading.to_vec();
    for digit in key.iter().rev() {
        let perm = permutation(letters.len(), usize::from(*digit));
        let mut restored = vec![0u8; letters.len()];
        for (output, source) in perm.iter().enumerate() {
            restored[*source] = letters[output];
        }
        letters = restored;
        shift(&mut letters, key, false);
    }
    letters
}

/// Scramble an uppercase string with a four digit key.
pub fn scramble_string(text: &str, key: u16) -> Result<String, PuzzleError> {
    let digits = key_digits(key)?;
    if !is_uppercase_letters(text) {
        return Err(PuzzleError::InvalidString(text.to_string()));
    }
    Ok(String::from_utf8_lossy(&scramble_bytes(text.as_bytes(), &digits)).into_owned())
}

pub fn unscramble_string(text: &str, key: u16) -> Result<String, PuzzleError> {
    let digits = key_digits(key)?;
    if !is_uppercase_letters(text) {
        return Err(PuzzleError::InvalidString(text.to_string()));
    }
    Ok(String::from_utf8_lossy(&unscramble_bytes(text.as_bytes(), &digits)).into_owned())
}

/// Scramble the grid's solution, returning the key used.
///
/// Without a key the grid's recorded key is reused, or a random one drawn.
pub fn scramble(grid: &mut Grid, key: Option<u16>) -> Result<u16, PuzzleError> {
    if grid.is_scrambled() {
        return Err(PuzzleError::CannotScramble("grid is already scrambled".into()));
    }
    if !grid.has_solution() {
        return Err(PuzzleError::CannotScramble("grid has no solution".into()));
    }
    let key = key.or(grid.key()).unwrap_or_else(random_key);
    let digits = key_digits(key)?;

    let reading = down_reading(grid);
    if !is_uppercase_letters(&reading) {
        return Err(PuzzleError::InvalidString(reading));
    }
    if reading.len() < MIN_SCRAMBLE_LEN {
        return Err(PuzzleError::CannotScramble(format!(
            "{} letters, need at least {MIN_SCRAMBLE_LEN}",
            reading.len()
        )));
    }
    let cksum = checksum_region(reading.as_bytes(), 0);
    if cksum == 0 {
        return Err(PuzzleError::CannotScramble("solution checksum is zero".into()));
    }

    let scrambled = scramble_bytes(reading.as_bytes(), &digits);
    write_down_reading(grid, &scrambled);
    grid.set_grid_flags(grid.grid_flags() | GridFlags::SCRAMBLED);
    grid.set_key(Some(key));
    grid.set_cksum(cksum);
    log::debug!("scrambled {} squares with key {key}", reading.len());
    Ok(key)
}

/// Undo [`scramble`]. Leaves the grid untouched and returns false for a wrong key.
pub fn unscramble(grid: &mut Grid, key: u16) -> bool {
    if !grid.is_scrambled() {
        return false;
    }
    let Ok(digits) = key_digits(key) else {
        return false;
    };
    let reading = down_reading(grid);
    if !is_uppercase_letters(&reading) {
        return false;
    }
    let restored = unscramble_bytes(reading.as_bytes(), &digits);
    if checksum_region(&restored, 0) != grid.cksum() {
        log::debug!("key {key} does not unscramble the solution");
        return false;
    }
    write_down_reading(grid, &restored);
    grid.set_grid_flags(grid.grid_flags() - GridFlags::SCRAMBLED);
    grid.set_key(Some(key));
    grid.set_cksum(0);
    true
}

/// Check a filled grid against the recorded checksum of a scrambled solution.
pub fn check_user_grid(grid: &Grid) -> bool {
    match user_down_reading(grid) {
        Some(reading) if is_uppercase_letters(&reading) => {
            checksum_region(reading.as_bytes(), 0) == grid.cksum()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_by_four() -> Grid {
        Grid::from_rows(&["ABCD", "EFGH", "IJKL", "MNOP"]).unwrap()
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(
            scramble_string("AEIMBFJNCGKODHLP", 1234).unwrap(),
            "TNLXWOOALOVYNVZJ"
        );
        assert_eq!(scramble_string("CROSSWORDPUZZ", 9876).unwrap(), "AGXYTZTSCTVDL");
        assert_eq!(unscramble_string("AGXYTZTSCTVDL", 9876).unwrap(), "CROSSWORDPUZZ");
    }

    #[test]
    fn test_invalid_key() {
        assert!(matches!(
            scramble_string("ABC", 999),
            Err(PuzzleError::InvalidKey(999))
        ));
        assert!(matches!(
            scramble_string("AB1", 1234),
            Err(PuzzleError::InvalidString(_))
        ));
    }

    #[test]
    fn test_scramble_grid() {
        let mut grid = four_by_four();
        assert_eq!(down_reading(&grid), "AEIMBFJNCGKODHLP");

        let key = scramble(&mut grid, Some(1234)).unwrap();
        assert_eq!(key, 1234);
        assert!(grid.is_scrambled());
        assert_eq!(grid.cksum(), 0x7);
        let rows: Vec<String> = (0..4)
            .map(|r| {
                (0..4)
                    .map(|c| grid.at(r, c).unwrap().solution().to_string())
                    .collect()
            })
            .collect();
        assert_eq!(rows, vec!["TWLN", "NOOV", "LOVZ", "XAYJ"]);

        assert!(!unscramble(&mut grid, 4321));
        assert!(grid.is_scrambled());
        assert!(unscramble(&mut grid, 1234));
        assert_eq!(grid, {
            let mut expected = four_by_four();
            expected.set_key(Some(1234));
            expected
        });
    }

    #[test]
    fn test_too_short() {
        let mut grid = Grid::from_rows(&["CAT", "A.O", "BOW"]).unwrap();
        assert!(matches!(
            scramble(&mut grid, Some(1234)),
            Err(PuzzleError::CannotScramble(_))
        ));
        assert!(!grid.is_scrambled());
    }

    #[test]
    fn test_random_key_digits() {
        for _ in 0..50 {
            let key = random_key();
            assert!((1111..=9999).contains(&key));
            assert!(!key.to_string().contains('0'));
        }
    }

    #[test]
    fn test_check_user_grid() {
        let mut grid = four_by_four();
        scramble(&mut grid, Some(1234)).unwrap();
        assert!(!check_user_grid(&grid));
        for (i, letter) in "ABCDEFGHIJKLMNOP".chars().enumerate() {
            grid.set_text(i, &letter.to_string()).unwrap();
        }
        assert!(check_user_grid(&grid));
        grid.set_text(5, "Z").unwrap();
        assert!(!check_user_grid(&grid));
    }
}
