use proptest::prelude::*;
use xword_core::scramble::{scramble, scramble_string, unscramble, unscramble_string};
use xword_core::{Grid, PuzzleError, checksum_region};

fn key() -> impl Strategy<Value = u16> {
    1000u16..=9999
}

proptest! {
    #[test]
    fn unscramble_inverts_scramble(text in "[A-Z]{1,60}", key in key()) {
        let scrambled = scramble_string(&text, key).unwrap();
        prop_assert_eq!(scrambled.len(), text.len());
        prop_assert_eq!(unscramble_string(&scrambled, key).unwrap(), text);
    }

    #[test]
    fn grid_round_trip(rows in proptest::collection::vec("[A-Z]{4}", 4..7), key in key()) {
        let mut grid = Grid::from_rows(&rows).unwrap();
        let original = grid.clone();
        let reading: String = grid.iter_down()
            .map(|i| grid.square(i).unwrap().solution().to_string())
            .collect();
        prop_assume!(checksum_region(reading.as_bytes(), 0) != 0);

        prop_assert_eq!(scramble(&mut grid, Some(key)), Ok(key));
        prop_assert!(grid.is_scrambled());
        prop_assert!(unscramble(&mut grid, key));
        grid.set_key(None);
        prop_assert_eq!(grid, original);
    }
}

#[test]
fn test_rebus_survives_scramble() {
    let mut grid = Grid::from_rows(&["ABCD", "EFGH", "IJKL", "MNOP"]).unwrap();
    grid.set_solution(5, "FIVE").unwrap();

    scramble(&mut grid, Some(1234)).unwrap();
    let square = grid.square(5).unwrap();
    assert_eq!(square.solution(), "FIVE");
    assert_ne!(square.plain_solution(), Some('F'));

    assert!(unscramble(&mut grid, 1234));
    assert_eq!(grid.square(5).unwrap().plain_solution(), Some('F'));
}

#[test]
fn test_non_letter_solution_cannot_scramble() {
    let mut grid = Grid::from_rows(&["ABCD", "EF1H", "IJKL", "MNOP"]).unwrap();
    assert!(matches!(
        scramble(&mut grid, Some(1234)),
        Err(PuzzleError::InvalidString(_))
    ));
    assert!(!grid.is_scrambled());
}
