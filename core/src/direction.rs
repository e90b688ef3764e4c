use crate::PuzzleError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Across,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Across, Direction::Down];

    pub fn swap(self) -> Self {
        match self {
            Direction::Across => Direction::Down,
            Direction::Down => Direction::Across,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Direction::Across => 0,
            Direction::Down => 1,
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = PuzzleError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Direction::Across),
            1 => Ok(Direction::Down),
            other => Err(PuzzleError::InvalidDirection(other.to_string())),
        }
    }
}

impl FromStr for Direction {
    type Err = PuzzleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "across" | "a" => Ok(Direction::Across),
            "down" | "d" => Ok(Direction::Down),
            _ => Err(PuzzleError::InvalidDirection(s.to_string())),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Across => write!(f, "Across"),
            Direction::Down => write!(f, "Down"),
        }
    }
}

/// Which way to move along a traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    Prev,
    Next,
}

impl Step {
    pub fn reverse(self) -> Self {
        match self {
            Step::Prev => Step::Next,
            Step::Next => Step::Prev,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Step::Prev => 0,
            Step::Next => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_direction() {
        assert_eq!("across".parse::<Direction>().unwrap(), Direction::Across);
        assert_eq!("D".parse::<Direction>().unwrap(), Direction::Down);
        assert!(matches!(
            "diagonal".parse::<Direction>(),
            Err(PuzzleError::InvalidDirection(_))
        ));
    }

    #[test]
    fn test_direction_from_u8() {
        assert_eq!(Direction::try_from(1).unwrap(), Direction::Down);
        assert!(Direction::try_from(2).is_err());
    }

    #[test]
    fn test_swap_and_reverse() {
        assert_eq!(Direction::Across.swap(), Direction::Down);
        assert_eq!(Direction::Down.swap().swap(), Direction::Down);
        assert_eq!(Step::Next.reverse(), Step::Prev);
        assert_eq!(Step::Prev.reverse(), Step::Next);
    }
}
