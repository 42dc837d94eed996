//! The eight-connected neighbourhood.

use std::f64::consts::SQRT_2;

/// One of the eight neighbours of a cell. North is the row above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Neighbour {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

/// All eight neighbours, clockwise from north.
pub const NEIGHBOURS: [Neighbour; 8] = [
    Neighbour::North,
    Neighbour::NorthEast,
    Neighbour::East,
    Neighbour::SouthEast,
    Neighbour::South,
    Neighbour::SouthWest,
    Neighbour::West,
    Neighbour::NorthWest,
];

/// The four cardinal neighbours, in the order used by per-direction arrays.
pub const CARDINALS: [Neighbour; 4] = [
    Neighbour::North,
    Neighbour::East,
    Neighbour::South,
    Neighbour::West,
];

impl Neighbour {
    /// `(d_row, d_col)` offset.
    #[inline]
    pub fn offset(self) -> (isize, isize) {
        match self {
            Neighbour::North => (-1, 0),
            Neighbour::NorthEast => (-1, 1),
            Neighbour::East => (0, 1),
            Neighbour::SouthEast => (1, 1),
            Neighbour::South => (1, 0),
            Neighbour::SouthWest => (1, -1),
            Neighbour::West => (0, -1),
            Neighbour::NorthWest => (-1, -1),
        }
    }

    /// Coordinates of this neighbour of `(row, col)`.
    ///
    /// Callers only step from interior cells, whose neighbours always exist in a padded grid.
    #[inline]
    pub fn step(self, row: usize, col: usize) -> (usize, usize) {
        let (dr, dc) = self.offset();
        (row.wrapping_add_signed(dr), col.wrapping_add_signed(dc))
    }

    #[inline]
    pub fn is_diagonal(self) -> bool {
        matches!(
            self,
            Neighbour::NorthEast | Neighbour::SouthEast | Neighbour::SouthWest | Neighbour::NorthWest
        )
    }

    /// Centre-to-centre distance in cell widths.
    #[inline]
    pub fn distance(self) -> f64 {
        if self.is_diagonal() {
            SQRT_2
        } else {
            1.0
        }
    }

    pub fn opposite(self) -> Neighbour {
        match self {
            Neighbour::North => Neighbour::South,
            Neighbour::NorthEast => Neighbour::SouthWest,
            Neighbour::East => Neighbour::West,
            Neighbour::SouthEast => Neighbour::NorthWest,
            Neighbour::South => Neighbour::North,
            Neighbour::SouthWest => Neighbour::NorthEast,
            Neighbour::West => Neighbour::East,
            Neighbour::NorthWest => Neighbour::SouthEast,
        }
    }

    /// Slot of a cardinal direction in `[_; 4]` arrays ordered like [`CARDINALS`].
    ///
    /// Diagonals have no slot and return `None`.
    #[inline]
    pub fn cardinal_index(self) -> Option<usize> {
        match self {
            Neighbour::North => Some(0),
            Neighbour::East => Some(1),
            Neighbour::South => Some(2),
            Neighbour::West => Some(3),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposites_cancel() {
        for n in NEIGHBOURS {
            let (dr, dc) = n.offset();
            let (or, oc) = n.opposite().offset();
            assert_eq!((dr + or, dc + oc), (0, 0));
        }
    }

    #[test]
    fn test_cardinal_slots_follow_order() {
        for (i, n) in CARDINALS.iter().enumerate() {
            assert_eq!(n.cardinal_index(), Some(i));
            assert!(!n.is_diagonal());
        }
        assert_eq!(Neighbour::SouthWest.cardinal_index(), None);
        assert!((Neighbour::NorthWest.distance() - SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn test_step_moves_by_offset() {
        assert_eq!(Neighbour::NorthWest.step(2, 2), (1, 1));
        assert_eq!(Neighbour::SouthEast.step(2, 2), (3, 3));
    }
}
