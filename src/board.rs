use std::fmt;

use crate::error::CheckersError;

/// One bit per playable square. Square `n` (1..=32) lives in bit `n - 1`.
pub type Bitboard = u32;

/// A move is stored as the position it produces.
pub type Move = Position;

pub const ALL_SQUARES: Bitboard = 0xffff_ffff;

/// Rows whose dark squares start at the left edge (5-8, 13-16, ...).
const LEFT_ROWS: Bitboard = 0xf0f0_f0f0;
/// Rows whose dark squares start one column in (1-4, 9-12, ...).
const RIGHT_ROWS: Bitboard = 0x0f0f_0f0f;

const TOP_ROW: Bitboard = 0x0000_000f;
const BOTTOM_ROW: Bitboard = 0xf000_0000;

/// Squares 4, 5, 12, 13, 20, 21, 28 and 29 on the left and right edges.
pub const EDGE_SQUARES: Bitboard = 0x1818_1818;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(&self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// The sense in which this color's men move.
    pub fn forward(self) -> Sense {
        match self {
            Color::Black => Sense::Down,
            Color::White => Sense::Up,
        }
    }

    /// The row this color starts on and defends against enemy promotion.
    pub fn home_row(self) -> Bitboard {
        match self {
            Color::Black => TOP_ROW,
            Color::White => BOTTOM_ROW,
        }
    }

    /// The row on which this color's men are crowned.
    pub fn crown_row(self) -> Bitboard {
        self.opposite().home_row()
    }

    pub fn name(self) -> &'static str {
        match self {
            Color::White => "White",
            Color::Black => "Black",
        }
    }
}

/// Vertical sense of travel: `Up` towards square 1, `Down` towards square 32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sense {
    Up,
    Down,
}

impl Sense {
    pub fn reverse(self) -> Sense {
        match self {
            Sense::Up => Sense::Down,
            Sense::Down => Sense::Up,
        }
    }
}

pub const SENSES: [Sense; 2] = [Sense::Down, Sense::Up];

/// The two diagonals through a square. `Rising` runs from lower-left to
/// upper-right, `Falling` from upper-left to lower-right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Diagonal {
    Rising,
    Falling,
}

pub const DIAGONALS: [Diagonal; 2] = [Diagonal::Rising, Diagonal::Falling];

impl Diagonal {
    // Shift amounts for (LEFT_ROWS, RIGHT_ROWS) sources.
    fn down_shifts(self) -> (u32, u32) {
        match self {
            Diagonal::Rising => (3, 4),
            Diagonal::Falling => (4, 5),
        }
    }

    fn up_shifts(self) -> (u32, u32) {
        match self {
            Diagonal::Rising => (4, 3),
            Diagonal::Falling => (5, 4),
        }
    }
}

/// Moves every set bit one step down along `diagonal`. Bits that would
/// leave the board vanish.
pub fn down(bits: Bitboard, diagonal: Diagonal) -> Bitboard {
    let (left, right) = diagonal.down_shifts();
    (((bits & LEFT_ROWS) << left) & RIGHT_ROWS) | (((bits & RIGHT_ROWS) << right) & LEFT_ROWS)
}

/// Moves every set bit one step up along `diagonal`; the inverse of [`down`].
pub fn up(bits: Bitboard, diagonal: Diagonal) -> Bitboard {
    let (left, right) = diagonal.up_shifts();
    (((bits & LEFT_ROWS) >> left) & RIGHT_ROWS) | (((bits & RIGHT_ROWS) >> right) & LEFT_ROWS)
}

pub fn step(bits: Bitboard, sense: Sense, diagonal: Diagonal) -> Bitboard {
    match sense {
        Sense::Up => up(bits, diagonal),
        Sense::Down => down(bits, diagonal),
    }
}

/// Lowest set bit of `bits`, or 0.
pub fn last_one(bits: Bitboard) -> Bitboard {
    bits & bits.wrapping_neg()
}

/// Iterator over the set bits of a bitboard, lowest first, each yielded as
/// a single-bit mask.
#[derive(Debug, Clone, Copy)]
pub struct Squares(Bitboard);

impl Iterator for Squares {
    type Item = Bitboard;

    fn next(&mut self) -> Option<Bitboard> {
        if self.0 == 0 {
            return None;
        }
        let bit = last_one(self.0);
        self.0 ^= bit;
        Some(bit)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

pub fn squares(bits: Bitboard) -> Squares {
    Squares(bits)
}

/// Mask of square `number` (1..=32).
pub fn square_mask(number: u32) -> Result<Bitboard, CheckersError> {
    if (1..=32).contains(&number) {
        Ok(1 << (number - 1))
    } else {
        Err(CheckersError::InvalidSquare(number))
    }
}

/// Square number of a single-bit mask.
pub fn square_number(mask: Bitboard) -> Option<u32> {
    if mask.count_ones() == 1 {
        Some(mask.trailing_zeros() + 1)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub black: Bitboard,
    pub white: Bitboard,
    pub kings: Bitboard,
}

impl Position {
    /// Builds a position, rejecting overlapping colors or stray king bits.
    pub fn new(black: Bitboard, white: Bitboard, kings: Bitboard) -> Result<Self, CheckersError> {
        let position = Self { black, white, kings };
        if !position.is_valid() {
            return Err(CheckersError::InvalidPosition(position));
        }
        Ok(position)
    }

    /// Standard opening setup: black on 1-12, white on 21-32.
    pub fn initial() -> Self {
        Self {
            black: 0x0000_0fff,
            white: 0xfff0_0000,
            kings: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.black & self.white == 0 && self.kings & !(self.black | self.white) == 0
    }

    pub fn occupied(&self) -> Bitboard {
        self.black | self.white
    }

    pub fn empty(&self) -> Bitboard {
        !self.occupied()
    }

    pub fn pieces(&self, color: Color) -> Bitboard {
        match color {
            Color::Black => self.black,
            Color::White => self.white,
        }
    }

    pub fn kings_of(&self, color: Color) -> Bitboard {
        self.pieces(color) & self.kings
    }

    pub fn count(&self, color: Color) -> u32 {
        self.pieces(color).count_ones()
    }

    /// Pieces of `color` allowed to travel in `sense`: all of them for the
    /// forward sense, kings only for the other.
    pub fn movers(&self, color: Color, sense: Sense) -> Bitboard {
        if color.forward() == sense {
            self.pieces(color)
        } else {
            self.kings_of(color)
        }
    }

    fn pieces_mut(&mut self, color: Color) -> &mut Bitboard {
        match color {
            Color::Black => &mut self.black,
            Color::White => &mut self.white,
        }
    }

    /// Moves the piece on `from` to `to`, removing whatever stood on
    /// `captured`. A man landing on its crown row is crowned.
    pub fn relocate(&self, color: Color, from: Bitboard, captured: Bitboard, to: Bitboard) -> Position {
        let mut next = *self;
        let was_king = self.kings & from != 0;
        *next.pieces_mut(color) = (self.pieces(color) & !from) | to;
        *next.pieces_mut(color.opposite()) = self.pieces(color.opposite()) & !captured;
        next.kings &= !(from | captured);
        if was_king || to & color.crown_row() != 0 {
            next.kings |= to;
        }
        next
    }

    /// Rotates the board half a turn and swaps the colors.
    pub fn mirrored(&self) -> Position {
        Position {
            black: self.white.reverse_bits(),
            white: self.black.reverse_bits(),
            kings: self.kings.reverse_bits(),
        }
    }

    pub fn piece_char(&self, mask: Bitboard) -> Option<char> {
        let king = self.kings & mask != 0;
        if self.black & mask != 0 {
            Some(if king { 'B' } else { 'b' })
        } else if self.white & mask != 0 {
            Some(if king { 'W' } else { 'w' })
        } else {
            None
        }
    }
}

const LEGEND: [&str; 10] = [
    " ________________ ",
    "|   1   2   3   4|",
    "| 5   6   7   8  |",
    "|   9  10  11  12|",
    "|13  14  15  16  |",
    "|  17  18  19  20|",
    "|21  22  23  24  |",
    "|  25  26  27  28|",
    "|29  30  31  32  |",
    " ---------------- ",
];

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, " _______________ \t{}", LEGEND[0])?;
        for row in 0..8 {
            let mut line = String::from("|");
            for col in 0..4 {
                let mask = 1u32 << (row * 4 + col);
                let c = self.piece_char(mask).unwrap_or(' ');
                if row % 2 == 0 {
                    line.push_str("  ");
                    line.push(c);
                } else {
                    line.push(c);
                    line.push_str("  ");
                }
                if col < 3 {
                    line.push(' ');
                }
            }
            writeln!(f, "{}|\t{}", line, LEGEND[row + 1])?;
        }
        writeln!(f, " --------------- \t{}", LEGEND[9])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(n: u32) -> Bitboard {
        square_mask(n).unwrap()
    }

    #[test]
    fn test_neighbors_in_middle() {
        assert_eq!(down(sq(14), Diagonal::Rising), sq(17));
        assert_eq!(down(sq(14), Diagonal::Falling), sq(18));
        assert_eq!(up(sq(14), Diagonal::Rising), sq(10));
        assert_eq!(up(sq(14), Diagonal::Falling), sq(9));
    }

    #[test]
    fn test_neighbors_fall_off_edges() {
        // Square 5 is on the left edge, square 12 on the right.
        assert_eq!(down(sq(5), Diagonal::Rising), 0);
        assert_eq!(up(sq(5), Diagonal::Falling), 0);
        assert_eq!(down(sq(12), Diagonal::Falling), 0);
        assert_eq!(up(sq(12), Diagonal::Rising), 0);
        // Top and bottom rows.
        assert_eq!(up(sq(2), Diagonal::Rising), 0);
        assert_eq!(down(sq(31), Diagonal::Falling), 0);
    }

    #[test]
    fn test_up_reverses_down() {
        for n in 1..=32 {
            for diagonal in DIAGONALS {
                let there = down(sq(n), diagonal);
                if there != 0 {
                    assert_eq!(up(there, diagonal), sq(n));
                }
            }
        }
    }

    #[test]
    fn test_squares_iterates_lowest_first() {
        let bits: Vec<_> = squares(sq(3) | sq(17) | sq(32)).collect();
        assert_eq!(bits, vec![sq(3), sq(17), sq(32)]);
        assert_eq!(squares(0).count(), 0);
    }

    #[test]
    fn test_relocate_crowns_on_back_row() {
        let position = Position::new(sq(26), 0, 0).unwrap();
        let next = position.relocate(Color::Black, sq(26), 0, sq(30));
        assert_eq!(next.black, sq(30));
        assert_eq!(next.kings, sq(30));
    }

    #[test]
    fn test_invalid_position_rejected() {
        assert!(Position::new(sq(1), sq(1), 0).is_err());
        assert!(Position::new(sq(1), 0, sq(2)).is_err());
        assert!(square_mask(0).is_err());
        assert!(square_mask(33).is_err());
        assert_eq!(square_number(sq(17)), Some(17));
        assert_eq!(square_number(sq(1) | sq(2)), None);
    }

    #[test]
    fn test_mirror_swaps_sides() {
        let mirrored = Position::initial().mirrored();
        assert_eq!(mirrored, Position::initial());
        assert_eq!(Color::Black.crown_row().reverse_bits(), Color::White.crown_row());
    }

    #[test]
    fn test_display_shows_pieces() {
        let text = Position::initial().to_string();
        assert!(text.contains('b'));
        assert!(text.contains('w'));
        assert_eq!(text.lines().count(), 10);
    }
}
