use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::board::{squares, Color, Move, Position};

/// Default number of slots, roughly 20 MB of entries.
pub const DEFAULT_TABLE_SIZE: usize = 500_000;

/// Score bound larger than any evaluation; also the value of a lost position.
pub const INFINITY: i32 = 2_000_000;

const ZOBRIST_SEED: u64 = 0x00c0_ffee_d00d_f00d;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranspositionEntry {
    pub position: Position,
    pub color: Color,
    pub low_bound: i32,
    pub low_depth: u32,
    pub high_bound: i32,
    pub high_depth: u32,
    pub best_move: Option<Move>,
}

/// Outcome of checking an entry against a search window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// The stored bound settles the node; return it.
    Cutoff(i32),
    /// Search on with the window narrowed by the stored bounds.
    Window(i32, i32),
}

impl TranspositionEntry {
    /// Applies bounds proven at `depth` or deeper to the window
    /// `(alpha, beta)`.
    pub fn probe(&self, depth: u32, alpha: i32, beta: i32) -> Probe {
        let (mut alpha, mut beta) = (alpha, beta);
        if self.low_depth >= depth {
            if self.low_bound >= beta {
                return Probe::Cutoff(self.low_bound);
            }
            alpha = alpha.max(self.low_bound);
        }
        if self.high_depth >= depth {
            if self.high_bound <= alpha {
                return Probe::Cutoff(self.high_bound);
            }
            beta = beta.min(self.high_bound);
        }
        Probe::Window(alpha, beta)
    }
}

struct ZobristKeys {
    // [square][black man, black king, white man, white king]
    pieces: [[u64; 4]; 32],
    black_to_move: u64,
}

impl ZobristKeys {
    fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut pieces = [[0u64; 4]; 32];
        for square in pieces.iter_mut() {
            for key in square.iter_mut() {
                *key = rng.gen();
            }
        }
        Self {
            pieces,
            black_to_move: rng.gen(),
        }
    }

    fn hash(&self, position: &Position, color: Color) -> u64 {
        let mut hash = if color == Color::Black { self.black_to_move } else { 0 };
        for piece in squares(position.occupied()) {
            let square = piece.trailing_zeros() as usize;
            let kind = match (position.black & piece != 0, position.kings & piece != 0) {
                (true, false) => 0,
                (true, true) => 1,
                (false, false) => 2,
                (false, true) => 3,
            };
            hash ^= self.pieces[square][kind];
        }
        hash
    }
}

/// Fixed-size table keyed by (position, side to move). A slot holds one
/// entry; storing into an occupied slot replaces whatever was there.
pub struct TranspositionTable {
    table: Vec<Option<TranspositionEntry>>,
    keys: ZobristKeys,
}

impl TranspositionTable {
    pub fn new(size: usize) -> Self {
        Self {
            table: vec![None; size.max(1)],
            keys: ZobristKeys::new(ZOBRIST_SEED),
        }
    }

    pub fn size(&self) -> usize {
        self.table.len()
    }

    fn index(&self, position: &Position, color: Color) -> usize {
        (self.keys.hash(position, color) % self.table.len() as u64) as usize
    }

    /// The entry for exactly this position and side, if its slot still
    /// holds it.
    pub fn lookup(&self, position: &Position, color: Color) -> Option<&TranspositionEntry> {
        self.table[self.index(position, color)]
            .as_ref()
            .filter(|entry| entry.position == *position && entry.color == color)
    }

    /// Records a search result. A value at or below `alpha` is an upper
    /// bound, at or above `beta` a lower bound, anything between is exact.
    #[allow(clippy::too_many_arguments)]
    pub fn store(
        &mut self,
        position: &Position,
        color: Color,
        depth: u32,
        alpha: i32,
        beta: i32,
        value: i32,
        best_move: Option<Move>,
    ) {
        let (low_bound, low_depth, high_bound, high_depth) = if value <= alpha {
            (-INFINITY, 0, value, depth)
        } else if value >= beta {
            (value, depth, INFINITY, 0)
        } else {
            (value, depth, value, depth)
        };

        let index = self.index(position, color);
        self.table[index] = Some(TranspositionEntry {
            position: *position,
            color,
            low_bound,
            low_depth,
            high_bound,
            high_depth,
            best_move,
        });
    }

    pub fn clear(&mut self) {
        self.table.iter_mut().for_each(|slot| *slot = None);
    }

    pub fn occupied_slots(&self) -> usize {
        self.table.iter().filter(|slot| slot.is_some()).count()
    }
}

impl Default for TranspositionTable {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_lookup_exact() {
        let mut table = TranspositionTable::new(1024);
        let position = Position::initial();
        table.store(&position, Color::Black, 3, -10, 10, 4, None);

        let entry = table.lookup(&position, Color::Black).copied().unwrap();
        assert_eq!((entry.low_bound, entry.high_bound), (4, 4));
        assert_eq!((entry.low_depth, entry.high_depth), (3, 3));
        assert!(table.lookup(&position, Color::White).is_none());
    }

    #[test]
    fn test_fail_high_and_fail_low_bounds() {
        let mut table = TranspositionTable::new(1024);
        let position = Position::initial();

        table.store(&position, Color::Black, 2, 0, 1, 5, None);
        let entry = *table.lookup(&position, Color::Black).unwrap();
        assert_eq!((entry.low_bound, entry.low_depth), (5, 2));
        assert_eq!((entry.high_bound, entry.high_depth), (INFINITY, 0));
        assert_eq!(entry.probe(2, 0, 1), Probe::Cutoff(5));
        // Not proven deep enough for a depth-3 query.
        assert_eq!(entry.probe(3, 0, 1), Probe::Window(0, 1));

        table.store(&position, Color::Black, 2, 0, 1, -7, None);
        let entry = *table.lookup(&position, Color::Black).unwrap();
        assert_eq!((entry.high_bound, entry.high_depth), (-7, 2));
        assert_eq!(entry.probe(1, 0, 1), Probe::Cutoff(-7));
        assert_eq!(entry.probe(1, -20, 1), Probe::Window(-20, -7));
    }

    #[test]
    fn test_collision_overwrites() {
        let mut table = TranspositionTable::new(1);
        let first = Position::initial();
        let second = first.relocate(Color::Black, 1 << 11, 0, 1 << 15);
        table.store(&first, Color::Black, 1, -1, 1, 0, None);
        table.store(&second, Color::Black, 1, -1, 1, 0, None);
        assert!(table.lookup(&first, Color::Black).is_none());
        assert!(table.lookup(&second, Color::Black).is_some());
        assert_eq!(table.occupied_slots(), 1);
        table.clear();
        assert_eq!(table.occupied_slots(), 0);
    }
}
