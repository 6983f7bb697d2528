use crate::board::{squares, step, Bitboard, Color, Move, Position, ALL_SQUARES, DIAGONALS, SENSES};

/// Upper bound on the moves a legal position can produce; used to size
/// move lists up front.
pub const MAX_MOVES: usize = 48;

#[derive(Debug, Clone, Copy, Default)]
pub struct MoveGenerator;

impl MoveGenerator {
    pub fn new() -> Self {
        Self
    }

    /// All legal moves for `color`. Captures are forced: when any exists
    /// only complete capture chains are returned.
    pub fn generate_moves(&self, position: &Position, color: Color) -> Vec<Move> {
        let mut moves = Vec::with_capacity(MAX_MOVES);
        if self.capture_chains(position, color, ALL_SQUARES, &mut moves) > 0 {
            return moves;
        }
        self.quiet_moves(position, color, &mut moves);
        moves
    }

    /// Every maximal capture chain available to `color`, or an empty list.
    pub fn generate_captures(&self, position: &Position, color: Color) -> Vec<Move> {
        let mut moves = Vec::new();
        self.capture_chains(position, color, ALL_SQUARES, &mut moves);
        moves
    }

    /// Every single-step move for `color`, ignoring the capture rule.
    pub fn generate_quiet(&self, position: &Position, color: Color) -> Vec<Move> {
        let mut moves = Vec::new();
        self.quiet_moves(position, color, &mut moves);
        moves
    }

    pub fn has_capture(&self, position: &Position, color: Color) -> bool {
        let enemy = position.pieces(color.opposite());
        let empty = position.empty();
        SENSES.iter().any(|&sense| {
            let movers = position.movers(color, sense);
            DIAGONALS.iter().any(|&diagonal| {
                step(step(movers, sense, diagonal) & enemy, sense, diagonal) & empty != 0
            })
        })
    }

    pub fn is_move_legal(&self, position: &Position, color: Color, mv: &Move) -> bool {
        self.generate_moves(position, color).contains(mv)
    }

    /// True when `mv` removed at least one enemy piece.
    pub fn is_capture(position: &Position, color: Color, mv: &Move) -> bool {
        mv.pieces(color.opposite()) != position.pieces(color.opposite())
    }

    fn quiet_moves(&self, position: &Position, color: Color, moves: &mut Vec<Move>) {
        let empty = position.empty();

        for sense in SENSES {
            let movers = position.movers(color, sense);
            for diagonal in DIAGONALS {
                let targets = step(movers, sense, diagonal) & empty;
                for to in squares(targets) {
                    let from = step(to, sense.reverse(), diagonal);
                    moves.push(position.relocate(color, from, 0, to));
                }
            }
        }
    }

    /// Pushes the end position of every maximal capture chain started by a
    /// piece in `mask` and returns how many were pushed.
    ///
    /// After each jump the chain continues only with the piece that just
    /// landed. The jumped square is vacated, so a chain can never double
    /// back over the piece it just took. A man crowned by a jump ends its
    /// chain on that jump.
    fn capture_chains(&self, position: &Position, color: Color, mask: Bitboard, moves: &mut Vec<Move>) -> usize {
        let enemy = position.pieces(color.opposite());
        let empty = position.empty();
        let mut leaves = 0;

        for sense in SENSES {
            let movers = position.movers(color, sense) & mask;
            for diagonal in DIAGONALS {
                let targets = step(step(movers, sense, diagonal) & enemy, sense, diagonal) & empty;
                for to in squares(targets) {
                    let captured = step(to, sense.reverse(), diagonal);
                    let from = step(captured, sense.reverse(), diagonal);
                    let next = position.relocate(color, from, captured, to);

                    let crowned = position.kings & from == 0 && next.kings & to != 0;
                    let continuation = if crowned { 0 } else { to };

                    let found = self.capture_chains(&next, color, continuation, moves);
                    if found == 0 {
                        moves.push(next);
                        leaves += 1;
                    } else {
                        leaves += found;
                    }
                }
            }
        }

        leaves
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::square_mask;

    fn sq(n: u32) -> Bitboard {
        square_mask(n).unwrap()
    }

    fn position(black: &[u32], white: &[u32], kings: &[u32]) -> Position {
        let bits = |s: &[u32]| s.iter().fold(0, |acc, &n| acc | sq(n));
        Position::new(bits(black), bits(white), bits(kings)).unwrap()
    }

    #[test]
    fn test_initial_moves() {
        let generator = MoveGenerator::new();
        let moves = generator.generate_moves(&Position::initial(), Color::Black);
        assert_eq!(moves.len(), 7);
        let white_moves = generator.generate_moves(&Position::initial(), Color::White);
        assert_eq!(white_moves.len(), 7);
    }

    #[test]
    fn test_man_moves_forward_only() {
        let generator = MoveGenerator::new();
        let moves = generator.generate_moves(&position(&[14], &[], &[]), Color::Black);
        let mut targets: Vec<_> = moves.iter().map(|m| m.black).collect();
        targets.sort();
        assert_eq!(targets, vec![sq(17), sq(18)]);
    }

    #[test]
    fn test_king_moves_both_ways() {
        let generator = MoveGenerator::new();
        let moves = generator.generate_moves(&position(&[14], &[], &[14]), Color::Black);
        assert_eq!(moves.len(), 4);
        assert!(moves.iter().all(|m| m.kings == m.black));
    }

    #[test]
    fn test_single_capture() {
        let generator = MoveGenerator::new();
        let moves = generator.generate_moves(&position(&[14], &[18], &[]), Color::Black);
        assert_eq!(moves, vec![position(&[23], &[], &[])]);
    }

    #[test]
    fn test_chain_capture_takes_both() {
        let generator = MoveGenerator::new();
        // 14x23x32: the man crowns on the last jump.
        let moves = generator.generate_moves(&position(&[14], &[18, 27], &[]), Color::Black);
        assert_eq!(moves, vec![position(&[32], &[], &[32])]);
    }

    #[test]
    fn test_branching_chains_are_siblings() {
        let generator = MoveGenerator::new();
        // From 23 black can take 26 (landing on 30) or 27 (landing on 32)
        // after first taking 18.
        let start = position(&[14], &[18, 26, 27], &[]);
        let moves = generator.generate_moves(&start, Color::Black);
        assert_eq!(moves.len(), 2);
        assert!(moves.iter().all(|m| m.white.count_ones() == 1));
    }

    #[test]
    fn test_crowning_ends_chain() {
        let generator = MoveGenerator::new();
        // Black man 23 jumps 26 to crown on 30. The jump over 25 is left
        // for the next turn.
        let start = position(&[23], &[25, 26], &[]);
        let moves = generator.generate_moves(&start, Color::Black);
        assert_eq!(moves, vec![position(&[30], &[25], &[30])]);
    }

    #[test]
    fn test_king_chain_continues_through_back_row() {
        let generator = MoveGenerator::new();
        // The same jump made by a king keeps going: 23x30x21.
        let start = position(&[23], &[25, 26], &[23]);
        let moves = generator.generate_moves(&start, Color::Black);
        assert_eq!(moves, vec![position(&[21], &[], &[21])]);
    }

    #[test]
    fn test_no_moves_is_empty() {
        let generator = MoveGenerator::new();
        // Black man on 29 is on white's side; white man blocked by the edge.
        let blocked = position(&[32], &[], &[]);
        assert!(generator.generate_moves(&blocked, Color::Black).is_empty());
        assert!(generator.generate_moves(&blocked, Color::White).is_empty());
    }

    #[test]
    fn test_has_capture_matches_generator() {
        let generator = MoveGenerator::new();
        let start = position(&[14, 1], &[18], &[]);
        assert!(generator.has_capture(&start, Color::Black));
        assert!(!generator.has_capture(&Position::initial(), Color::Black));
        assert_eq!(generator.generate_moves(&start, Color::Black).len(), 1);
        assert!(MoveGenerator::is_capture(&start, Color::Black, &generator.generate_moves(&start, Color::Black)[0]));
    }
}
