use std::fmt;

use crate::board::{squares, step, Bitboard, Color, Diagonal, Position, Sense, DIAGONALS, EDGE_SQUARES, SENSES};

/// Whose pieces count as attackers in [`threatened`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attackers {
    Only(Color),
    Both,
}

/// Squares on which a piece would be capturable right now by an attacker:
/// the square is next to the attacker in a sense it may move in, is not
/// held by the attacker's own side, and the square beyond it is empty.
pub fn threatened(position: &Position, attackers: Attackers) -> Bitboard {
    let empty = position.empty();
    let candidates = match attackers {
        Attackers::Only(color) => position.pieces(color),
        Attackers::Both => position.occupied(),
    };

    let mut mask = 0;
    for piece in squares(candidates) {
        let color = if position.black & piece != 0 { Color::Black } else { Color::White };
        let own = position.pieces(color);
        for sense in SENSES {
            if position.movers(color, sense) & piece == 0 {
                continue;
            }
            for diagonal in DIAGONALS {
                let neighbor = step(piece, sense, diagonal);
                if neighbor & !own != 0 && step(neighbor, sense, diagonal) & empty != 0 {
                    mask |= neighbor;
                }
            }
        }
    }
    mask
}

/// Fewest forward steps a man on `from` needs to reach its crown row
/// through empty squares outside `danger`, or `None` when no such path
/// exists.
pub fn runaway(position: &Position, from: Bitboard, color: Color, danger: Bitboard) -> Option<u32> {
    if from & color.crown_row() != 0 {
        return Some(0);
    }
    let empty = position.empty();
    DIAGONALS
        .iter()
        .filter_map(|&diagonal| {
            let next = step(from, color.forward(), diagonal);
            if next & empty & !danger != 0 {
                runaway(position, next, color, danger)
            } else {
                None
            }
        })
        .min()
        .map(|steps| steps + 1)
}

/// Longest run of captures a piece of `color` standing on `from` could
/// make, moving in `senses`. A final capture only counts if its landing
/// square is not itself threatened. `arrived` is the step that brought the
/// piece to `from`; it is never retraced.
pub fn possible_kills(
    position: &Position,
    color: Color,
    senses: &[Sense],
    from: Bitboard,
    arrived: Option<(Sense, Diagonal)>,
) -> u32 {
    let enemy = position.pieces(color.opposite());
    let empty = position.empty();
    let mut best = 0;

    for diagonal in DIAGONALS {
        for &sense in senses {
            if arrived == Some((sense.reverse(), diagonal)) {
                continue;
            }
            let victim = step(from, sense, diagonal);
            let landing = step(victim, sense, diagonal);
            if victim & enemy == 0 || landing & empty == 0 {
                continue;
            }

            // The piece is lifted off the board while it travels.
            let lifted = victim | from;
            let rest = Position {
                black: position.black & !lifted,
                white: position.white & !lifted,
                kings: position.kings & !lifted,
            };

            let more = possible_kills(&rest, color, senses, landing, Some((sense, diagonal)));
            if more > 0 {
                best = best.max(1 + more);
            } else if landing & !threatened(&rest, Attackers::Only(color.opposite())) != 0 {
                best = best.max(1);
            }
        }
    }
    best
}

/// Individual evaluation terms, each already signed in black's favour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalTerms {
    pub material: i32,
    pub trapped_kings: i32,
    pub dog_holes: i32,
    pub safe_men: i32,
    pub runaway_men: i32,
    pub turn: i32,
    pub back_rank: i32,
    pub possible_kills: i32,
}

impl EvalTerms {
    pub fn total(&self) -> i32 {
        self.material
            + self.trapped_kings
            + self.dog_holes
            + self.safe_men
            + self.runaway_men
            + self.turn
            + self.back_rank
            + self.possible_kills
    }
}

impl fmt::Display for EvalTerms {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Material: {}", self.material)?;
        writeln!(f, "Trapped kings: {}", self.trapped_kings)?;
        writeln!(f, "Dog holes: {}", self.dog_holes)?;
        writeln!(f, "Safe men: {}", self.safe_men)?;
        writeln!(f, "Runaway men: {}", self.runaway_men)?;
        writeln!(f, "Turn: {}", self.turn)?;
        writeln!(f, "Back rank: {}", self.back_rank)?;
        writeln!(f, "Possible kills: {}", self.possible_kills)?;
        write!(f, "Total: {}", self.total())
    }
}

#[derive(Default)]
struct KillTally {
    pieces: i32,
    extra: i32,
}

pub struct Evaluator {
    // Material
    pub man_value: i32,
    pub king_value: i32,
    pub victory_value: i32,

    // Structure
    pub trapped_king_penalty: i32,
    pub dog_hole_penalty: i32,
    pub safe_man_bonus: i32,
    pub runaway_bonus: i32,
    pub runaway_step_penalty: i32,
    /// Indexed by how many pieces still guard the home row.
    pub back_rank_bonus: [i32; 5],

    // Tempo and tactics
    pub turn_bonus: i32,
    pub kill_bonus: i32,
    pub alt_kill_bonus: i32,
    pub extra_kill_bonus: i32,
    pub mover_kill_factor: f32,
    pub waiting_kill_factor: f32,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            man_value: 100,
            king_value: 150,
            victory_value: 1_000_000,

            trapped_king_penalty: 50,
            dog_hole_penalty: 10,
            safe_man_bonus: 1,
            runaway_bonus: 50,
            runaway_step_penalty: 7,
            back_rank_bonus: [20, 18, 12, 4, 0],

            turn_bonus: 3,
            kill_bonus: 30,
            alt_kill_bonus: 2,
            extra_kill_bonus: 80,
            mover_kill_factor: 0.5,
            waiting_kill_factor: 1.0,
        }
    }

    /// Scores `position` with `to_move` on turn. Positive favours black.
    pub fn evaluate(&self, position: &Position, to_move: Color) -> i32 {
        self.evaluate_terms(position, to_move).total()
    }

    pub fn evaluate_terms(&self, position: &Position, to_move: Color) -> EvalTerms {
        let empty = position.empty();
        let mut terms = EvalTerms::default();
        let mut kills = [KillTally::default(), KillTally::default()];

        // One pass over every piece on the board
        for piece in squares(position.occupied()) {
            let color = if position.black & piece != 0 { Color::Black } else { Color::White };
            let bias = sign(color);
            let is_king = position.kings & piece != 0;
            let forward = [color.forward()];
            let senses: &[Sense] = if is_king { &SENSES } else { &forward };

            let piece_kills = possible_kills(position, color, senses, piece, None) as i32;
            if piece_kills > 0 {
                let tally = &mut kills[color.index()];
                tally.pieces += 1;
                tally.extra = tally.extra.max(piece_kills - 1);
            }

            if is_king {
                terms.material += bias * self.king_value;

                // A king is trapped when it can neither capture nor step to a
                // square the enemy does not threaten.
                let enemy = position.pieces(color.opposite());
                let mut escapes = 0;
                for diagonal in DIAGONALS {
                    for sense in SENSES {
                        let neighbor = step(piece, sense, diagonal);
                        if neighbor & empty != 0 {
                            escapes |= neighbor;
                        } else if neighbor & enemy != 0 {
                            escapes |= step(neighbor, sense, diagonal) & empty;
                        }
                    }
                }
                let danger = threatened(position, Attackers::Only(color.opposite()));
                if piece_kills == 0 && escapes & empty & !danger == 0 {
                    terms.trapped_kings -= bias * self.trapped_king_penalty;
                }
            } else {
                terms.material += bias * self.man_value;

                if piece & EDGE_SQUARES != 0 {
                    terms.safe_men += bias * self.safe_man_bonus;
                }

                // Path search runs without the man itself on the board.
                let rest = Position {
                    black: position.black & !piece,
                    white: position.white & !piece,
                    kings: position.kings & !piece,
                };
                let danger = threatened(&rest, Attackers::Only(color.opposite()));
                if let Some(steps) = runaway(&rest, piece, color, danger) {
                    terms.runaway_men += bias * (self.runaway_bonus - steps as i32 * self.runaway_step_penalty);
                }
            }
        }

        if position.white == 0 {
            terms.material += self.victory_value;
        }
        if position.black == 0 {
            terms.material -= self.victory_value;
        }

        terms.turn = sign(to_move) * self.turn_bonus;

        for color in [Color::Black, Color::White] {
            let tally = &kills[color.index()];
            if tally.pieces == 0 {
                continue;
            }
            let factor = if color == to_move { self.mover_kill_factor } else { self.waiting_kill_factor };
            let raw = self.kill_bonus + self.alt_kill_bonus * (tally.pieces - 1) + self.extra_kill_bonus * tally.extra;
            terms.possible_kills += sign(color) * (raw as f32 * factor) as i32;
        }

        // Fewer defenders on the home row means a weaker back rank. Black
        // profits from a weak white back rank and the other way round.
        let white_guards = (position.white & Color::White.home_row()).count_ones() as usize;
        let black_guards = (position.black & Color::Black.home_row()).count_ones() as usize;
        terms.back_rank += self.back_rank_bonus[white_guards.min(4)];
        terms.back_rank -= self.back_rank_bonus[black_guards.min(4)];

        // Dog holes: white on 5 under black on 1, black on 28 over white on 32.
        if position.white & 0x0000_0010 != 0 && position.black & 0x0000_0001 != 0 {
            terms.dog_holes += self.dog_hole_penalty;
        }
        if position.black & 0x0800_0000 != 0 && position.white & 0x8000_0000 != 0 {
            terms.dog_holes -= self.dog_hole_penalty;
        }

        terms
    }
}

fn sign(color: Color) -> i32 {
    match color {
        Color::Black => 1,
        Color::White => -1,
    }
}
