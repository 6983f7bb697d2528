use crate::board::{square_mask, square_number, squares, step, Bitboard, Color, Move, Position, Sense, DIAGONALS, SENSES};
use crate::error::CheckersError;

/// Finds the landing squares of a chain starting at `at` that removes
/// exactly `captured` and ends on `target`, landing only on `open`
/// squares. A man passes its crown row only on the final jump.
fn jump_path(
    at: Bitboard,
    open: Bitboard,
    captured: Bitboard,
    target: Bitboard,
    senses: &[Sense],
    crown_row: Bitboard,
    path: &mut Vec<Bitboard>,
) -> bool {
    if captured == 0 {
        return at == target;
    }
    for &sense in senses {
        for diagonal in DIAGONALS {
            let over = step(at, sense, diagonal);
            if over & captured == 0 {
                continue;
            }
            let landing = step(over, sense, diagonal);
            let remaining = captured ^ over;
            if landing & open == 0 || (landing & crown_row != 0 && remaining != 0) {
                continue;
            }
            path.push(landing);
            if jump_path(landing, open | over, remaining, target, senses, crown_row, path) {
                return true;
            }
            path.pop();
        }
    }
    false
}

/// Renders the move `before -> after` made by `color` as square numbers
/// joined by `-`, listing every landing square of a capture chain.
///
/// Returns `None` when `after` cannot be reached from `before` by one
/// piece of `color` stepping or jumping.
pub fn describe_move(before: &Position, after: &Move, color: Color) -> Option<String> {
    let ours = before.pieces(color);
    let changed = ours ^ after.pieces(color);
    let from = changed & ours;
    let to = changed & after.pieces(color);
    let captured = before.pieces(color.opposite()) & !after.pieces(color.opposite());

    if from.count_ones() > 1 || from.count_ones() != to.count_ones() {
        return None;
    }
    if from == 0 && captured == 0 {
        return None;
    }

    // A king may finish a chain on the square it started from
    let starts = if from != 0 { from } else { ours & after.pieces(color) };

    let forward = [color.forward()];
    for start in squares(starts) {
        let target = if to != 0 { to } else { start };
        let (senses, crown_row): (&[Sense], Bitboard) = if before.kings & start != 0 {
            (&SENSES, 0)
        } else {
            (&forward, color.crown_row())
        };

        let mut path = vec![start];
        if captured == 0 {
            let adjacent = senses
                .iter()
                .any(|&sense| DIAGONALS.iter().any(|&diagonal| step(start, sense, diagonal) == target));
            if !adjacent || before.empty() & target == 0 {
                continue;
            }
            path.push(target);
        } else if !jump_path(start, before.empty() | start, captured, target, senses, crown_row, &mut path) {
            continue;
        }
        let numbers = path
            .iter()
            .map(|&mask| square_number(mask).map(|n| n.to_string()))
            .collect::<Option<Vec<_>>>()?;
        return Some(numbers.join("-"));
    }

    None
}

/// True when `text` is non-empty and holds only digits and `-`.
pub fn is_move_text(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit() || c == '-')
}

/// Reads a move typed as `from-to` or `from-over-...-to` and plays it for
/// `color` on `before`.
///
/// Every hop is checked against the board: one diagonal step, or a jump
/// over an enemy piece, by a piece of `color` onto an empty square in a
/// sense that piece may move. Forced captures are not checked here.
pub fn parse_move(before: &Position, color: Color, text: &str) -> Result<Move, CheckersError> {
    if !is_move_text(text) {
        return Err(CheckersError::InvalidMoveText(text.to_string()));
    }

    let hops = text
        .split('-')
        .map(|part| {
            let n = part
                .parse::<u32>()
                .map_err(|_| CheckersError::InvalidMoveText(text.to_string()))?;
            square_mask(n)
        })
        .collect::<Result<Vec<_>, _>>()?;

    if hops.len() < 2 {
        return Err(CheckersError::InvalidMoveText(text.to_string()));
    }

    let illegal = || CheckersError::IllegalMove(text.to_string());
    let mut position = *before;

    for (i, pair) in hops.windows(2).enumerate() {
        let (from, to) = (pair[0], pair[1]);

        // Find the sense and diagonal joining the two squares
        let mut hop = None;
        for sense in SENSES {
            for diagonal in DIAGONALS {
                let neighbor = step(from, sense, diagonal);
                if neighbor == to {
                    hop = Some((sense, 0));
                } else if neighbor != 0 && step(neighbor, sense, diagonal) == to {
                    hop = Some((sense, neighbor));
                }
            }
        }
        let (sense, captured) = hop.ok_or_else(illegal)?;

        // Only jumps may be chained
        if captured == 0 && hops.len() > 2 {
            return Err(illegal());
        }
        if position.pieces(color) & from == 0 || position.empty() & to == 0 {
            return Err(illegal());
        }
        if captured != 0 && position.pieces(color.opposite()) & captured == 0 {
            return Err(illegal());
        }
        if position.movers(color, sense) & from == 0 {
            return Err(illegal());
        }

        let next = position.relocate(color, from, captured, to);

        // A man crowned mid-chain stops there
        let crowned = position.kings & from == 0 && next.kings & to != 0;
        if crowned && i + 2 < hops.len() {
            return Err(illegal());
        }
        position = next;
    }

    Ok(position)
}
