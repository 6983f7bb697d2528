//! Plain-text board files.
//!
//! A board is 32 square characters (`b`, `w` for men, `B`, `W` for kings,
//! `.` for empty) in square order; any other characters are skipped. The
//! first `b` or `w` after the squares gives the side to move and an optional
//! number after that the seconds left on the clock. Game logs use the same
//! layout followed by the numbered move list, so a log can be read back as
//! a board.

use std::fs;
use std::path::Path;

use log::debug;

use crate::board::{Color, Position};
use crate::error::CheckersError;

/// Clock used when a board file does not say how much time is left.
pub const DEFAULT_SECONDS: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardFile {
    pub position: Position,
    pub to_move: Color,
    pub seconds_left: f64,
}

impl Default for BoardFile {
    fn default() -> Self {
        Self {
            position: Position::initial(),
            to_move: Color::Black,
            seconds_left: DEFAULT_SECONDS,
        }
    }
}

pub fn parse_board(text: &str) -> Result<BoardFile, CheckersError> {
    let mut position = Position::default();
    let mut count = 0;
    let mut rest = text;

    for (offset, c) in text.char_indices() {
        if count == 32 {
            rest = &text[offset..];
            break;
        }
        let mask = 1u32 << count;
        match c {
            'b' => position.black |= mask,
            'B' => {
                position.black |= mask;
                position.kings |= mask;
            }
            'w' => position.white |= mask,
            'W' => {
                position.white |= mask;
                position.kings |= mask;
            }
            '.' => {}
            _ => continue,
        }
        count += 1;
        rest = &text[offset + c.len_utf8()..];
    }

    if count < 32 {
        return Err(CheckersError::MalformedBoard(format!("only {} of 32 squares given", count)));
    }

    let (to_move, after) = rest
        .char_indices()
        .find_map(|(offset, c)| match c {
            'b' => Some((Color::Black, &rest[offset + 1..])),
            'w' => Some((Color::White, &rest[offset + 1..])),
            _ => None,
        })
        .ok_or_else(|| CheckersError::MalformedBoard("side to move missing".to_string()))?;

    let seconds_left = after
        .split_whitespace()
        .next()
        .and_then(|word| word.parse::<f64>().ok())
        .unwrap_or(DEFAULT_SECONDS);

    Ok(BoardFile {
        position,
        to_move,
        seconds_left,
    })
}

pub fn read_board(path: &Path) -> Result<BoardFile, CheckersError> {
    let text = fs::read_to_string(path).map_err(|source| CheckersError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let board = parse_board(&text)?;
    debug!("loaded {} ({} to move, {:.2}s)", path.display(), board.to_move.name(), board.seconds_left);
    Ok(board)
}

/// Renders a board line plus one `N. move` line per entry of `moves`.
pub fn format_log(board: &BoardFile, moves: &[String]) -> String {
    let mut out = String::new();
    for square in 0..32 {
        out.push(board.position.piece_char(1 << square).unwrap_or('.'));
        if square % 4 == 3 {
            out.push(' ');
        }
    }
    let side = match board.to_move {
        Color::Black => 'b',
        Color::White => 'w',
    };
    out.push_str(&format!("{} {:.2}\n", side, board.seconds_left));
    for (i, mv) in moves.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, mv));
    }
    out
}

/// Rewrites the log file at `path` from scratch.
pub fn write_log(path: &Path, board: &BoardFile, moves: &[String]) -> Result<(), CheckersError> {
    fs::write(path, format_log(board, moves)).map_err(|source| CheckersError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_initial_board() {
        let text = "bbbb bbbb bbbb\n.... ....\nwwww wwww wwww\nb\n";
        let board = parse_board(text).unwrap();
        assert_eq!(board.position, Position::initial());
        assert_eq!(board.to_move, Color::Black);
        assert_eq!(board.seconds_left, DEFAULT_SECONDS);
    }

    #[test]
    fn test_parse_kings_and_clock() {
        let text = "B... .... .... .... .... .... .... ...W\n w 12.5\n";
        let board = parse_board(text).unwrap();
        assert_eq!(board.position.black, 1);
        assert_eq!(board.position.white, 1 << 31);
        assert_eq!(board.position.kings, 1 | 1 << 31);
        assert_eq!(board.to_move, Color::White);
        assert_eq!(board.seconds_left, 12.5);
    }

    #[test]
    fn test_parse_rejects_short_or_sideless_board() {
        assert!(matches!(parse_board("bbbb ...."), Err(CheckersError::MalformedBoard(_))));
        let no_side = "bbbb bbbb bbbb .... .... wwww wwww wwww\n 300\n";
        assert!(matches!(parse_board(no_side), Err(CheckersError::MalformedBoard(_))));
    }

    #[test]
    fn test_log_reads_back_as_board() {
        let board = BoardFile {
            position: Position::initial().relocate(Color::Black, 1 << 8, 0, 1 << 13),
            to_move: Color::White,
            seconds_left: 291.256,
        };
        let text = format_log(&board, &["9-14".to_string()]);
        assert!(text.starts_with("bbbb bbbb .bbb .b.. .... wwww wwww wwww w 291.26\n"));
        assert!(text.ends_with("1. 9-14\n"));

        let back = parse_board(&text).unwrap();
        assert_eq!(back.position, board.position);
        assert_eq!(back.to_move, Color::White);
    }

    #[test]
    fn test_log_numbers_every_move() {
        let moves = ["11-15".to_string(), "23-18".to_string(), "15-22".to_string()];
        let text = format_log(&BoardFile::default(), &moves);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with(" b 300.00"));
        assert_eq!(&lines[1..], ["1. 11-15", "2. 23-18", "3. 15-22"]);
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_board(Path::new("/nonexistent/board.wdp")).unwrap_err();
        assert!(matches!(err, CheckersError::Io { .. }));
    }
}
