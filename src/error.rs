use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::board::Position;

#[derive(Debug, Error)]
pub enum CheckersError {
    #[error("square {0} is not on the board (expected 1-32)")]
    InvalidSquare(u32),

    #[error("position violates board invariants: {0:?}")]
    InvalidPosition(Position),

    #[error("malformed board: {0}")]
    MalformedBoard(String),

    #[error("cannot read move `{0}`")]
    InvalidMoveText(String),

    #[error("illegal move `{0}`")]
    IllegalMove(String),

    #[error("input closed before the game finished")]
    InputClosed,

    #[error("console i/o failed: {0}")]
    Console(#[from] io::Error),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
