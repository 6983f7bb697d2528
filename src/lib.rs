pub mod board;
pub mod error;
pub mod evaluation;
pub mod game;
pub mod movegen;
pub mod notation;
pub mod search;
pub mod transposition;
pub mod wdp;

pub use board::{Color, Move, Position};
pub use error::CheckersError;
