use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::board::{Color, Move, Position};
use crate::error::CheckersError;
use crate::movegen::MoveGenerator;
use crate::notation::{describe_move, parse_move};
use crate::search::Search;
use crate::wdp::{self, BoardFile};

/// Moves budgeted for when the engine is down to its last piece.
const MOVES_RESERVE: u32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Won,
    Lost,
    Draw,
}

/// Game clock for the engine's side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clock {
    seconds_left: f64,
    spent: f64,
    moves_reserve: u32,
    unlimited: bool,
}

impl Clock {
    pub fn new(seconds_left: f64) -> Self {
        Self {
            seconds_left,
            spent: 0.0,
            moves_reserve: MOVES_RESERVE,
            unlimited: false,
        }
    }

    pub fn unlimited() -> Self {
        Self {
            seconds_left: f64::INFINITY,
            spent: 0.0,
            moves_reserve: MOVES_RESERVE,
            unlimited: true,
        }
    }

    pub fn seconds_left(&self) -> f64 {
        self.seconds_left
    }

    /// Seconds charged over the whole game.
    pub fn spent(&self) -> f64 {
        self.spent
    }

    pub fn is_unlimited(&self) -> bool {
        self.unlimited
    }

    /// Decides the search budget for one move. `None` means the search is
    /// never cut off.
    ///
    /// Fewer pieces get more time, and `favourable == false` adds two
    /// seconds. With a single piece left the remaining clock is split over
    /// the reserve of moves, which shrinks while both sides are down to one
    /// piece. The budget never exceeds a thirtieth of the clock and is at
    /// least a second.
    pub fn allocate(&mut self, legal_moves: usize, own_pieces: u32, opponent_pieces: u32, favourable: bool) -> Option<Duration> {
        if self.unlimited {
            return None;
        }
        if legal_moves == 1 {
            return Some(Duration::from_secs(1));
        }

        let bonus = if favourable { 0.0 } else { 2.0 };
        let mut seconds = match own_pieces {
            11.. => 1.0,
            8..=10 => 3.0 + bonus,
            4..=7 => 5.0 + bonus,
            2..=3 => 8.0 + bonus,
            _ => {
                let share = (self.seconds_left / self.moves_reserve as f64).floor();
                if opponent_pieces == 1 && self.moves_reserve > 1 {
                    self.moves_reserve -= 1;
                }
                share
            }
        };

        if seconds >= self.seconds_left {
            seconds = self.seconds_left.floor();
        }
        if seconds > self.seconds_left / 30.0 {
            seconds = (self.seconds_left / 30.0).floor();
        }
        Some(Duration::from_secs(seconds.max(1.0) as u64))
    }

    pub fn charge(&mut self, elapsed: Duration) {
        self.spent += elapsed.as_secs_f64();
        if !self.unlimited {
            self.seconds_left -= elapsed.as_secs_f64();
        }
    }

    pub fn is_expired(&self) -> bool {
        self.seconds_left <= 0.0
    }
}

/// Rough description of an evaluation from Black's point of view.
pub fn standings(score: i32) -> String {
    let leader = if score < 0 { "white" } else { "black" };
    match score.unsigned_abs() {
        0 => "Equal".to_string(),
        351.. => format!("{}{} is winning", leader[..1].to_uppercase(), &leader[1..]),
        200..=350 => format!("Very large {} advantage", leader),
        100..=199 => format!("Large {} advantage", leader),
        30..=99 => format!("Medium {} advantage", leader),
        _ => format!("Slight {} advantage", leader),
    }
}

/// Whether the engine playing `engine` should accept a draw: only when it
/// is behind on material and its last score was against it.
pub fn accept_draw(engine: Color, engine_pieces: u32, opponent_pieces: u32, score: i32) -> bool {
    let unfavourable = match engine {
        Color::Black => score < 0,
        Color::White => score > 0,
    };
    engine_pieces < opponent_pieces && unfavourable
}

fn favours(color: Color, score: i32) -> bool {
    match color {
        Color::Black => score > 0,
        Color::White => score < 0,
    }
}

/// An operator-driven match: the engine's moves are printed, the
/// opponent's are typed in.
pub struct Game<R, W> {
    input: R,
    output: W,
    search: Search,
    move_generator: MoveGenerator,
    position: Position,
    to_move: Color,
    engine: Color,
    clock: Clock,
    score: i32,
    engine_moves: u32,
    history: Vec<String>,
    log_path: Option<PathBuf>,
}

impl<R: BufRead, W: Write> Game<R, W> {
    pub fn new(search: Search, board: BoardFile, engine: Color, input: R, output: W) -> Self {
        Self {
            input,
            output,
            search,
            move_generator: MoveGenerator::new(),
            position: board.position,
            to_move: board.to_move,
            engine,
            clock: Clock::new(board.seconds_left),
            score: 0,
            engine_moves: 0,
            history: Vec::new(),
            log_path: None,
        }
    }

    pub fn with_log(mut self, path: PathBuf) -> Self {
        self.log_path = Some(path);
        self
    }

    pub fn with_unlimited_time(mut self) -> Self {
        self.clock = Clock::unlimited();
        self
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Plays until one side wins or a draw is agreed.
    pub fn play(&mut self) -> Result<Outcome, CheckersError> {
        info!("engine plays {}", self.engine.name());
        if self.to_move != self.engine {
            write!(self.output, "{}", self.position)?;
        }

        loop {
            let outcome = if self.to_move == self.engine {
                self.engine_turn()?
            } else {
                self.opponent_turn()?
            };

            if let Some(outcome) = outcome {
                let text = match outcome {
                    Outcome::Won => "I won the game.",
                    Outcome::Lost => "I lost the game.",
                    Outcome::Draw => "The game ended in a draw.",
                };
                writeln!(self.output, "\n{}\n", text)?;
                info!("game over after {} moves: {:?}", self.history.len(), outcome);
                return Ok(outcome);
            }
            self.to_move = self.to_move.opposite();
        }
    }

    fn engine_turn(&mut self) -> Result<Option<Outcome>, CheckersError> {
        let opponent = self.engine.opposite();
        writeln!(self.output, "\n\n{}'s turn:\n", self.engine.name())?;

        let legal = self.move_generator.generate_moves(&self.position, self.engine);
        if legal.is_empty() {
            writeln!(self.output, "\nI cannot make any moves!")?;
            return Ok(Some(Outcome::Lost));
        }
        if self.move_generator.generate_moves(&self.position, opponent).is_empty() {
            writeln!(self.output, "\nOpponent cannot make any moves!")?;
            return Ok(Some(Outcome::Won));
        }

        let budget = self.clock.allocate(
            legal.len(),
            self.position.count(self.engine),
            self.position.count(opponent),
            favours(self.engine, self.score),
        );
        debug!("allocated {:?} for move {}", budget, self.engine_moves + 1);

        let mut limits = self.search.limits();
        limits.max_time = budget;
        self.search.set_limits(limits);

        let started = Instant::now();
        let result = self.search.find_best_move(&self.position, self.engine);
        let elapsed = started.elapsed();

        let Some(best_move) = result.best_move else {
            writeln!(self.output, "\nI cannot make any moves!")?;
            return Ok(Some(Outcome::Lost));
        };

        let text = describe_move(&self.position, &best_move, self.engine)
            .ok_or(CheckersError::InvalidPosition(best_move))?;
        self.engine_moves += 1;
        writeln!(self.output, "       My move is: {}. {}", self.engine_moves, text)?;
        self.play_move(best_move, text);

        self.clock.charge(elapsed);
        if !self.clock.is_unlimited() {
            writeln!(self.output, "Time on this move: {:.2}", elapsed.as_secs_f64())?;
            writeln!(self.output, " Total time spent: {:.2}", self.clock.spent())?;
        }

        self.score = self.search.evaluator().evaluate(&self.position, opponent);
        writeln!(self.output, "        Standings: {} ({})", standings(self.score), self.score)?;

        if self.clock.is_expired() {
            writeln!(self.output, "\nMy time ran out, so I give up!")?;
            return Ok(Some(Outcome::Lost));
        }

        write!(self.output, "{}", self.position)?;
        self.write_log(opponent);

        if self.position.count(opponent) == 0 {
            return Ok(Some(Outcome::Won));
        }
        Ok(None)
    }

    fn opponent_turn(&mut self) -> Result<Option<Outcome>, CheckersError> {
        let opponent = self.engine.opposite();
        writeln!(self.output, "\n\n{}'s turn:\n", opponent.name())?;

        if self.move_generator.generate_moves(&self.position, opponent).is_empty() {
            writeln!(self.output, "\nOpponent cannot make any moves!")?;
            return Ok(Some(Outcome::Won));
        }

        let captures = self.move_generator.generate_captures(&self.position, opponent).len();
        if captures > 0 {
            writeln!(
                self.output,
                "\nWarning: {} has {} possible jump{}.\n         {} must jump or {} will lose!\n",
                opponent.name(),
                captures,
                if captures > 1 { "s" } else { "" },
                opponent.name(),
                opponent.name(),
            )?;
        }

        let backup = self.position;
        loop {
            let line = self.prompt("OPERATOR: Opponent's move was: ")?;

            if line == "draw" {
                writeln!(self.output, "Opponent has offered a draw.")?;
                if accept_draw(self.engine, self.position.count(self.engine), self.position.count(opponent), self.score) {
                    writeln!(self.output, "Draw has been offered and accepted.")?;
                    return Ok(Some(Outcome::Draw));
                }
                writeln!(self.output, "Draw has been offered and refused. Game will continue.")?;
                continue;
            }

            let mv = match parse_move(&self.position, opponent, &line) {
                Ok(mv) => mv,
                Err(err) => {
                    debug!("rejected opponent input: {}", err);
                    writeln!(self.output, "Invalid move entered!")?;
                    continue;
                }
            };

            if captures > 0 && !MoveGenerator::is_capture(&self.position, opponent, &mv) {
                writeln!(self.output, "\nWarning: This move will cause {} to lose!", opponent.name())?;
                if self.confirm("\nOPERATOR: Are you sure this is correct? [y/n] ")? {
                    writeln!(self.output, "\nIllegal move by {}! Should have jumped.", opponent.name())?;
                    return Ok(Some(Outcome::Won));
                }
                continue;
            }

            self.position = mv;
            write!(self.output, "{}", self.position)?;
            if self.confirm("OPERATOR: Is the board correct? [y/n] ")? {
                self.history.push(line);
                break;
            }
            self.position = backup;
        }

        self.write_log(self.engine);

        if self.position.count(self.engine) == 0 {
            return Ok(Some(Outcome::Lost));
        }
        Ok(None)
    }

    fn play_move(&mut self, mv: Move, text: String) {
        self.position = mv;
        self.history.push(text);
    }

    fn prompt(&mut self, text: &str) -> Result<String, CheckersError> {
        write!(self.output, "{}", text)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(CheckersError::InputClosed);
        }
        Ok(line.trim().to_string())
    }

    fn confirm(&mut self, text: &str) -> Result<bool, CheckersError> {
        loop {
            let answer = self.prompt(text)?;
            match answer.chars().next() {
                Some('y') => return Ok(true),
                Some('n') => return Ok(false),
                _ => {}
            }
        }
    }

    fn write_log(&self, to_move: Color) {
        let Some(path) = &self.log_path else {
            return;
        };
        let board = BoardFile {
            position: self.position,
            to_move,
            seconds_left: self.clock.seconds_left(),
        };
        if let Err(err) = wdp::write_log(path, &board, &self.history) {
            warn!("could not write game log: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::square_mask;
    use crate::search::SearchLimits;
    use std::io::Cursor;

    fn position(black: &[u32], white: &[u32]) -> Position {
        let bits = |s: &[u32]| s.iter().fold(0, |acc, &n| acc | square_mask(n).unwrap());
        Position::new(bits(black), bits(white), 0).unwrap()
    }

    fn game(board: BoardFile, engine: Color, script: &str) -> Game<Cursor<Vec<u8>>, Vec<u8>> {
        let mut search = Search::with_table_size(1 << 12);
        search.set_limits(SearchLimits {
            max_time: None,
            max_depth: Some(4),
        });
        Game::new(search, board, engine, Cursor::new(script.as_bytes().to_vec()), Vec::new())
    }

    fn board(position: Position, to_move: Color) -> BoardFile {
        BoardFile {
            position,
            to_move,
            seconds_left: 300.0,
        }
    }

    fn output(game: &Game<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8_lossy(&game.output).into_owned()
    }

    #[test]
    fn test_clock_allocation() {
        let mut clock = Clock::new(300.0);
        assert_eq!(clock.allocate(1, 3, 3, false), Some(Duration::from_secs(1)));
        assert_eq!(clock.allocate(7, 12, 12, true), Some(Duration::from_secs(1)));
        assert_eq!(clock.allocate(7, 9, 12, false), Some(Duration::from_secs(5)));
        assert_eq!(clock.allocate(7, 9, 12, true), Some(Duration::from_secs(3)));
        assert_eq!(clock.allocate(7, 3, 5, false), Some(Duration::from_secs(10)));

        // Last piece each: 300 / 40 rounds down and the reserve shrinks
        assert_eq!(clock.allocate(2, 1, 1, false), Some(Duration::from_secs(7)));
        assert_eq!(clock.moves_reserve, MOVES_RESERVE - 1);

        // Never more than a thirtieth of the clock, never under a second
        let mut short = Clock::new(10.0);
        assert_eq!(short.allocate(7, 3, 5, false), Some(Duration::from_secs(1)));

        assert_eq!(Clock::unlimited().allocate(7, 12, 12, false), None);
    }

    #[test]
    fn test_clock_expires() {
        let mut clock = Clock::new(1.0);
        clock.charge(Duration::from_millis(1500));
        assert!(clock.is_expired());

        let mut unlimited = Clock::unlimited();
        unlimited.charge(Duration::from_secs(1000));
        assert!(!unlimited.is_expired());
    }

    #[test]
    fn test_clock_totals_time_spent() {
        let mut clock = Clock::new(300.0);
        assert_eq!(clock.spent(), 0.0);
        clock.charge(Duration::from_millis(1500));
        clock.charge(Duration::from_millis(2500));
        assert_eq!(clock.spent(), 4.0);
        assert_eq!(clock.seconds_left(), 296.0);
    }

    #[test]
    fn test_standings_thresholds() {
        assert_eq!(standings(0), "Equal");
        assert_eq!(standings(12), "Slight black advantage");
        assert_eq!(standings(-30), "Medium white advantage");
        assert_eq!(standings(150), "Large black advantage");
        assert_eq!(standings(-350), "Very large white advantage");
        assert_eq!(standings(351), "Black is winning");
        assert_eq!(standings(-1_000_000), "White is winning");
    }

    #[test]
    fn test_accept_draw_only_when_behind() {
        assert!(accept_draw(Color::Black, 2, 3, -40));
        assert!(!accept_draw(Color::Black, 2, 3, 40));
        assert!(!accept_draw(Color::Black, 3, 3, -40));
        assert!(accept_draw(Color::White, 1, 4, 40));
        assert!(!accept_draw(Color::White, 1, 4, 0));
    }

    #[test]
    fn test_engine_takes_last_piece() {
        let mut game = game(board(position(&[14], &[18]), Color::Black), Color::Black, "");
        assert_eq!(game.play().unwrap(), Outcome::Won);
        let text = output(&game);
        assert!(text.contains("My move is: 1. 14-23"));
        assert!(text.contains("Time on this move: "));
        assert!(text.contains(" Total time spent: "));
        assert_eq!(game.history(), ["14-23"]);
    }

    #[test]
    fn test_opponent_skipping_capture_forfeits() {
        let mut game = game(board(position(&[14], &[18]), Color::Black), Color::White, "14-17\ny\n");
        assert_eq!(game.play().unwrap(), Outcome::Won);
        let text = output(&game);
        assert!(text.contains("must jump"));
        assert!(text.contains("Should have jumped"));
    }

    #[test]
    fn test_opponent_takes_last_piece() {
        let log = std::env::temp_dir().join(format!("checkers-game-{}.wdp", std::process::id()));
        let mut game = game(board(position(&[14], &[18]), Color::Black), Color::White, "abc\n14-23\nn\n14-23\ny\n")
            .with_log(log.clone());
        assert_eq!(game.play().unwrap(), Outcome::Lost);
        assert!(output(&game).contains("Invalid move entered!"));
        assert_eq!(*game.position(), position(&[23], &[]));

        let written = wdp::read_board(&log).unwrap();
        assert_eq!(written.position, position(&[23], &[]));
        assert_eq!(written.to_move, Color::White);
        std::fs::remove_file(&log).unwrap();
    }

    #[test]
    fn test_draw_refused_then_input_closed() {
        let start = position(&[1, 2], &[30]);
        let mut game = game(board(start, Color::Black), Color::White, "draw\n");
        assert!(matches!(game.play(), Err(CheckersError::InputClosed)));
        assert!(output(&game).contains("refused"));
        assert_eq!(*game.position(), start);
    }
}
