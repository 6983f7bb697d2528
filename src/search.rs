use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, trace};
use thiserror::Error;

use crate::board::{Color, Move, Position};
use crate::evaluation::Evaluator;
use crate::movegen::MoveGenerator;
use crate::transposition::{Probe, TranspositionTable, DEFAULT_TABLE_SIZE, INFINITY};

/// Deepest iteration the driver will start.
pub const MAX_DEPTH: u32 = 64;

/// Raised at a node once the deadline has passed or the stop flag is set.
/// It unwinds the whole recursion; nothing is stored on the way out.
#[derive(Debug, Error)]
#[error("search interrupted")]
struct Interrupted;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: u64,
    pub evaluations: u64,
    pub table_hits: u64,
    pub completed_depth: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchResult {
    /// `None` when the side to move has no legal move and has lost.
    pub best_move: Option<Move>,
    /// Value of the last completed depth from the mover's point of view.
    pub value: i32,
    pub stats: SearchStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchLimits {
    /// `None` searches until a forced result or the depth cap.
    pub max_time: Option<Duration>,
    pub max_depth: Option<u32>,
}

pub struct Search {
    evaluator: Evaluator,
    move_generator: MoveGenerator,
    transposition_table: TranspositionTable,
    limits: SearchLimits,
    stats: SearchStats,
    stop: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
    interruptible: bool,
    top_depth: u32,
    root_moves: Vec<Move>,
    root_best: Option<Move>,
}

impl Default for Search {
    fn default() -> Self {
        Self::new()
    }
}

impl Search {
    pub fn new() -> Self {
        Self::with_table_size(DEFAULT_TABLE_SIZE)
    }

    pub fn with_table_size(size: usize) -> Self {
        Self {
            evaluator: Evaluator::new(),
            move_generator: MoveGenerator::new(),
            transposition_table: TranspositionTable::new(size),
            limits: SearchLimits::default(),
            stats: SearchStats::default(),
            stop: None,
            deadline: None,
            interruptible: false,
            top_depth: 0,
            root_moves: Vec::new(),
            root_best: None,
        }
    }

    pub fn set_limits(&mut self, limits: SearchLimits) {
        self.limits = limits;
    }

    pub fn limits(&self) -> SearchLimits {
        self.limits
    }

    pub fn set_max_depth(&mut self, depth: Option<u32>) {
        self.limits.max_depth = depth;
    }

    /// Time budget in whole seconds; `None` disables the cutoff.
    pub fn set_max_time(&mut self, seconds: Option<u64>) {
        self.limits.max_time = seconds.map(Duration::from_secs);
    }

    /// Flag polled at every node alongside the deadline.
    pub fn set_stop_flag(&mut self, stop: Option<Arc<AtomicBool>>) {
        self.stop = stop;
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn transposition_table(&self) -> &TranspositionTable {
        &self.transposition_table
    }

    /// Picks a move for `color` by iterative deepening with MTD(f).
    ///
    /// Depth 1 always runs to completion. Deeper iterations may be cut off
    /// by the time limit or stop flag, in which case the result of the last
    /// fully searched depth is returned.
    pub fn find_best_move(&mut self, position: &Position, color: Color) -> SearchResult {
        let start = Instant::now();
        self.stats = SearchStats::default();
        self.interruptible = false;
        self.deadline = None;
        self.root_best = None;
        self.root_moves = self.move_generator.generate_moves(position, color);

        if self.root_moves.is_empty() {
            debug!("{} has no legal moves", color.name());
            return SearchResult {
                best_move: None,
                value: -INFINITY,
                stats: self.stats,
            };
        }

        // First iteration with an open window seeds the value
        self.top_depth = 1;
        let mut value = match self.alpha_beta(position, -INFINITY, INFINITY, 1, color) {
            Ok(value) => value,
            Err(Interrupted) => -INFINITY,
        };
        let mut best_move = self.root_best.or_else(|| self.root_moves.first().copied());
        self.stats.completed_depth = 1;
        debug!("depth 1: value {}", value);

        self.deadline = self.limits.max_time.map(|budget| start + budget);
        self.interruptible = true;

        let max_depth = self.limits.max_depth.unwrap_or(MAX_DEPTH).clamp(1, MAX_DEPTH);
        for depth in 2..=max_depth {
            if value >= INFINITY || value <= -INFINITY {
                break;
            }

            self.top_depth = depth;
            self.root_best = best_move;
            match self.mtdf(position, color, depth, value) {
                Ok(next) => {
                    value = next;
                    best_move = self.root_best;
                    self.stats.completed_depth = depth;
                    debug!("depth {}: value {}, {} nodes", depth, value, self.stats.nodes);
                }
                Err(Interrupted) => {
                    debug!("depth {} interrupted after {:?}", depth, start.elapsed());
                    break;
                }
            }
        }
        self.interruptible = false;

        let elapsed = start.elapsed().as_secs_f64();
        info!(
            "Completed {} depths, {} nodes, {} evals, {} hash hits ({:.02} eval/sec)",
            self.stats.completed_depth,
            self.stats.nodes,
            self.stats.evaluations,
            self.stats.table_hits,
            if elapsed > 0.0 { self.stats.evaluations as f64 / elapsed } else { 0.0 },
        );

        SearchResult {
            best_move,
            value,
            stats: self.stats,
        }
    }

    /// Converges on the exact value at `depth` with zero-width probes
    /// around `guess`.
    fn mtdf(&mut self, position: &Position, color: Color, depth: u32, guess: i32) -> Result<i32, Interrupted> {
        let mut value = guess;
        let mut lower_bound = -INFINITY;
        let mut upper_bound = INFINITY;

        while upper_bound > lower_bound {
            let beta = if value == lower_bound { value + 1 } else { value };
            value = self.alpha_beta(position, beta - 1, beta, depth, color)?;
            trace!("probe beta {} -> {} [{}, {}]", beta, value, lower_bound, upper_bound);

            if value < beta {
                upper_bound = value;
            } else {
                lower_bound = value;
            }
        }
        Ok(value)
    }

    fn check_interrupt(&self) -> Result<(), Interrupted> {
        if !self.interruptible {
            return Ok(());
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Interrupted);
            }
        }
        if let Some(stop) = &self.stop {
            if stop.load(Ordering::Relaxed) {
                return Err(Interrupted);
            }
        }
        Ok(())
    }

    /// Alpha-beta with memory in negamax form: the returned value is from
    /// the point of view of `color`.
    fn alpha_beta(&mut self, position: &Position, alpha: i32, beta: i32, depth: u32, color: Color) -> Result<i32, Interrupted> {
        self.check_interrupt()?;
        self.stats.nodes += 1;

        if depth == 0 {
            self.stats.evaluations += 1;
            return Ok(match color {
                Color::Black => self.evaluator.evaluate(position, Color::Black),
                Color::White => -self.evaluator.evaluate(position, Color::White),
            });
        }

        let is_root = depth == self.top_depth;
        let (mut alpha, mut beta) = (alpha, beta);

        // Check transposition table. The root skips it and walks its moves
        // in generator order, settling on the first move reaching the value.
        let entry = if is_root {
            None
        } else {
            self.transposition_table.lookup(position, color).copied()
        };
        if let Some(entry) = entry {
            self.stats.table_hits += 1;
            match entry.probe(depth, alpha, beta) {
                Probe::Cutoff(value) => return Ok(value),
                Probe::Window(low, high) => {
                    alpha = low;
                    beta = high;
                }
            }
        }

        let mut moves = self.move_generator.generate_moves(position, color);

        // Try the remembered best move first, once it is confirmed legal here
        if let Some(hash_move) = entry.and_then(|entry| entry.best_move) {
            if let Some(index) = moves.iter().position(|mv| *mv == hash_move) {
                moves.swap(0, index);
            }
        }

        // No moves means the side to move has lost
        let mut value = -INFINITY;
        let mut best_alpha = alpha;
        let mut best_move = None;
        for mv in moves {
            if value >= beta {
                break;
            }
            let next_value = -self.alpha_beta(&mv, -beta, -best_alpha, depth - 1, color.opposite())?;
            if next_value > value {
                value = next_value;
                best_move = Some(mv);
            }
            if next_value > best_alpha {
                best_alpha = next_value;
                if is_root {
                    self.root_best = Some(mv);
                }
            }
        }

        self.transposition_table
            .store(position, color, depth, alpha, beta, value, best_move);

        Ok(value)
    }
}
