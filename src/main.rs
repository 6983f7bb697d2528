use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use checkers::evaluation::Evaluator;
use checkers::game::Game;
use checkers::movegen::MoveGenerator;
use checkers::notation::describe_move;
use checkers::search::{Search, SearchLimits};
use checkers::transposition::DEFAULT_TABLE_SIZE;
use checkers::wdp::{self, BoardFile};
use checkers::Color;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a game against an opponent whose moves are typed in
    Play {
        /// Board file to start from (standard opening if omitted)
        board: Option<PathBuf>,

        /// Side the engine plays; asked for when omitted
        #[arg(long, value_enum)]
        engine: Option<Side>,

        /// Rewrite this file with the board and move list after every move
        #[arg(long)]
        log: Option<PathBuf>,

        /// Ignore the clock
        #[arg(long)]
        unlimited: bool,

        /// Transposition table slots
        #[arg(long, default_value_t = DEFAULT_TABLE_SIZE)]
        hash_size: usize,

        /// Deepest iteration to search
        #[arg(long)]
        depth: Option<u32>,
    },
    /// Search one position and report the chosen move
    Analyze {
        board: PathBuf,

        /// Seconds to search
        #[arg(long)]
        time: Option<u64>,

        #[arg(long)]
        depth: Option<u32>,

        #[arg(long, default_value_t = DEFAULT_TABLE_SIZE)]
        hash_size: usize,
    },
    /// List the legal moves of a position
    Moves { board: PathBuf },
    /// Break down the evaluation of a position
    Eval { board: PathBuf },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Side {
    Black,
    White,
}

impl From<Side> for Color {
    fn from(side: Side) -> Color {
        match side {
            Side::Black => Color::Black,
            Side::White => Color::White,
        }
    }
}

fn main() {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, log_level),
    );
    builder
        .format(|buf, record| writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args()))
        .write_style(env_logger::WriteStyle::Never)
        .target(env_logger::Target::Stderr)
        .init();

    if let Err(e) = run(args.command) {
        log::error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Play {
            board,
            engine,
            log,
            unlimited,
            hash_size,
            depth,
        } => play(board, engine, log, unlimited, hash_size, depth),
        Command::Analyze {
            board,
            time,
            depth,
            hash_size,
        } => analyze(board, time, depth, hash_size),
        Command::Moves { board } => moves(board),
        Command::Eval { board } => eval(board),
    }
}

fn load(path: &Path) -> Result<BoardFile> {
    wdp::read_board(path).with_context(|| format!("Could not load board {}", path.display()))
}

fn ask_engine_side(input: &mut impl BufRead) -> Result<Color> {
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "OPERATOR: Enter 'b' if system is black, 'w' if white. [b/w] ")?;
        stdout.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            bail!("input closed before a side was chosen");
        }
        match line.trim() {
            "b" => return Ok(Color::Black),
            "w" => return Ok(Color::White),
            _ => {}
        }
    }
}

fn play(
    board: Option<PathBuf>,
    engine: Option<Side>,
    log: Option<PathBuf>,
    unlimited: bool,
    hash_size: usize,
    depth: Option<u32>,
) -> Result<()> {
    println!("Checkers\n");

    let board = match &board {
        Some(path) => {
            println!("Using {}.", path.display());
            load(path)?
        }
        None => BoardFile::default(),
    };

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let engine = match engine {
        Some(side) => side.into(),
        None => ask_engine_side(&mut input)?,
    };

    let mut search = Search::with_table_size(hash_size);
    search.set_max_depth(depth);

    let mut game = Game::new(search, board, engine, input, io::stdout());
    if let Some(path) = log {
        println!("Logging game to {}.", path.display());
        game = game.with_log(path);
    }
    if unlimited {
        println!("Unlimited time.");
        game = game.with_unlimited_time();
    }

    game.play()?;
    Ok(())
}

fn analyze(path: PathBuf, time: Option<u64>, depth: Option<u32>, hash_size: usize) -> Result<()> {
    let board = load(&path)?;
    let mut search = Search::with_table_size(hash_size);
    search.set_limits(SearchLimits {
        max_time: None,
        max_depth: depth,
    });
    search.set_max_time(time);

    print!("{}", board.position);
    let result = search.find_best_move(&board.position, board.to_move);
    match result.best_move {
        Some(mv) => {
            let text = describe_move(&board.position, &mv, board.to_move)
                .context("Search returned a move with no notation")?;
            println!("Best move: {}", text);
            print!("{}", mv);
        }
        None => println!("{} has no legal moves.", board.to_move.name()),
    }
    println!("Value: {}", result.value);
    println!(
        "Completed {} depths, {} nodes, {} evals, {} hash hits",
        result.stats.completed_depth, result.stats.nodes, result.stats.evaluations, result.stats.table_hits
    );
    Ok(())
}

fn moves(path: PathBuf) -> Result<()> {
    let board = load(&path)?;
    let moves = MoveGenerator::new().generate_moves(&board.position, board.to_move);
    for (i, mv) in moves.iter().enumerate() {
        println!("move option #{}", i + 1);
        print!("{}", mv);
        let text = describe_move(&board.position, mv, board.to_move)
            .with_context(|| format!("Move option #{} has no notation", i + 1))?;
        println!("{}", text);
    }
    if moves.is_empty() {
        println!("{} has no legal moves.", board.to_move.name());
    }
    Ok(())
}

fn eval(path: PathBuf) -> Result<()> {
    let board = load(&path)?;
    let terms = Evaluator::new().evaluate_terms(&board.position, board.to_move);
    print!("{}", board.position);
    println!("{} to move", board.to_move.name());
    println!("{}", terms);
    Ok(())
}
