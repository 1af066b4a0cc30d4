//! A command-line tool which indexes a PGN database, checks its games and
//! dumps them.

mod dump_game;

use annotate_snippets::Renderer;
use clap::Parser as _;
use dump_game::{dump_game, DumpOptions};
use pgnparser_rs::line_cache::LineCache;
use pgnparser_rs::{Error, NagFormat, Parser, ParserOptions, Report, ALL_GAMES};
use simple_logger::SimpleLogger;
use std::io::{stdout, BufWriter, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// A PGN database indexer, validator and dumping tool
#[derive(Debug, clap::Parser)]
#[command(version, about, verbatim_doc_comment)]
struct Cli {
    /// Database file to load
    #[arg(id("DATABASE"), required_unless_present("text"))]
    db: Option<String>,
    /// Provides raw database content on the command line; may be repeated
    #[arg(long, value_names(&["NAME", "TEXT"]))]
    text: Vec<String>,
    /// Prints the number of games
    #[arg(short, long)]
    count: bool,
    /// Dumps the given game; may be repeated.  All games are dumped by default
    #[arg(short, long, value_name("N"), value_parser = clap::value_parser!(u32).range(1..))]
    game: Vec<u32>,
    /// Prints the tag pairs of each game
    #[arg(short, long)]
    tags: bool,
    /// Prints the moves of each game, with variations, comments and annotations
    #[arg(short, long)]
    moves: bool,
    /// How to print annotation glyphs: numeric, brief or detailed
    #[arg(long, value_name("FORMAT"), default_value = "brief")]
    nag_format: NagFormat,
    /// Parses the movetext of each game and reports every problem in it
    #[arg(short, long)]
    deep: bool,
    /// Reports problems which are otherwise tolerated silently
    #[arg(long)]
    strict: bool,
    /// Number of threads to index the database from
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    jobs: Option<u32>,
    /// Activates debug logs
    #[arg(long)]
    debug: bool,
}

/// Opens the database file, if one was given, and one in-memory database per
/// `--text NAME TEXT` pair.
fn open_all(cli: &Cli, options: &ParserOptions) -> Result<Vec<Parser>, Error> {
    let mut parsers = vec![];
    if let Some(path) = &cli.db {
        parsers.push(Parser::open(path, options.clone())?);
    }
    for kv in cli.text.chunks(2) {
        let text = kv[1].clone().into_bytes();
        parsers.push(Parser::from_bytes(kv[0].clone(), text, options.clone())?);
    }
    Ok(parsers)
}

/// Indexes the whole database from `jobs` threads at once.
fn index_parallel(parser: &Parser, jobs: u32) -> Result<u32, Error> {
    std::thread::scope(|s| {
        let workers: Vec<_> = (0..jobs)
            .map(|_| s.spawn(|| parser.index_to(ALL_GAMES)))
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .try_fold(0, |most, res| res.map(|n| most.max(n)))
    })
}

/// Counts, checks and dumps the games of one database, then prints the
/// problems found.  Returns the number of problems and failed reads.
fn process(cli: &Cli, parser: &Parser, opts: DumpOptions) -> usize {
    let reports = Arc::new(Mutex::new(Vec::<Report>::new()));
    let sink = reports.clone();
    parser.set_error_handler(Some(Box::new(move |report: &Report| {
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report.clone());
        true
    })));

    let jobs = cli.jobs.unwrap_or(1);
    let mut failures = 0;
    let indexed = if jobs > 1 {
        index_parallel(parser, jobs).and_then(|_| parser.game_count())
    } else {
        parser.game_count()
    };
    let count = indexed.unwrap_or_else(|err| {
        eprintln!("{}: error: {err}", parser.name());
        failures += 1;
        parser.indexed_count()
    });

    if cli.count {
        println!("{}: {count} games", parser.name());
    }

    let games = if !cli.game.is_empty() {
        cli.game.clone()
    } else if cli.count && !(cli.tags || cli.moves || cli.deep) {
        vec![]
    } else {
        (1..=count).collect()
    };
    let mut out = BufWriter::new(stdout());
    for n in games {
        match parser.read_game(n) {
            Ok(Some(game)) => {
                if let Err(err) = dump_game(&game, opts, &mut out) {
                    eprintln!("error: {err}");
                    std::process::exit(1);
                }
            }
            Ok(None) => {
                eprintln!("{}: game {n}: no such game", parser.name());
                failures += 1;
            }
            // fatal and aborting problems were collected by the handler
            Err(Error::Io(err)) => {
                eprintln!("{}: game {n}: {err}", parser.name());
                failures += 1;
            }
            Err(_) => {}
        }
    }
    _ = out.flush();
    drop(out);
    parser.set_error_handler(None);

    let text = parser.text();
    let mut lc = LineCache::default();
    let r = Renderer::styled();
    let reports = reports.lock().unwrap_or_else(PoisonError::into_inner);
    for report in reports.iter() {
        report
            .diagnostic
            .render(parser.name(), &text, &mut lc, |msg| println!("{}", r.render(msg)));
    }
    reports.len() + failures
}

fn main() {
    let cli = Cli::parse();

    if cli.debug {
        SimpleLogger::new().init().unwrap();
    }

    let options = ParserOptions {
        strict: cli.strict,
        prefetch: 0,
    };
    let parsers = match open_all(&cli, &options) {
        Ok(parsers) => parsers,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };
    let opts = DumpOptions {
        tags: cli.tags,
        moves: cli.moves,
        nag_format: cli.nag_format,
        deep: cli.deep,
    };
    let problems: usize = parsers
        .iter()
        .map(|parser| process(&cli, parser, opts))
        .sum();
    println!("{problems} diagnostics issued.");

    // Exit with code 1 if any warning or error were encountered
    let code = if problems > 0 { 1 } else { 0 };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser as _;

    #[test]
    fn every_text_pair_is_opened() {
        let cli = Cli::parse_from([
            "pgndump",
            "--text",
            "one.pgn",
            "[Event \"A\"] 1. e4 *",
            "--text",
            "two.pgn",
            "[Event \"B\"] 1. d4 * [Event \"C\"] 1. c4 *",
        ]);
        let parsers = open_all(&cli, &ParserOptions::default()).unwrap();
        let names: Vec<_> = parsers.iter().map(Parser::name).collect();
        assert_eq!(names, vec!["one.pgn", "two.pgn"]);
        assert_eq!(parsers[1].game_count().unwrap(), 2);
    }

    #[test]
    fn parallel_indexing_finds_every_game() {
        let text = "[Event \"A\"]\n1. e4 *\n\n".repeat(50);
        let parser = Parser::from_bytes("many.pgn", text.into_bytes(), ParserOptions::default()).unwrap();
        assert_eq!(index_parallel(&parser, 4).unwrap(), 50);
        assert!(parser.is_fully_indexed());
    }
}
