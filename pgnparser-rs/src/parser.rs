//! The entry point: random access to the games of one PGN database.
//!
//! A [`Parser`] owns the mapping of the database, the game index built so far
//! and the error handler.  All operations take `&self`, so one parser can be
//! shared between threads; indexing is serialized internally, and reading or
//! validating games proceeds in parallel.
//!
//! ```no_run
//! use pgnparser_rs::{Parser, ParserOptions};
//!
//! let parser = Parser::open("games.pgn", ParserOptions::default())?;
//! println!("{} games", parser.game_count()?);
//! if let Some(game) = parser.read_game(1)? {
//!     println!("{:?} vs {:?}: {}", game.white(), game.black(), game.main_line());
//! }
//! # Ok::<(), pgnparser_rs::Error>(())
//! ```

use crate::diag::{Diagnostic, Error, SyntaxError};
use crate::game::{Game, Validation};
use crate::index::{Index, IndexEntry, Scan, ALL_GAMES};
use crate::reporter::{ErrorHandler, Reporter};
use crate::source::{BufferRef, Source, Span};
use crate::util::quick_hash;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Options which affect the behavior of a [`Parser`].
#[derive(Clone, Debug, Default)]
pub struct ParserOptions {
    /// Report problems which are otherwise fixed up silently: tabs in tag
    /// values, and text after a game's termination marker.
    pub strict: bool,
    /// Number of games to index when the database is opened.
    pub prefetch: u32,
}

/// What games keep from the parser which read them.
#[derive(Debug)]
pub(crate) struct Shared {
    pub reporter: Reporter,
    pub options: ParserOptions,
}

/// Random access to the games of one database.
#[derive(Debug)]
pub struct Parser {
    source: Source,
    index: Index,
    shared: Arc<Shared>,
    /// The sequence number of the last game read.
    cursor: AtomicU32,
    /// The last game read, handed out again when it is asked for again.
    current: Mutex<Option<Arc<Game>>>,
}

impl Parser {
    fn with_source(source: Source, options: ParserOptions) -> Result<Parser, Error> {
        let prefetch = options.prefetch;
        let parser = Parser {
            source,
            index: Index::default(),
            shared: Arc::new(Shared {
                reporter: Reporter::default(),
                options,
            }),
            cursor: AtomicU32::new(0),
            current: Mutex::new(None),
        };
        if prefetch > 0 {
            parser.index_to(prefetch)?;
        }
        Ok(parser)
    }

    /// Opens a database file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, or if prefetching runs into a
    /// critical problem.
    pub fn open(path: impl AsRef<Path>, options: ParserOptions) -> Result<Parser, Error> {
        Parser::with_source(Source::open(path)?, options)
    }

    /// Creates a parser over database content held in memory.  `name` is
    /// used in diagnostics.
    ///
    /// # Errors
    ///
    /// Fails if prefetching runs into a critical problem.
    pub fn from_bytes(
        name: impl Into<String>,
        bytes: Vec<u8>,
        options: ParserOptions,
    ) -> Result<Parser, Error> {
        Parser::with_source(Source::from_bytes(name, bytes), options)
    }

    /// The name of the database, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        self.source.name()
    }

    /// The current content of the database, for rendering diagnostics.
    #[must_use]
    pub fn text(&self) -> BufferRef {
        self.source.snapshot()
    }

    /// The options the parser was created with.
    #[must_use]
    pub fn options(&self) -> &ParserOptions {
        &self.shared.options
    }

    /// Installs an error handler, or removes it with `None`.
    ///
    /// Without a handler, recoverable problems are ignored.  The handler must
    /// not call back into this parser.
    pub fn set_error_handler(&self, handler: Option<Box<dyn ErrorHandler>>) {
        self.shared.reporter.set_handler(handler);
    }

    /// Picks up changes to the database file since it was mapped.
    fn refresh(&self) -> Result<(), Error> {
        if let Some(remap) = self.source.refresh()? {
            if remap.grew() {
                self.index.reopen();
            }
        }
        Ok(())
    }

    /// Indexes at least `target` games, or the whole database if it holds
    /// fewer, and returns the number of games indexed.  Use [`ALL_GAMES`] to
    /// index everything.
    ///
    /// # Errors
    ///
    /// Fails on a critical problem, or when the error handler declines to
    /// continue past a problem.  Games indexed before the failure are kept.
    pub fn index_to(&self, target: u32) -> Result<u32, Error> {
        let buf = self.source.snapshot();
        self.index.ensure(
            target,
            Scan {
                buf: &buf,
                reporter: &self.shared.reporter,
                strict: self.shared.options.strict,
            },
        )
    }

    /// The number of games in the database.  Indexes the whole database.
    ///
    /// # Errors
    ///
    /// As for [`Parser::index_to`].
    pub fn game_count(&self) -> Result<u32, Error> {
        self.refresh()?;
        self.index_to(ALL_GAMES)
    }

    /// Has the whole database been indexed?
    #[must_use]
    pub fn is_fully_indexed(&self) -> bool {
        self.index.is_complete()
    }

    /// The number of games indexed so far, without indexing more.
    #[must_use]
    pub fn indexed_count(&self) -> u32 {
        self.index.size()
    }

    /// A copy of the index entries found so far.
    #[must_use]
    pub fn entries(&self) -> Vec<IndexEntry> {
        self.index.entries()
    }

    fn fatal(&self, buf: &[u8], diag: Diagnostic) -> Error {
        match self.shared.reporter.report(buf, &diag) {
            Err(err) => err,
            Ok(()) => Error::Fatal(diag),
        }
    }

    /// Reads game `n`, counting from 1.  Returns `None` if the database has
    /// fewer games.
    ///
    /// # Errors
    ///
    /// Fails if indexing up to the game fails, if the file changed under the
    /// index entry for the game, if its movetext has unmatched parentheses,
    /// or if the error handler declines to continue past a problem in the
    /// game.  After a change is detected, the
    /// game and those after it are indexed again on the next read.
    pub fn read_game(&self, n: u32) -> Result<Option<Arc<Game>>, Error> {
        if n == 0 {
            return Ok(None);
        }
        self.refresh()?;
        if self.index_to(n)? < n {
            return Ok(None);
        }
        let Some(entry) = self.index.entry(n) else {
            return Ok(None);
        };
        let buffer = self.source.snapshot();
        if entry.tags.end > buffer.len() || entry.movetext.end > buffer.len() {
            self.index.invalidate_from(n);
            let span = Span::new(entry.tags.start.min(buffer.len()), buffer.len());
            return Err(self.fatal(&buffer, Diagnostic::GameOutOfRange { game: n, span }));
        }
        if quick_hash(entry.tags.as_ref(&buffer)) != entry.quick_hash {
            self.index.invalidate_from(n);
            let diag = Diagnostic::HashMismatch {
                game: n,
                span: entry.tags,
            };
            return Err(self.fatal(&buffer, diag));
        }
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let reusable = current.as_ref().filter(|game| {
            game.sequence_number() == n
                && *game.entry() == entry
                && Arc::ptr_eq(game.buffer(), &buffer)
        });
        let game = match reusable {
            Some(game) => game.clone(),
            None => {
                let game = Arc::new(Game::new(n, entry, buffer, self.shared.clone())?);
                *current = Some(game.clone());
                game
            }
        };
        self.cursor.store(n, Ordering::Relaxed);
        Ok(Some(game))
    }

    /// Reads the game after the one read last, starting with game 1.
    ///
    /// # Errors
    ///
    /// As for [`Parser::read_game`].
    pub fn read_next(&self) -> Result<Option<Arc<Game>>, Error> {
        let next = self.cursor.load(Ordering::Relaxed).saturating_add(1);
        self.read_game(next)
    }

    /// Checks a game read from this parser.  See [`Game::validate`].
    pub fn is_game_valid(&self, game: &Game, mode: Validation) -> SyntaxError {
        game.validate(mode)
    }
}
