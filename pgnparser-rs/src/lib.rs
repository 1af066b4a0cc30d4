//! A library for random access to [PGN](https://www.saremba.de/chessgml/standards/pgn/pgn-complete.htm)
//! chess databases.  The entry point for all API operations is
//! [`Parser`], in the `parser` module.
//!
//! Opening a database only maps the file.  Games are located on demand by an
//! incremental index which records where each game's tag pairs and movetext
//! lie; reading a game decodes its tag pairs and parses its movetext into a
//! tree of variations.  Problems found along
//! the way are passed to an optional [`ErrorHandler`], which decides whether
//! the operation carries on.

pub use fnv;
pub use regex;
pub use shakmaty;

mod skip;
mod tags;
mod util;

pub mod diag;
pub mod game;
pub mod index;
pub mod line_cache;
mod movetext;
pub mod nag;
pub mod parser;
pub mod reporter;
pub mod source;

#[cfg(test)]
mod index_tests;

pub use diag::{Diagnostic, Error, SyntaxError};
pub use game::{Game, GameResult, Move, TagPair, Validation, Variation};
pub use index::{IndexEntry, ALL_GAMES};
pub use nag::{InvalidNag, Nag, NagFormat};
pub use parser::{Parser, ParserOptions};
pub use reporter::{ErrorHandler, Report};
pub use source::Span;
