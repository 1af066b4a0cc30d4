//! Datatypes to represent the problems found while indexing and parsing PGN
//! text.
//!
//! [`SyntaxError`] is the coarse classification handed to error handlers and
//! returned by validation; [`Diagnostic`] is the precise description, with the
//! byte range it applies to, which can be rendered for humans.  [`Error`] is
//! what the fallible operations of the parser return.

use crate::line_cache::LineCache;
use crate::source::Span;
use annotate_snippets::{Level, Message, Snippet};
use std::borrow::Cow;
use std::fmt::{self, Display};
use std::io;
use typed_arena::Arena;

/// The kinds of syntax error a game can exhibit.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum SyntaxError {
    /// No error.
    #[default]
    Valid,
    /// Text that does not fit the grammar at all.
    IllegalToken,
    /// A malformed tag value.
    IllegalTagValue,
    /// A malformed tag name.
    IllegalTagName,
    /// A malformed move or move annotation.
    IllegalMove,
    /// A missing or unrecognized game termination marker.
    IllegalTerminationMarker,
    /// A problem not described by any of the other codes.
    UndefinedErrorCode,
}

impl SyntaxError {
    /// Is this the absence of an error?
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, SyntaxError::Valid)
    }

    /// A short name for the error kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            SyntaxError::Valid => "valid",
            SyntaxError::IllegalToken => "illegal token",
            SyntaxError::IllegalTagValue => "illegal tag value",
            SyntaxError::IllegalTagName => "illegal tag name",
            SyntaxError::IllegalMove => "illegal move",
            SyntaxError::IllegalTerminationMarker => "illegal termination marker",
            SyntaxError::UndefinedErrorCode => "undefined error",
        }
    }

    /// Keeps the first error seen: `self` unless it is `Valid`.
    #[must_use]
    pub const fn or(self, other: SyntaxError) -> SyntaxError {
        match self {
            SyntaxError::Valid => other,
            _ => self,
        }
    }
}

impl Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// List of all problems that can be reported.
///
/// Every span is absolute within the database.
#[derive(Debug, Clone, Eq, PartialEq)]
#[allow(missing_docs)]
pub enum Diagnostic {
    BadNag(Span),
    BadSan(Span),
    BadTagName(Span),
    BadTerminationMarker(Span),
    ControlInTagValue(Span),
    GameOutOfRange { game: u32, span: Span },
    HashMismatch { game: u32, span: Span },
    IoError(String),
    MarkerInVariation(Span),
    MissingTagValue(Span),
    MissingTerminationMarker(Span),
    NagWithoutMove(Span),
    TabInTagValue(Span),
    TokensAfterTermination { marker: Span, extra: Span },
    UnclosedComment(Span),
    UnclosedEscape(Span),
    UnclosedTag(Span),
    UnclosedTagValue(Span),
    UnexpectedCharacter(Span),
    UnexpectedHeaderText(Span),
    UnmatchedCloseParen(Span),
    UnmatchedOpenParen(Span),
    VariationWithoutMove(Span),
}
use self::Diagnostic::*;

impl From<io::Error> for Diagnostic {
    fn from(err: io::Error) -> Diagnostic {
        IoError(format!("{err}"))
    }
}

impl Diagnostic {
    /// The syntax error kind reported to error handlers for this problem.
    #[must_use]
    pub const fn code(&self) -> SyntaxError {
        match self {
            BadTagName(_) => SyntaxError::IllegalTagName,
            ControlInTagValue(_) | MissingTagValue(_) | TabInTagValue(_) | UnclosedTagValue(_) => {
                SyntaxError::IllegalTagValue
            }
            BadNag(_) | BadSan(_) => SyntaxError::IllegalMove,
            BadTerminationMarker(_) | MarkerInVariation(_) | MissingTerminationMarker(_) => {
                SyntaxError::IllegalTerminationMarker
            }
            NagWithoutMove(_)
            | TokensAfterTermination { .. }
            | UnclosedComment(_)
            | UnclosedEscape(_)
            | UnclosedTag(_)
            | UnexpectedCharacter(_)
            | UnexpectedHeaderText(_)
            | UnmatchedCloseParen(_)
            | UnmatchedOpenParen(_)
            | VariationWithoutMove(_) => SyntaxError::IllegalToken,
            GameOutOfRange { .. } | HashMismatch { .. } | IoError(_) => {
                SyntaxError::UndefinedErrorCode
            }
        }
    }

    /// Critical problems always abort the operation that found them, whatever
    /// the error handler answers.
    #[must_use]
    pub const fn is_critical(&self) -> bool {
        matches!(
            self,
            GameOutOfRange { .. }
                | HashMismatch { .. }
                | IoError(_)
                | UnmatchedCloseParen(_)
                | UnmatchedOpenParen(_)
        )
    }

    /// The main location of the problem, if it has one.
    #[must_use]
    pub const fn span(&self) -> Option<Span> {
        match *self {
            BadNag(span)
            | BadSan(span)
            | BadTagName(span)
            | BadTerminationMarker(span)
            | ControlInTagValue(span)
            | GameOutOfRange { span, .. }
            | HashMismatch { span, .. }
            | MarkerInVariation(span)
            | MissingTagValue(span)
            | MissingTerminationMarker(span)
            | NagWithoutMove(span)
            | TabInTagValue(span)
            | TokensAfterTermination { extra: span, .. }
            | UnclosedComment(span)
            | UnclosedEscape(span)
            | UnclosedTag(span)
            | UnclosedTagValue(span)
            | UnexpectedCharacter(span)
            | UnexpectedHeaderText(span)
            | UnmatchedCloseParen(span)
            | UnmatchedOpenParen(span)
            | VariationWithoutMove(span) => Some(span),
            IoError(_) => None,
        }
    }

    /// The severity used when rendering.
    #[must_use]
    pub const fn level(&self) -> Level {
        if self.is_critical() {
            Level::Error
        } else {
            Level::Warning
        }
    }

    fn infos(&self) -> Vec<(Level, Cow<'static, str>, Span)> {
        let level = self.level();
        match *self {
            TokensAfterTermination { marker, extra } => vec![
                (level, "not part of the game".into(), extra),
                (Level::Note, "the game ended here".into(), marker),
            ],
            HashMismatch { game, span } => vec![(
                level,
                format!("game {game} no longer matches the index").into(),
                span,
            )],
            _ => self
                .span()
                .map(|span| (level, self.code().name().into(), span))
                .into_iter()
                .collect(),
        }
    }

    /// Renders the diagnostic as an annotated source snippet.
    ///
    /// # Arguments
    ///
    /// * `origin` - The name of the database, shown in the snippet header.
    /// * `text` - The database bytes the diagnostic's spans refer to.
    /// * `lc` - A helper struct for keeping track of line numbers in the source file
    /// * `f` - A function for continuation passing style (CPS)
    pub fn render<T>(
        &self,
        origin: &str,
        text: &[u8],
        lc: &mut LineCache,
        f: impl for<'a> FnOnce(Message<'a>) -> T,
    ) -> T {
        let arena: Arena<String> = Arena::new();
        let mut snippets = vec![];
        for (level, label, span) in self.infos() {
            let offs = span.start.min(text.len());
            let end_offs = span.end.clamp(offs, text.len());
            let (line, col) = lc.from_offset(text, offs);
            let source_start = offs + 1 - col as usize;
            let source_end = LineCache::line_end(text, end_offs);
            let raw = &text[source_start..source_end];
            let (source, range) = match std::str::from_utf8(raw) {
                Ok(source) => (source.to_owned(), offs - source_start..end_offs - source_start),
                Err(_) => {
                    // ISO-8859-1: the annotation has to move by the bytes the
                    // upper half gains when re-encoded
                    let width =
                        |bytes: &[u8]| bytes.iter().map(|&ch| char::from(ch).len_utf8()).sum::<usize>();
                    let start = width(&text[source_start..offs]);
                    let source: String = raw.iter().copied().map(char::from).collect();
                    (source, start..start + width(&text[offs..end_offs]))
                }
            };
            let annotation = level.span(range).label(arena.alloc(label.into_owned()));
            snippets.push(
                Snippet::source(arena.alloc(source))
                    .line_start(usize::try_from(line).unwrap_or(usize::MAX))
                    .origin(origin)
                    .fold(true)
                    .annotation(annotation),
            );
        }
        f(self
            .level()
            .title(arena.alloc(self.to_string()))
            .snippets(snippets))
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BadNag(_) => f.write_str("Unknown move annotation"),
            BadSan(_) => f.write_str("Move is not in standard algebraic notation"),
            BadTagName(_) => {
                f.write_str("Tag names may only contain letters, digits and underscores")
            }
            BadTerminationMarker(_) => f.write_str("Unrecognized game termination marker"),
            ControlInTagValue(_) => f.write_str("Control character in tag value"),
            GameOutOfRange { game, .. } => {
                write!(f, "Game {game} lies beyond the end of the database")
            }
            HashMismatch { game, .. } => write!(
                f,
                "The header of game {game} changed since the database was indexed"
            ),
            IoError(err) => write!(f, "I/O error: {err}"),
            MarkerInVariation(_) => f.write_str("Termination marker inside a variation"),
            MissingTagValue(_) => f.write_str("Tag value must be a quoted string"),
            MissingTerminationMarker(_) => f.write_str("Game has no termination marker"),
            NagWithoutMove(_) => f.write_str("Annotation does not follow a move"),
            TabInTagValue(_) => f.write_str("Tab character in tag value"),
            TokensAfterTermination { .. } => f.write_str("Text after the termination marker"),
            UnclosedComment(_) => f.write_str("Comment is not closed before end of file"),
            UnclosedEscape(_) => f.write_str("Escaped line is not terminated"),
            UnclosedTag(_) => f.write_str("Tag pair is missing its closing bracket"),
            UnclosedTagValue(_) => f.write_str("Tag value is not closed on its line"),
            UnexpectedCharacter(_) => f.write_str("Unexpected text in movetext"),
            UnexpectedHeaderText(_) => f.write_str("Expected a tag pair"),
            UnmatchedCloseParen(_) => f.write_str("Variation closed but never opened"),
            UnmatchedOpenParen(_) => f.write_str("Variation opened but never closed"),
            VariationWithoutMove(_) => f.write_str("Variation does not follow a move"),
        }
    }
}

impl std::error::Error for Diagnostic {}

/// The failure of a parser operation.
#[derive(Debug)]
pub enum Error {
    /// The database could not be read.
    Io(io::Error),
    /// A critical problem was found.
    Fatal(Diagnostic),
    /// The error handler asked to stop after this problem.
    Aborted(Diagnostic),
}

impl Error {
    /// The problem that stopped the operation, if it was a diagnostic.
    #[must_use]
    pub const fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Error::Io(_) => None,
            Error::Fatal(diag) | Error::Aborted(diag) => Some(diag),
        }
    }

    /// The syntax error kind of the failure.
    #[must_use]
    pub const fn code(&self) -> SyntaxError {
        match self {
            Error::Io(_) => SyntaxError::UndefinedErrorCode,
            Error::Fatal(diag) | Error::Aborted(diag) => diag.code(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {err}"),
            Error::Fatal(diag) => write!(f, "{diag}"),
            Error::Aborted(diag) => write!(f, "aborted by error handler: {diag}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Fatal(diag) | Error::Aborted(diag) => Some(diag),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}
