//! Delivery of diagnostics to a user-supplied error handler.
//!
//! The reporter is shared by every operation on one [`Parser`](crate::Parser).
//! Each distinct problem, identified by its code and position, reaches the
//! handler at most once, however many times the indexer, the movetext parser
//! or validation run into it again.

use crate::diag::{Diagnostic, Error, SyntaxError};
use crate::line_cache::LineCache;
use crate::util::HashSet;
use log::{trace, warn};
use std::sync::{Mutex, PoisonError};

/// One problem, as seen by an [`ErrorHandler`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Report {
    /// Critical problems stop the current operation whatever the handler
    /// answers.
    pub critical: bool,
    /// The kind of problem.
    pub code: SyntaxError,
    /// Human-readable description.
    pub message: String,
    /// 1-based line of the problem.
    pub line: u64,
    /// 1-based byte column of the problem.
    pub column: u32,
    /// The problem itself, for rendering.
    pub diagnostic: Diagnostic,
}

/// Receives problems found in a database.
///
/// The handler is called with the parser's reporting lock held, so it must not
/// call back into the parser it is installed on.
pub trait ErrorHandler: Send {
    /// Return `true` to carry on past a recoverable problem, `false` to stop
    /// the operation which found it.  The answer is ignored for critical
    /// problems.
    fn on_error(&mut self, report: &Report) -> bool;
}

impl<F> ErrorHandler for F
where
    F: FnMut(&Report) -> bool + Send,
{
    fn on_error(&mut self, report: &Report) -> bool {
        self(report)
    }
}

#[derive(Default)]
struct State {
    handler: Option<Box<dyn ErrorHandler>>,
    seen: HashSet<(SyntaxError, u64, u32)>,
    lines: LineCache,
}

/// The deduplicating front of an optional [`ErrorHandler`].
#[derive(Default)]
pub(crate) struct Reporter {
    state: Mutex<State>,
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Reporter")
    }
}

impl Reporter {
    /// Installs or removes the handler.  Problems reported while no handler
    /// was installed are forgotten.
    pub(crate) fn set_handler(&self, handler: Option<Box<dyn ErrorHandler>>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.handler = handler;
    }

    /// Reports a problem found in `text`.
    ///
    /// Returns `Ok` when the caller may carry on.  Critical problems always
    /// produce [`Error::Fatal`]; recoverable ones produce [`Error::Aborted`]
    /// when the handler declines to continue.  Without a handler, recoverable
    /// problems are absorbed.
    pub(crate) fn report(&self, text: &[u8], diag: &Diagnostic) -> Result<(), Error> {
        let critical = diag.is_critical();
        if critical {
            warn!("{diag}");
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let State {
            handler,
            seen,
            lines,
        } = &mut *state;
        let proceed = match handler {
            None => true,
            Some(handler) => {
                let (line, column) = match diag.span() {
                    Some(span) => lines.from_offset(text, span.start.min(text.len())),
                    None => (0, 0),
                };
                let code = diag.code();
                if seen.insert((code, line, column)) {
                    trace!("{code} at {line}:{column}: {diag}");
                    handler.on_error(&Report {
                        critical,
                        code,
                        message: diag.to_string(),
                        line,
                        column,
                        diagnostic: diag.clone(),
                    })
                } else {
                    true
                }
            }
        };
        if critical {
            Err(Error::Fatal(diag.clone()))
        } else if proceed {
            Ok(())
        } else {
            Err(Error::Aborted(diag.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Span;
    use assert_matches::assert_matches;
    use std::sync::Arc;

    #[test]
    fn unarmed_absorbs() {
        let reporter = Reporter::default();
        assert_matches!(reporter.report(b"x", &Diagnostic::BadSan(Span::new(0, 1))), Ok(()));
        assert_matches!(
            reporter.report(b"x", &Diagnostic::UnmatchedOpenParen(Span::new(0, 1))),
            Err(Error::Fatal(Diagnostic::UnmatchedOpenParen(_)))
        );
    }

    #[test]
    fn dedup_by_position() {
        let text = b"e4 e5\nxx yy";
        let reporter = Reporter::default();
        let calls = Arc::new(Mutex::new(vec![]));
        let sink = calls.clone();
        reporter.set_handler(Some(Box::new(move |report: &Report| {
            sink.lock().unwrap().push((report.code, report.line, report.column));
            true
        })));
        for _ in 0..3 {
            reporter.report(text, &Diagnostic::BadSan(Span::new(6, 8))).unwrap();
        }
        reporter.report(text, &Diagnostic::BadSan(Span::new(9, 11))).unwrap();
        // same place, different code
        reporter.report(text, &Diagnostic::UnexpectedCharacter(Span::new(9, 11))).unwrap();
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                (SyntaxError::IllegalMove, 2, 1),
                (SyntaxError::IllegalMove, 2, 4),
                (SyntaxError::IllegalToken, 2, 4),
            ]
        );
    }

    #[test]
    fn handler_decides() {
        let reporter = Reporter::default();
        reporter.set_handler(Some(Box::new(|_: &Report| false)));
        assert_matches!(
            reporter.report(b"x", &Diagnostic::BadSan(Span::new(0, 1))),
            Err(Error::Aborted(Diagnostic::BadSan(_)))
        );
        // reported once already, so it no longer stops anything
        assert_matches!(reporter.report(b"x", &Diagnostic::BadSan(Span::new(0, 1))), Ok(()));
        reporter.set_handler(Some(Box::new(|_: &Report| true)));
        assert_matches!(
            reporter.report(b"x", &Diagnostic::HashMismatch { game: 1, span: Span::new(0, 1) }),
            Err(Error::Fatal(_))
        );
    }
}
