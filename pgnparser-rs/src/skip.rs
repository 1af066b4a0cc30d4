//! The material every scan steps over between tokens: whitespace, comments
//! and `%` escape lines.

use crate::diag::Diagnostic;
use crate::source::Span;
use crate::util::{at_line_start, is_space};

/// Where a skip ended, and the problem it ran into, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Skip {
    /// Offset of the first byte which is not skippable.
    pub end: usize,
    /// An unterminated comment or escape line; the skip then ends at the end
    /// of the buffer.
    pub error: Option<Diagnostic>,
}

/// Skips from `pos` over any run of whitespace, `;` and `{}` comments, and
/// lines starting with `%`.  The bodies of the comments are passed to
/// `comment` in order.
pub(crate) fn skip(buf: &[u8], mut pos: usize, mut comment: impl FnMut(Span)) -> Skip {
    let find = |from: usize, byte: u8| buf[from..].iter().position(|&ch| ch == byte).map(|n| from + n);
    while let Some(&ch) = buf.get(pos) {
        match ch {
            _ if is_space(ch) => pos += 1,
            b'%' if at_line_start(buf, pos) => match find(pos, b'\n') {
                Some(nl) => pos = nl + 1,
                None => {
                    return Skip {
                        end: buf.len(),
                        error: Some(Diagnostic::UnclosedEscape(Span::new(pos, buf.len()))),
                    }
                }
            },
            b';' => {
                let end = find(pos, b'\n').unwrap_or(buf.len());
                comment(Span::new(pos + 1, end));
                pos = end;
            }
            b'{' => match find(pos, b'}') {
                Some(close) => {
                    comment(Span::new(pos + 1, close));
                    pos = close + 1;
                }
                None => {
                    comment(Span::new(pos + 1, buf.len()));
                    return Skip {
                        end: buf.len(),
                        error: Some(Diagnostic::UnclosedComment(Span::new(pos, buf.len()))),
                    };
                }
            },
            _ => break,
        }
    }
    Skip {
        end: pos,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn comments(buf: &[u8]) -> (Skip, Vec<&[u8]>) {
        let mut spans = vec![];
        let skip = skip(buf, 0, |span| spans.push(span));
        (skip, spans.into_iter().map(|span| span.as_ref(buf)).collect())
    }

    #[test]
    fn whitespace_and_comments() {
        let (skip, found) = comments(b" \r\n{a}\t; b\n{c\nd}e4");
        assert_eq!(skip.end, 16);
        assert_eq!(skip.error, None);
        assert_eq!(found, vec![&b"a"[..], b" b", b"c\nd"]);
    }

    #[test]
    fn escape_only_in_first_column() {
        let (skip, found) = comments(b"% skipped\n  %x");
        assert_eq!(skip.end, 12);
        assert!(found.is_empty());
    }

    #[test]
    fn braces_do_not_nest() {
        let (skip, found) = comments(b"{a {b} c}");
        assert_eq!(skip.end, 7);
        assert_eq!(found, vec![&b"a {b"[..]]);
    }

    #[test]
    fn unterminated() {
        let (skip, found) = comments(b"  {open");
        assert_eq!(skip.end, 7);
        assert_matches!(skip.error, Some(Diagnostic::UnclosedComment(Span { start: 2, end: 7 })));
        assert_eq!(found, vec![&b"open"[..]]);
        let (skip, _) = comments(b"%escape");
        assert_matches!(skip.error, Some(Diagnostic::UnclosedEscape(_)));
    }
}
