//! The tag-pair section of a game: `[Name "Value"]` lines.
//!
//! The same scanner is used by the indexer, which only needs to know where a
//! header ends and whether it was well formed, and by [`Game`](crate::Game),
//! which keeps the pairs.

use crate::diag::{Diagnostic, Error, SyntaxError};
use crate::line_cache::LineCache;
use crate::skip::skip;
use crate::source::Span;
use crate::util::is_space;
use regex::bytes::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

/// The location of one tag pair.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct RawTag {
    pub name: Span,
    /// The value between the quotes, escapes still in place.
    pub value: Span,
}

/// The extent of a header, as found by [`scan_section`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct Section {
    /// From the first `[` to the end of the last tag pair.
    pub span: Span,
    /// Where scanning stopped: the first byte after the tags which is not
    /// skippable.
    pub next: usize,
    /// Where the movetext starts.  Comments between the tags and the first
    /// move belong to the movetext.
    pub movetext: usize,
    /// The first problem found in the header.
    pub status: SyntaxError,
}

#[inline]
pub(crate) const fn is_name_byte(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}

/// Could a new game's header start at `pos`?
///
/// This is the lookahead which ends a movetext section: a `[` followed by
/// something shaped like a tag name and an opening quote, wherever it is on
/// the line.  A bracket which does not open a tag pair (`[%clk 1:00]`) stays
/// part of the movetext.
pub(crate) fn is_section_start(buf: &[u8], pos: usize) -> bool {
    static TAG_START: OnceLock<Regex> = OnceLock::new();
    if buf.get(pos) != Some(&b'[') {
        return false;
    }
    let tag_start =
        TAG_START.get_or_init(|| Regex::new(r#"(?-u)^\[[ \t]*[A-Za-z0-9_]+[ \t]+""#).unwrap());
    tag_start.is_match(&buf[pos..buf.len().min(pos + 256)])
}

/// Runs `skip` and converts an unterminated comment into an error.
fn skip_in_tag(buf: &[u8], pos: usize) -> Result<usize, Diagnostic> {
    let skip = skip(buf, pos, |_| {});
    match skip.error {
        Some(diag) => Err(diag),
        None => Ok(skip.end),
    }
}

/// Parses one tag pair starting at the `[` at `pos`.  Skippable material is
/// allowed between the tokens.  On success, also returns the offset just
/// past the closing `]`.
///
/// In `strict` mode a tab inside the value is passed to `warn`; it is
/// otherwise accepted silently.
pub(crate) fn tag_pair(
    buf: &[u8],
    pos: usize,
    strict: bool,
    warn: &mut impl FnMut(Diagnostic) -> Result<(), Error>,
) -> Result<Result<(RawTag, usize), Diagnostic>, Error> {
    let start = pos;
    let pos = match skip_in_tag(buf, pos + 1) {
        Ok(pos) => pos,
        Err(diag) => return Ok(Err(diag)),
    };
    let name_start = pos;
    let mut pos = pos;
    while buf.get(pos).is_some_and(|&ch| is_name_byte(ch)) {
        pos += 1;
    }
    let name = Span::new(name_start, pos);
    let token_end = buf[pos..]
        .iter()
        .position(|&ch| ch.is_ascii_whitespace() || matches!(ch, b'"' | b']' | b'{' | b';'))
        .map_or(buf.len(), |n| pos + n);
    if name.is_empty() || token_end != pos {
        // at least one byte, so the report has something to point at
        let end = token_end.max(name_start + 1).min(buf.len());
        return Ok(Err(Diagnostic::BadTagName(Span::new(name_start, end))));
    }
    let pos = match skip_in_tag(buf, pos) {
        Ok(pos) => pos,
        Err(diag) => return Ok(Err(diag)),
    };
    if buf.get(pos) != Some(&b'"') {
        let end = LineCache::line_end(buf, pos).min(pos + 1);
        return Ok(Err(Diagnostic::MissingTagValue(Span::new(pos, end))));
    }
    let value_start = pos + 1;
    let mut pos = value_start;
    let value = loop {
        match buf.get(pos) {
            None | Some(b'\n' | b'\r') => {
                return Ok(Err(Diagnostic::UnclosedTagValue(Span::new(start, pos))));
            }
            Some(b'"') => break Span::new(value_start, pos),
            Some(b'\\') if matches!(buf.get(pos + 1), Some(b'\\' | b'"')) => pos += 2,
            Some(b'\t') => {
                if strict {
                    warn(Diagnostic::TabInTagValue(Span::new(pos, pos + 1)))?;
                }
                pos += 1;
            }
            Some(&ch) if ch < 0x20 || ch == 0x7f => {
                return Ok(Err(Diagnostic::ControlInTagValue(Span::new(pos, pos + 1))));
            }
            Some(_) => pos += 1,
        }
    };
    let pos = match skip_in_tag(buf, pos + 1) {
        Ok(pos) => pos,
        Err(diag) => return Ok(Err(diag)),
    };
    if buf.get(pos) != Some(&b']') {
        return Ok(Err(Diagnostic::UnclosedTag(Span::new(start, pos))));
    }
    Ok(Ok((RawTag { name, value }, pos + 1)))
}

/// Scans the header starting with the `[` at `start`.
///
/// Each well-formed pair is passed to `on_tag`; every problem is passed to
/// `report`, and a malformed pair is skipped up to the end of its line.  The
/// section ends at the first byte after the tags which is neither skippable
/// nor a `[`.
pub(crate) fn scan_section(
    buf: &[u8],
    start: usize,
    strict: bool,
    mut on_tag: impl FnMut(RawTag),
    report: &mut impl FnMut(Diagnostic) -> Result<(), Error>,
) -> Result<Section, Error> {
    let mut status = SyntaxError::Valid;
    let mut pos = start;
    let mut end = start;
    while buf.get(pos) == Some(&b'[') {
        match tag_pair(buf, pos, strict, report)? {
            Ok((tag, next)) => {
                on_tag(tag);
                pos = next;
                end = next;
            }
            Err(diag) => {
                status = status.or(diag.code());
                report(diag)?;
                let eol = LineCache::line_end(buf, pos);
                end = eol;
                pos = eol;
            }
        }
        let skip = skip(buf, pos, |_| {});
        if let Some(diag) = skip.error {
            status = status.or(diag.code());
            report(diag)?;
        }
        pos = skip.end;
    }
    let movetext = (end..pos).find(|&at| !is_space(buf[at])).unwrap_or(pos);
    Ok(Section {
        span: Span::new(start, end),
        next: pos,
        movetext,
        status,
    })
}

/// Removes the `\\` and `\"` escapes from a tag value.
#[must_use]
pub(crate) fn unescape(raw: &[u8]) -> Cow<'_, [u8]> {
    if !raw.contains(&b'\\') {
        return Cow::Borrowed(raw);
    }
    let mut out = Vec::with_capacity(raw.len());
    let mut iter = raw.iter().copied().peekable();
    while let Some(ch) = iter.next() {
        if ch == b'\\' {
            if let Some(next @ (b'\\' | b'"')) = iter.peek().copied() {
                out.push(next);
                iter.next();
                continue;
            }
        }
        out.push(ch);
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn pair(text: &[u8], strict: bool) -> (Result<(RawTag, usize), Diagnostic>, Vec<Diagnostic>) {
        let mut warnings = vec![];
        let res = tag_pair(text, 0, strict, &mut |diag| {
            warnings.push(diag);
            Ok(())
        })
        .unwrap();
        (res, warnings)
    }

    #[test]
    fn well_formed() {
        let text = br#"[ White { who } "Fischer, \"Bobby\"" ] rest"#;
        let (res, _) = pair(text, false);
        let (tag, next) = res.unwrap();
        assert_eq!(tag.name.as_ref(text), b"White");
        assert_eq!(tag.value.as_ref(text), br#"Fischer, \"Bobby\""#);
        assert_eq!(&*unescape(tag.value.as_ref(text)), br#"Fischer, "Bobby""#);
        assert_eq!(&text[next..], b" rest");
    }

    #[test]
    fn malformed() {
        assert_matches!(pair(b"[Bad-Name \"x\"]", false).0, Err(Diagnostic::BadTagName(Span { start: 1, end: 9 })));
        assert_matches!(pair(b"[ \"x\"]", false).0, Err(Diagnostic::BadTagName(_)));
        assert_matches!(pair(b"[Event x]", false).0, Err(Diagnostic::MissingTagValue(_)));
        assert_matches!(pair(b"[Event \"x]\n", false).0, Err(Diagnostic::UnclosedTagValue(_)));
        assert_matches!(pair(b"[Event \"x\x01\"]", false).0, Err(Diagnostic::ControlInTagValue(_)));
        assert_matches!(pair(b"[Event \"x\"\n[Site", false).0, Err(Diagnostic::UnclosedTag(_)));
    }

    #[test]
    fn tabs_warn_only_when_strict() {
        let (res, warnings) = pair(b"[Event \"a\tb\"]", false);
        assert!(res.is_ok());
        assert!(warnings.is_empty());
        let (res, warnings) = pair(b"[Event \"a\tb\"]", true);
        assert!(res.is_ok());
        assert_matches!(&warnings[..], [Diagnostic::TabInTagValue(_)]);
    }

    #[test]
    fn section_recovers_per_line() {
        let text = b"[Event \"a\"]\n[Bad-Name \"b\"]\n[Site \"c\"]\n\n1. e4 *";
        let mut names = vec![];
        let mut diags = vec![];
        let section = scan_section(text, 0, false, |tag| names.push(tag.name.as_ref(text)), &mut |diag| {
            diags.push(diag);
            Ok(())
        })
        .unwrap();
        assert_eq!(names, vec![&b"Event"[..], b"Site"]);
        assert_eq!(section.status, SyntaxError::IllegalTagName);
        assert_eq!(&text[section.next..], b"1. e4 *");
        assert_eq!(section.movetext, section.next);
        assert_eq!(section.span, Span::new(0, 37));
        assert_matches!(&diags[..], [Diagnostic::BadTagName(_)]);
    }

    #[test]
    fn leading_comment_starts_movetext() {
        let text = b"[Event \"a\"]\n{ opening }\n1. e4 *";
        let section = scan_section(text, 0, false, |_| {}, &mut |_| Ok(())).unwrap();
        assert_eq!(&text[section.movetext..], b"{ opening }\n1. e4 *");
        assert_eq!(&text[section.next..], b"1. e4 *");
    }

    #[test]
    fn section_lookahead() {
        assert!(is_section_start(b"[Event \"x\"]", 0));
        assert!(is_section_start(b"e4 [Event \"x\"]", 3));
        assert!(is_section_start(b"e4\n[ White\t\"x\"]", 3));
        assert!(!is_section_start(b"[Event", 0));
        assert!(!is_section_start(b"e4 [%clk 1:00]", 3));
        assert!(!is_section_start(b"e4\n[%clk 1:00]", 3));
    }
}
