//! Parsing movetext into a tree of variations.
//!
//! The tree is stored as two flat arenas, one of variations and one of moves,
//! which refer to each other by index.  Variation 0 is the main line.  Each
//! move lists the variations branching from it, and each variation records
//! the move it branches from, so the tree can be walked in both directions
//! without any shared ownership.

use crate::diag::{Diagnostic, Error, SyntaxError};
use crate::game::GameResult;
use crate::nag::Nag;
use crate::skip::skip;
use crate::source::Span;
use crate::util::{decode_text, is_space, trim};
use log::debug;
use shakmaty::san::SanPlus;
use tinyvec::TinyVec;

/// Index of a variation within a [`MoveTree`].
pub(crate) type VariationId = usize;
/// Index of a move within a [`MoveTree`].
pub(crate) type MoveId = usize;

#[derive(Debug, Default)]
pub(crate) struct VariationNode {
    /// The move this is an alternative to; `None` for the main line.
    pub parent: Option<MoveId>,
    pub moves: Vec<MoveId>,
    /// The text of the variation, without its parentheses.
    pub span: Span,
    /// Comment before the first move.
    pub comment: Option<String>,
    /// 0 for the main line, 1 for its variations, and so on.
    pub depth: u32,
}

#[derive(Debug)]
pub(crate) struct MoveNode {
    pub san: String,
    pub span: Span,
    /// 1-based position within the owning variation.
    pub number: u32,
    /// The move number written before the move, if any.
    pub indicated: Option<u32>,
    pub comment: Option<String>,
    pub nags: TinyVec<[Nag; 2]>,
    pub variations: Vec<VariationId>,
    pub parent: VariationId,
    pub validity: SyntaxError,
}

/// The parsed movetext of one game.
#[derive(Debug, Default)]
pub(crate) struct MoveTree {
    pub variations: Vec<VariationNode>,
    pub moves: Vec<MoveNode>,
    /// The termination marker, if one was found.
    pub marker: Option<(GameResult, Span)>,
    /// The first problem found.
    pub status: SyntaxError,
    /// Every problem found, in order.
    pub diagnostics: Vec<Diagnostic>,
}

impl MoveTree {
    /// The number of distinct lines through the tree, i.e. the number of
    /// leaves: the main line plus one for every variation reachable from it.
    pub(crate) fn leaf_count(&self) -> usize {
        if self.variations.is_empty() {
            return 0;
        }
        let mut count = 0;
        let mut pending = vec![0];
        while let Some(id) = pending.pop() {
            count += 1;
            for &mv in &self.variations[id].moves {
                pending.extend_from_slice(&self.moves[mv].variations);
            }
        }
        count
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Token {
    Number(u32),
    San(SyntaxError),
    Nag(Nag),
    BadNag,
    Open,
    Close,
    Marker(GameResult),
    BadMarker,
    Unexpected,
}

// the bytes which end a token, besides whitespace
#[inline]
fn is_break(ch: u8) -> bool {
    is_space(ch)
        || matches!(
            ch,
            b'{' | b'}' | b'(' | b')' | b'!' | b'?' | b'$' | b';' | b'.' | b'['
        )
}

/// Is this a syntactically valid SAN move?  Castling may be written with
/// zeros, and both `--` and `Z0` are accepted as null moves.
fn is_san(text: &[u8]) -> bool {
    match text {
        b"--" | b"Z0" => true,
        [b'0', b'-', b'0', ..] => {
            let castle: Vec<u8> = text
                .iter()
                .map(|&ch| if ch == b'0' { b'O' } else { ch })
                .collect();
            SanPlus::from_ascii(&castle).is_ok()
        }
        _ => SanPlus::from_ascii(text).is_ok(),
    }
}

/// Where one variation is being filled in.
#[derive(Copy, Clone, Debug)]
struct Frame {
    variation: VariationId,
    last: Option<MoveId>,
    /// Offset of the `(` which opened the variation.
    open: usize,
}

struct Builder<'a, R> {
    buf: &'a [u8],
    span: Span,
    strict: bool,
    report: R,
    tree: MoveTree,
}

impl<R> Builder<'_, R>
where
    R: FnMut(&Diagnostic) -> Result<(), Error>,
{
    fn diag(&mut self, diag: Diagnostic) -> Result<(), Error> {
        self.tree.status = self.tree.status.or(diag.code());
        self.warn(diag)
    }

    /// Reports a problem which leaves the status alone.
    fn warn(&mut self, diag: Diagnostic) -> Result<(), Error> {
        let res = (self.report)(&diag);
        self.tree.diagnostics.push(diag);
        res
    }

    fn token_end(&self, from: usize) -> usize {
        (from..self.span.end)
            .find(|&at| is_break(self.buf[at]))
            .unwrap_or(self.span.end)
    }

    /// Splits off a move, and any annotation glyph written directly after it
    /// (`e4+-`).
    fn san(&self, pos: usize) -> (Token, usize) {
        let end = self.token_end(pos);
        let text = &self.buf[pos..end];
        if is_san(text) {
            return (Token::San(SyntaxError::Valid), end);
        }
        for split in (1..text.len()).rev() {
            let suffix = &text[split..];
            if Nag::glyph_prefix(suffix).is_some_and(|(_, len)| len == suffix.len())
                && is_san(&text[..split])
            {
                return (Token::San(SyntaxError::Valid), pos + split);
            }
        }
        (Token::San(SyntaxError::IllegalMove), end)
    }

    fn numeric(&self, pos: usize) -> (Token, usize) {
        let end = self.token_end(pos);
        let text = &self.buf[pos..end];
        match text {
            b"1-0" => (Token::Marker(GameResult::WhiteWin), end),
            b"0-1" => (Token::Marker(GameResult::BlackWin), end),
            b"1/2-1/2" => (Token::Marker(GameResult::Draw), end),
            [b'0', b'-', b'0', ..] => self.san(pos),
            _ if text.iter().all(u8::is_ascii_digit) => {
                let mut stop = end;
                while stop < self.span.end && self.buf[stop] == b'.' {
                    stop += 1;
                }
                let number = std::str::from_utf8(text)
                    .ok()
                    .and_then(|digits| digits.parse().ok());
                (number.map_or(Token::Unexpected, Token::Number), stop)
            }
            _ if text
                .iter()
                .all(|&ch| ch.is_ascii_digit() || matches!(ch, b'-' | b'/')) =>
            {
                (Token::BadMarker, end)
            }
            _ => (Token::Unexpected, end),
        }
    }

    /// Reads the token starting at `pos`, which is not skippable.
    fn token(&self, pos: usize) -> (Token, Span) {
        let buf = &self.buf[..self.span.end];
        let ch = buf[pos];
        let (token, end) = match ch {
            b'(' => (Token::Open, pos + 1),
            b')' => (Token::Close, pos + 1),
            b'*' => (Token::Marker(GameResult::Undefined), pos + 1),
            b'$' => {
                let end = self.token_end(pos + 1);
                match Nag::from_ascii(&buf[pos..end]) {
                    Ok(nag) => (Token::Nag(nag), end),
                    Err(_) => (Token::BadNag, end),
                }
            }
            b'0'..=b'9' => self.numeric(pos),
            b'a'..=b'z' | b'A'..=b'Z' | b'@' => self.san(pos),
            _ => match Nag::glyph_prefix(&buf[pos..]) {
                Some((nag, len)) => (Token::Nag(nag), pos + len),
                None => {
                    let end = self.token_end(pos + 1);
                    let token = if &buf[pos..end] == b"--" {
                        Token::San(SyntaxError::Valid)
                    } else if matches!(ch, b'!' | b'?' | b'+' | b'-' | b'=' | b'/' | b'~') {
                        Token::BadNag
                    } else {
                        Token::Unexpected
                    };
                    (token, end)
                }
            },
        };
        (token, Span::new(pos, end))
    }

    /// Appends a comment to the last move of the variation, or makes it the
    /// variation's leading comment.
    fn comment(&mut self, frame: Frame, span: Span) {
        let text = decode_text(trim(span.as_ref(self.buf)));
        if text.is_empty() {
            return;
        }
        let slot = match frame.last {
            Some(mv) => &mut self.tree.moves[mv].comment,
            None => &mut self.tree.variations[frame.variation].comment,
        };
        match slot {
            Some(comment) => {
                comment.push(' ');
                comment.push_str(&text);
            }
            None => *slot = Some(text.into_owned()),
        }
    }

    fn push_move(&mut self, frame: &mut Frame, span: Span, validity: SyntaxError, indicated: Option<u32>) {
        let id = self.tree.moves.len();
        let variation = &mut self.tree.variations[frame.variation];
        variation.moves.push(id);
        let number = u32::try_from(variation.moves.len()).unwrap_or(u32::MAX);
        self.tree.moves.push(MoveNode {
            san: decode_text(span.as_ref(self.buf)).into_owned(),
            span,
            number,
            indicated,
            comment: None,
            nags: TinyVec::new(),
            variations: vec![],
            parent: frame.variation,
            validity,
        });
        frame.last = Some(id);
    }

    fn run(&mut self) -> Result<(), Error> {
        let end = self.span.end;
        self.tree.variations.push(VariationNode {
            span: self.span,
            ..VariationNode::default()
        });
        let mut frame = Frame {
            variation: 0,
            last: None,
            open: self.span.start,
        };
        // the variations enclosing the current one
        let mut outer: Vec<Frame> = vec![];
        let mut number = None;
        let mut comments = vec![];
        let mut pos = self.span.start;
        loop {
            comments.clear();
            let skip = skip(&self.buf[..end], pos, |span| comments.push(span));
            for &span in &comments {
                self.comment(frame, span);
            }
            if let Some(diag) = skip.error {
                self.diag(diag)?;
            }
            pos = skip.end;
            if pos >= end {
                break;
            }
            let (token, span) = self.token(pos);
            pos = span.end;
            match token {
                Token::Number(n) => number = Some(n),
                Token::San(validity) => {
                    self.push_move(&mut frame, span, validity, number.take());
                    if !validity.is_valid() {
                        self.diag(Diagnostic::BadSan(span))?;
                    }
                }
                Token::Nag(nag) => match frame.last {
                    Some(mv) => self.tree.moves[mv].nags.push(nag),
                    None => self.diag(Diagnostic::NagWithoutMove(span))?,
                },
                Token::BadNag => self.diag(Diagnostic::BadNag(span))?,
                Token::Open => {
                    if frame.last.is_none() {
                        self.diag(Diagnostic::VariationWithoutMove(span))?;
                    }
                    let id = self.tree.variations.len();
                    self.tree.variations.push(VariationNode {
                        parent: frame.last,
                        span: Span::new(span.end, span.end),
                        depth: u32::try_from(outer.len() + 1).unwrap_or(u32::MAX),
                        ..VariationNode::default()
                    });
                    if let Some(mv) = frame.last {
                        self.tree.moves[mv].variations.push(id);
                    }
                    outer.push(frame);
                    frame = Frame {
                        variation: id,
                        last: None,
                        open: span.start,
                    };
                    number = None;
                }
                Token::Close => match outer.pop() {
                    Some(parent) => {
                        self.tree.variations[frame.variation].span.end = span.start;
                        frame = parent;
                        number = None;
                    }
                    None => self.diag(Diagnostic::UnmatchedCloseParen(span))?,
                },
                Token::Marker(_) | Token::BadMarker if !outer.is_empty() => {
                    self.diag(Diagnostic::MarkerInVariation(span))?;
                }
                Token::Marker(result) => {
                    self.tree.marker = Some((result, span));
                    return self.after_marker(span);
                }
                Token::BadMarker => {
                    self.tree.marker = Some((GameResult::Undefined, span));
                    return self.diag(Diagnostic::BadTerminationMarker(span));
                }
                Token::Unexpected => self.diag(Diagnostic::UnexpectedCharacter(span))?,
            }
        }
        if !outer.is_empty() {
            for open in outer.iter().skip(1).chain(Some(&frame)) {
                self.tree.variations[open.variation].span.end = end;
            }
            self.diag(Diagnostic::UnmatchedOpenParen(Span::new(frame.open, frame.open + 1)))?;
        }
        self.diag(Diagnostic::MissingTerminationMarker(Span::new(end, end)))
    }

    /// Anything after the termination marker is ignored, and reported in
    /// strict mode.
    fn after_marker(&mut self, marker: Span) -> Result<(), Error> {
        if !self.strict {
            return Ok(());
        }
        let rest = skip(&self.buf[..self.span.end], marker.end, |_| {}).end;
        if rest < self.span.end {
            self.warn(Diagnostic::TokensAfterTermination {
                marker,
                extra: Span::new(rest, self.span.end),
            })?;
        }
        Ok(())
    }
}

/// Parses the movetext in `span`.
///
/// Every problem is passed to `report`; parsing stops at the first problem
/// for which `report` returns an error.  The tree built up to that point is
/// returned along with the error.
pub(crate) fn parse(
    buf: &[u8],
    span: Span,
    strict: bool,
    report: impl FnMut(&Diagnostic) -> Result<(), Error>,
) -> (MoveTree, Result<(), Error>) {
    let mut builder = Builder {
        buf,
        span,
        strict,
        report,
        tree: MoveTree::default(),
    };
    let res = builder.run();
    if let Err(err) = &res {
        debug!("movetext parse stopped: {err}");
    }
    (builder.tree, res)
}
