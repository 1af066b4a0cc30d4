//! Games read from a database, and borrowed views of their variation trees.
//!
//! A [`Game`] owns its tag pairs and its parsed movetext.  [`Variation`] and [`Move`] are small `Copy` handles into the
//! parsed tree, tied to the lifetime of the game they came from.

use crate::diag::{Diagnostic, Error, SyntaxError};
use crate::index::IndexEntry;
use crate::movetext::{self, MoveId, MoveTree, VariationId};
use crate::nag::{Nag, NagFormat};
use crate::parser::Shared;
use crate::source::{BufferRef, Span};
use crate::tags::{scan_section, unescape, RawTag};
use crate::util::{decode_text, trim};
use itertools::Itertools;
use std::borrow::Cow;
use std::fmt::{self, Display, Write};
use std::sync::Arc;

/// The outcome of a game.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum GameResult {
    /// `1-0`
    WhiteWin,
    /// `0-1`
    BlackWin,
    /// `1/2-1/2`
    Draw,
    /// `*`, or no usable result at all.
    #[default]
    Undefined,
}

impl GameResult {
    /// Reads a result as written in a `Result` tag or a termination marker.
    #[must_use]
    pub fn from_ascii(s: &[u8]) -> Option<GameResult> {
        match s {
            b"1-0" => Some(GameResult::WhiteWin),
            b"0-1" => Some(GameResult::BlackWin),
            b"1/2-1/2" => Some(GameResult::Draw),
            b"*" => Some(GameResult::Undefined),
            _ => None,
        }
    }

    /// The termination marker for this result.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            GameResult::WhiteWin => "1-0",
            GameResult::BlackWin => "0-1",
            GameResult::Draw => "1/2-1/2",
            GameResult::Undefined => "*",
        }
    }
}

impl Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How thoroughly to check a game.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Validation {
    /// Look only at what indexing and reading the header found.
    #[default]
    Simple,
    /// Also parse the movetext, and pass every problem found to the error
    /// handler again.
    Deep,
}

/// One tag pair, decoded and unescaped.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TagPair {
    name: String,
    value: String,
}

impl TagPair {
    fn new(buf: &[u8], raw: RawTag) -> TagPair {
        TagPair {
            name: decode_text(raw.name.as_ref(buf)).into_owned(),
            value: decode_text(&unescape(raw.value.as_ref(buf))).into_owned(),
        }
    }

    /// The tag name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The tag value, without quotes or escapes.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// A game read from a database.
#[derive(Debug)]
pub struct Game {
    sequence: u32,
    entry: IndexEntry,
    tags: Vec<TagPair>,
    tag_status: SyntaxError,
    tag_diagnostics: Vec<Diagnostic>,
    buffer: BufferRef,
    shared: Arc<Shared>,
    tree: MoveTree,
}

impl Game {
    /// Reads the game at `entry`: its tag pairs, then its movetext.  Problems
    /// are reported as they are found, and the first one the reporter turns
    /// into an error ends the read.
    pub(crate) fn new(
        sequence: u32,
        entry: IndexEntry,
        buffer: BufferRef,
        shared: Arc<Shared>,
    ) -> Result<Game, Error> {
        let buf: &[u8] = &buffer;
        let header = &buf[..entry.movetext.start.max(entry.tags.end).min(buf.len())];
        let mut tags = vec![];
        let mut tag_diagnostics = vec![];
        let section = scan_section(
            header,
            entry.tags.start,
            shared.options.strict,
            |raw| tags.push(TagPair::new(header, raw)),
            &mut |diag: Diagnostic| {
                let res = shared.reporter.report(buf, &diag);
                tag_diagnostics.push(diag);
                res
            },
        )?;
        let (tree, res) = movetext::parse(buf, entry.movetext, shared.options.strict, |diag| {
            shared.reporter.report(buf, diag)
        });
        res?;
        Ok(Game {
            sequence,
            entry,
            tags,
            tag_status: section.status,
            tag_diagnostics,
            buffer,
            shared,
            tree,
        })
    }

    const fn tree(&self) -> &MoveTree {
        &self.tree
    }

    pub(crate) const fn buffer(&self) -> &BufferRef {
        &self.buffer
    }

    /// The 1-based position of the game in its database.
    #[must_use]
    pub const fn sequence_number(&self) -> u32 {
        self.sequence
    }

    /// Where the game lies in the database.
    #[must_use]
    pub const fn entry(&self) -> &IndexEntry {
        &self.entry
    }

    /// The value of the first tag pair with this name.
    #[must_use]
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.name == name)
            .map(TagPair::value)
    }

    /// The `Event` tag.
    #[must_use]
    pub fn event(&self) -> Option<&str> {
        self.tag("Event")
    }

    /// The `Site` tag.
    #[must_use]
    pub fn site(&self) -> Option<&str> {
        self.tag("Site")
    }

    /// The `Date` tag.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.tag("Date")
    }

    /// The `Round` tag.
    #[must_use]
    pub fn round(&self) -> Option<&str> {
        self.tag("Round")
    }

    /// The `White` tag.
    #[must_use]
    pub fn white(&self) -> Option<&str> {
        self.tag("White")
    }

    /// The `Black` tag.
    #[must_use]
    pub fn black(&self) -> Option<&str> {
        self.tag("Black")
    }

    /// The `Result` tag, as written.
    #[must_use]
    pub fn result_tag(&self) -> Option<&str> {
        self.tag("Result")
    }

    /// The number of well-formed tag pairs.
    #[must_use]
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// The tag pair at `index`, in file order.
    #[must_use]
    pub fn tag_pair(&self, index: usize) -> Option<&TagPair> {
        self.tags.get(index)
    }

    /// The tag pairs in file order.
    pub fn tags(&self) -> std::slice::Iter<'_, TagPair> {
        self.tags.iter()
    }

    /// The outcome of the game.  The termination marker wins over the
    /// `Result` tag; the tag is used when there is no marker.
    #[must_use]
    pub fn result(&self) -> GameResult {
        match self.tree().marker {
            Some((result, _)) => result,
            None => self
                .result_tag()
                .and_then(|tag| GameResult::from_ascii(tag.as_bytes()))
                .unwrap_or_default(),
        }
    }

    /// The movetext as written, without the termination marker.
    #[must_use]
    pub fn movetext(&self) -> Cow<'_, str> {
        let span = self.entry.movetext;
        let end = self.tree().marker.map_or(span.end, |(_, marker)| marker.start);
        decode_text(trim(&self.buffer[span.start..end]))
    }

    /// The main line of the game.
    #[must_use]
    pub fn main_line(&self) -> Variation<'_> {
        Variation {
            tree: self.tree(),
            buf: &self.buffer,
            id: 0,
        }
    }

    /// The number of distinct lines in the game: one for the main line and
    /// one for each variation.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.tree().leaf_count()
    }

    /// Checks the game and returns the first problem found, or
    /// [`SyntaxError::Valid`].
    ///
    /// Deep validation passes every problem to the error handler again; each
    /// still reaches the handler only once per position.  Validation never
    /// stops early, whatever the handler answers.
    pub fn validate(&self, mode: Validation) -> SyntaxError {
        let status = self.entry.status.or(self.tag_status);
        match mode {
            Validation::Simple => status,
            Validation::Deep => {
                let buf: &[u8] = &self.buffer;
                let tree = self.tree();
                for diag in self.tag_diagnostics.iter().chain(&tree.diagnostics) {
                    // the answer only matters to the operation which found it
                    let _ = self.shared.reporter.report(buf, diag);
                }
                status.or(tree.status)
            }
        }
    }
}

/// A line of play: the main line of a game, or an alternative to one move.
#[derive(Copy, Clone)]
pub struct Variation<'a> {
    tree: &'a MoveTree,
    buf: &'a [u8],
    id: VariationId,
}

impl<'a> Variation<'a> {
    fn node(&self) -> &'a movetext::VariationNode {
        &self.tree.variations[self.id]
    }

    const fn make_move(&self, id: MoveId) -> Move<'a> {
        Move {
            tree: self.tree,
            buf: self.buf,
            id,
        }
    }

    /// The number of moves in the variation.
    #[must_use]
    pub fn len(&self) -> usize {
        self.node().moves.len()
    }

    /// Is this a variation without moves?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.node().moves.is_empty()
    }

    /// The move at 0-based `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Move<'a>> {
        self.node().moves.get(index).map(|&id| self.make_move(id))
    }

    /// The moves, in order.
    pub fn moves(&self) -> impl Iterator<Item = Move<'a>> + 'a {
        let this = *self;
        self.node().moves.iter().map(move |&id| this.make_move(id))
    }

    /// Where the variation lies in the database.  For alternatives, the span
    /// excludes the parentheses.
    #[must_use]
    pub fn span(&self) -> Span {
        self.node().span
    }

    /// The raw text of the variation.
    #[must_use]
    pub fn text(&self) -> Cow<'a, str> {
        decode_text(trim(self.span().as_ref(self.buf)))
    }

    /// The comment before the first move.
    #[must_use]
    pub fn comment(&self) -> Option<&'a str> {
        self.node().comment.as_deref()
    }

    /// The move this variation is an alternative to; `None` for the main
    /// line.
    #[must_use]
    pub fn parent(&self) -> Option<Move<'a>> {
        self.node().parent.map(|id| self.make_move(id))
    }

    /// Nesting depth: 0 for the main line.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.node().depth
    }

    /// Writes the variation back as movetext, with every annotation in the
    /// given format.  Move numbers are not written.
    ///
    /// # Errors
    ///
    /// Fails only if `out` does.
    pub fn write_movetext(&self, out: &mut impl Write, fmt: NagFormat) -> fmt::Result {
        enum Step {
            Open(VariationId),
            Moves(VariationId, usize),
            Close,
        }
        let mut space = false;
        let word = |out: &mut dyn Write, text: &dyn Display, space: &mut bool| {
            let sep = if *space { " " } else { "" };
            *space = true;
            write!(out, "{sep}{text}")
        };
        if let Some(comment) = self.comment() {
            word(out, &format_args!("{{{comment}}}"), &mut space)?;
        }
        let mut steps = vec![Step::Moves(self.id, 0)];
        while let Some(step) = steps.pop() {
            match step {
                Step::Open(id) => {
                    word(out, &"(", &mut space)?;
                    space = false;
                    if let Some(comment) = &self.tree.variations[id].comment {
                        word(out, &format_args!("{{{comment}}}"), &mut space)?;
                    }
                }
                Step::Close => {
                    out.write_char(')')?;
                    space = true;
                }
                Step::Moves(id, at) => {
                    let Some(&mv) = self.tree.variations[id].moves.get(at) else {
                        continue;
                    };
                    let mv = self.make_move(mv);
                    word(out, &mv.san(), &mut space)?;
                    if !mv.nags().is_empty() {
                        let nags = mv.nags().iter().map(|nag| nag.render(fmt)).format(" ");
                        word(out, &nags, &mut space)?;
                    }
                    if let Some(comment) = mv.comment() {
                        word(out, &format_args!("{{{comment}}}"), &mut space)?;
                    }
                    steps.push(Step::Moves(id, at + 1));
                    for &child in self.tree.moves[mv.id].variations.iter().rev() {
                        steps.push(Step::Close);
                        steps.push(Step::Moves(child, 0));
                        steps.push(Step::Open(child));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Display for Variation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_movetext(f, NagFormat::Numeric)
    }
}

impl fmt::Debug for Variation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variation")
            .field("id", &self.id)
            .field("depth", &self.depth())
            .field("moves", &self.len())
            .finish()
    }
}

/// One move of a variation, with its annotations.
#[derive(Copy, Clone)]
pub struct Move<'a> {
    tree: &'a MoveTree,
    buf: &'a [u8],
    id: MoveId,
}

impl<'a> Move<'a> {
    fn node(&self) -> &'a movetext::MoveNode {
        &self.tree.moves[self.id]
    }

    const fn make_variation(&self, id: VariationId) -> Variation<'a> {
        Variation {
            tree: self.tree,
            buf: self.buf,
            id,
        }
    }

    /// The move in standard algebraic notation, as written.
    #[must_use]
    pub fn san(&self) -> &'a str {
        &self.node().san
    }

    /// Where the move lies in the database.
    #[must_use]
    pub fn span(&self) -> Span {
        self.node().span
    }

    /// 1-based position of the move in its variation.
    #[must_use]
    pub fn number(&self) -> u32 {
        self.node().number
    }

    /// The move number written before the move (`12.` or `12...`), if any.
    #[must_use]
    pub fn indicated_number(&self) -> Option<u32> {
        self.node().indicated
    }

    /// Comments after the move, joined with spaces.
    #[must_use]
    pub fn comment(&self) -> Option<&'a str> {
        self.node().comment.as_deref()
    }

    /// The annotation glyphs, in order.
    #[must_use]
    pub fn nags(&self) -> &'a [Nag] {
        &self.node().nags
    }

    /// [`SyntaxError::IllegalMove`] if the move is not valid SAN.
    #[must_use]
    pub fn validity(&self) -> SyntaxError {
        self.node().validity
    }

    /// The number of alternatives to this move.
    #[must_use]
    pub fn variation_count(&self) -> usize {
        self.node().variations.len()
    }

    /// The alternative at 0-based `index`.
    #[must_use]
    pub fn variation(&self, index: usize) -> Option<Variation<'a>> {
        self.node()
            .variations
            .get(index)
            .map(|&id| self.make_variation(id))
    }

    /// The alternatives, in order.
    pub fn variations(&self) -> impl Iterator<Item = Variation<'a>> + 'a {
        let this = *self;
        self.node()
            .variations
            .iter()
            .map(move |&id| this.make_variation(id))
    }

    /// The variation this move belongs to.
    #[must_use]
    pub fn parent(&self) -> Variation<'a> {
        self.make_variation(self.node().parent)
    }
}

impl fmt::Debug for Move<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Move")
            .field("san", &self.san())
            .field("number", &self.number())
            .field("nags", &self.nags())
            .field("variations", &self.variation_count())
            .finish()
    }
}
