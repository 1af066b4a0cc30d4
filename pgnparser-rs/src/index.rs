//! The game index: where each game's header and movetext lie in the database.
//!
//! The index is built lazily.  Asking for game `n` scans the file only as far
//! as needed to find `n` games, starting from where the previous scan
//! stopped.  The scan recognizes just enough of the grammar to find the game
//! boundaries: tag pairs are checked, movetext is stepped over token by token
//! without being interpreted.

use crate::diag::{Diagnostic, Error, SyntaxError};
use crate::line_cache::LineCache;
use crate::reporter::Reporter;
use crate::skip::skip;
use crate::source::Span;
use crate::tags::{is_section_start, scan_section};
use crate::util::{at_line_start, is_space, quick_hash};
use log::debug;
use std::sync::{PoisonError, RwLock};

/// Passed to [`Parser::index_to`](crate::Parser::index_to) to index the whole
/// database.
pub const ALL_GAMES: u32 = u32::MAX;

const BYTE_ORDER_MARK: &[u8] = b"\xef\xbb\xbf";

/// Where one game lies in the database.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct IndexEntry {
    /// 1-based position of the game in the database.
    pub ordinal: u32,
    /// The tag pairs, from the first `[` to the last `]`.
    pub tags: Span,
    /// The movetext, up to and including the termination marker.
    pub movetext: Span,
    /// Checksum of the tag-pair bytes at the time the game was indexed.
    pub quick_hash: u64,
    /// The first problem found in the header while indexing.
    pub status: SyntaxError,
}

#[derive(Debug, Default)]
struct IndexState {
    entries: Vec<IndexEntry>,
    /// Offset to continue scanning from: the end of the last entry.
    resume: usize,
    /// The scan has reached the end of the database.
    complete: bool,
}

/// The entries found so far, shared between all readers of one database.
#[derive(Debug, Default)]
pub(crate) struct Index {
    state: RwLock<IndexState>,
}

/// What an index scan runs against.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Scan<'a> {
    pub buf: &'a [u8],
    pub reporter: &'a Reporter,
    pub strict: bool,
}

impl Scan<'_> {
    fn report(&self, diag: Diagnostic) -> Result<(), Error> {
        self.reporter.report(self.buf, &diag)
    }

    /// Skips whitespace and comments, reporting an unterminated comment.
    fn skip(&self, pos: usize) -> Result<usize, Error> {
        let skip = skip(self.buf, pos, |_| {});
        if let Some(diag) = skip.error {
            self.report(diag)?;
        }
        Ok(skip.end)
    }

    /// Finds the next `[` at the start of a line, where scanning can pick up
    /// again after text which does not belong to any game.
    fn resync(&self, pos: usize) -> usize {
        let buf = self.buf;
        (pos + 1..buf.len())
            .find(|&at| buf[at] == b'[' && at_line_start(buf, at))
            .unwrap_or(buf.len())
    }

    /// Steps over movetext starting at `pos` until the next header or the end
    /// of the database.  Returns where the movetext's last token ends and
    /// where the next game starts.
    fn movetext(&self, mut pos: usize) -> Result<(usize, usize), Error> {
        let buf = self.buf;
        let mut last = pos;
        loop {
            pos = self.skip(pos)?;
            if pos >= buf.len() || is_section_start(buf, pos) {
                return Ok((last, pos));
            }
            // '[' here is not a header, so it is part of a token
            pos += 1;
            while let Some(&ch) = buf.get(pos) {
                if is_space(ch) || matches!(ch, b'{' | b';' | b'[' | b'(' | b')') {
                    break;
                }
                pos += 1;
            }
            last = pos;
        }
    }

    /// Scans one game whose header starts at `start`.  Returns the entry and
    /// the offset where the next game may start.
    fn game(&self, ordinal: u32, start: usize) -> Result<(IndexEntry, usize), Error> {
        let buf = self.buf;
        let mut report = |diag| self.report(diag);
        let section = scan_section(buf, start, self.strict, |_| {}, &mut report)?;
        let (movetext_end, next) = self.movetext(section.next)?;
        let entry = IndexEntry {
            ordinal,
            tags: section.span,
            movetext: Span::new(section.movetext, movetext_end.max(section.movetext)),
            quick_hash: quick_hash(section.span.as_ref(buf)),
            status: section.status,
        };
        Ok((entry, next))
    }

    /// Appends entries to `state` until it holds `target` of them or the end
    /// of the database is reached.
    fn extend(&self, state: &mut IndexState, target: u32) -> Result<(), Error> {
        let buf = self.buf;
        let mut pos = state.resume;
        if pos == 0 && buf.starts_with(BYTE_ORDER_MARK) {
            pos = BYTE_ORDER_MARK.len();
        }
        let before = state.entries.len();
        while state.entries.len() < target as usize {
            pos = self.skip(pos)?;
            if pos >= buf.len() {
                state.complete = true;
                break;
            }
            if buf[pos] != b'[' {
                let next = self.resync(pos);
                let end = LineCache::line_end(buf, pos).min(next);
                self.report(Diagnostic::UnexpectedHeaderText(Span::new(pos, end)))?;
                pos = next;
                continue;
            }
            let ordinal = u32::try_from(state.entries.len() + 1).unwrap_or(u32::MAX);
            let (entry, next) = self.game(ordinal, pos)?;
            state.entries.push(entry);
            state.resume = next;
            pos = next;
        }
        debug!(
            "indexed games {}..={} (up to offset {}{})",
            before + 1,
            state.entries.len(),
            state.resume,
            if state.complete { ", complete" } else { "" }
        );
        Ok(())
    }
}

impl Index {
    fn read(&self) -> std::sync::RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The number of games indexed so far.
    pub(crate) fn size(&self) -> u32 {
        u32::try_from(self.read().entries.len()).unwrap_or(u32::MAX)
    }

    /// Has the whole database been indexed?
    pub(crate) fn is_complete(&self) -> bool {
        self.read().complete
    }

    /// The entry for the 1-based `ordinal`, if it has been indexed.
    pub(crate) fn entry(&self, ordinal: u32) -> Option<IndexEntry> {
        let index = usize::try_from(ordinal).ok()?.checked_sub(1)?;
        self.read().entries.get(index).copied()
    }

    /// A copy of every entry indexed so far.
    pub(crate) fn entries(&self) -> Vec<IndexEntry> {
        self.read().entries.clone()
    }

    /// Makes sure at least `target` games are indexed, unless the database
    /// holds fewer, and returns the number of games indexed.
    ///
    /// Concurrent callers are serialized on the write lock; whoever comes
    /// second finds the work done.  Entries found before a scan fails are
    /// kept.
    pub(crate) fn ensure(&self, target: u32, scan: Scan<'_>) -> Result<u32, Error> {
        {
            let state = self.read();
            if state.complete || state.entries.len() >= target as usize {
                return Ok(u32::try_from(state.entries.len()).unwrap_or(u32::MAX));
            }
        }
        let mut state = self.write();
        if !state.complete && state.entries.len() < target as usize {
            scan.extend(&mut state, target)?;
        }
        Ok(u32::try_from(state.entries.len()).unwrap_or(u32::MAX))
    }

    /// Forgets game `ordinal` and every game after it, so they are indexed
    /// again from the start of that game's header.
    pub(crate) fn invalidate_from(&self, ordinal: u32) {
        let mut state = self.write();
        let keep = (ordinal as usize).saturating_sub(1);
        if let Some(entry) = state.entries.get(keep) {
            state.resume = entry.tags.start;
            state.entries.truncate(keep);
            state.complete = false;
            debug!("dropped index entries from game {ordinal} on");
        }
    }

    /// Allows the scan to continue past the previous end of the database,
    /// after the file grew.  The last game ran up to the old end, so it is
    /// scanned again in case its movetext continues.
    pub(crate) fn reopen(&self) {
        let mut state = self.write();
        if !state.complete {
            return;
        }
        state.complete = false;
        if let Some(last) = state.entries.pop() {
            state.resume = last.tags.start;
        }
    }
}
