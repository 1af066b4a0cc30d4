//! Utilities for source-offset/line-number mapping.

use std::convert::TryFrom;

const PAGE: usize = 256;

/// An object for repeated byte offset to line conversions against one buffer.
///
/// The index stores the number of newlines before every 256-byte boundary.
/// Unlike a whole-file index it is only extended as far as the furthest
/// offset queried so far: diagnostics are rare, and a database may be many
/// gigabytes of which only the first few games have been looked at.
///
/// The cache remembers the address range of the buffer it indexed and starts
/// over when it is queried against a different one, which happens after the
/// database has been remapped.
#[derive(Default, Debug)]
pub struct LineCache {
    key: (usize, usize),
    index: Vec<u64>,
}

// use an i8 accumulator to maximize the effectiveness of vectorization.  do
// blocks of 128 because we don't want to overflow the i8.  count down because
// the natural compare instructions produce 0 and -1, not 0 and 1.
#[allow(clippy::cast_sign_loss)]
fn count_newlines(page: &[u8]) -> u64 {
    let mut count = 0u64;
    for block in page.chunks(128) {
        let mut inner = 0i8;
        for &ch in block {
            inner += -i8::from(ch == b'\n');
        }
        count += u64::from((inner as u8).wrapping_neg());
    }
    count
}

impl LineCache {
    fn extend_to(&mut self, buf: &[u8], offset: usize) {
        let key = (buf.as_ptr() as usize, buf.len());
        if self.key != key || self.index.is_empty() {
            self.key = key;
            self.index.clear();
            self.index.push(0);
        }
        // index[k] counts the newlines in buf[..k * PAGE]
        let want = offset / PAGE;
        while self.index.len() <= want {
            let page = self.index.len() - 1;
            let total = self.index[page] + count_newlines(&buf[page * PAGE..(page + 1) * PAGE]);
            self.index.push(total);
        }
    }

    /// Map a buffer index to a 1-based (line, column) pair.  The column is
    /// counted in bytes.
    ///
    /// ## Panics
    /// Panics if offset is out of range.
    #[must_use]
    pub fn from_offset(&mut self, buf: &[u8], offset: usize) -> (u64, u32) {
        assert!(offset <= buf.len(), "offset out of range");
        self.extend_to(buf, offset);
        let base = offset / PAGE * PAGE;
        let lineno = self.index[offset / PAGE] + count_newlines(&buf[base..offset]);
        let line_start = buf[..offset]
            .iter()
            .rposition(|&ch| ch == b'\n')
            .map_or(0, |pos| pos + 1);
        let colno = u32::try_from(offset - line_start).unwrap_or(u32::MAX - 1);
        (lineno + 1, colno + 1)
    }

    /// Find the offset just after the end of the line (usually the
    /// location of a '\n', unless we are at the end of the file).
    #[must_use]
    pub fn line_end(buf: &[u8], offset: usize) -> usize {
        buf.iter()
            .skip(offset)
            .position(|&ch| ch == b'\n')
            .map_or(buf.len(), |pos| offset + pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_and_columns() {
        let buf = b"ab\ncd\n\nef";
        let mut cache = LineCache::default();
        assert_eq!(cache.from_offset(buf, 0), (1, 1));
        assert_eq!(cache.from_offset(buf, 1), (1, 2));
        assert_eq!(cache.from_offset(buf, 3), (2, 1));
        assert_eq!(cache.from_offset(buf, 6), (3, 1));
        assert_eq!(cache.from_offset(buf, 8), (4, 2));
        assert_eq!(cache.from_offset(buf, 9), (4, 3));
    }

    #[test]
    fn across_pages() {
        let mut buf = Vec::new();
        for _ in 0..1000 {
            buf.extend_from_slice(b"123456789\n");
        }
        let mut cache = LineCache::default();
        assert_eq!(cache.from_offset(&buf, 5005), (501, 6));
        // querying backwards reuses the index
        assert_eq!(cache.from_offset(&buf, 10), (2, 1));
        assert_eq!(cache.from_offset(&buf, buf.len()), (1001, 1));
    }

    #[test]
    fn new_buffer_resets() {
        let mut cache = LineCache::default();
        let first = vec![b'\n'; 600];
        assert_eq!(cache.from_offset(&first, 599), (600, 1));
        let second = vec![b'x'; 600];
        assert_eq!(cache.from_offset(&second, 599), (1, 600));
    }

    #[test]
    fn line_end() {
        assert_eq!(LineCache::line_end(b"ab\ncd", 0), 2);
        assert_eq!(LineCache::line_end(b"ab\ncd", 3), 5);
    }
}
