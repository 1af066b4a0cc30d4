//! Support functions that don't belong anywhere else.

use fnv::FnvHasher;
use std::borrow::Cow;
use std::collections;
use std::hash::{BuildHasherDefault, Hasher};

/// Type alias for hashsets to allow swapping out the implementation.
pub(crate) type HashSet<K> = collections::HashSet<K, BuildHasherDefault<FnvHasher>>;

/// Fast checksum of a game's tag-pair bytes.
///
/// Stored in the index when a game is first found and recomputed before the
/// game is parsed, to notice that the file changed under a cached entry.
#[must_use]
pub(crate) fn quick_hash(bytes: &[u8]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(bytes);
    hasher.finish()
}

/// Decodes text from a database: UTF-8 when it is valid, ISO-8859-1
/// otherwise.  Every byte is a valid ISO-8859-1 character, so this never
/// fails.
#[must_use]
pub(crate) fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(bytes.iter().copied().map(char::from).collect()),
    }
}

/// Is this byte whitespace for PGN purposes?
#[inline]
#[must_use]
pub(crate) const fn is_space(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\r' | b'\n' | 0x0b | 0x0c)
}

/// Does `pos` begin a line?
#[inline]
#[must_use]
pub(crate) fn at_line_start(buf: &[u8], pos: usize) -> bool {
    pos == 0 || matches!(buf[pos - 1], b'\n' | b'\r')
}

/// Trims PGN whitespace from both ends of a byte slice.
#[must_use]
pub(crate) fn trim(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if !is_space(*first) {
            break;
        }
        bytes = rest;
    }
    while let [rest @ .., last] = bytes {
        if !is_space(*last) {
            break;
        }
        bytes = rest;
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_falls_back_to_latin1() {
        assert_eq!(decode_text(b"Caf\xc3\xa9"), "Café");
        assert_eq!(decode_text(b"Caf\xe9"), "Café");
        assert!(matches!(decode_text(b"plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn hash_depends_on_content() {
        assert_eq!(quick_hash(b"[Event \"A\"]"), quick_hash(b"[Event \"A\"]"));
        assert_ne!(quick_hash(b"[Event \"A\"]"), quick_hash(b"[Event \"B\"]"));
    }

    #[test]
    fn trim_pgn_space() {
        assert_eq!(trim(b"  a b \r\n"), b"a b");
        assert_eq!(trim(b" \t "), b"");
    }
}
