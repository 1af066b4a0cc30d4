//! Read-only access to the bytes of a PGN database.
//!
//! A database is mapped into memory once when it is opened and read in place
//! from then on; nothing here copies file content.  The mapping is handed out
//! as a reference-counted [`BufferRef`] snapshot, so a later remap (after the
//! file changed on disk) never invalidates a buffer that an index scan or a
//! parsed game is still looking at.

use filetime::FileTime;
use log::debug;
use memmap2::Mmap;
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Semantic type for byte ranges within a database.
///
/// Spans are half-open and always absolute, i.e. relative to the start of the
/// file, never to the start of a game.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct Span {
    /// Index of first byte of the range.
    pub start: usize,
    /// Index one past last byte of the range.
    pub end: usize,
}

impl Span {
    /// Creates a span from a pair of offsets.
    #[inline]
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Span {
        Span { start, end }
    }

    /// Get the length of the span.
    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        self.end - self.start
    }

    /// Is this an empty span?
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.start == self.end
    }

    /// Given a position span, extract the corresponding bytes from a buffer.
    #[inline]
    #[must_use]
    pub fn as_ref(self, buf: &[u8]) -> &[u8] {
        &buf[self.start..self.end]
    }
}

/// The bytes of a database, either mapped from disk or held in memory.
pub enum Buffer {
    /// A read-only file mapping.
    Mapped(Mmap),
    /// Content supplied directly by the caller.
    Memory(Vec<u8>),
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Buffer::Mapped(map) => map,
            Buffer::Memory(vec) => vec,
        }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Buffer::Mapped(map) => write!(f, "Buffer::Mapped({} bytes)", map.len()),
            Buffer::Memory(vec) => write!(f, "Buffer::Memory({} bytes)", vec.len()),
        }
    }
}

/// A shared, immutable view of the database bytes.
pub type BufferRef = Arc<Buffer>;

#[derive(Debug)]
struct Mapping {
    buffer: BufferRef,
    modified: Option<FileTime>,
}

/// What changed when a [`Source`] was remapped.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Remap {
    /// Length of the buffer before the remap.
    pub old_len: usize,
    /// Length of the buffer after the remap.
    pub new_len: usize,
}

impl Remap {
    /// Did the database grow?  New games may have been appended.
    #[must_use]
    pub const fn grew(self) -> bool {
        self.new_len > self.old_len
    }
}

/// The byte source of one database.
#[derive(Debug)]
pub struct Source {
    path: Option<PathBuf>,
    name: String,
    current: RwLock<Mapping>,
}

fn map_file(path: &Path) -> io::Result<Mapping> {
    let file = File::open(path)?;
    let meta = file.metadata()?;
    let modified = Some(FileTime::from_last_modification_time(&meta));
    if meta.len() == 0 {
        // zero-length mappings are an error on some platforms
        return Ok(Mapping {
            buffer: Arc::new(Buffer::Memory(Vec::new())),
            modified,
        });
    }
    // SAFETY: the mapping is read-only.  The file must not be truncated while
    // it is mapped; in-place modifications are detected by the quick hash.
    let map = unsafe { Mmap::map(&file)? };
    Ok(Mapping {
        buffer: Arc::new(Buffer::Mapped(map)),
        modified,
    })
}

impl Source {
    /// Maps a database file for reading.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or mapped.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Source> {
        let path = path.as_ref();
        let mapping = map_file(path)?;
        debug!("mapped {} ({} bytes)", path.display(), mapping.buffer.len());
        Ok(Source {
            path: Some(path.to_owned()),
            name: path.display().to_string(),
            current: RwLock::new(mapping),
        })
    }

    /// Wraps database content which is already in memory.
    #[must_use]
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Source {
        Source {
            path: None,
            name: name.into(),
            current: RwLock::new(Mapping {
                buffer: Arc::new(Buffer::Memory(bytes)),
                modified: None,
            }),
        }
    }

    /// The name used for this database in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current view of the database bytes.
    #[must_use]
    pub fn snapshot(&self) -> BufferRef {
        let mapping = self.current.read().unwrap_or_else(PoisonError::into_inner);
        mapping.buffer.clone()
    }

    /// Maps the file again, picking up any change in length.
    ///
    /// In-memory sources are left as they are.
    ///
    /// # Errors
    ///
    /// Fails if the file can no longer be opened or mapped.
    pub fn remap(&self) -> io::Result<Remap> {
        let mut mapping = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let old_len = mapping.buffer.len();
        if let Some(path) = &self.path {
            *mapping = map_file(path)?;
            debug!("remapped {} ({old_len} -> {} bytes)", self.name, mapping.buffer.len());
        }
        Ok(Remap {
            old_len,
            new_len: mapping.buffer.len(),
        })
    }

    /// Remaps the file if its modification time differs from the one seen
    /// when it was last mapped.
    ///
    /// # Errors
    ///
    /// Fails if the file can no longer be inspected or mapped.
    pub fn refresh(&self) -> io::Result<Option<Remap>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        let modified = FileTime::from_last_modification_time(&fs::metadata(path)?);
        let unchanged = {
            let mapping = self.current.read().unwrap_or_else(PoisonError::into_inner);
            mapping.modified == Some(modified)
        };
        if unchanged {
            Ok(None)
        } else {
            self.remap().map(Some)
        }
    }
}
