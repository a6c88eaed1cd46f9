//! Data structures for an editing session.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::document::{Document, Header};

/// Settings that shape how a session loads and presents files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Accepted file extensions, lowercase, without the dot.
    pub extensions: Vec<String>,
    /// Ask before discarding unsaved changes.
    pub confirm_discard: bool,
    /// Indentation width for `list` output.
    pub list_indent: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            extensions: vec!["mp3".to_string()],
            confirm_discard: true,
            list_indent: 4,
        }
    }
}

/// A file open in the session.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedFile {
    /// Path the file was loaded from; unique within the session.
    pub path: PathBuf,
    /// Bytes from the sync marker onward, written back verbatim.
    pub payload: Vec<u8>,
    /// Embedded document, or the wiped state.
    pub header: Header,
    /// The document changed since it was loaded or last saved.
    pub modified: bool,
}

impl LoadedFile {
    pub(crate) fn new(path: PathBuf, document: Document, payload: Vec<u8>) -> Self {
        Self {
            path,
            payload,
            header: Header::Present(document),
            modified: false,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The document, unless the header was wiped.
    #[must_use]
    pub fn document(&self) -> Option<&Document> {
        self.header.document()
    }

    #[must_use]
    pub fn is_wiped(&self) -> bool {
        self.header.is_wiped()
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.document().is_some_and(Document::is_locked)
    }

    /// Whether saving would write anything.
    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        self.modified || self.is_wiped()
    }
}

/// Result of a session operation that did not fail.
///
/// Some outcomes are no-ops worth reporting; see [`Outcome::is_noop`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Loaded(PathBuf),
    Unloaded(PathBuf),
    /// Unloading was declined to keep unsaved changes.
    Kept(PathBuf),
    Activated(PathBuf),
    AlreadyActive(PathBuf),
    Deactivated(PathBuf),
    Saved(PathBuf),
    /// A wiped header was removed from disk and the file closed.
    Erased(PathBuf),
    /// Nothing to save.
    Unchanged(PathBuf),
    Set { key: String, changed: bool },
    Renamed { path: PathBuf, changed: bool },
    Cleared(PathBuf),
    Wiped(PathBuf),
    AlreadyWiped(PathBuf),
    Locked(PathBuf),
    Unlocked(PathBuf),
    NotLocked(PathBuf),
}

impl Outcome {
    /// Whether the operation left everything as it was.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(
            self,
            Self::Kept(_)
                | Self::AlreadyActive(_)
                | Self::Unchanged(_)
                | Self::AlreadyWiped(_)
                | Self::NotLocked(_)
                | Self::Set { changed: false, .. }
                | Self::Renamed { changed: false, .. }
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded(p) => write!(
                f,
                "'{}' loaded successfully. Activate it with `activate {}`",
                p.display(),
                p.display()
            ),
            Self::Unloaded(p) => write!(f, "'{}' successfully closed.", p.display()),
            Self::Kept(p) => write!(f, "'{}' kept open.", p.display()),
            Self::Activated(p) => write!(f, "'{}' activated successfully.", p.display()),
            Self::AlreadyActive(p) => write!(f, "'{}' is already the active file.", p.display()),
            Self::Deactivated(p) => write!(f, "'{}' deactivated.", p.display()),
            Self::Saved(p) => write!(f, "'{}' saved.", p.display()),
            Self::Erased(p) => write!(
                f,
                "Header erased from '{}'. The file was closed.",
                p.display()
            ),
            Self::Unchanged(p) => write!(f, "'{}' has no changes to save.", p.display()),
            Self::Set { key, changed: true } => write!(f, "'{}' set.", key),
            Self::Set {
                key,
                changed: false,
            } => write!(f, "'{}' already holds that value.", key),
            Self::Renamed {
                path,
                changed: true,
            } => write!(f, "'{}' renamed.", path.display()),
            Self::Renamed {
                path,
                changed: false,
            } => write!(f, "'{}' already has that name.", path.display()),
            Self::Cleared(p) => write!(f, "Data of '{}' cleared.", p.display()),
            Self::Wiped(p) => write!(
                f,
                "'{}' wiped. Run `save {}` to erase its header.",
                p.display(),
                p.display()
            ),
            Self::AlreadyWiped(p) => write!(f, "'{}' is already wiped.", p.display()),
            Self::Locked(p) => write!(f, "'{}' locked.", p.display()),
            Self::Unlocked(p) => write!(f, "'{}' unlocked.", p.display()),
            Self::NotLocked(p) => write!(f, "'{}' is not locked.", p.display()),
        }
    }
}
