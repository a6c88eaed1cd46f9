//! Session manager: the set of open files and the active-file pointer.
//!
//! A [`Session`] owns every [`LoadedFile`] and is the only thing that
//! mutates them. It ties the other components together:
//!
//! * [`crate::codec`] to decode files on load and encode them on save,
//! * [`crate::path`] to apply `set` edits,
//! * [`crate::lock`] for load-time authentication, `lock` and `unlock`,
//! * a [`Console`] for passwords and discard confirmations.
//!
//! # Lifecycle
//!
//! A file is *loaded* by [`Session::load`], may become the single *active*
//! file with [`Session::activate`], and leaves the session through
//! [`Session::unload`] or after saving a wiped header. Operations that take
//! an optional path fall back to the active file.
//!
//! # Architecture
//!
//! * [`data`]: loaded files, settings and operation outcomes.
//! * [`io`]: scoped reads and writes of media files.

pub mod data;
pub(crate) mod io;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::codec::{Codec, CodecError};
use crate::console::Console;
use crate::document::Header;
use crate::error::ErrorKind;
use crate::lock::{self, Argon2Hasher, LockError, SecretHasher, Unlocked};
use crate::path::{KeyPath, PathError};

pub use data::{LoadedFile, Outcome, SessionSettings};

/// Error type for session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The file does not exist.
    #[error("'{0}' not found.")]
    NotFound(PathBuf),

    /// The file extension is not accepted.
    #[error("Extension '{extension}' of '{path}' is not supported.")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// The embedded document is invalid.
    #[error("'{path}' is possibly corrupted: {source}")]
    Corrupted {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    /// The document could not be encoded for writing.
    #[error("Failed to encode the header of '{path}': {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    /// The password was wrong.
    #[error("Incorrect password entered for '{0}'.")]
    Authentication(PathBuf),

    /// A key expression was rejected.
    #[error(transparent)]
    Path(#[from] PathError),

    /// A lock operation failed.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// The file is already loaded.
    #[error("'{0}' is already loaded. Maybe try `switch`?")]
    AlreadyLoaded(PathBuf),

    /// The file is not loaded.
    #[error("'{0}' is not currently loaded. First, load it with `load`.")]
    NotLoaded(PathBuf),

    /// Another file is active.
    #[error("'{0}' is currently active. First, deactivate it with `deactivate`.")]
    AlreadyActive(PathBuf),

    /// No path was given and no file is active.
    #[error("No file is currently active. First, run `activate [FILE]`.")]
    NoActiveFile,

    /// The header was wiped; only `save`, `unload` and `reload` apply.
    #[error("'{0}' was wiped. Save it to erase the header or reload it to undo.")]
    Wiped(PathBuf),

    /// A prompt could not be answered.
    #[error("prompt failed: {0}")]
    Prompt(#[source] std::io::Error),

    /// Reading or writing the file failed.
    #[error("I/O error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SessionError {
    /// Category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Self::Corrupted { .. } => ErrorKind::Corrupted,
            Self::Authentication(_) | Self::Lock(LockError::Mismatch) => ErrorKind::Authentication,
            Self::Path(PathError::Validation { .. }) | Self::Lock(LockError::EmptySecret) => {
                ErrorKind::Validation
            }
            Self::Path(PathError::Bounds { .. }) => ErrorKind::Bounds,
            Self::AlreadyLoaded(_)
            | Self::NotLoaded(_)
            | Self::AlreadyActive(_)
            | Self::NoActiveFile
            | Self::Wiped(_) => ErrorKind::State,
            Self::Encode { .. }
            | Self::Lock(LockError::Hash(_))
            | Self::Prompt(_)
            | Self::Io { .. } => ErrorKind::Io,
        }
    }

    /// Whether input ended while a prompt was waiting for an answer.
    #[must_use]
    pub fn is_end_of_input(&self) -> bool {
        matches!(self, Self::Prompt(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// The open files and the active-file pointer.
pub struct Session {
    files: BTreeMap<PathBuf, LoadedFile>,
    active: Option<PathBuf>,
    settings: SessionSettings,
    codec: Codec,
    hasher: Box<dyn SecretHasher>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionSettings::default())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("files", &self.files.keys().collect::<Vec<_>>())
            .field("active", &self.active)
            .field("settings", &self.settings)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Empty session for MP3 files with the default Argon2 hasher.
    #[must_use]
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            files: BTreeMap::new(),
            active: None,
            settings,
            codec: Codec::mp3(),
            hasher: Box::new(Argon2Hasher::default()),
        }
    }

    /// Use a different header codec.
    #[must_use]
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Use a different password hasher.
    #[must_use]
    pub fn with_hasher(mut self, hasher: Box<dyn SecretHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Path of the active file, if any.
    #[must_use]
    pub fn active(&self) -> Option<&Path> {
        self.active.as_deref()
    }

    /// A loaded file by path.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&LoadedFile> {
        self.files.get(path)
    }

    #[must_use]
    pub fn is_loaded(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Loaded files, ordered by path.
    pub fn files(&self) -> impl Iterator<Item = &LoadedFile> {
        self.files.values()
    }

    /// Paths of files whose changes have not been saved.
    #[must_use]
    pub fn pending_changes(&self) -> Vec<&Path> {
        self.files
            .values()
            .filter(|file| file.has_pending_changes())
            .map(LoadedFile::path)
            .collect()
    }

    /// Load a file, asking the console for its password if it is locked.
    ///
    /// # Errors
    ///
    /// `AlreadyLoaded`, `NotFound`, `UnsupportedFormat`, `Corrupted`,
    /// `Authentication`, or I/O failures. The session is unchanged on error.
    pub fn load(&mut self, path: &Path, console: &mut dyn Console) -> SessionResult<Outcome> {
        self.load_with_secret(path, console, None)
    }

    /// Load a file, using `secret` instead of prompting when it is locked.
    ///
    /// # Errors
    ///
    /// Same as [`Session::load`].
    pub fn load_with_secret(
        &mut self,
        path: &Path,
        console: &mut dyn Console,
        secret: Option<&str>,
    ) -> SessionResult<Outcome> {
        log::debug!("Loading {}", path.display());
        if self.files.contains_key(path) {
            return Err(SessionError::AlreadyLoaded(path.to_path_buf()));
        }
        io::check_media(path, &self.settings.extensions)?;

        // Read and split into header and payload
        let raw = io::read_media(path)?;
        let decoded = self
            .codec
            .decode(&raw)
            .map_err(|source| SessionError::Corrupted {
                path: path.to_path_buf(),
                source,
            })?;

        // Locked documents need their password before they enter the session
        if decoded.document.is_locked() {
            let secret = match secret {
                Some(secret) => secret.to_string(),
                None => console
                    .ask_secret(&format!("Type in password for '{}': ", path.display()))
                    .map_err(SessionError::Prompt)?,
            };
            if !lock::verify(self.hasher.as_ref(), &decoded.document, &secret) {
                log::debug!("Password check failed for {}", path.display());
                return Err(SessionError::Authentication(path.to_path_buf()));
            }
        }

        log::debug!(
            "Loaded {} (header: {}, payload: {} byte(s))",
            path.display(),
            if decoded.embedded { "embedded" } else { "default" },
            decoded.payload.len()
        );
        self.files.insert(
            path.to_path_buf(),
            LoadedFile::new(path.to_path_buf(), decoded.document, decoded.payload),
        );
        Ok(Outcome::Loaded(path.to_path_buf()))
    }

    /// Close a file, confirming first if it has unsaved changes.
    ///
    /// Declining the confirmation keeps the file and returns
    /// [`Outcome::Kept`].
    ///
    /// # Errors
    ///
    /// `NotLoaded`, or a prompt failure.
    pub fn unload(&mut self, path: &Path, console: &mut dyn Console) -> SessionResult<Outcome> {
        let file = self
            .files
            .get(path)
            .ok_or_else(|| SessionError::NotLoaded(path.to_path_buf()))?;

        if file.has_pending_changes() && self.settings.confirm_discard {
            let question = format!(
                "'{}' was modified. Do you wish to close it and discard changes (y/n)? ",
                path.display()
            );
            if !console.confirm(&question).map_err(SessionError::Prompt)? {
                return Ok(Outcome::Kept(path.to_path_buf()));
            }
        }

        self.remove(path);
        Ok(Outcome::Unloaded(path.to_path_buf()))
    }

    /// Unload and load again from disk.
    ///
    /// # Errors
    ///
    /// Any error of [`Session::unload`] or [`Session::load`].
    pub fn reload(&mut self, path: &Path, console: &mut dyn Console) -> SessionResult<Outcome> {
        match self.unload(path, console)? {
            Outcome::Unloaded(_) => self.load(path, console),
            kept => Ok(kept),
        }
    }

    /// Make a loaded file the active one.
    ///
    /// # Errors
    ///
    /// `NotLoaded`, or `AlreadyActive` when another file is active.
    pub fn activate(&mut self, path: &Path) -> SessionResult<Outcome> {
        if !self.files.contains_key(path) {
            return Err(SessionError::NotLoaded(path.to_path_buf()));
        }
        // At most one file is active at a time
        match &self.active {
            Some(active) if active == path => Ok(Outcome::AlreadyActive(path.to_path_buf())),
            Some(active) => Err(SessionError::AlreadyActive(active.clone())),
            None => {
                self.active = Some(path.to_path_buf());
                Ok(Outcome::Activated(path.to_path_buf()))
            }
        }
    }

    /// Clear the active-file pointer.
    ///
    /// # Errors
    ///
    /// `NoActiveFile` if nothing is active.
    pub fn deactivate(&mut self) -> SessionResult<Outcome> {
        self.active
            .take()
            .map(Outcome::Deactivated)
            .ok_or(SessionError::NoActiveFile)
    }

    /// Deactivate whatever is active, then activate `path`.
    ///
    /// # Errors
    ///
    /// `NotLoaded`; the active file is left alone in that case.
    pub fn switch(&mut self, path: &Path) -> SessionResult<Outcome> {
        if !self.files.contains_key(path) {
            return Err(SessionError::NotLoaded(path.to_path_buf()));
        }
        self.active = None;
        self.activate(path)
    }

    /// Write pending changes of `path`, or of the active file.
    ///
    /// A wiped file has its header erased and is closed. Any other file is
    /// re-read from disk afterwards so the session matches what was written;
    /// it stays active if it was.
    ///
    /// # Errors
    ///
    /// `NotLoaded`, `NoActiveFile`, or I/O failures.
    pub fn save(&mut self, path: Option<&Path>) -> SessionResult<Outcome> {
        let path = self.target(path)?;
        let file = &self.files[&path];
        if !file.has_pending_changes() {
            return Ok(Outcome::Unchanged(path));
        }

        // Header first, then the untouched payload
        let bytes = self
            .codec
            .assemble(&file.header, &file.payload)
            .map_err(|source| SessionError::Encode {
                path: path.clone(),
                source,
            })?;
        io::write_media(&path, &bytes)?;

        // A wiped header is gone from disk now; the file leaves the session
        if file.is_wiped() {
            self.remove(&path);
            log::info!("Erased header of {}", path.display());
            return Ok(Outcome::Erased(path));
        }

        // Re-read what was written so memory matches disk
        self.resync(&path)?;
        log::info!("Saved {}", path.display());
        Ok(Outcome::Saved(path))
    }

    /// Reset the data of `path`, or of the active file, to `{}`.
    ///
    /// # Errors
    ///
    /// `NotLoaded` or `NoActiveFile`.
    pub fn clear(&mut self, path: Option<&Path>) -> SessionResult<Outcome> {
        let path = self.target(path)?;
        let file = self.file_mut(&path)?;
        let Some(document) = file.header.document_mut() else {
            return Ok(Outcome::AlreadyWiped(path));
        };
        document.data.clear();
        file.modified = true;
        Ok(Outcome::Cleared(path))
    }

    /// Drop the whole header of `path`, or of the active file.
    ///
    /// The next save erases it from disk and closes the file.
    ///
    /// # Errors
    ///
    /// `NotLoaded` or `NoActiveFile`.
    pub fn wipe(&mut self, path: Option<&Path>) -> SessionResult<Outcome> {
        let path = self.target(path)?;
        let file = self.file_mut(&path)?;
        if file.is_wiped() {
            return Ok(Outcome::AlreadyWiped(path));
        }
        file.header = Header::Wiped;
        Ok(Outcome::Wiped(path))
    }

    /// Write `value` at `key` in the active file's data.
    ///
    /// A leading `data.` is accepted and names the data root. The file is
    /// marked modified only if something changed.
    ///
    /// # Errors
    ///
    /// `NoActiveFile`, `Wiped`, or a key `Validation`/`Bounds` error; the
    /// document is unchanged on error.
    pub fn set(&mut self, key: &str, value: Value) -> SessionResult<Outcome> {
        let path = self.active.clone().ok_or(SessionError::NoActiveFile)?;
        let keypath = KeyPath::parse(key)?.strip_data_root();

        let file = self.file_mut(&path)?;
        let document = file
            .header
            .document_mut()
            .ok_or_else(|| SessionError::Wiped(path.clone()))?;
        let changed = keypath.apply(&mut document.data, value)?;
        if changed {
            file.modified = true;
        }
        Ok(Outcome::Set {
            key: key.to_string(),
            changed,
        })
    }

    /// Set or clear the display name of the active file's document.
    ///
    /// # Errors
    ///
    /// `NoActiveFile` or `Wiped`.
    pub fn rename(&mut self, name: Option<String>) -> SessionResult<Outcome> {
        let path = self.active.clone().ok_or(SessionError::NoActiveFile)?;
        let file = self.file_mut(&path)?;
        let document = file
            .header
            .document_mut()
            .ok_or_else(|| SessionError::Wiped(path.clone()))?;
        let changed = document.name != name;
        if changed {
            document.name = name;
            file.modified = true;
        }
        Ok(Outcome::Renamed { path, changed })
    }

    /// Protect `path`, or the active file, with a new password.
    ///
    /// An already locked file asks for its current password first.
    ///
    /// # Errors
    ///
    /// `NotLoaded`, `NoActiveFile`, `Wiped`, `Authentication`, an empty new
    /// password, or a prompt failure. Nothing changes on error.
    pub fn lock(&mut self, path: Option<&Path>, console: &mut dyn Console) -> SessionResult<Outcome> {
        let path = self.target(path)?;
        let hasher = self.hasher.as_ref();
        let file = self
            .files
            .get_mut(&path)
            .ok_or_else(|| SessionError::NotLoaded(path.clone()))?;
        let document = file
            .header
            .document_mut()
            .ok_or_else(|| SessionError::Wiped(path.clone()))?;

        // Authenticate once, before asking for the replacement
        if let Some(digest) = &document.password {
            let current = console
                .ask_secret(&format!("Current password for '{}': ", path.display()))
                .map_err(SessionError::Prompt)?;
            if !hasher.verify(&current, digest) {
                return Err(SessionError::Authentication(path));
            }
        }
        let new_secret = console
            .ask_secret(&format!("New password for '{}': ", path.display()))
            .map_err(SessionError::Prompt)?;

        lock::replace_secret(hasher, document, &new_secret)?;
        file.modified = true;
        Ok(Outcome::Locked(path))
    }

    /// Remove the password of `path`, or of the active file.
    ///
    /// # Errors
    ///
    /// `NotLoaded`, `NoActiveFile`, `Wiped`, `Authentication`, or a prompt
    /// failure. The digest is kept on error.
    pub fn unlock(
        &mut self,
        path: Option<&Path>,
        console: &mut dyn Console,
    ) -> SessionResult<Outcome> {
        let path = self.target(path)?;
        let hasher = self.hasher.as_ref();
        let file = self
            .files
            .get_mut(&path)
            .ok_or_else(|| SessionError::NotLoaded(path.clone()))?;
        let document = file
            .header
            .document_mut()
            .ok_or_else(|| SessionError::Wiped(path.clone()))?;
        if !document.is_locked() {
            return Ok(Outcome::NotLocked(path));
        }

        let secret = console
            .ask_secret(&format!("Password for '{}': ", path.display()))
            .map_err(SessionError::Prompt)?;
        match lock::unlock(hasher, document, &secret) {
            Ok(Unlocked::Removed) => {
                file.modified = true;
                Ok(Outcome::Unlocked(path))
            }
            Ok(Unlocked::NotLocked) => Ok(Outcome::NotLocked(path)),
            Err(LockError::Mismatch) => Err(SessionError::Authentication(path)),
            Err(e) => Err(e.into()),
        }
    }

    /// Pretty-printed JSON of `path`'s document, or of the active file's.
    ///
    /// A wiped header prints as `{}`.
    ///
    /// # Errors
    ///
    /// `NotLoaded` or `NoActiveFile`.
    pub fn list(&self, path: Option<&Path>) -> SessionResult<String> {
        let path = self.target(path)?;
        let file = &self.files[&path];

        let indent = " ".repeat(self.settings.list_indent);
        let mut out = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(
            &mut out,
            PrettyFormatter::with_indent(indent.as_bytes()),
        );
        // Documents keep their field order; `Value` objects would sort them.
        let written = match file.document() {
            Some(document) => document.serialize(&mut ser),
            None => Map::new().serialize(&mut ser),
        };
        written.map_err(|e| SessionError::Io {
            path: path.clone(),
            source: e.into(),
        })?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Resolve an optional path to a loaded file, defaulting to the active one.
    fn target(&self, path: Option<&Path>) -> SessionResult<PathBuf> {
        match path {
            Some(path) if self.files.contains_key(path) => Ok(path.to_path_buf()),
            Some(path) => Err(SessionError::NotLoaded(path.to_path_buf())),
            None => self.active.clone().ok_or(SessionError::NoActiveFile),
        }
    }

    fn file_mut(&mut self, path: &Path) -> SessionResult<&mut LoadedFile> {
        self.files
            .get_mut(path)
            .ok_or_else(|| SessionError::NotLoaded(path.to_path_buf()))
    }

    fn remove(&mut self, path: &Path) {
        if self.active.as_deref() == Some(path) {
            self.active = None;
        }
        self.files.remove(path);
    }

    /// Re-read a saved file so memory matches disk, without asking for the
    /// password again.
    fn resync(&mut self, path: &Path) -> SessionResult<()> {
        let raw = io::read_media(path)?;
        let decoded = self
            .codec
            .decode(&raw)
            .map_err(|source| SessionError::Corrupted {
                path: path.to_path_buf(),
                source,
            })?;
        let file = self.file_mut(path)?;
        file.header = Header::Present(decoded.document);
        file.payload = decoded.payload;
        file.modified = false;
        Ok(())
    }
}
