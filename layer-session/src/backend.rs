//! Pluggable storage for the three session resources.
//!
//! The [`SessionBackend`] trait abstracts over where the session bytes live so
//! that callers can swap the on-disk content root for an in-memory map (tests,
//! throwaway sessions) or anything else.
//!
//! Two built-in backends are provided:
//! * [`FileBackend`] — one file per resource under a private content root.
//! * [`InMemoryBackend`] — ephemeral, nothing touches the disk.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

// ─── ResourceKind ────────────────────────────────────────────────────────────

/// The three named resources of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// Update-stream position (`state`).
    Cursor,
    /// Datacenter table and keys (`auth`).
    Credentials,
    /// Established secret chats (`secret`).
    SecretChats,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [Self::Cursor, Self::Credentials, Self::SecretChats];

    /// File name under the content root.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Cursor      => "state",
            Self::Credentials => "auth",
            Self::SecretChats => "secret",
        }
    }
}

// ─── Trait ────────────────────────────────────────────────────────────────────

/// An abstraction over where and how session resources are persisted.
pub trait SessionBackend: Send + Sync {
    /// Read a whole resource, or `None` if it does not exist.
    fn read(&self, kind: ResourceKind) -> io::Result<Option<Vec<u8>>>;

    /// Replace a whole resource. Either the new bytes land completely or the
    /// previous content stays in place.
    fn write(&self, kind: ResourceKind, bytes: &[u8]) -> io::Result<()>;

    /// Remove a resource; removing a missing one is not an error.
    fn delete(&self, kind: ResourceKind) -> io::Result<()>;

    /// Human-readable name of this backend (for log messages).
    fn name(&self) -> &str;
}

// ─── FileBackend ──────────────────────────────────────────────────────────────

/// The default backend: a content root directory holding `state`, `auth` and
/// `secret`, plus a `downloads/` subdirectory.
///
/// Directories are created with mode `0700` and files with `0600` on unix.
/// Writes go to `<name>.tmp` first and are renamed over the target.
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Open (creating if needed) the content root at `root`.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        create_private_dir(&root)?;
        create_private_dir(&root.join("downloads"))?;
        Ok(Self { root })
    }

    /// Attach to an existing content root without creating anything.
    pub fn open_existing(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        if !fs::metadata(&root)?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{} is not a directory", root.display()),
            ));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path { &self.root }

    pub fn downloads_dir(&self) -> PathBuf { self.root.join("downloads") }

    /// Full path of `kind`'s file.
    pub fn path(&self, kind: ResourceKind) -> PathBuf { self.root.join(kind.file_name()) }
}

impl SessionBackend for FileBackend {
    fn read(&self, kind: ResourceKind) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path(kind)) {
            Ok(bytes)                                       => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound   => Ok(None),
            Err(e)                                          => Err(e),
        }
    }

    fn write(&self, kind: ResourceKind, bytes: &[u8]) -> io::Result<()> {
        let path = self.path(kind);
        let tmp  = path.with_extension("tmp");
        let result = (|| {
            let mut file = open_private(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        })();
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }

    fn delete(&self, kind: ResourceKind) -> io::Result<()> {
        match fs::remove_file(self.path(kind)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &str { "file" }
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

fn open_private(path: &Path) -> io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    opts.open(path)
}

// ─── InMemoryBackend ─────────────────────────────────────────────────────────

/// An ephemeral backend that stores nothing on disk.
///
/// Useful for testing or for sessions that should always start fresh.
#[derive(Default)]
pub struct InMemoryBackend {
    data: Mutex<HashMap<ResourceKind, Vec<u8>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self { Self::default() }

    /// Seed a resource, e.g. with a hand-built or corrupted payload.
    pub fn with_resource(self, kind: ResourceKind, bytes: impl Into<Vec<u8>>) -> Self {
        self.lock().insert(kind, bytes.into());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ResourceKind, Vec<u8>>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionBackend for InMemoryBackend {
    fn read(&self, kind: ResourceKind) -> io::Result<Option<Vec<u8>>> {
        Ok(self.lock().get(&kind).cloned())
    }

    fn write(&self, kind: ResourceKind, bytes: &[u8]) -> io::Result<()> {
        self.lock().insert(kind, bytes.to_vec());
        Ok(())
    }

    fn delete(&self, kind: ResourceKind) -> io::Result<()> {
        self.lock().remove(&kind);
        Ok(())
    }

    fn name(&self) -> &str { "in-memory" }
}
