//! Upload vault: original uploads kept under `<upload_dir>/<file name>`.
//!
//! A file name is reserved with `create_new`, so two concurrent uploads of the
//! same name can never both win. A reserved slot that is dropped without
//! [`VaultSlot::commit`] removes its file again.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::errors::RagError;

/// Outcome of [`UploadVault::reserve`].
#[derive(Debug)]
pub enum Reservation {
    /// The name was free; the caller owns the new file.
    New(VaultSlot),
    /// A file with that name is already stored.
    Existing(PathBuf),
}

#[derive(Clone, Debug)]
pub struct UploadVault {
    dir: PathBuf,
}

impl UploadVault {
    /// Opens the vault, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, RagError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Reduces an uploaded name to its last path component.
    ///
    /// # Errors
    /// [`RagError::Read`] when nothing usable remains (empty, `.` or `..`).
    pub fn sanitize(name: &str) -> Result<String, RagError> {
        let last = name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .trim();
        if last.is_empty() || last == "." || last == ".." {
            return Err(RagError::Read(format!("invalid file name `{name}`")));
        }
        Ok(last.to_string())
    }

    /// Atomically creates `<dir>/<name>` if absent.
    ///
    /// `name` must already be sanitized.
    pub fn reserve(&self, name: &str) -> Result<Reservation, RagError> {
        let path = self.dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => {
                debug!(path = %path.display(), "vault slot reserved");
                Ok(Reservation::New(VaultSlot {
                    path,
                    file: Some(file),
                    committed: false,
                }))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(Reservation::Existing(path)),
            Err(e) => Err(e.into()),
        }
    }

    /// Takes over an existing file left behind by an interrupted ingestion;
    /// its content is truncated.
    pub fn reclaim(&self, path: PathBuf) -> Result<VaultSlot, RagError> {
        let file = OpenOptions::new().write(true).truncate(true).open(&path)?;
        Ok(VaultSlot {
            path,
            file: Some(file),
            committed: false,
        })
    }
}

/// A reserved vault file; removed on drop unless committed.
#[derive(Debug)]
pub struct VaultSlot {
    path: PathBuf,
    file: Option<File>,
    committed: bool,
}

impl VaultSlot {
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<(), RagError> {
        if let Some(f) = self.file.as_mut() {
            f.write_all(bytes)?;
            f.sync_all()?;
        }
        Ok(())
    }

    /// Keeps the file.
    pub fn commit(mut self) {
        self.committed = true;
        self.file = None;
    }
}

impl Drop for VaultSlot {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.file = None;
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove vault file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_the_file_name_only() {
        assert_eq!(UploadVault::sanitize("a/b/recipes.pdf").unwrap(), "recipes.pdf");
        assert_eq!(UploadVault::sanitize("..\\x.docx").unwrap(), "x.docx");
        assert!(UploadVault::sanitize("..").is_err());
        assert!(UploadVault::sanitize("dir/").is_err());
    }

    #[test]
    fn second_reservation_sees_the_first() {
        let dir = tempfile::tempdir().unwrap();
        let vault = UploadVault::new(dir.path()).unwrap();

        let Reservation::New(mut slot) = vault.reserve("r.pdf").unwrap() else {
            panic!("expected a new slot");
        };
        slot.write_all(b"pdf").unwrap();
        assert!(matches!(vault.reserve("r.pdf").unwrap(), Reservation::Existing(_)));
        slot.commit();

        assert_eq!(std::fs::read(dir.path().join("r.pdf")).unwrap(), b"pdf");
    }

    #[test]
    fn dropped_slot_removes_its_file() {
        let dir = tempfile::tempdir().unwrap();
        let vault = UploadVault::new(dir.path()).unwrap();
        let Reservation::New(slot) = vault.reserve("r.pdf").unwrap() else {
            panic!("expected a new slot");
        };
        drop(slot);
        assert!(!dir.path().join("r.pdf").exists());
        assert!(matches!(vault.reserve("r.pdf").unwrap(), Reservation::New(_)));
    }

    #[test]
    fn reclaimed_slot_truncates_old_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("r.docx"), b"stale bytes").unwrap();
        let vault = UploadVault::new(dir.path()).unwrap();
        let Reservation::Existing(path) = vault.reserve("r.docx").unwrap() else {
            panic!("expected the existing file");
        };
        let mut slot = vault.reclaim(path).unwrap();
        slot.write_all(b"new").unwrap();
        slot.commit();
        assert_eq!(std::fs::read(dir.path().join("r.docx")).unwrap(), b"new");
    }
}
