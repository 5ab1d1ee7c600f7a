//! Host storage for serialized backup envelopes.
//!
//! The core only needs an opaque key/blob store. [`FileStore`] keeps one
//! file per key in a directory; [`MemoryStore`] keeps blobs in memory.

use getrandom::fill;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use crate::error::{Error, Result};

/// Opaque get/set byte store supplied by the host platform.
pub trait BlobStore {
    /// Stores `data` under `key`, replacing any previous blob.
    fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Returns the blob stored under `key`, or `None` if there is none.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// Keys become file names, so they are restricted to a safe alphabet.
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::invalid_input("blob key must not be empty"));
    }
    if key.starts_with('.') {
        return Err(Error::invalid_input("blob key must not start with '.'"));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(Error::invalid_input(format!("invalid blob key: {key:?}")));
    }
    Ok(())
}

fn io_error(context: &str, e: io::Error) -> Error {
    Error::storage(format!("{context}: {e}"))
}

/// A directory of blob files.
///
/// Each `put` writes atomically: data goes to a randomly named temporary
/// file, is fsynced, then replaces the target, and the directory is
/// fsynced so the rename survives a crash.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a new FileStore rooted at `dir`. The directory is created on
    /// first write.
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Returns the directory holding the blobs.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns `true` if a blob exists under `key`.
    pub fn exists(&self, key: &str) -> bool {
        validate_key(key).is_ok() && self.dir.join(key).exists()
    }

    /// Generates a unique temporary file path next to `target`.
    ///
    /// Format: `filename.tmp.<randomhex>`
    fn random_tmp_path(&self, target: &Path) -> Result<PathBuf> {
        let mut buf = [0u8; 8]; // 64 bit entropy
        fill(&mut buf).map_err(|_| Error::internal("OS random generator unavailable"))?;

        let file_name = target
            .file_name()
            .ok_or_else(|| Error::invalid_input("blob path has no file name"))?
            .to_string_lossy();

        let tmp_name = format!("{}.tmp.{}", file_name, hex::encode(buf));

        Ok(target.with_file_name(tmp_name))
    }

    /// Atomically replaces the target file with the temporary file.
    ///
    /// Uses Windows `ReplaceFileW` API with `REPLACEFILE_WRITE_THROUGH` flag
    /// when the target already exists.
    #[cfg(target_os = "windows")]
    fn atomic_replace(&self, tmp_path: &Path, target: &Path) -> io::Result<()> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;
        use windows_sys::Win32::Storage::FileSystem::{REPLACEFILE_WRITE_THROUGH, ReplaceFileW};

        if !target.exists() {
            return fs::rename(tmp_path, target);
        }

        fn to_wide(s: &OsStr) -> Vec<u16> {
            s.encode_wide().chain(std::iter::once(0)).collect()
        }

        let target_w = to_wide(target.as_os_str());
        let tmp_w = to_wide(tmp_path.as_os_str());

        // SAFETY:
        // - Strings are valid UTF-16 and null-terminated
        // - Pointers remain valid during the call
        // - Windows does not retain the pointers after return
        let result = unsafe {
            ReplaceFileW(
                target_w.as_ptr(),
                tmp_w.as_ptr(),
                std::ptr::null(),
                REPLACEFILE_WRITE_THROUGH,
                std::ptr::null(),
                std::ptr::null(),
            )
        };

        if result == 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    /// On Unix, `rename()` is atomic when both paths are on the same filesystem.
    #[cfg(not(target_os = "windows"))]
    fn atomic_replace(&self, tmp_path: &Path, target: &Path) -> io::Result<()> {
        fs::rename(tmp_path, target)
    }
}

impl BlobStore for FileStore {
    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        validate_key(key)?;
        fs::create_dir_all(&self.dir).map_err(|e| io_error("failed to create store dir", e))?;

        let target = self.dir.join(key);
        let tmp_path = self.random_tmp_path(&target)?;

        // securely create temp file (fail if exists)
        let mut tmp_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
            .map_err(|e| io_error("failed to create temporary file", e))?;

        let written = tmp_file.write_all(data).and_then(|_| tmp_file.sync_all());
        drop(tmp_file);

        if let Err(e) = written.and_then(|_| self.atomic_replace(&tmp_path, &target)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(io_error("failed to write blob", e));
        }

        // fsync directory; not supported for directory handles on Windows
        #[cfg(not(target_os = "windows"))]
        File::open(&self.dir)
            .and_then(|dir| dir.sync_all())
            .map_err(|e| io_error("failed to sync store dir", e))?;

        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        match fs::read(self.dir.join(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("failed to read blob", e)),
        }
    }
}

/// In-memory blob store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryStore {
    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        validate_key(key)?;
        self.blobs
            .write()
            .map_err(|_| Error::storage("memory store lock poisoned"))?
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self
            .blobs
            .read()
            .map_err(|_| Error::storage("memory store lock poisoned"))?
            .get(key)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::fs;
    use tempfile::tempdir;

    // --------------------------------------------------
    // FILE STORE
    // --------------------------------------------------

    #[test]
    fn get_returns_written_data() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());

        store.put("backup", b"hello world").unwrap();

        assert_eq!(store.get("backup").unwrap().unwrap(), b"hello world");
    }

    #[test]
    fn get_missing_key_is_none() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("missing"));

        assert_eq!(store.get("backup").unwrap(), None);
        assert!(!store.exists("backup"));
    }

    #[test]
    fn put_replaces_existing_blob() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());

        store.put("backup", b"first").unwrap();
        store.put("backup", b"second").unwrap();

        let content = fs::read(dir.path().join("backup")).unwrap();
        assert_eq!(content, b"second");
    }

    #[test]
    fn tmp_file_is_removed_after_success() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        store.put("backup", b"data").unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0], "backup");
    }

    #[test]
    fn store_directory_is_created() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        let store = FileStore::new(nested.clone());
        store.put("backup", b"data").unwrap();

        assert!(nested.join("backup").exists());
    }

    #[test]
    fn tmp_names_are_unique() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        let target = dir.path().join("backup");

        let a = store.random_tmp_path(&target).unwrap();
        let b = store.random_tmp_path(&target).unwrap();

        assert_ne!(a, b);
        assert_eq!(a.parent(), target.parent());
    }

    #[test]
    fn path_traversal_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());

        for key in ["", "../escape", "a/b", ".hidden"] {
            let err = store.put(key, b"x").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "key {key:?}");
        }
    }

    // --------------------------------------------------
    // MEMORY STORE
    // --------------------------------------------------

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        store.put("a", b"1").unwrap();
        store.put("a", b"2").unwrap();

        assert_eq!(store.get("a").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.get("b").unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn memory_store_len_survives_poisoned_lock() {
        let store = std::sync::Arc::new(MemoryStore::new());
        store.put("a", b"1").unwrap();
        store.put("b", b"2").unwrap();

        let poisoner = std::sync::Arc::clone(&store);
        let joined = std::thread::spawn(move || {
            let _guard = poisoner.blobs.write().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(joined.is_err());

        assert_eq!(store.len(), 2);
        assert!(!store.is_empty());
        assert_eq!(store.put("c", b"3").unwrap_err().kind(), ErrorKind::Storage);
    }
}
