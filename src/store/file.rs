use std::io;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;

use super::{Kv, StoreError};

/// File-backed key-value backend: one file per key under a data directory.
///
/// Keys are percent-encoded into file names so the logical layout
/// (`target:{id}`, `queue:{id}`, ...) never escapes the directory or
/// collides with path syntax. Writes land in a temp file first and are
/// renamed into place, so a crash mid-write never leaves a torn value
/// behind.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if necessary) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(encode_key(key))
    }
}

/// Encode a logical key into a safe file name.
///
/// Alphanumerics, `_` and `-` pass through; every other byte becomes `%xx`.
/// `.` is escaped too, so the `.tmp` staging suffix can never collide with
/// an encoded key.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'-' => out.push(b as char),
            _ => {
                out.push('%');
                out.push_str(&format!("{b:02x}"));
            }
        }
    }
    out
}

impl Kv for FileStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, StoreError>> {
        Box::pin(async move {
            match tokio::fs::read(self.path_for(key)).await {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(StoreError::Io(e)),
            }
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: Vec<u8>) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let path = self.path_for(key);
            // Same-key writers are serialized by the key lock above this
            // layer, so a fixed staging name per key is race-free.
            let tmp = self.root.join(format!("{}.tmp", encode_key(key)));
            tokio::fs::write(&tmp, &value).await?;
            tokio::fs::rename(&tmp, &path).await?;
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            match tokio::fs::remove_file(self.path_for(key)).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StoreError::Io(e)),
            }
        })
    }
}
