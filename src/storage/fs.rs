use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::StorageError;
use crate::error::{Error, Result};

/// Sidecar metadata stored next to each object, in a parallel `meta/`
/// tree. The generation token is the unit of conflict detection: it
/// increments on every successful write and compare-and-swap checks
/// run against it, never against content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectMeta {
    pub generation: u64,
    pub size: i64,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectInfo {
    pub path: String,
    pub size: i64,
    pub generation: u64,
}

/// Filesystem object store. Content lives under `blobs/<prefix>/<path>`
/// and metadata under `meta/<prefix>/<path>.json`; both are written
/// temp-file-then-rename so a crash never leaves a half-written object
/// visible.
///
/// Mutating calls are not internally synchronized. Callers serialize
/// writes per workspace; that guarantee is what makes the generation
/// check-then-write here atomic in practice.
pub struct FsObjectStore {
    base_path: PathBuf,
}

impl FsObjectStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            base_path: data_dir.join("objects"),
        }
    }

    fn blob_path(&self, prefix: &str, path: &str) -> PathBuf {
        self.base_path.join("blobs").join(prefix).join(path)
    }

    fn meta_path(&self, prefix: &str, path: &str) -> PathBuf {
        self.base_path
            .join("meta")
            .join(prefix)
            .join(format!("{path}.json"))
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path.join("tmp").join(Uuid::new_v4().to_string())
    }

    async fn load_meta(&self, prefix: &str, path: &str) -> Result<Option<ObjectMeta>> {
        let meta_path = self.meta_path(prefix, path);
        let raw = match fs::read(&meta_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e).into()),
        };

        let meta = serde_json::from_slice(&raw).map_err(|_| {
            StorageError::CorruptMeta(meta_path.display().to_string())
        })?;
        Ok(Some(meta))
    }

    async fn write_atomic(&self, target: &Path, data: &[u8]) -> Result<()> {
        let temp_path = self.temp_path();
        if let Some(parent) = temp_path.parent() {
            fs::create_dir_all(parent).await.map_err(StorageError::Io)?;
        }

        let mut temp_file = File::create(&temp_path).await.map_err(StorageError::Io)?;
        temp_file.write_all(data).await.map_err(StorageError::Io)?;
        temp_file.sync_all().await.map_err(StorageError::Io)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(StorageError::Io)?;
        }
        fs::rename(&temp_path, target)
            .await
            .map_err(StorageError::Io)?;
        Ok(())
    }

    pub async fn read(&self, prefix: &str, path: &str) -> Result<(Vec<u8>, ObjectMeta)> {
        validate_key(prefix)?;
        validate_key(path)?;

        let meta = self
            .load_meta(prefix, path)
            .await?
            .ok_or(Error::NotFound)?;
        let content = fs::read(self.blob_path(prefix, path))
            .await
            .map_err(StorageError::from_io)?;
        Ok((content, meta))
    }

    pub async fn stat(&self, prefix: &str, path: &str) -> Result<Option<ObjectMeta>> {
        validate_key(prefix)?;
        validate_key(path)?;
        self.load_meta(prefix, path).await
    }

    /// Compare-and-swap write. `expected_generation` must match the
    /// current generation exactly; `None` is only valid when the object
    /// does not exist yet. Returns the new metadata on success.
    pub async fn write(
        &self,
        prefix: &str,
        path: &str,
        data: &[u8],
        expected_generation: Option<u64>,
    ) -> Result<ObjectMeta> {
        validate_key(prefix)?;
        validate_key(path)?;

        let current = self.load_meta(prefix, path).await?;
        let current_generation = current.as_ref().map_or(0, |m| m.generation);
        if expected_generation.unwrap_or(0) != current_generation {
            return Err(Error::Conflict {
                expected: expected_generation.unwrap_or(0),
                current: current_generation,
            });
        }

        let mut hasher = Sha256::new();
        hasher.update(data);
        let meta = ObjectMeta {
            generation: current_generation + 1,
            size: data.len() as i64,
            sha256: hex::encode(hasher.finalize()),
        };

        // Blob first, meta second: readers trust the meta tree, so an
        // interrupted write leaves the old meta pointing at old content
        // or a fresh blob with no meta, never the reverse.
        self.write_atomic(&self.blob_path(prefix, path), data)
            .await?;
        let encoded = serde_json::to_vec(&meta)
            .map_err(|e| Error::Storage(StorageError::Io(std::io::Error::other(e))))?;
        self.write_atomic(&self.meta_path(prefix, path), &encoded)
            .await?;

        Ok(meta)
    }

    /// Compare-and-swap delete. Returns the freed size in bytes.
    pub async fn delete(
        &self,
        prefix: &str,
        path: &str,
        expected_generation: Option<u64>,
    ) -> Result<i64> {
        validate_key(prefix)?;
        validate_key(path)?;

        let meta = self
            .load_meta(prefix, path)
            .await?
            .ok_or(Error::NotFound)?;
        if let Some(expected) = expected_generation
            && expected != meta.generation
        {
            return Err(Error::Conflict {
                expected,
                current: meta.generation,
            });
        }

        fs::remove_file(self.meta_path(prefix, path))
            .await
            .map_err(StorageError::from_io)?;
        match fs::remove_file(self.blob_path(prefix, path)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::Io(e).into()),
        }
        Ok(meta.size)
    }

    /// Lists every object under the prefix, sorted by path.
    pub async fn list_prefix(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        validate_key(prefix)?;

        let root = self.base_path.join("meta").join(prefix);
        let mut infos = Vec::new();
        for file in walk_files(&root).await? {
            let Ok(relative) = file.strip_prefix(&root) else {
                continue;
            };
            let Some(path) = relative
                .to_str()
                .and_then(|s| s.strip_suffix(".json"))
                .map(String::from)
            else {
                continue;
            };

            if let Some(meta) = self.load_meta(prefix, &path).await? {
                infos.push(ObjectInfo {
                    path,
                    size: meta.size,
                    generation: meta.generation,
                });
            }
        }

        infos.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(infos)
    }

    /// Sums the actual blob sizes on disk under the prefix. This is the
    /// ground truth the reconciliation job converges the ledger toward,
    /// deliberately independent of the meta tree.
    pub async fn usage(&self, prefix: &str) -> Result<i64> {
        validate_key(prefix)?;

        let root = self.base_path.join("blobs").join(prefix);
        let mut total = 0;
        for file in walk_files(&root).await? {
            let metadata = fs::metadata(&file).await.map_err(StorageError::Io)?;
            total += metadata.len() as i64;
        }
        Ok(total)
    }

    /// Removes everything under the prefix. Returns the number of
    /// objects removed; deleting an absent prefix is a no-op.
    pub async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        validate_key(prefix)?;

        let count = self.list_prefix(prefix).await?.len() as u64;
        for root in [
            self.base_path.join("meta").join(prefix),
            self.base_path.join("blobs").join(prefix),
        ] {
            match fs::remove_dir_all(&root).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::Io(e).into()),
            }
        }
        Ok(count)
    }
}

async fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(StorageError::Io(e).into()),
        };

        while let Some(entry) = entries.next_entry().await.map_err(StorageError::Io)? {
            let file_type = entry.file_type().await.map_err(StorageError::Io)?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }

    Ok(files)
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with('/')
        && !key.contains('\\')
        && !key.contains('\0')
        && key.split('/').all(|seg| !seg.is_empty() && seg != "." && seg != "..");

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidPath(key.to_string()).into())
    }
}
