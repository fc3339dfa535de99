use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

use crate::types::AttachmentRef;

#[derive(Debug, Error)]
pub enum AttachmentStorageError {
    #[error("attachment not found")]
    NotFound,
    #[error("invalid attachment hash")]
    InvalidHash,
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AttachmentStorageError {
    fn from_io(e: std::io::Error) -> Self {
        if e.kind() == ErrorKind::NotFound {
            Self::NotFound
        } else {
            Self::Io(e)
        }
    }
}

impl From<AttachmentStorageError> for crate::error::Error {
    fn from(e: AttachmentStorageError) -> Self {
        match e {
            AttachmentStorageError::NotFound => Self::NotFound,
            bad @ (AttachmentStorageError::InvalidHash
            | AttachmentStorageError::HashMismatch { .. }) => Self::BadRequest(bad.to_string()),
            AttachmentStorageError::Io(io) => Self::Io(io),
        }
    }
}

/// SHA-256 content address of `data`.
#[must_use]
pub fn digest(data: &[u8]) -> AttachmentRef {
    let mut hasher = Sha256::new();
    hasher.update(data);
    AttachmentRef::from_digest(hex::encode(hasher.finalize()))
}

/// Content-addressed blob store for large tiddler bodies.
///
/// Objects live at `<base>/objects/ab/cd/<hash>`; identical content shares
/// one file regardless of how many tiddlers or bags cite it.
pub struct AttachmentStorage {
    base_path: PathBuf,
}

impl AttachmentStorage {
    pub fn new(base_path: &Path) -> Self {
        Self {
            base_path: base_path.to_path_buf(),
        }
    }

    fn object_path(&self, hash: &AttachmentRef) -> Result<PathBuf, AttachmentStorageError> {
        let hash = hash.as_str();
        validate_hash(hash)?;
        Ok(self
            .base_path
            .join("objects")
            .join(&hash[0..2])
            .join(&hash[2..4])
            .join(hash))
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path.join("tmp").join(Uuid::new_v4().to_string())
    }

    pub async fn exists(&self, hash: &AttachmentRef) -> Result<bool, AttachmentStorageError> {
        Ok(fs::try_exists(self.object_path(hash)?).await?)
    }

    pub async fn size(&self, hash: &AttachmentRef) -> Result<i64, AttachmentStorageError> {
        let metadata = fs::metadata(self.object_path(hash)?)
            .await
            .map_err(AttachmentStorageError::from_io)?;
        Ok(metadata.len() as i64)
    }

    pub async fn get(&self, hash: &AttachmentRef) -> Result<Vec<u8>, AttachmentStorageError> {
        let mut file = File::open(self.object_path(hash)?)
            .await
            .map_err(AttachmentStorageError::from_io)?;

        let mut data = Vec::new();
        file.read_to_end(&mut data).await?;

        let actual = digest(&data);
        if &actual != hash {
            return Err(AttachmentStorageError::HashMismatch {
                expected: hash.to_string(),
                actual: actual.to_string(),
            });
        }

        Ok(data)
    }

    /// Stores `data` under its digest. Content that is already present is
    /// not rewritten.
    pub async fn put(&self, data: &[u8]) -> Result<AttachmentRef, AttachmentStorageError> {
        let hash = digest(data);
        let final_path = self.object_path(&hash)?;

        if fs::try_exists(&final_path).await.unwrap_or(false) {
            tracing::debug!(%hash, "attachment already stored");
            return Ok(hash);
        }

        let temp_path = self.temp_path();
        if let Some(parent) = temp_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut temp_file = File::create(&temp_path).await?;
        temp_file.write_all(data).await?;
        temp_file.sync_all().await?;

        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::rename(&temp_path, &final_path).await?;
        tracing::debug!(%hash, size = data.len(), "stored attachment");

        Ok(hash)
    }

    pub async fn delete(&self, hash: &AttachmentRef) -> Result<bool, AttachmentStorageError> {
        match fs::remove_file(self.object_path(hash)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AttachmentStorageError::Io(e)),
        }
    }
}

fn validate_hash(hash: &str) -> Result<(), AttachmentStorageError> {
    if AttachmentRef::parse(hash).is_none() {
        return Err(AttachmentStorageError::InvalidHash);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_hash() -> AttachmentRef {
        AttachmentRef::parse("a665a45920422f9d417e4867efdc4fb8a04a1f3fff1fa07e998e86f7f7a27ae3")
            .unwrap()
    }

    #[test]
    fn test_digest_matches_sha256() {
        assert_eq!(digest(b"123"), test_hash());
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let storage = AttachmentStorage::new(temp_dir.path());

        let hash = storage.put(b"123").await.unwrap();
        assert_eq!(hash, test_hash());
        assert!(storage.exists(&hash).await.unwrap());
        assert_eq!(storage.size(&hash).await.unwrap(), 3);
        assert_eq!(storage.get(&hash).await.unwrap(), b"123".to_vec());
    }

    #[tokio::test]
    async fn test_put_deduplicates() {
        let temp_dir = TempDir::new().unwrap();
        let storage = AttachmentStorage::new(temp_dir.path());

        let first = storage.put(b"same bytes").await.unwrap();
        let second = storage.put(b"same bytes").await.unwrap();
        assert_eq!(first, second);

        let mut entries = fs::read_dir(temp_dir.path().join("tmp")).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupted_object_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let storage = AttachmentStorage::new(temp_dir.path());

        let hash = storage.put(b"123").await.unwrap();
        fs::write(storage.object_path(&hash).unwrap(), b"456").await.unwrap();

        assert!(matches!(
            storage.get(&hash).await,
            Err(AttachmentStorageError::HashMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let storage = AttachmentStorage::new(temp_dir.path());

        let hash = test_hash();
        assert!(!storage.exists(&hash).await.unwrap());
        assert!(matches!(
            storage.get(&hash).await,
            Err(AttachmentStorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let temp_dir = TempDir::new().unwrap();
        let storage = AttachmentStorage::new(temp_dir.path());

        let hash = storage.put(b"123").await.unwrap();
        assert!(storage.delete(&hash).await.unwrap());
        assert!(!storage.exists(&hash).await.unwrap());
        assert!(!storage.delete(&hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_hash_never_reaches_disk() {
        let temp_dir = TempDir::new().unwrap();
        let storage = AttachmentStorage::new(temp_dir.path());

        for raw in ["ab", "../../../../../../etc/passwd"] {
            let hash = AttachmentRef::from_digest(raw.to_string());
            assert!(matches!(
                storage.object_path(&hash),
                Err(AttachmentStorageError::InvalidHash)
            ));
            assert!(matches!(
                storage.get(&hash).await,
                Err(AttachmentStorageError::InvalidHash)
            ));
            assert!(matches!(
                storage.exists(&hash).await,
                Err(AttachmentStorageError::InvalidHash)
            ));
            assert!(matches!(
                storage.delete(&hash).await,
                Err(AttachmentStorageError::InvalidHash)
            ));
        }
    }
}
