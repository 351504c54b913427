use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use crate::application::ports::medical_file_store::{MedicalFileStore, StoredFile};
use crate::application::services::checksum::sha256_hex;
use crate::infrastructure::crypto;

/// Patient files on the local filesystem, AES-GCM sealed under `<root>/<tenant>/<record><ext>`.
pub struct EncryptedFsStore {
    pub root: PathBuf,
    key: String,
}

impl EncryptedFsStore {
    pub fn new(root: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            key: key.into(),
        }
    }

    pub fn relative_path(tenant_id: Uuid, record_id: Uuid, extension: &str) -> String {
        format!("{tenant_id}/{record_id}{extension}")
    }

    fn resolve(&self, relative: &str) -> anyhow::Result<PathBuf> {
        let rel = Path::new(relative);
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            anyhow::bail!("invalid storage path: {relative}");
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl MedicalFileStore for EncryptedFsStore {
    async fn store(
        &self,
        tenant_id: Uuid,
        record_id: Uuid,
        extension: &str,
        bytes: &[u8],
    ) -> anyhow::Result<StoredFile> {
        let relative_path = Self::relative_path(tenant_id, record_id, extension);
        let path = self.resolve(&relative_path)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("create_dir {}", dir.display()))?;
        }
        let sealed = crypto::encrypt_bytes(&self.key, bytes)?;
        tokio::fs::write(&path, &sealed)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        Ok(StoredFile {
            relative_path,
            size: bytes.len() as i64,
            checksum: sha256_hex(bytes),
        })
    }

    async fn load(&self, relative_path: &str) -> anyhow::Result<Vec<u8>> {
        let path = self.resolve(relative_path)?;
        let sealed = tokio::fs::read(&path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        crypto::decrypt_bytes(&self.key, &sealed)
    }

    async fn secure_delete(&self, relative_path: &str) -> anyhow::Result<()> {
        let path = self.resolve(relative_path)?;
        let len = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len() as usize,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        tokio::fs::write(&path, vec![0u8; len])
            .await
            .with_context(|| format!("overwrite {}", path.display()))?;
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("remove {}", path.display()))?;
        Ok(())
    }

    async fn is_writable(&self) -> bool {
        if tokio::fs::create_dir_all(&self.root).await.is_err() {
            return false;
        }
        let marker = self.root.join(format!(".write-check-{}", Uuid::new_v4()));
        let ok = tokio::fs::write(&marker, b"ok").await.is_ok();
        let _ = tokio::fs::remove_file(&marker).await;
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "a-file-encryption-key-that-is-long-enough";

    #[tokio::test]
    async fn stores_ciphertext_and_loads_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedFsStore::new(dir.path(), KEY);
        let (tenant, record) = (Uuid::new_v4(), Uuid::new_v4());
        let stored = store
            .store(tenant, record, ".txt", b"periapical lesion noted")
            .await
            .unwrap();
        assert_eq!(stored.relative_path, format!("{tenant}/{record}.txt"));
        assert_eq!(stored.size, 23);
        assert_eq!(stored.checksum, sha256_hex(b"periapical lesion noted"));

        let on_disk = std::fs::read(dir.path().join(&stored.relative_path)).unwrap();
        assert!(!on_disk.windows(10).any(|w| w == b"periapical"));
        assert_eq!(
            store.load(&stored.relative_path).await.unwrap(),
            b"periapical lesion noted"
        );
    }

    #[tokio::test]
    async fn secure_delete_removes_file_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedFsStore::new(dir.path(), KEY);
        let stored = store
            .store(Uuid::new_v4(), Uuid::new_v4(), ".pdf", b"%PDF")
            .await
            .unwrap();
        store.secure_delete(&stored.relative_path).await.unwrap();
        assert!(!dir.path().join(&stored.relative_path).exists());
        store.secure_delete(&stored.relative_path).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedFsStore::new(dir.path(), KEY);
        assert!(store.load("../etc/passwd").await.is_err());
        assert!(store.load("/etc/passwd").await.is_err());
    }

    #[tokio::test]
    async fn reports_writable_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedFsStore::new(dir.path().join("records"), KEY);
        assert!(store.is_writable().await);
    }
}
