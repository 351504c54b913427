use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Path relative to the storage root.
    pub relative_path: String,
    pub size: i64,
    /// SHA-256 hex digest of the plaintext.
    pub checksum: String,
}

/// Encrypted at-rest storage for patient files.
#[async_trait]
pub trait MedicalFileStore: Send + Sync {
    async fn store(
        &self,
        tenant_id: Uuid,
        record_id: Uuid,
        extension: &str,
        bytes: &[u8],
    ) -> anyhow::Result<StoredFile>;
    /// Returns the decrypted plaintext.
    async fn load(&self, relative_path: &str) -> anyhow::Result<Vec<u8>>;
    /// Overwrites the file before unlinking it. Missing files are not an error.
    async fn secure_delete(&self, relative_path: &str) -> anyhow::Result<()>;
    async fn is_writable(&self) -> bool;
}
