pub mod filesystem;
pub mod memory;

pub use filesystem::FsBlobStore;
pub use memory::InMemoryBlobStore;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("no blob stored under key {0}")]
    NotFound(String),

    #[error("invalid blob key {0}")]
    InvalidKey(String),

    #[error("blob store I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Opaque blob store keyed by string.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` and returns the key to fetch them with.
    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<String, BlobError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError>;
}

/// Builds `uploads/{unix_millis}-{name}` with the file name reduced to a
/// safe character set.
pub fn upload_key(name: &str, millis: i64) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let sanitized: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let sanitized = sanitized.trim_start_matches('.');
    let sanitized = if sanitized.is_empty() { "upload.csv" } else { sanitized };
    format!("uploads/{}-{}", millis, sanitized)
}

/// Keys handed out by `upload_key`; anything else cannot name a stored blob.
pub fn is_valid_key(key: &str) -> bool {
    match key.strip_prefix("uploads/") {
        Some(rest) => {
            !rest.is_empty()
                && !rest.starts_with('.')
                && rest
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        }
        None => false,
    }
}
