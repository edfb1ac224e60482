//! Image storage collaborator.
//!
//! The ledger only holds image references; bytes live with a media service.
//! When a project is deleted its images are handed here for removal.

use async_trait::async_trait;

use crate::models::ImageRef;

#[derive(Debug, thiserror::Error)]
#[error("media removal failed for {public_id}: {reason}")]
pub struct MediaError {
    pub public_id: String,
    pub reason: String,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn remove(&self, images: &[ImageRef]) -> Result<(), MediaError>;
}

/// Stand-in used when no media service is configured. Records the request
/// in the log and succeeds.
#[derive(Debug, Clone, Default)]
pub struct LoggingMediaStore;

#[async_trait]
impl MediaStore for LoggingMediaStore {
    async fn remove(&self, images: &[ImageRef]) -> Result<(), MediaError> {
        for image in images {
            tracing::info!(public_id = %image.public_id, "media removal requested");
        }
        Ok(())
    }
}
