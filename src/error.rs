use std::time::Duration;

use uuid::Uuid;

use crate::store::StoreError;

/// Every way a ledger operation can fail.
///
/// Callers branch on the variant; no operation ever reports partial success.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProjectError {
    /// The identifier is malformed. Raised before any I/O.
    #[error("invalid project id: {0:?}")]
    InvalidId(String),

    #[error("project not found: {0}")]
    NotFound(Uuid),

    #[error("sub-goal {subgoal_id:?} not found in project {project_id}")]
    SubgoalNotFound { project_id: Uuid, subgoal_id: String },

    /// The per-project lock could not be acquired in time.
    #[error("project {id} is busy; gave up after {waited:?}")]
    ConcurrencyTimeout { id: Uuid, waited: Duration },

    #[error("transient store failure: {0}")]
    TransientStore(StoreError),

    #[error("store failure: {0}")]
    PermanentStore(StoreError),

    #[error("validation failed: {0}")]
    Validation(String),
}

impl ProjectError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<StoreError> for ProjectError {
    fn from(e: StoreError) -> Self {
        if e.is_transient() {
            Self::TransientStore(e)
        } else {
            Self::PermanentStore(e)
        }
    }
}

pub type Result<T, E = ProjectError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_split_by_transience() {
        let e: ProjectError = StoreError::Busy("locked".into()).into();
        assert!(matches!(e, ProjectError::TransientStore(_)));

        let e: ProjectError = StoreError::Internal("disk full".into()).into();
        assert!(matches!(e, ProjectError::PermanentStore(_)));
    }
}
