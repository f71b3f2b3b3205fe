//! Reconcile error taxonomy.

use appdeployer_state::{ErrorClass, ObjectKey, StorageError};

/// Errors produced while reconciling one pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("malformed image reference {reference:?}: {reason}")]
    MalformedImage {
        reference: String,
        reason: &'static str,
    },

    #[error("build config {key} has no output image")]
    MissingOutputImage { key: ObjectKey },
}

impl ReconcileError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ReconcileError::Storage(err) => err.class(),
            ReconcileError::MalformedImage { .. } | ReconcileError::MissingOutputImage { .. } => {
                ErrorClass::Fatal
            }
        }
    }

    /// Errors caused by one object's own data. They skip that object only and
    /// never abort the rest of the pass.
    pub fn is_object_local(&self) -> bool {
        !matches!(self, ReconcileError::Storage(_))
    }

    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }
}

/// Result type for reconcile operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;
