//! Error types for appdeployer-state

use std::time::Duration;

use thiserror::Error;

use crate::model::{ObjectKey, ResourceKind};

/// Coarse classification of a storage failure.
///
/// Callers decide between "skip", "retry" and "give up" from this alone and
/// never need to match on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The object does not exist (deleted or never created).
    NotFound,
    /// The object changed since it was read; re-read and try again.
    Conflict,
    /// A create raced with another creator of the same name.
    AlreadyExists,
    /// Timeouts, connectivity, throttling. Worth retrying with backoff.
    Transient,
    /// Rejected or undecodable. Retrying the same request will not help.
    Fatal,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorClass::NotFound => "not_found",
            ErrorClass::Conflict => "conflict",
            ErrorClass::AlreadyExists => "already_exists",
            ErrorClass::Transient => "transient",
            ErrorClass::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// Errors returned by [`ObjectStore`](crate::ObjectStore) implementations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("{kind} {key} not found")]
    NotFound { kind: ResourceKind, key: ObjectKey },

    #[error("{kind} {key} was modified concurrently")]
    Conflict { kind: ResourceKind, key: ObjectKey },

    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: ResourceKind, key: ObjectKey },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl StorageError {
    pub fn class(&self) -> ErrorClass {
        match self {
            StorageError::NotFound { .. } => ErrorClass::NotFound,
            StorageError::Conflict { .. } => ErrorClass::Conflict,
            StorageError::AlreadyExists { .. } => ErrorClass::AlreadyExists,
            StorageError::Timeout { .. } | StorageError::Unavailable(_) => ErrorClass::Transient,
            StorageError::Rejected { .. } | StorageError::Serialization(_) => ErrorClass::Fatal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }

    pub fn is_already_exists(&self) -> bool {
        self.class() == ErrorClass::AlreadyExists
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_cover_the_taxonomy() {
        let key = ObjectKey::new("ns", "api");
        let not_found = StorageError::NotFound {
            kind: ResourceKind::BuildConfig,
            key: key.clone(),
        };
        let conflict = StorageError::Conflict {
            kind: ResourceKind::BuildConfig,
            key: key.clone(),
        };
        let exists = StorageError::AlreadyExists {
            kind: ResourceKind::Build,
            key,
        };

        assert_eq!(not_found.class(), ErrorClass::NotFound);
        assert!(not_found.is_not_found());
        assert_eq!(conflict.class(), ErrorClass::Conflict);
        assert!(exists.is_already_exists());
        assert_eq!(
            StorageError::Timeout {
                operation: "get",
                after: Duration::from_secs(1)
            }
            .class(),
            ErrorClass::Transient
        );
        assert_eq!(
            StorageError::Unavailable("connection refused".into()).class(),
            ErrorClass::Transient
        );
        assert_eq!(
            StorageError::Rejected {
                status: 403,
                message: "forbidden".into()
            }
            .class(),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn display_names_object_and_kind() {
        let err = StorageError::Conflict {
            kind: ResourceKind::DeploymentConfig,
            key: ObjectKey::new("prod", "api-deploy"),
        };
        assert_eq!(
            err.to_string(),
            "DeploymentConfig prod/api-deploy was modified concurrently"
        );
        assert_eq!(ErrorClass::AlreadyExists.to_string(), "already_exists");
    }
}
