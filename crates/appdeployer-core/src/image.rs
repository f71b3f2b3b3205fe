//! Image reference parsing.
//!
//! Managed references have the form `repository:tag`. The tag is whatever
//! follows the last `:`; a registry port (`host:5000/repo`) is told apart
//! from a tag by the `/` that follows it.

use std::fmt;
use std::str::FromStr;

use crate::error::ReconcileError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    repository: String,
    tag: String,
}

impl ImageRef {
    pub fn parse(reference: &str) -> Result<Self, ReconcileError> {
        let malformed = |reason: &'static str| ReconcileError::MalformedImage {
            reference: reference.to_string(),
            reason,
        };

        let (repository, tag) = reference
            .rsplit_once(':')
            .ok_or_else(|| malformed("missing tag separator"))?;
        if tag.contains('/') {
            return Err(malformed("missing tag separator"));
        }
        if repository.is_empty() {
            return Err(malformed("empty repository"));
        }
        if repository.contains('@') {
            return Err(malformed("digest references cannot be retagged"));
        }

        Ok(Self {
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// May be empty: `repo:` is the shape written when no desired version is set.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn with_tag(&self, tag: &str) -> Self {
        Self {
            repository: self.repository.clone(),
            tag: tag.to_string(),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

impl FromStr for ImageRef {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_last_colon() {
        let image = ImageRef::parse("registry.example.com:5000/team/api:v2").unwrap();
        assert_eq!(image.repository(), "registry.example.com:5000/team/api");
        assert_eq!(image.tag(), "v2");
    }

    #[test]
    fn retag_keeps_repository() {
        let image: ImageRef = "registry/api:v2".parse().unwrap();
        assert_eq!(image.with_tag("v3").to_string(), "registry/api:v3");
    }

    #[test]
    fn empty_tag_is_accepted() {
        let image = ImageRef::parse("registry/api:").unwrap();
        assert_eq!(image.tag(), "");
        assert_eq!(image.to_string(), "registry/api:");
    }

    #[test]
    fn rejects_references_without_tag() {
        for reference in ["registry/api", "registry:5000/api", ":v1", "api@sha256:abcd"] {
            let err = ImageRef::parse(reference).unwrap_err();
            assert!(
                matches!(err, ReconcileError::MalformedImage { .. }),
                "{reference} should be malformed"
            );
        }
    }
}
