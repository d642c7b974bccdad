//! Object name validation.
//!
//! Names are used verbatim as path segments on disk, so every name that
//! reaches the storage layer must be a single, non-traversing segment.

use serde::{Deserialize, Serialize};

use crate::namespace::IMAGE_SUFFIX;

/// Maximum object name length in bytes (common filesystem limit).
pub const MAX_NAME_LENGTH: usize = 255;

/// Errors produced when validating an object name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("name cannot be empty")]
    Empty,

    #[error("name exceeds {MAX_NAME_LENGTH} bytes")]
    TooLong,

    #[error("name cannot be '.' or '..'")]
    DotSegment,

    #[error("name cannot contain path separators")]
    PathSeparator,

    #[error("name cannot contain '..'")]
    Traversal,

    #[error("name cannot contain control characters")]
    ControlCharacter,
}

/// A validated object name: a single path segment, safe to join onto a
/// namespace directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectName(String);

impl ObjectName {
    /// Validate a raw name.
    pub fn parse(raw: &str) -> Result<Self, NameError> {
        if raw.is_empty() {
            return Err(NameError::Empty);
        }
        if raw.len() > MAX_NAME_LENGTH {
            return Err(NameError::TooLong);
        }
        if raw == "." || raw == ".." {
            return Err(NameError::DotSegment);
        }
        if raw.contains('/') || raw.contains('\\') {
            return Err(NameError::PathSeparator);
        }
        if raw.contains("..") {
            return Err(NameError::Traversal);
        }
        if raw.chars().any(char::is_control) {
            return Err(NameError::ControlCharacter);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for ObjectName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ObjectName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ObjectName> for String {
    fn from(value: ObjectName) -> Self {
        value.0
    }
}

/// Derive the image name from an uploaded archive filename.
///
/// A trailing `.tar.gz` is dropped when something remains before it.
pub fn image_name_from_filename(filename: &str) -> &str {
    match filename.strip_suffix(IMAGE_SUFFIX) {
        Some(stem) if !stem.is_empty() => stem,
        _ => filename,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(ObjectName::parse("a.bin").is_ok());
        assert!(ObjectName::parse("nginx:latest").is_ok());
        assert!(ObjectName::parse("report 2024 (final).pdf").is_ok());
        assert!(ObjectName::parse(".hidden").is_ok());
    }

    #[test]
    fn test_rejected_names() {
        assert_eq!(ObjectName::parse(""), Err(NameError::Empty));
        assert_eq!(ObjectName::parse("."), Err(NameError::DotSegment));
        assert_eq!(ObjectName::parse(".."), Err(NameError::DotSegment));
        assert_eq!(ObjectName::parse("../etc/passwd"), Err(NameError::PathSeparator));
        assert_eq!(ObjectName::parse("dir\\file"), Err(NameError::PathSeparator));
        assert_eq!(ObjectName::parse("a..b"), Err(NameError::Traversal));
        assert_eq!(ObjectName::parse("bad\0name"), Err(NameError::ControlCharacter));
        assert_eq!(
            ObjectName::parse(&"x".repeat(MAX_NAME_LENGTH + 1)),
            Err(NameError::TooLong)
        );
    }

    #[test]
    fn test_serde_validates() {
        let ok: ObjectName = serde_json::from_str("\"a.bin\"").unwrap();
        assert_eq!(ok.as_str(), "a.bin");
        assert!(serde_json::from_str::<ObjectName>("\"../x\"").is_err());
    }

    #[test]
    fn test_image_name_from_filename() {
        assert_eq!(image_name_from_filename("nginx.tar.gz"), "nginx");
        assert_eq!(image_name_from_filename("nginx"), "nginx");
        assert_eq!(image_name_from_filename("nginx.tar"), "nginx.tar");
        assert_eq!(image_name_from_filename(".tar.gz"), ".tar.gz");
    }
}
