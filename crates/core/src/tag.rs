//! Snapshot tag type
//!
//! A tag is the short, user-supplied label that becomes part of a snapshot's
//! file name and its version-control tag. Because it is spliced into paths,
//! it is validated before anything touches the filesystem.
//!
//! ## Validation
//!
//! Tags must:
//! - Be 1-128 characters
//! - Contain only ASCII alphanumerics, dash, underscore

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum length of a snapshot tag
pub const MAX_TAG_LENGTH: usize = 128;

/// Validated snapshot tag
///
/// ## Examples
///
/// Valid tags:
/// - "nightly"
/// - "pre-deploy"
/// - "auto_2024"
///
/// Invalid tags:
/// - "" (empty)
/// - "has spaces"
/// - "a/b"
/// - "x;rm"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SnapshotTag(String);

/// Error when validating a snapshot tag
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    /// Tag is empty
    #[error("snapshot tag cannot be empty")]
    Empty,

    /// Tag exceeds maximum length
    #[error("snapshot tag too long: {length} chars (max {max})")]
    TooLong {
        /// Actual length of the tag
        length: usize,
        /// Maximum allowed length
        max: usize,
    },

    /// Tag contains a character outside `[A-Za-z0-9_-]`
    #[error("invalid character {ch:?} at position {position} (only alphanumeric, dash, underscore allowed)")]
    InvalidChar {
        /// The invalid character
        ch: char,
        /// Position of the invalid character
        position: usize,
    },
}

impl SnapshotTag {
    /// Create a new tag, validating the input
    ///
    /// # Errors
    ///
    /// Returns `TagError` if the tag is invalid.
    pub fn new(tag: impl Into<String>) -> Result<Self, TagError> {
        let tag = tag.into();
        Self::validate(&tag)?;
        Ok(SnapshotTag(tag))
    }

    /// Validate a tag without constructing it
    pub fn validate(tag: &str) -> Result<(), TagError> {
        if tag.is_empty() {
            return Err(TagError::Empty);
        }

        let length = tag.chars().count();
        if length > MAX_TAG_LENGTH {
            return Err(TagError::TooLong {
                length,
                max: MAX_TAG_LENGTH,
            });
        }

        for (position, ch) in tag.chars().enumerate() {
            if !is_tag_char(ch) {
                return Err(TagError::InvalidChar { ch, position });
            }
        }

        Ok(())
    }

    /// Get the tag as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_tag_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}

impl fmt::Display for SnapshotTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SnapshotTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SnapshotTag {
    type Error = TagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SnapshotTag::new(value)
    }
}

impl TryFrom<&str> for SnapshotTag {
    type Error = TagError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        SnapshotTag::new(value)
    }
}

impl From<SnapshotTag> for String {
    fn from(tag: SnapshotTag) -> Self {
        tag.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_tags() {
        for tag in ["nightly", "pre-deploy", "auto_2024", "A", "0", "-", "_"] {
            assert!(SnapshotTag::new(tag).is_ok(), "expected {:?} to be valid", tag);
        }
    }

    #[test]
    fn test_empty_tag() {
        assert_eq!(SnapshotTag::new(""), Err(TagError::Empty));
    }

    #[test]
    fn test_rejects_separators_and_shell_chars() {
        assert_eq!(
            SnapshotTag::new("a/b"),
            Err(TagError::InvalidChar { ch: '/', position: 1 })
        );
        assert_eq!(
            SnapshotTag::new("has space"),
            Err(TagError::InvalidChar { ch: ' ', position: 3 })
        );
        assert_eq!(
            SnapshotTag::new("x;rm"),
            Err(TagError::InvalidChar { ch: ';', position: 1 })
        );
        assert!(SnapshotTag::new("..").is_err());
        assert!(SnapshotTag::new("caf\u{e9}").is_err());
    }

    #[test]
    fn test_too_long() {
        let tag = "a".repeat(MAX_TAG_LENGTH + 1);
        assert!(matches!(
            SnapshotTag::new(tag),
            Err(TagError::TooLong { max: MAX_TAG_LENGTH, .. })
        ));
        assert!(SnapshotTag::new("a".repeat(MAX_TAG_LENGTH)).is_ok());
    }

    #[test]
    fn test_serde_validates() {
        let tag: SnapshotTag = serde_json::from_str("\"nightly\"").unwrap();
        assert_eq!(tag.as_str(), "nightly");
        assert!(serde_json::from_str::<SnapshotTag>("\"bad tag\"").is_err());
    }

    #[test]
    fn test_error_display() {
        let err = SnapshotTag::new("a/b").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'/'"));
        assert!(msg.contains("position 1"));
    }

    proptest! {
        #[test]
        fn prop_pattern_tags_accepted(tag in "[A-Za-z0-9_-]{1,64}") {
            prop_assert!(SnapshotTag::new(tag).is_ok());
        }

        #[test]
        fn prop_any_forbidden_char_rejected(
            prefix in "[A-Za-z0-9_-]{0,8}",
            bad in prop::sample::select(vec!['/', ' ', ';', '.', '\\', '$', '\n']),
            suffix in "[A-Za-z0-9_-]{0,8}",
        ) {
            let tag = format!("{}{}{}", prefix, bad, suffix);
            prop_assert!(SnapshotTag::new(tag).is_err());
        }
    }
}
