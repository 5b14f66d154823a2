//! Tag labels attached to tool descriptors.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAX_TAG_LEN: usize = 64;

/// Category label used for grouping tools and gating access.
///
/// Tags are lowercase and ordered lexically so that sets of tags have a stable
/// iteration order; the order carries no meaning.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag(String);

impl Tag {
    /// Creates a tag after validating its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTag`] if the label is empty, too long, or contains
    /// characters other than lowercase alphanumerics, dash, underscore, colon,
    /// or dot.
    pub fn new(tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        validate_tag(&tag)?;
        Ok(Self(tag))
    }

    /// Returns the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Tag {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Tag> for String {
    fn from(value: Tag) -> Self {
        value.0
    }
}

fn validate_tag(tag: &str) -> Result<()> {
    if tag.is_empty() {
        return Err(Error::InvalidTag {
            tag: String::new(),
            reason: "tag cannot be empty".into(),
        });
    }

    if tag.len() > MAX_TAG_LEN {
        return Err(Error::InvalidTag {
            tag: tag.into(),
            reason: format!("tag length must be <= {MAX_TAG_LEN}"),
        });
    }

    if !tag
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-' | '_' | '.' | ':'))
    {
        return Err(Error::InvalidTag {
            tag: tag.into(),
            reason: "tag must contain lowercase alphanumeric, dash, underscore, colon, or dot"
                .into(),
        });
    }

    Ok(())
}
