// src/domain/tag.rs
use std::fmt;

use crate::domain::error::{DomainError, DomainResult};

/// Tag stored for bookmarks added without any tag.
pub const NO_TAG: &str = "notag";

/// Represents a single tag as a value object.
///
/// Tags are case-sensitive: `Rust` and `rust` are different tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    value: String,
}

impl Tag {
    /// Creates a new Tag with validation
    pub fn new<S: AsRef<str>>(value: S) -> DomainResult<Self> {
        let value = value.as_ref().trim();

        if value.is_empty() {
            return Err(DomainError::InvalidTag("Tag cannot be empty".to_string()));
        }

        if value.contains(',') || value.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidTag(format!(
                "Tag cannot contain commas or spaces: '{}'",
                value
            )));
        }

        Ok(Self {
            value: value.to_string(),
        })
    }

    /// Get the tag value
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Parse a tag string separated by commas and/or blanks.
    ///
    /// Order of first appearance is kept, duplicates are dropped.
    pub fn parse_tags<S: AsRef<str>>(tag_str: S) -> DomainResult<Vec<Tag>> {
        let mut result: Vec<Tag> = Vec::new();

        for tag_value in tag_str
            .as_ref()
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
        {
            let tag = Tag::new(tag_value)?;
            if !result.contains(&tag) {
                result.push(tag);
            }
        }

        Ok(result)
    }

    /// Format tags as `"a,b,"`; no tags yields `"notag,"`.
    pub fn format_tags(tags: &[Tag]) -> String {
        if tags.is_empty() {
            return format!("{},", NO_TAG);
        }

        let mut out = String::new();
        for tag in tags {
            out.push_str(&tag.value);
            out.push(',');
        }
        out
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_valid_tag_value_when_create_tag_then_returns_tag() {
        let tag = Tag::new("test").unwrap();
        assert_eq!(tag.value(), "test");

        // case is preserved
        let tag = Tag::new("TEST").unwrap();
        assert_eq!(tag.value(), "TEST");

        let tag = Tag::new(" test ").unwrap();
        assert_eq!(tag.value(), "test");
    }

    #[test]
    fn given_invalid_tag_value_when_create_tag_then_returns_error() {
        assert!(Tag::new("").is_err());
        assert!(Tag::new("   ").is_err());
        assert!(Tag::new("test,tag").is_err());
        assert!(Tag::new("test tag").is_err());
    }

    #[test]
    fn given_tag_string_when_parse_tags_then_keeps_order_and_drops_duplicates() {
        let tags = Tag::parse_tags("go, cli,,go rust").unwrap();
        let values: Vec<&str> = tags.iter().map(Tag::value).collect();
        assert_eq!(values, vec!["go", "cli", "rust"]);
    }

    #[test]
    fn given_tags_when_format_then_trailing_comma() {
        let tags = Tag::parse_tags("go,cli").unwrap();
        assert_eq!(Tag::format_tags(&tags), "go,cli,");
    }

    #[test]
    fn given_no_tags_when_format_then_sentinel() {
        assert_eq!(Tag::format_tags(&[]), "notag,");
        let blank = Tag::parse_tags(" , ").unwrap();
        assert_eq!(Tag::format_tags(&blank), "notag,");
    }

    #[test]
    fn given_formatted_string_when_parsed_again_then_unchanged() {
        let once = Tag::format_tags(&Tag::parse_tags("a b,c").unwrap());
        assert_eq!(once, "a,b,c,");
        assert_eq!(Tag::format_tags(&Tag::parse_tags(&once).unwrap()), once);
    }
}
