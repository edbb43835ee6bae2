// src/domain/bookmark.rs
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::tag::Tag;
use chrono::{DateTime, Utc};
use derive_builder::Builder;
use serde::{Serialize, Serializer};
use std::fmt;

/// Represents a bookmark domain entity
#[derive(Builder, Clone, PartialEq, Serialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct Bookmark {
    #[builder(default)]
    pub id: Option<i32>,
    pub url: String,
    #[builder(default)]
    pub title: String,
    #[builder(default)]
    #[serde(rename = "desc")]
    pub description: String,
    #[builder(default)]
    #[serde(serialize_with = "serialize_tags")]
    pub tags: Vec<Tag>,
    #[builder(default = "Utc::now()")]
    pub created_at: DateTime<Utc>,
    #[builder(default = "Utc::now()")]
    pub updated_at: DateTime<Utc>,
    #[builder(default = "Utc::now()")]
    pub last_visit: DateTime<Utc>,
    #[builder(default)]
    pub visit_count: i32,
    #[builder(default)]
    pub favorite: bool,
}

impl BookmarkBuilder {
    fn validate(&self) -> Result<(), String> {
        match &self.url {
            Some(url) if normalize_url(url).is_empty() => Err("URL cannot be empty".to_string()),
            _ => Ok(()),
        }
    }
}

fn serialize_tags<S: Serializer>(tags: &[Tag], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&Tag::format_tags(tags))
}

/// Trim blanks and trailing slashes from a URL.
pub fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Methods for the Bookmark entity
///
/// new: validated, timestamps set to now
/// from_storage: converts from the storage representation
impl Bookmark {
    pub fn new<S: AsRef<str>>(url: S, title: S, description: S, tags: S) -> DomainResult<Self> {
        let url = normalize_url(url.as_ref());
        if url.is_empty() {
            return Err(DomainError::InvalidBookmark("URL cannot be empty".to_string()));
        }
        let now = Utc::now();

        Ok(Self {
            id: None,
            url,
            title: title.as_ref().trim().to_string(),
            description: description.as_ref().trim().to_string(),
            tags: Tag::parse_tags(tags)?,
            created_at: now,
            updated_at: now,
            last_visit: now,
            visit_count: 0,
            favorite: false,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_storage(
        id: i32,
        url: String,
        title: String,
        description: String,
        tag_string: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        last_visit: DateTime<Utc>,
        visit_count: i32,
        favorite: bool,
    ) -> DomainResult<Self> {
        let tags = Tag::parse_tags(tag_string)?;

        Ok(Self {
            id: Some(id),
            url,
            title,
            description,
            tags,
            created_at,
            updated_at,
            last_visit,
            visit_count,
            favorite,
        })
    }

    /// A bookmark needs a non-empty URL.
    pub fn is_valid(&self) -> bool {
        !self.url.trim().is_empty()
    }

    /// Set all tags at once (replacing existing tags)
    pub fn set_tags(&mut self, tags: Vec<Tag>) {
        self.tags = tags;
        self.updated_at = Utc::now();
    }

    /// Update bookmark information
    pub fn update(&mut self, title: String, description: String) {
        self.title = title;
        self.description = description;
        self.updated_at = Utc::now();
    }

    /// Tag string in storage form: `"a,b,"`, or `"notag,"`
    pub fn formatted_tags(&self) -> String {
        Tag::format_tags(&self.tags)
    }

    /// Set the ID (typically used after storage)
    pub fn set_id(&mut self, id: i32) {
        self.id = Some(id);
    }

    /// Compare the user editable content, ignoring id and timestamps.
    pub fn same_content(&self, other: &Bookmark) -> bool {
        self.url == other.url
            && self.title == other.title
            && self.description == other.description
            && self.formatted_tags() == other.formatted_tags()
    }
}

impl fmt::Display for Bookmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.id.map_or("New".to_string(), |id| id.to_string()),
            self.title,
            self.url,
            self.formatted_tags()
        )
    }
}

impl fmt::Debug for Bookmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bookmark")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("title", &self.title)
            .field("description", &self.description)
            .field("tags", &self.formatted_tags())
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("last_visit", &self.last_visit)
            .field("visit_count", &self.visit_count)
            .field("favorite", &self.favorite)
            .finish()
    }
}
