//! Story listings
//!
//! The item type served by the story endpoints and the handful of canned
//! queries built on top of the generic listing.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use storypager_core::RequestFilters;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, alias = "description", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Some endpoints send a count, others the list of users who liked it.
    #[serde(default, deserialize_with = "count_or_list")]
    pub likes: u64,
    #[serde(default, alias = "chaptersCount")]
    pub chapter_count: u32,
    #[serde(default, alias = "createdAt", skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    /// Fields this type does not model, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Either a bare author id or a populated profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthorRef {
    Id(String),
    Profile {
        #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, alias = "username", skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl AuthorRef {
    pub fn id(&self) -> Option<&str> {
        match self {
            AuthorRef::Id(id) => Some(id),
            AuthorRef::Profile { id, .. } => id.as_deref(),
        }
    }

    /// Name when populated, otherwise the id.
    pub fn display_name(&self) -> &str {
        match self {
            AuthorRef::Id(id) => id,
            AuthorRef::Profile { name: Some(name), .. } => name,
            AuthorRef::Profile { id, .. } => id.as_deref().unwrap_or("unknown"),
        }
    }
}

fn count_or_list<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum CountOrList {
        Count(u64),
        List(Vec<Value>),
        Missing(()),
    }

    Ok(match CountOrList::deserialize(deserializer)? {
        CountOrList::Count(n) => n,
        CountOrList::List(list) => list.len() as u64,
        CountOrList::Missing(()) => 0,
    })
}

/// Canned story listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryQuery {
    All,
    ByAuthor(String),
    InCategory(String),
    Search(String),
    /// The signed-in user's own stories. Answers 401 without a token.
    Mine,
}

impl StoryQuery {
    pub fn all() -> Self {
        StoryQuery::All
    }

    pub fn by_author(author_id: impl Into<String>) -> Self {
        StoryQuery::ByAuthor(author_id.into())
    }

    pub fn in_category(category: impl Into<String>) -> Self {
        StoryQuery::InCategory(category.into())
    }

    pub fn search(text: impl Into<String>) -> Self {
        StoryQuery::Search(text.into())
    }

    pub fn mine() -> Self {
        StoryQuery::Mine
    }

    /// Listing endpoint for this query under the stories base URL.
    pub fn endpoint(&self, base: &str) -> String {
        let base = base.trim_end_matches('/');
        match self {
            StoryQuery::Mine => format!("{}/mine", base),
            _ => base.to_string(),
        }
    }

    /// Query filters, layered over `base`.
    pub fn filters(&self, base: &RequestFilters) -> RequestFilters {
        let filters = base.clone();
        match self {
            StoryQuery::All | StoryQuery::Mine => filters,
            StoryQuery::ByAuthor(id) => filters.with("author", id.as_str()),
            StoryQuery::InCategory(category) => filters.with("category", category.as_str()),
            StoryQuery::Search(text) => filters.with("q", text.as_str()),
        }
    }

    pub fn requires_auth(&self) -> bool {
        matches!(self, StoryQuery::Mine)
    }
}
