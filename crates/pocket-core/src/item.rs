use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Derived, query-friendly fields. Recomputed on every enrichment; never read
/// back from storage as a source of truth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extra {
    /// Tag names in service order; `None` when the record has no tags
    pub tags: Option<Vec<String>>,
    pub given_domain: Option<String>,
    pub resolved_domain: Option<String>,
}

/// A bookmark record as persisted in the items store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Service-assigned id; the items store's dedup key
    pub item_id: String,

    /// Owning user, only set in multi-tenant mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    pub given_url: Option<String>,
    pub resolved_url: Option<String>,
    pub given_title: Option<String>,
    pub resolved_title: Option<String>,

    /// Tag metadata exactly as the service sent it
    pub tags: Option<Map<String, Value>>,

    pub extra: Extra,

    /// Every other field the service sent, kept verbatim
    #[serde(default)]
    pub payload: Map<String, Value>,
}

/// A taxonomy entry. `(tag, user_id)` is unique within the tags store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Tag {
    pub fn new(tag: impl Into<String>, user_id: Option<&str>) -> Self {
        Self {
            tag: tag.into(),
            user_id: user_id.map(str::to_string),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.user_id {
            Some(user) => write!(f, "{} ({})", self.tag, user),
            None => f.write_str(&self.tag),
        }
    }
}
