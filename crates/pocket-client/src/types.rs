//! Wire types for the retrieval API

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Environment variable holding the application's consumer key
pub const CONSUMER_KEY_VAR: &str = "POCKET_CONSUMER_KEY";

/// Environment variable holding the user's access token
pub const ACCESS_TOKEN_VAR: &str = "POCKET_ACCESS_TOKEN";

/// Consumer key + access token pair sent with every request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub consumer_key: String,
    pub access_token: String,
}

impl Credentials {
    pub fn new(consumer_key: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            access_token: access_token.into(),
        }
    }

    /// Pick the credentials out of a set of environment pairs.
    ///
    /// Takes the pairs explicitly so callers decide where they come from
    /// (`std::env::vars()` in the binary, literals in tests). Missing variables
    /// leave the field empty; `is_complete` reports whether both are set.
    pub fn from_env_map<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut creds = Credentials::default();
        for (key, value) in vars {
            match key.as_ref() {
                CONSUMER_KEY_VAR => creds.consumer_key = value.into(),
                ACCESS_TOKEN_VAR => creds.access_token = value.into(),
                _ => {}
            }
        }
        creds
    }

    pub fn is_complete(&self) -> bool {
        !self.consumer_key.trim().is_empty() && !self.access_token.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &redact(&self.consumer_key))
            .field("access_token", &redact(&self.access_token))
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

/// Which slice of the user's list to retrieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchWindow {
    /// Up to `count` records, newest first
    Newest { count: u32 },
    /// Every record modified after the given unix timestamp (seconds)
    Since(i64),
}

/// A bookmark record as returned by the service.
///
/// The named fields are the ones the sync engine reads; everything else the
/// service sends is kept in `rest` and persisted untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub item_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_title: Option<String>,

    /// Tag name -> service metadata, in the order the service sent them
    #[serde(
        default,
        deserialize_with = "deserialize_tags",
        skip_serializing_if = "Option::is_none"
    )]
    pub tags: Option<Map<String, Value>>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl RawRecord {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            given_url: None,
            resolved_url: None,
            given_title: None,
            resolved_title: None,
            tags: None,
            rest: Map::new(),
        }
    }

    pub fn with_given_url(mut self, url: impl Into<String>) -> Self {
        self.given_url = Some(url.into());
        self
    }

    pub fn with_resolved_url(mut self, url: impl Into<String>) -> Self {
        self.resolved_url = Some(url.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        self.given_title = Some(title.clone());
        self.resolved_title = Some(title);
        self
    }

    /// Attach a tag the way the service shapes it (`{"item_id", "tag"}`).
    pub fn with_tag(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        let mut meta = Map::new();
        meta.insert("item_id".into(), Value::String(self.item_id.clone()));
        meta.insert("tag".into(), Value::String(name.clone()));
        self.tags
            .get_or_insert_with(Map::new)
            .insert(name, Value::Object(meta));
        self
    }

    /// Tag names in service order; empty when the record is untagged.
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.tags
            .iter()
            .flat_map(|tags| tags.keys().map(String::as_str))
    }

    pub fn has_tags(&self) -> bool {
        self.tags.as_ref().is_some_and(|t| !t.is_empty())
    }
}

/// Ids arrive as strings, but older payloads sometimes carry bare integers.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Text(String),
        Number(u64),
    }

    Ok(match IdRepr::deserialize(deserializer)? {
        IdRepr::Text(s) => s,
        IdRepr::Number(n) => n.to_string(),
    })
}

/// The service sends `{}` / `[]` / nothing for untagged records; collapse all of
/// them to `None`.
fn deserialize_tags<'de, D>(deserializer: D) -> Result<Option<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Object(map)) if !map.is_empty() => Some(map),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn credentials_from_env_pairs() {
        let creds = Credentials::from_env_map([
            ("HOME", "/root"),
            (CONSUMER_KEY_VAR, "1234-abcd"),
            (ACCESS_TOKEN_VAR, "token"),
        ]);
        assert_eq!(creds, Credentials::new("1234-abcd", "token"));
        assert!(creds.is_complete());
    }

    #[test]
    fn credentials_incomplete_when_blank() {
        let creds = Credentials::from_env_map([(CONSUMER_KEY_VAR, "1234"), (ACCESS_TOKEN_VAR, "  ")]);
        assert!(!creds.is_complete());
    }

    #[test]
    fn credentials_debug_hides_secrets() {
        let rendered = format!("{:?}", Credentials::new("secret-key", "secret-token"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn record_keeps_unknown_fields() {
        let record: RawRecord = serde_json::from_value(json!({
            "item_id": "229279689",
            "given_url": "http://www.grantland.com/blog/the-triangle/post/_/id/38347/ryder-cup-preview",
            "given_title": "The Massive Ryder Cup Preview",
            "excerpt": "The list of things I love about the Ryder Cup is so long",
            "word_count": "3197"
        }))
        .unwrap();

        assert_eq!(record.item_id, "229279689");
        assert_eq!(record.resolved_url, None);
        assert_eq!(record.rest.get("word_count"), Some(&json!("3197")));
        assert!(!record.has_tags());
    }

    #[test]
    fn numeric_item_id_accepted() {
        let record: RawRecord = serde_json::from_value(json!({ "item_id": 42 })).unwrap();
        assert_eq!(record.item_id, "42");
    }

    #[test]
    fn empty_tag_shapes_collapse_to_none() {
        for tags in [json!({}), json!([]), Value::Null] {
            let record: RawRecord =
                serde_json::from_value(json!({ "item_id": "1", "tags": tags })).unwrap();
            assert_eq!(record.tags, None);
        }
    }

    #[test]
    fn tag_names_follow_service_order() {
        let record: RawRecord = serde_json::from_value(json!({
            "item_id": "1",
            "tags": {
                "zeta": { "item_id": "1", "tag": "zeta" },
                "alpha": { "item_id": "1", "tag": "alpha" }
            }
        }))
        .unwrap();
        let names: Vec<&str> = record.tag_names().collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn builder_tags_match_service_shape() {
        let record = RawRecord::new("7").with_tag("rust");
        let meta = &record.tags.as_ref().unwrap()["rust"];
        assert_eq!(meta, &json!({ "item_id": "7", "tag": "rust" }));
    }
}
