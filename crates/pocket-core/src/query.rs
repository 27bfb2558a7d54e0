use serde::{Deserialize, Serialize};

/// Default page size for searches
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Filters for searching stored items. All set filters must match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Substring of either title
    pub text: Option<String>,
    /// Every tag listed must be on the item
    pub tags: Vec<String>,
    /// Substring of either derived domain
    pub domain: Option<String>,
    /// Restrict to one owner
    pub user_id: Option<String>,
    pub limit: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            text: None,
            tags: Vec::new(),
            domain: None,
            user_id: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl SearchParams {
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Split a comma separated tag list (`"rust,sqlite"`) into tag filters.
    pub fn tags_from_csv(mut self, csv: &str) -> Self {
        self.tags.extend(
            csv.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limit() {
        assert_eq!(SearchParams::default().limit, 20);
    }

    #[test]
    fn csv_tags_trimmed() {
        let params = SearchParams::default().tags_from_csv(" rust, sqlite ,,");
        assert_eq!(params.tags, vec!["rust", "sqlite"]);
    }
}
