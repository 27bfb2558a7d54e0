use rusqlite::types::Value as SqlValue;

use crate::query::SearchParams;

/// Compiled SQL query fragment with bound parameters.
pub(crate) struct CompiledSearch {
    pub where_clause: String,
    pub params: Vec<SqlValue>,
}

/// Translate search filters into a WHERE clause over the items table.
///
/// The limit is bound separately by the caller.
pub(crate) fn compile_search(q: &SearchParams) -> CompiledSearch {
    let mut params = Vec::new();
    let mut conditions = Vec::new();

    if let Some(ref text) = q.text {
        let pattern = like_pattern(text);
        conditions.push(
            "(resolved_title LIKE ? ESCAPE '\\' OR given_title LIKE ? ESCAPE '\\')".to_string(),
        );
        params.push(SqlValue::Text(pattern.clone()));
        params.push(SqlValue::Text(pattern));
    }

    for tag in &q.tags {
        conditions.push(
            "EXISTS (SELECT 1 FROM json_each(extra, '$.tags') WHERE json_each.value = ?)"
                .to_string(),
        );
        params.push(SqlValue::Text(tag.clone()));
    }

    if let Some(ref domain) = q.domain {
        let pattern = like_pattern(domain);
        conditions.push(
            "(json_extract(extra, '$.resolved_domain') LIKE ? ESCAPE '\\' \
             OR json_extract(extra, '$.given_domain') LIKE ? ESCAPE '\\')"
                .to_string(),
        );
        params.push(SqlValue::Text(pattern.clone()));
        params.push(SqlValue::Text(pattern));
    }

    if let Some(ref user) = q.user_id {
        conditions.push("user_id = ?".to_string());
        params.push(SqlValue::Text(user.clone()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    CompiledSearch {
        where_clause,
        params,
    }
}

/// `%text%` with LIKE wildcards in `text` escaped.
fn like_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
