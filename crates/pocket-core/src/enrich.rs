//! Derivation of query-friendly fields from raw records.

use pocket_client::RawRecord;
use url::Url;

use crate::item::{Extra, Item};

/// Turn a raw record into a storable item, recomputing `extra` and stamping
/// the owner when one is given.
pub fn enrich(record: RawRecord, user_id: Option<&str>) -> Item {
    let extra = Extra {
        tags: record
            .has_tags()
            .then(|| record.tag_names().map(str::to_string).collect()),
        given_domain: record.given_url.as_deref().and_then(domain_of),
        resolved_domain: record.resolved_url.as_deref().and_then(domain_of),
    };

    Item {
        item_id: record.item_id,
        user_id: user_id.map(str::to_string),
        given_url: record.given_url,
        resolved_url: record.resolved_url,
        given_title: record.given_title,
        resolved_title: record.resolved_title,
        tags: record.tags,
        extra,
        payload: record.rest,
    }
}

pub fn enrich_all(records: Vec<RawRecord>, user_id: Option<&str>) -> Vec<Item> {
    records.into_iter().map(|r| enrich(r, user_id)).collect()
}

/// Host component of `url`, or `None` when it is blank, unparsable or hostless.
pub fn domain_of(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    Url::parse(url)
        .ok()?
        .host_str()
        .filter(|h| !h.is_empty())
        .map(str::to_string)
}
