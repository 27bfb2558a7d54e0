//! Tag taxonomy extraction.

use std::collections::HashSet;

use pocket_client::RawRecord;

use crate::item::Tag;

/// Collect the distinct tag names used across `records`.
///
/// Untagged records are skipped; names keep the order of their first
/// appearance (record order, then the service's tag order within a record).
pub fn parse_tags(records: &[RawRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| r.has_tags())
        .flat_map(RawRecord::tag_names)
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}

/// Attach an owner to extracted names, producing store records.
pub fn owned_tags(names: Vec<String>, user_id: Option<&str>) -> Vec<Tag> {
    names.into_iter().map(|name| Tag::new(name, user_id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tagged(id: &str, tags: &[&str]) -> RawRecord {
        tags.iter()
            .fold(RawRecord::new(id), |record, tag| record.with_tag(*tag))
    }

    #[test]
    fn duplicates_collapse_first_seen_wins() {
        let records = vec![
            tagged("1", &["rust", "releases"]),
            RawRecord::new("2"),
            tagged("3", &["databases", "rust"]),
        ];
        assert_eq!(parse_tags(&records), vec!["rust", "releases", "databases"]);
    }

    #[test]
    fn no_records_no_tags() {
        assert!(parse_tags(&[]).is_empty());
        assert!(parse_tags(&[RawRecord::new("1")]).is_empty());
    }

    #[test]
    fn owner_applied_to_every_tag() {
        let tags = owned_tags(vec!["a".into(), "b".into()], Some("u1"));
        assert!(tags.iter().all(|t| t.user_id.as_deref() == Some("u1")));
        assert_eq!(tags[0].tag, "a");
    }

    fn arb_records() -> impl Strategy<Value = Vec<RawRecord>> {
        prop::collection::vec(
            prop::collection::vec("[a-e]{1,2}", 0..4),
            0..8,
        )
        .prop_map(|batches| {
            batches
                .iter()
                .enumerate()
                .map(|(i, names)| {
                    names
                        .iter()
                        .fold(RawRecord::new(i.to_string()), |r, n| r.with_tag(n.as_str()))
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn parse_is_stable_across_calls(records in arb_records()) {
            prop_assert_eq!(parse_tags(&records), parse_tags(&records));
        }

        #[test]
        fn parse_yields_each_name_once(records in arb_records()) {
            let tags = parse_tags(&records);
            let unique: HashSet<_> = tags.iter().collect();
            prop_assert_eq!(unique.len(), tags.len());

            let all: HashSet<&str> = records.iter().flat_map(RawRecord::tag_names).collect();
            prop_assert_eq!(all.len(), tags.len());
        }
    }
}
