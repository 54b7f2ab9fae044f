//! `NodeDocumentIdComparator`: orders composite ids by the node-document
//! path-depth encoding.
//!
//! Real node-document ids are prefixed by their path depth (`"<depth>:<path>"`)
//! so that a plain string sort also yields a depth-first, deterministic
//! total order without decoding every id. This comparator derives the same
//! ordering from the raw `"<doc-id>/<modified>"` composite id by counting
//! path separators in the doc-id portion before falling back to a
//! lexicographic tie-break. Ties are permitted (two composite ids differing
//! only in the sentinel-tagged timestamp still compare distinctly because
//! the suffix is part of the string), and the caller treats duplicates
//! idempotently, so no attempt is made to disambiguate further.

use std::cmp::Ordering;

/// Count of path separators, used as a cheap proxy for node depth.
fn path_depth(doc_id: &str) -> usize {
    doc_id.matches('/').count()
}

fn doc_id_part(composite: &str) -> &str {
    composite.rsplit_once('/').map_or(composite, |(doc_id, _)| doc_id)
}

/// Deterministic, total ordering over composite ids: shallower paths sort
/// first, then lexicographic order on the full composite string.
#[must_use]
pub fn compare_composite_ids(a: &str, b: &str) -> Ordering {
    let depth_a = path_depth(doc_id_part(a));
    let depth_b = path_depth(doc_id_part(b));
    depth_a.cmp(&depth_b).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shallower_paths_sort_first() {
        assert_eq!(
            compare_composite_ids("/a/100", "/a/b/c/100"),
            Ordering::Less
        );
    }

    #[test]
    fn equal_depth_falls_back_to_lexicographic() {
        assert_eq!(compare_composite_ids("/a/100", "/b/100"), Ordering::Less);
    }

    #[test]
    fn identical_ids_are_equal() {
        assert_eq!(compare_composite_ids("/a/100", "/a/100"), Ordering::Equal);
    }

    #[test]
    fn comparator_is_total_and_deterministic_over_a_sample() {
        let mut ids = vec![
            "/c/100".to_string(),
            "/a/b/200".to_string(),
            "/a/100".to_string(),
            "/a/b/c/300".to_string(),
        ];
        ids.sort_by(|a, b| compare_composite_ids(a, b));
        assert_eq!(
            ids,
            vec![
                "/a/100".to_string(),
                "/c/100".to_string(),
                "/a/b/200".to_string(),
                "/a/b/c/300".to_string(),
            ]
        );
    }
}
