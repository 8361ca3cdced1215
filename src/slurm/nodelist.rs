//! Expansion of Slurm compact node-list notation.
//!
//! Supported forms:
//! - `node1,node2` comma separated literals
//! - `node[01-03,07]` a prefix followed by bracketed ranges
//! - `spdr50` a single literal name
//! - `(null)`, `(Resources)` and empty text, which name no node

use regex::Regex;
use std::sync::LazyLock;

static RANGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)\[([0-9,\-]+)\]").expect("valid node range regex"));

/// Largest number of names a single node list may expand to
pub const MAX_EXPANDED_NODES: usize = 65_536;

/// Expand node-list text into an ordered list of node names.
///
/// Never fails; unparseable input expands to an empty list. A bracketed list
/// naming more than [`MAX_EXPANDED_NODES`] nodes counts as unparseable.
pub fn expand(nodelist: &str) -> Vec<String> {
    if nodelist.contains(',') && !nodelist.contains('[') {
        return nodelist.split(',').map(|n| n.trim().to_string()).collect();
    }

    if let Some(captures) = RANGE_PATTERN.captures(nodelist) {
        let prefix = &captures[1];
        let mut nodes = Vec::new();
        for part in captures[2].split(',') {
            if !expand_part(prefix, part, &mut nodes) {
                return Vec::new();
            }
        }
        return nodes;
    }

    if !nodelist.is_empty() && !nodelist.starts_with('(') {
        return vec![nodelist.to_string()];
    }

    Vec::new()
}

/// Expand one `N` or `N-M` sub-range, padding to the width of `N`.
///
/// Malformed parts are skipped. Returns false once the list would grow past
/// [`MAX_EXPANDED_NODES`].
fn expand_part(prefix: &str, part: &str, nodes: &mut Vec<String>) -> bool {
    if part.is_empty() {
        return true;
    }

    let Some((start, end)) = part.split_once('-') else {
        if nodes.len() >= MAX_EXPANDED_NODES {
            return false;
        }
        nodes.push(format!("{}{}", prefix, part));
        return true;
    };

    let width = start.len();
    let (Ok(first), Ok(last)) = (start.parse::<u64>(), end.parse::<u64>()) else {
        return true;
    };
    if last < first {
        return true;
    }

    let remaining = (MAX_EXPANDED_NODES - nodes.len()) as u64;
    if last - first >= remaining {
        return false;
    }
    for index in first..=last {
        nodes.push(format!("{}{:0width$}", prefix, index, width = width));
    }
    true
}

/// Join node names into the comma form accepted by `scontrol show node`
pub fn compact(nodes: &[String]) -> String {
    nodes.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[rstest]
    #[case("node[01-03]", &["node01", "node02", "node03"])]
    #[case("node1,node2", &["node1", "node2"])]
    #[case("node1, node2 ,node3", &["node1", "node2", "node3"])]
    #[case("(null)", &[])]
    #[case("(Resources)", &[])]
    #[case("", &[])]
    #[case("spdr50", &["spdr50"])]
    #[case("spdr[01-02,50-51]", &["spdr01", "spdr02", "spdr50", "spdr51"])]
    #[case("node[1-3]", &["node1", "node2", "node3"])]
    #[case("node[7]", &["node7"])]
    #[case("node[01,05]", &["node01", "node05"])]
    #[case("node[08-11]", &["node08", "node09", "node10", "node11"])]
    fn test_expand(#[case] input: &str, #[case] expected: &[&str]) {
        assert_eq!(expand(input), names(expected));
    }

    #[test]
    fn test_padding_uses_first_bound_width() {
        // width of "9" is 1, so 10 and 11 are not padded further
        assert_eq!(expand("gpu[9-11]"), names(&["gpu9", "gpu10", "gpu11"]));
        assert_eq!(expand("gpu[009-011]"), names(&["gpu009", "gpu010", "gpu011"]));
    }

    #[test]
    fn test_descending_range_is_empty() {
        assert!(expand("node[05-01]").is_empty());
    }

    #[test]
    fn test_malformed_ranges_do_not_panic() {
        assert!(expand("node[1-2-3]").is_empty());
        assert!(expand("node[-]").is_empty());
        assert_eq!(expand("node[1,,2]"), names(&["node1", "node2"]));
        // bracket without a valid range falls back to a literal name
        assert_eq!(expand("node[a-b]"), names(&["node[a-b]"]));
    }

    #[rstest]
    #[case("node[0-99999999999]")]
    #[case("node[0-18446744073709551615]")]
    #[case("node[1-65537]")]
    #[case("node[1-40000,50001-90000]")]
    #[case("node[1-65536,99999]")]
    fn test_oversized_ranges_are_unparseable(#[case] input: &str) {
        assert!(expand(input).is_empty());
    }

    #[test]
    fn test_range_at_limit_expands() {
        let nodes = expand("node[1-65536]");
        assert_eq!(nodes.len(), MAX_EXPANDED_NODES);
        assert_eq!(nodes[0], "node1");
        assert_eq!(nodes[MAX_EXPANDED_NODES - 1], "node65536");
    }

    #[test]
    fn test_compact() {
        assert_eq!(compact(&names(&["a1", "a2"])), "a1,a2");
    }
}
