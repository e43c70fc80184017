//! # Substitution Engine
//!
//! Given a block's raw data and its name, produces the "combined data"
//! string with every valid reference token replaced by the referenced
//! block's current result, and reports which references were valid,
//! unresolved, or circular.
//!
//! Policy, precise and load-bearing:
//! - A reference to a non-existent name is left unreplaced and reported
//!   as unresolved.
//! - A reference whose target has no usable result yet (never computed,
//!   errored, or an image payload with no textual form) is left
//!   unreplaced and reported as unresolved.
//! - A self-reference or direct circular pair (producer and consumer
//!   mutually reference each other) is skipped to prevent infinite
//!   propagation loops; longer cycles are the scheduler's topological
//!   sort's problem, not ours.
//! - Resolving a reference to an existing block eagerly adds the
//!   producer -> consumer edge to the graph, BEFORE the circular check.
//!   Graph maintenance is interleaved with substitution by design, and
//!   is NOT transactional with batch scheduling: a later batch abort
//!   does not undo edges added here.

use crate::graph::DependencyGraph;
use crate::reference::extract_references;
use crate::store::BlockStore;

/// One resolved reference: the name and the producer's current result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencedResult {
    pub name: String,
    pub result: String,
}

/// Outcome of resolving one block's references.
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    /// Whether any reference token was found, independent of validity.
    pub has_references: bool,
    /// Every reference that resolved to an existing, non-circular block
    /// with a usable result, in occurrence order.
    pub referenced_results: Vec<ReferencedResult>,
    /// `data` with every valid reference token replaced.
    pub combined_data: String,
    /// Names that did not resolve, or resolved to a block without a
    /// usable result. Left literal in `combined_data`.
    pub unresolved: Vec<String>,
    /// Names skipped because of a self-reference or direct mutual pair.
    pub circular: Vec<String>,
}

/// Resolve every reference in `data`, producing the combined data for
/// the block named `consumer_name`.
///
/// Side effect: each reference to an existing block inserts the
/// producer -> consumer edge into `graph` if absent.
pub fn resolve_references(
    store: &BlockStore,
    graph: &mut DependencyGraph,
    data: &str,
    consumer_name: &str,
) -> Substitution {
    let names = extract_references(data);

    let mut sub = Substitution {
        has_references: !names.is_empty(),
        combined_data: data.to_string(),
        ..Substitution::default()
    };

    if names.is_empty() {
        return sub;
    }

    let consumer_id = store.find_by_name(consumer_name).map(|b| b.id);

    for name in names {
        let Some(producer) = store.find_by_name(&name) else {
            sub.unresolved.push(name);
            continue;
        };

        // The referenced block exists and is used by this block:
        // maintain the reverse graph eagerly, even when the reference
        // ends up skipped below.
        if let Some(consumer_id) = consumer_id {
            graph.add_edge(producer.id, consumer_id);

            let is_self_reference = producer.id == consumer_id;
            let is_direct_circular = graph.has_edge(producer.id, consumer_id)
                && graph.has_edge(consumer_id, producer.id);

            if is_self_reference || is_direct_circular {
                sub.circular.push(name);
                continue;
            }
        }

        let Some(result) = producer.usable_result() else {
            sub.unresolved.push(name);
            continue;
        };

        sub.combined_data = replace_reference(&sub.combined_data, &name, result);
        sub.referenced_results.push(ReferencedResult {
            name,
            result: result.to_string(),
        });
    }

    sub
}

/// Whether a name is safe to substitute literally.
///
/// Names outside this class (possible with bracket tokens, which accept
/// arbitrary characters) are resolved but never substituted.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || matches!(c, '_' | '-' | '.'))
}

/// Replace every occurrence of the bracket and bare token forms of
/// `name` in `data` with `result`.
fn replace_reference(data: &str, name: &str, result: &str) -> String {
    if !is_plain_name(name) {
        return data.to_string();
    }

    // Bracket tokens match the name literally.
    let bracket_token = format!("[{name}]");
    let mut replaced = data.replace(&bracket_token, result);

    // Bare tokens only exist for whitespace-free names, and only match
    // with a trailing word boundary: `#ab` must not match inside `#abc`.
    if !name.chars().any(char::is_whitespace) {
        replaced = replace_bare_token(&replaced, name, result);
    }

    replaced
}

/// Replace `#name` occurrences whose next character is not a word
/// character (ASCII alphanumeric or underscore).
fn replace_bare_token(data: &str, name: &str, result: &str) -> String {
    let token = format!("#{name}");
    let mut out = String::with_capacity(data.len());
    let mut rest = data;

    while let Some(pos) = rest.find(&token) {
        let after = pos + token.len();
        let boundary = match rest[after..].chars().next() {
            Some(c) => !(c.is_ascii_alphanumeric() || c == '_'),
            None => true,
        };

        if boundary {
            out.push_str(&rest[..pos]);
            out.push_str(result);
            rest = &rest[after..];
        } else {
            // Not a token boundary; keep the text and move past the '#'.
            out.push_str(&rest[..pos + 1]);
            rest = &rest[pos + 1..];
        }
    }

    out.push_str(rest);
    out
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::types::{BlockId, BlockKind, TransformResult};

    fn store_with(blocks: &[(&str, Option<&str>)]) -> BlockStore {
        let mut store = BlockStore::new();
        for (name, result) in blocks {
            let id = store.create(BlockKind::Text, Some((*name).to_string()));
            if let (Some(r), Some(block)) = (result, store.get_mut(id)) {
                block.result = Some(TransformResult::Text((*r).to_string()));
            }
        }
        store
    }

    #[test]
    fn no_references_is_identity() {
        let store = store_with(&[]);
        let mut graph = DependencyGraph::new();
        let sub = resolve_references(&store, &mut graph, "plain text", "me");

        assert!(!sub.has_references);
        assert_eq!(sub.combined_data, "plain text");
        assert!(sub.referenced_results.is_empty());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn valid_reference_substituted_and_edge_added() {
        let store = store_with(&[("A", Some("HELLO")), ("B", None)]);
        let mut graph = DependencyGraph::new();

        let sub = resolve_references(&store, &mut graph, "#A world", "B");

        assert!(sub.has_references);
        assert_eq!(sub.combined_data, "HELLO world");
        assert_eq!(sub.referenced_results.len(), 1);
        assert_eq!(sub.referenced_results[0].name, "A");

        let a = store.find_by_name("A").expect("A").id;
        let b = store.find_by_name("B").expect("B").id;
        assert!(graph.has_edge(a, b));
    }

    #[test]
    fn bracket_reference_substituted() {
        let store = store_with(&[("my block", Some("out")), ("B", None)]);
        let mut graph = DependencyGraph::new();

        let sub = resolve_references(&store, &mut graph, "use [my block] here", "B");
        assert_eq!(sub.combined_data, "use out here");
    }

    #[test]
    fn unknown_name_left_literal() {
        let store = store_with(&[("B", None)]);
        let mut graph = DependencyGraph::new();

        let sub = resolve_references(&store, &mut graph, "#ghost data", "B");
        assert_eq!(sub.combined_data, "#ghost data");
        assert_eq!(sub.unresolved, vec!["ghost"]);
        assert!(sub.referenced_results.is_empty());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn reference_without_result_left_literal() {
        let store = store_with(&[("A", None), ("B", None)]);
        let mut graph = DependencyGraph::new();

        let sub = resolve_references(&store, &mut graph, "#A world", "B");
        assert_eq!(sub.combined_data, "#A world");
        assert_eq!(sub.unresolved, vec!["A"]);

        // The edge is added anyway: graph maintenance is eager.
        let a = store.find_by_name("A").expect("A").id;
        let b = store.find_by_name("B").expect("B").id;
        assert!(graph.has_edge(a, b));
    }

    #[test]
    fn errored_producer_excluded() {
        let mut store = store_with(&[("A", Some("stale")), ("B", None)]);
        let a = store.find_by_name("A").expect("A").id;
        if let Some(block) = store.get_mut(a) {
            block.errored = true;
        }
        let mut graph = DependencyGraph::new();

        let sub = resolve_references(&store, &mut graph, "#A world", "B");
        assert_eq!(sub.combined_data, "#A world");
        assert_eq!(sub.unresolved, vec!["A"]);
    }

    #[test]
    fn self_reference_never_resolves() {
        let store = store_with(&[("C", Some("loop"))]);
        let mut graph = DependencyGraph::new();

        let sub = resolve_references(&store, &mut graph, "#C", "C");
        assert_eq!(sub.combined_data, "#C");
        assert_eq!(sub.circular, vec!["C"]);
        assert!(sub.referenced_results.is_empty());

        // The self-loop edge is still recorded.
        let c = store.find_by_name("C").expect("C").id;
        assert!(graph.has_edge(c, c));
    }

    #[test]
    fn mutual_pair_never_resolves_either_direction() {
        let store = store_with(&[("X", Some("rx")), ("Y", Some("ry"))]);
        let x = store.find_by_name("X").expect("X").id;
        let y = store.find_by_name("Y").expect("Y").id;
        let mut graph = DependencyGraph::new();

        // X references Y first: no mutual edge yet, resolves fine.
        let sub_x = resolve_references(&store, &mut graph, "#Y", "X");
        assert_eq!(sub_x.combined_data, "ry");

        // Y references X: edge X -> Y now exists, so this is mutual.
        let sub_y = resolve_references(&store, &mut graph, "#X", "Y");
        assert_eq!(sub_y.combined_data, "#X");
        assert_eq!(sub_y.circular, vec!["X"]);
        assert!(graph.has_edge(x, y));
        assert!(graph.has_edge(y, x));

        // And once both edges exist, X's reference stops resolving too.
        let sub_x2 = resolve_references(&store, &mut graph, "#Y", "X");
        assert_eq!(sub_x2.combined_data, "#Y");
        assert_eq!(sub_x2.circular, vec!["Y"]);
    }

    #[test]
    fn chain_of_three_resolves() {
        let store = store_with(&[("A", Some("ra")), ("B", Some("rb")), ("C", None)]);
        let mut graph = DependencyGraph::new();

        let sub_b = resolve_references(&store, &mut graph, "#A", "B");
        assert_eq!(sub_b.combined_data, "ra");

        let sub_c = resolve_references(&store, &mut graph, "#B", "C");
        assert_eq!(sub_c.combined_data, "rb");
    }

    #[test]
    fn bare_token_respects_word_boundary() {
        let store = store_with(&[("ab", Some("R")), ("B", None)]);
        let mut graph = DependencyGraph::new();

        let sub = resolve_references(&store, &mut graph, "#ab. #abc #ab", "B");
        // "#abc" extracts the name "abc" (no such block); only exact
        // "#ab" occurrences with a boundary are replaced.
        assert_eq!(sub.combined_data, "R. #abc R");
    }

    #[test]
    fn duplicate_references_all_replaced() {
        let store = store_with(&[("A", Some("x")), ("B", None)]);
        let mut graph = DependencyGraph::new();

        let sub = resolve_references(&store, &mut graph, "#A and #A", "B");
        assert_eq!(sub.combined_data, "x and x");
        // One entry per occurrence, duplicates preserved.
        assert_eq!(sub.referenced_results.len(), 2);
    }

    #[test]
    fn image_result_not_substituted() {
        let mut store = BlockStore::new();
        let img = store.create(BlockKind::Image, Some("pic".to_string()));
        if let Some(block) = store.get_mut(img) {
            block.result = Some(TransformResult::Image(vec![1, 2, 3]));
        }
        store.create(BlockKind::Text, Some("B".to_string()));
        let mut graph = DependencyGraph::new();

        let sub = resolve_references(&store, &mut graph, "#pic here", "B");
        assert_eq!(sub.combined_data, "#pic here");
        assert_eq!(sub.unresolved, vec!["pic"]);
    }

    #[test]
    fn exotic_bracket_name_resolved_but_not_substituted() {
        let store = store_with(&[("a|b", Some("r")), ("B", None)]);
        let mut graph = DependencyGraph::new();

        let sub = resolve_references(&store, &mut graph, "[a|b]", "B");
        // The name resolves (edge added, result listed) but the token
        // stays literal: substitution only touches plain names.
        assert_eq!(sub.combined_data, "[a|b]");
        assert_eq!(sub.referenced_results.len(), 1);
    }

    #[test]
    fn first_match_wins_for_duplicate_names() {
        let mut store = BlockStore::new();
        let first = store.create(BlockKind::Text, Some("dup".to_string()));
        let second = store.create(BlockKind::Text, Some("dup".to_string()));
        if let Some(block) = store.get_mut(first) {
            block.result = Some(TransformResult::Text("first".to_string()));
        }
        if let Some(block) = store.get_mut(second) {
            block.result = Some(TransformResult::Text("second".to_string()));
        }
        store.create(BlockKind::Text, Some("B".to_string()));
        let mut graph = DependencyGraph::new();

        let sub = resolve_references(&store, &mut graph, "#dup", "B");
        assert_eq!(sub.combined_data, "first");
    }
}
