//! Structural matcher: finds, for every unit of a left document, its
//! counterpart span in a right document.
//!
//! Matching is scope-by-scope. The two roots correspond implicitly;
//! within a matched pair the children are matched one-to-one by
//! structural equivalence, and only matched pairs are recursed into.
//! Children of an unmatched parent therefore always come back with
//! the sentinel target, even when a lookalike exists somewhere else
//! in the right document.
//!
//! The result is one-directional. Callers that need both directions
//! invoke [`locate`] twice with the documents swapped.

use tracing::trace;

use crate::correspondence::{CorrespondenceEntry, CorrespondenceMap};
use crate::document::{Document, NodeId};
use crate::location::Location;

/// Map every matchable unit of `left` to its counterpart in `right`.
///
/// Each scope is matched greedily in left document order. Among the
/// equivalent, still-unclaimed right candidates the winner is the one
/// nearest the slot just after the previous match in that scope (the
/// left ordinal when nothing has matched yet), with the earlier
/// candidate winning ties. Every matchable left unit gets exactly one
/// entry; unmatched ones map to [`Location::EMPTY`].
pub fn locate(left: &Document, right: &Document) -> CorrespondenceMap {
    let mut map = CorrespondenceMap::new();
    let mut pairs: Vec<(NodeId, NodeId)> = vec![(0, 0)];
    let mut i = 0;
    while i < pairs.len() {
        let (l, r) = pairs[i];
        i += 1;
        let left_children = left.node(l).children.clone();
        let right_children = right.node(r).children.clone();
        match_scope(left, &left_children, right, &right_children, &mut map, &mut pairs);
    }
    let matched = map.iter().filter(|(_, e)| !e.is_unmatched()).count();
    trace!(
        left = %left.role(),
        right = %right.role(),
        matched,
        total = map.len(),
        "located counterparts"
    );
    map
}

/// Map every matchable unit of `doc` to the sentinel. Stands in for a
/// comparison against a document that does not exist, such as the
/// previous generation on a first run.
pub fn unmatched_map(doc: &Document) -> CorrespondenceMap {
    let mut map = CorrespondenceMap::new();
    for id in doc.descendants(0) {
        let node = doc.node(id);
        map.insert(CorrespondenceEntry::with_nodes(
            node.location,
            Location::EMPTY,
            Some(id),
            None,
        ));
    }
    map
}

fn match_scope(
    left: &Document,
    left_children: &[NodeId],
    right: &Document,
    right_children: &[NodeId],
    map: &mut CorrespondenceMap,
    pairs: &mut Vec<(NodeId, NodeId)>,
) {
    let mut taken = vec![false; right_children.len()];
    let mut last_matched: Option<usize> = None;
    for (li, &lid) in left_children.iter().enumerate() {
        let lnode = left.node(lid);
        let expected = last_matched.map_or(li, |r| r + 1);
        let best = right_children
            .iter()
            .enumerate()
            .filter(|&(ri, &rid)| !taken[ri] && right.node(rid).is_equivalent(lnode))
            .min_by_key(|(ri, _)| (ri.abs_diff(expected), *ri))
            .map(|(ri, _)| ri);
        match best {
            Some(ri) => {
                taken[ri] = true;
                last_matched = Some(ri);
                let rid = right_children[ri];
                map.insert(CorrespondenceEntry::with_nodes(
                    lnode.location,
                    right.node(rid).location,
                    Some(lid),
                    Some(rid),
                ));
                pairs.push((lid, rid));
            }
            None => {
                map.insert(CorrespondenceEntry::with_nodes(
                    lnode.location,
                    Location::EMPTY,
                    Some(lid),
                    None,
                ));
                for desc in left.descendants(lid) {
                    let d = left.node(desc);
                    map.insert(CorrespondenceEntry::with_nodes(
                        d.location,
                        Location::EMPTY,
                        Some(desc),
                        None,
                    ));
                }
            }
        }
    }
}
