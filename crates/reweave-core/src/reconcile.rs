//! Derives the edit set that carries a freshly generated fragment
//! into the current file.
//!
//! Four correspondence maps drive the derivation: the new fragment
//! against the current file, the new fragment against the previous
//! generation (both directions), and the current file against the
//! previous generation. Insertions are taken from what is new and not
//! previously generated, deletions from what the previous generation
//! had and the new one dropped, and replacements from matched nodes
//! whose own text drifted between generations. Hand-written content
//! never qualifies for any class, which is what keeps user edits
//! intact across regenerations.

use std::collections::HashSet;

use tracing::debug;

use crate::correspondence::{CorrespondenceEntry, CorrespondenceMap};
use crate::document::{normalize_text, Document, Node, NodeId};
use crate::location::Location;
use crate::locator::{locate, unmatched_map};

/// The three edit classes of one reconciliation, kept apart so
/// callers can inspect or report them before applying.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Novel content, keyed by its splice caret in the current file.
    pub insertions: CorrespondenceMap,
    /// Withdrawn content, keyed synthetically; each entry's target is
    /// the current-file span to remove.
    pub deletions: CorrespondenceMap,
    /// Drifted content, keyed by the current-file span it overwrites.
    pub replacements: CorrespondenceMap,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.insertions.is_empty() && self.deletions.is_empty() && self.replacements.is_empty()
    }

    pub fn edit_count(&self) -> usize {
        self.insertions.len() + self.deletions.len() + self.replacements.len()
    }

    /// Single map the patch applier consumes. Merging is right-biased,
    /// so on a key collision replacements override deletions, which
    /// override insertions.
    pub fn combined(&self) -> CorrespondenceMap {
        self.insertions
            .clone()
            .merge(self.deletions.clone())
            .merge(self.replacements.clone())
    }
}

/// Compare the three documents and classify every divergence.
///
/// `previous` is `None` when no earlier generation could be
/// reconstructed; everything in `new` that the current file does not
/// already contain then counts as an insertion, and nothing is
/// deleted or replaced.
pub fn reconcile(current: &Document, new: &Document, previous: Option<&Document>) -> Reconciliation {
    let new_into_current = locate(new, current);
    let (new_into_previous, previous_into_new, current_into_previous) = match previous {
        Some(prev) => (locate(new, prev), locate(prev, new), locate(current, prev)),
        None => (
            unmatched_map(new),
            CorrespondenceMap::new(),
            CorrespondenceMap::new(),
        ),
    };

    let mut keys = SyntheticKeys::new();
    let insertions = derive_insertions(current, new, &new_into_current, &new_into_previous, &mut keys);
    let deletions = derive_deletions(
        current,
        previous,
        &previous_into_new,
        &current_into_previous,
        &mut keys,
    );
    let replacements = match previous {
        Some(prev) => derive_replacements(
            current,
            new,
            prev,
            &new_into_previous,
            &current_into_previous,
        ),
        None => CorrespondenceMap::new(),
    };

    debug!(
        insertions = insertions.len(),
        deletions = deletions.len(),
        replacements = replacements.len(),
        "reconciled documents"
    );

    Reconciliation {
        insertions,
        deletions,
        replacements,
    }
}

/// Allocator for out-of-band map keys, issued in emission order so a
/// given input always produces the same key sequence.
struct SyntheticKeys {
    next: u32,
}

impl SyntheticKeys {
    fn new() -> Self {
        SyntheticKeys { next: 1 }
    }

    fn alloc(&mut self) -> Location {
        let key = Location::synthetic(self.next);
        self.next += 1;
        key
    }
}

fn derive_insertions(
    current: &Document,
    new: &Document,
    new_into_current: &CorrespondenceMap,
    new_into_previous: &CorrespondenceMap,
    keys: &mut SyntheticKeys,
) -> CorrespondenceMap {
    // A unit is novel when neither the previous generation nor the
    // current file has a counterpart for it. A unit the current file
    // already holds needs no edit at all: the user's copy wins.
    let mut novel: HashSet<NodeId> = HashSet::new();
    for id in new.descendants(0) {
        let loc = new.node(id).location;
        let in_previous = new_into_previous
            .target_of(&loc)
            .is_some_and(|t| !t.is_empty());
        let in_current = new_into_current
            .target_of(&loc)
            .is_some_and(|t| !t.is_empty());
        if !in_previous && !in_current {
            novel.insert(id);
        }
    }
    // A novel unit inside a novel container rides along with the
    // container's text; emitting it separately would splice it twice.
    let covered: Vec<NodeId> = novel
        .iter()
        .copied()
        .filter(|&id| {
            let mut cursor = new.node(id).parent;
            while let Some(p) = cursor {
                if novel.contains(&p) {
                    return true;
                }
                cursor = new.node(p).parent;
            }
            false
        })
        .collect();
    for id in covered {
        novel.remove(&id);
    }

    let mut out = CorrespondenceMap::new();
    let mut scopes: Vec<NodeId> = vec![0];
    scopes.extend(new.descendants(0).into_iter().filter(|&id| !new.node(id).is_leaf()));
    for scope in scopes {
        let counterpart = scope_counterpart(current, new, scope, new_into_current);
        if counterpart.is_none() && scope != 0 {
            // The user removed this container from the current file;
            // nothing of its interior comes back.
            continue;
        }
        let children = &new.node(scope).children;
        let mut start = None;
        for i in 0..=children.len() {
            let is_novel = i < children.len() && novel.contains(&children[i]);
            match (start, is_novel) {
                (None, true) => start = Some(i),
                (Some(s), false) => {
                    emit_run(
                        current,
                        new,
                        scope,
                        counterpart,
                        children,
                        s,
                        i - 1,
                        new_into_current,
                        &mut out,
                        keys,
                    );
                    start = None;
                }
                _ => {}
            }
        }
    }
    out
}

/// Current-file node playing host to insertions under `scope`. The
/// roots of the two documents always correspond; any other scope must
/// have been matched.
fn scope_counterpart<'a>(
    current: &'a Document,
    new: &Document,
    scope: NodeId,
    new_into_current: &CorrespondenceMap,
) -> Option<&'a Node> {
    if scope == 0 {
        return Some(current.root());
    }
    let entry = new_into_current.get(&new.node(scope).location)?;
    if entry.is_unmatched() {
        return None;
    }
    entry.to_node.map(|id| current.node(id))
}

/// Emit one splice for a maximal run of novel siblings. The anchor is
/// a caret in the current file; the hull is the fragment span whose
/// bytes get spliced there, extended to the nearest sibling boundary
/// so the fragment's own separators travel with the content.
fn emit_run(
    current: &Document,
    new: &Document,
    scope: NodeId,
    counterpart: Option<&Node>,
    children: &[NodeId],
    start: usize,
    end: usize,
    new_into_current: &CorrespondenceMap,
    out: &mut CorrespondenceMap,
    keys: &mut SyntheticKeys,
) {
    let matched_target = |id: NodeId| -> Option<Location> {
        new_into_current
            .target_of(&new.node(id).location)
            .filter(|t| !t.is_empty())
    };

    let run_first = new.node(children[start]);
    let run_last = new.node(children[end]);
    let run_span = Location::new(
        run_first.location.start_line,
        run_first.location.start_col,
        run_last.location.end_line,
        run_last.location.end_col,
    );

    // Left boundary for a separator-before hull: the immediate
    // preceding sibling's end, or just inside the scope's body when
    // the run opens the scope. Never reaches past a sibling, so text
    // the user removed cannot ride back in with the run.
    let before = if start > 0 {
        let b = new.node(children[start - 1]).location;
        (b.end_line, b.end_col)
    } else {
        match new.node(scope).body_insert {
            Some(open) => (open.start_line, open.start_col),
            None => (run_span.start_line, run_span.start_col),
        }
    };

    // Prefer anchoring after the nearest preceding matched sibling,
    // then before the nearest following one, then inside the host's
    // body. Which neighbor supplies the separator follows the anchor
    // side: spliced text must meet existing text cleanly.
    let mut resolved: Option<(Location, Location)> = None;
    for i in (0..start).rev() {
        if let Some(target) = matched_target(children[i]) {
            let anchor = Location::caret(target.end_line, target.end_col);
            let hull = Location::new(before.0, before.1, run_span.end_line, run_span.end_col);
            resolved = Some((anchor, hull));
            break;
        }
    }
    if resolved.is_none() {
        for i in (end + 1)..children.len() {
            if let Some(target) = matched_target(children[i]) {
                let anchor = Location::caret(target.start_line, target.start_col);
                let after = new.node(children[end + 1]).location;
                let hull = Location::new(
                    run_span.start_line,
                    run_span.start_col,
                    after.start_line,
                    after.start_col,
                );
                resolved = Some((anchor, hull));
                break;
            }
        }
    }
    if resolved.is_none() {
        let host = match counterpart {
            Some(host) => host,
            None => return,
        };
        if let Some(&last) = host.children.last() {
            // Nothing in the scope matched, so the run appends after
            // the host's existing content. When both sides own their
            // lines outright the splice works in whole lines; that
            // keeps it clear of a whole-line deletion of the host's
            // tail, which is exactly what a reworded statement
            // compiles down to.
            let tail = current.node(last).location;
            let tail_lines = extend_to_whole_lines(current, tail);
            let hull_lines = extend_to_whole_lines(new, run_span);
            if tail_lines != tail && hull_lines != run_span {
                let anchor = Location::caret(tail_lines.end_line, tail_lines.end_col);
                resolved = Some((anchor, hull_lines));
            } else {
                let anchor = Location::caret(tail.end_line, tail.end_col);
                let hull =
                    Location::new(before.0, before.1, run_span.end_line, run_span.end_col);
                resolved = Some((anchor, hull));
            }
        } else {
            let anchor = host
                .body_insert
                .unwrap_or(Location::caret(host.location.end_line, host.location.end_col));
            let mut hull =
                Location::new(before.0, before.1, run_span.end_line, run_span.end_col);
            // First generation into a blank file takes the fragment
            // verbatim, trailing newline included.
            if scope == 0 && current.is_blank() && end + 1 == children.len() {
                let eof = new.index().end_caret();
                hull.end_line = eof.end_line;
                hull.end_col = eof.end_col;
            }
            resolved = Some((anchor, hull));
        }
    }

    if let Some((anchor, hull)) = resolved {
        let entry =
            CorrespondenceEntry::with_nodes(hull, anchor, Some(children[start]), None);
        let key = if out.contains_key(&anchor) {
            keys.alloc()
        } else {
            anchor
        };
        out.insert_keyed(key, entry);
    }
}

fn derive_deletions(
    current: &Document,
    previous: Option<&Document>,
    previous_into_new: &CorrespondenceMap,
    current_into_previous: &CorrespondenceMap,
    keys: &mut SyntheticKeys,
) -> CorrespondenceMap {
    let mut out = CorrespondenceMap::new();
    if previous.is_none() {
        return out;
    }

    // Previously generated, absent from the new fragment, and still
    // present in the current file: that content is withdrawn.
    let mut candidates: Vec<(Location, Option<NodeId>)> = Vec::new();
    for (prev_loc, entry) in previous_into_new {
        if !entry.is_unmatched() {
            continue;
        }
        if let Some((cur_loc, cur_entry)) = current_into_previous.find_by_target(prev_loc) {
            candidates.push((*cur_loc, cur_entry.from_node));
        }
    }

    // A deletion nested inside another deletion is already covered by
    // the outer span.
    let spans: Vec<Location> = candidates.iter().map(|(loc, _)| *loc).collect();
    candidates.retain(|(loc, _)| {
        !spans
            .iter()
            .any(|outer| *outer != *loc && outer.contains(loc))
    });

    for (cur_loc, cur_node) in candidates {
        let extended = extend_to_whole_lines(current, cur_loc);
        out.insert_keyed(
            keys.alloc(),
            CorrespondenceEntry::with_nodes(Location::EMPTY, extended, None, cur_node),
        );
    }
    out
}

/// Widen a span to full lines when everything around it on its first
/// and last line is whitespace, so deleting a statement takes its
/// indentation and line break along instead of leaving a blank husk.
fn extend_to_whole_lines(doc: &Document, loc: Location) -> Location {
    let index = doc.index();
    let text = doc.text();
    let range = index.byte_range(&loc);

    let first_line = index.line_range(loc.start_line);
    let prefix = &text[first_line.start..range.start.max(first_line.start)];
    if !prefix.trim().is_empty() {
        return loc;
    }

    let end_at_line_start = range.end > range.start && text.as_bytes()[range.end - 1] == b'\n';
    let line_end = if end_at_line_start {
        range.end
    } else {
        let (end_line, _) = index.point_of(range.end);
        let last_line = index.line_range(end_line);
        let suffix = &text[range.end.min(last_line.end)..last_line.end];
        if !suffix.trim().is_empty() {
            return loc;
        }
        last_line.end
    };

    index.location_of(first_line.start..line_end)
}

fn derive_replacements(
    current: &Document,
    new: &Document,
    previous: &Document,
    new_into_previous: &CorrespondenceMap,
    current_into_previous: &CorrespondenceMap,
) -> CorrespondenceMap {
    let mut out = CorrespondenceMap::new();
    for (_, entry) in new_into_previous {
        if entry.is_unmatched() {
            continue;
        }
        let (Some(new_id), Some(prev_id)) = (entry.from_node, entry.to_node) else {
            continue;
        };
        // If the user removed the node from the current file, the
        // drift has nowhere to land and their deletion stands.
        let Some((_, cur_entry)) = current_into_previous.find_by_target(&entry.to) else {
            continue;
        };
        let Some(cur_id) = cur_entry.from_node else {
            continue;
        };

        let new_node = new.node(new_id);
        let prev_node = previous.node(prev_id);
        let cur_node = current.node(cur_id);

        if new_node.is_leaf() && prev_node.is_leaf() && cur_node.is_leaf() {
            let drifted = normalize_text(new.node_text(new_id))
                != normalize_text(previous.node_text(prev_id));
            if drifted {
                out.insert_keyed(
                    cur_node.location,
                    CorrespondenceEntry::with_nodes(
                        new_node.location,
                        cur_node.location,
                        Some(new_id),
                        Some(cur_id),
                    ),
                );
            }
        } else if !new_node.is_leaf() && !prev_node.is_leaf() && !cur_node.is_leaf() {
            // For containers only the frame is the node's own text;
            // drift inside the children is their own business.
            compare_frame(
                current, new, previous, new_node, prev_node, cur_node, Frame::Head, &mut out,
            );
            compare_frame(
                current, new, previous, new_node, prev_node, cur_node, Frame::Tail, &mut out,
            );
        } else {
            // Child structure disagrees between the generations and
            // the current file; a frame splice could not land safely.
            debug!(
                signature = %new_node.signature,
                "skipping frame comparison for structurally divergent node"
            );
        }
    }
    out
}

#[derive(Clone, Copy)]
enum Frame {
    Head,
    Tail,
}

fn compare_frame(
    current: &Document,
    new: &Document,
    previous: &Document,
    new_node: &Node,
    prev_node: &Node,
    cur_node: &Node,
    frame: Frame,
    out: &mut CorrespondenceMap,
) {
    let Some(new_frame) = frame_region(new, new_node, frame) else {
        return;
    };
    let Some(prev_frame) = frame_region(previous, prev_node, frame) else {
        return;
    };
    let Some(cur_frame) = frame_region(current, cur_node, frame) else {
        return;
    };
    if normalize_text(new.text_at(&new_frame)) != normalize_text(previous.text_at(&prev_frame)) {
        out.insert_keyed(
            cur_frame,
            CorrespondenceEntry::with_nodes(
                new_frame,
                cur_frame,
                Some(new_node.id),
                Some(cur_node.id),
            ),
        );
    }
}

/// Span of a container's own text on one side of its children: from
/// the node's start to its first child for [`Frame::Head`], from its
/// last child to the node's end for [`Frame::Tail`]. Trimmed to the
/// non-whitespace core so a frame splice can never brush against a
/// whole-line edit of a neighboring child.
fn frame_region(doc: &Document, node: &Node, frame: Frame) -> Option<Location> {
    let first = *node.children.first()?;
    let last = *node.children.last()?;
    let index = doc.index();
    let outer = index.byte_range(&node.location);
    let range = match frame {
        Frame::Head => outer.start..index.byte_range(&doc.node(first).location).start,
        Frame::Tail => index.byte_range(&doc.node(last).location).end..outer.end,
    };
    if range.start >= range.end {
        return None;
    }
    let text = &doc.text()[range.clone()];
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lead = text.len() - text.trim_start().len();
    let trail = text.len() - text.trim_end().len();
    Some(index.location_of(range.start + lead..range.end - trail))
}
