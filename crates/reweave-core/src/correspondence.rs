//! Correspondence maps: the common currency between the locator, the
//! reconciler, and the patch applier.
//!
//! A map records, for each interesting span of one document, the span
//! of a counterpart in another document. The sentinel target
//! [`Location::EMPTY`] means "no counterpart" and is data, not an
//! error. Maps are ordered by their keys so every pass that walks one
//! is deterministic.

use std::collections::{BTreeMap, HashMap};

use crate::document::{Document, Node, NodeId};
use crate::location::Location;

/// One `from -> to` association between two documents. Node ids are
/// kept alongside the spans so later passes can reach structure
/// (children, body carets) without re-resolving locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrespondenceEntry {
    pub from: Location,
    pub to: Location,
    pub from_node: Option<NodeId>,
    pub to_node: Option<NodeId>,
}

impl CorrespondenceEntry {
    pub fn new(from: Location, to: Location) -> Self {
        CorrespondenceEntry {
            from,
            to,
            from_node: None,
            to_node: None,
        }
    }

    pub fn with_nodes(
        from: Location,
        to: Location,
        from_node: Option<NodeId>,
        to_node: Option<NodeId>,
    ) -> Self {
        CorrespondenceEntry {
            from,
            to,
            from_node,
            to_node,
        }
    }

    /// An entry whose target is the sentinel records a missing
    /// counterpart.
    pub fn is_unmatched(&self) -> bool {
        self.to.is_empty()
    }
}

/// Ordered collection of [`CorrespondenceEntry`] values keyed by a
/// location in the "from" document. Keys are identities; the spans a
/// splice actually touches always come from the entry itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrespondenceMap {
    entries: BTreeMap<Location, CorrespondenceEntry>,
}

impl CorrespondenceMap {
    pub fn new() -> Self {
        CorrespondenceMap::default()
    }

    /// Insert keyed by the entry's own `from` span.
    pub fn insert(&mut self, entry: CorrespondenceEntry) {
        self.entries.insert(entry.from, entry);
    }

    /// Insert under an explicit key. Used for edits that have no
    /// natural span of their own, such as deletions keyed by
    /// [`Location::synthetic`].
    pub fn insert_keyed(&mut self, key: Location, entry: CorrespondenceEntry) {
        self.entries.insert(key, entry);
    }

    pub fn get(&self, from: &Location) -> Option<&CorrespondenceEntry> {
        self.entries.get(from)
    }

    pub fn contains_key(&self, from: &Location) -> bool {
        self.entries.contains_key(from)
    }

    /// Target span recorded for `from`, if the key is present.
    pub fn target_of(&self, from: &Location) -> Option<Location> {
        self.entries.get(from).map(|e| e.to)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Location, &CorrespondenceEntry)> {
        self.entries.iter()
    }

    /// New map holding the entries that satisfy `keep`, under their
    /// original keys.
    pub fn filter<F>(&self, keep: F) -> CorrespondenceMap
    where
        F: Fn(&Location, &CorrespondenceEntry) -> bool,
    {
        let entries = self
            .entries
            .iter()
            .filter(|(k, e)| keep(k, e))
            .map(|(k, e)| (*k, e.clone()))
            .collect();
        CorrespondenceMap { entries }
    }

    /// Union of two maps. On a key collision the entry from `other`
    /// wins, which is what lets later edit classes override earlier
    /// ones when the classes are merged in precedence order.
    pub fn merge(mut self, other: CorrespondenceMap) -> CorrespondenceMap {
        self.entries.extend(other.entries);
        self
    }

    /// First entry whose target is exactly `target`, in key order.
    /// Matching is one-to-one, so at most one entry qualifies when the
    /// map came out of the locator.
    pub fn find_by_target(&self, target: &Location) -> Option<(&Location, &CorrespondenceEntry)> {
        if target.is_empty() {
            return None;
        }
        self.entries.iter().find(|(_, e)| e.to == *target)
    }

    /// Re-key this map onto the left document of `via`, using the
    /// shared targets as the bridge: an entry `a -> z` of `self`
    /// combined with an entry `c -> z` of `via` yields `c -> a`
    /// reversed into an entry keyed at `c` with `from = a, to = c`.
    /// Entries of either map with a sentinel target drop out.
    pub fn project_through(&self, via: &CorrespondenceMap) -> CorrespondenceMap {
        let mut by_target: HashMap<Location, (&Location, &CorrespondenceEntry)> = HashMap::new();
        for (key, entry) in via.entries.iter() {
            if !entry.to.is_empty() {
                by_target.entry(entry.to).or_insert((key, entry));
            }
        }
        let mut out = CorrespondenceMap::new();
        for entry in self.entries.values() {
            if entry.to.is_empty() {
                continue;
            }
            if let Some((via_key, via_entry)) = by_target.get(&entry.to) {
                out.insert_keyed(
                    **via_key,
                    CorrespondenceEntry::with_nodes(
                        entry.from,
                        **via_key,
                        entry.from_node,
                        via_entry.from_node,
                    ),
                );
            }
        }
        out
    }

    /// Whether any entry's source node is structurally equivalent to
    /// `probe`. `doc` must be the document the map's keys point into.
    pub fn contains_equivalent(&self, doc: &Document, probe: &Node) -> bool {
        self.entries.values().any(|e| {
            e.from_node
                .is_some_and(|id| doc.node(id).is_equivalent(probe))
        })
    }
}

impl<'a> IntoIterator for &'a CorrespondenceMap {
    type Item = (&'a Location, &'a CorrespondenceEntry);
    type IntoIter = std::collections::btree_map::Iter<'a, Location, CorrespondenceEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
