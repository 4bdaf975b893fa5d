//! Building and checking the flat row sequence.
//!
//! Everything here is pure over an [`ItemGraph`]: the list calls in to derive
//! rows for a data set, a filter, or a restore, and to validate a candidate
//! row sequence before committing an edit.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::change::ListChange;
use crate::filter::ItemFilter;
use crate::graph::{ItemGraph, ItemNode};
use crate::item::ItemId;

/// Rows derived from a top-level order plus the expansion flags a filter
/// forces on the expandables it visited.
#[derive(Clone, Debug)]
pub(crate) struct Materialized<Id> {
    pub(crate) rows: Vec<Id>,
    pub(crate) forced: Vec<(Id, bool)>,
}

/// Derives rows from a top-level order.
///
/// Without a filter, expanded items contribute their visible descendants and
/// every sectionable item is preceded by its header. With a filter, only
/// items whose subtree matches survive, parents are forced open exactly when
/// a descendant matches, and headers appear only above a surviving item.
pub(crate) fn materialize<Id: ItemId>(
    graph: &ItemGraph<Id>,
    top_level: &[Id],
    filter: Option<&dyn ItemFilter<Id>>,
) -> Materialized<Id> {
    let mut rows = Vec::with_capacity(top_level.len());
    let mut forced = Vec::new();
    let mut emitted = FxHashSet::default();
    let mut memo = FxHashMap::default();

    for &id in top_level {
        let Some(node) = graph.get(id) else {
            continue;
        };
        if !node.is_materializable() || node.parent().is_some() || emitted.contains(&id) {
            continue;
        }
        if let Some(filter) = filter {
            if node.is_plain_header() || !graph.subtree_matches(id, filter, &mut memo) {
                continue;
            }
        }
        let mut subtree = Vec::new();
        match filter {
            Some(filter) => {
                push_filtered_subtree(graph, id, filter, &mut memo, &mut subtree, &mut forced);
            }
            None => push_expanded_subtree(graph, id, &mut subtree),
        }
        if let Some(header) = leading_header(graph, id, &subtree, |h| {
            !emitted.contains(&h) && graph.is_visible_header(h)
        }) {
            rows.push(header);
            emitted.insert(header);
        }
        rows.push(id);
        emitted.insert(id);
        rows.extend(subtree);
    }

    Materialized { rows, forced }
}

/// Header that has to precede the subtree rooted at `root`.
///
/// A sectioned root needs its own header. An unsectioned root takes the
/// first header one of its `descendants` links to, so a child may belong to
/// a section its parent is not part of. `eligible` decides which headers
/// still have to be placed.
pub(crate) fn leading_header<Id: ItemId>(
    graph: &ItemGraph<Id>,
    root: Id,
    descendants: &[Id],
    eligible: impl Fn(Id) -> bool,
) -> Option<Id> {
    let node = graph.get(root)?;
    match node.section().filter(|h| *h != root) {
        Some(header) => eligible(header).then_some(header),
        None => descendants
            .iter()
            .filter_map(|d| graph.get(*d).and_then(ItemNode::section))
            .find(|header| *header != root && !descendants.contains(header))
            .filter(|header| eligible(*header)),
    }
}

/// Appends the visible descendants of `id` in pre-order, following the
/// current expansion flags.
pub(crate) fn push_expanded_subtree<Id: ItemId>(graph: &ItemGraph<Id>, id: Id, rows: &mut Vec<Id>) {
    if graph.get(id).is_some_and(ItemNode::is_expanded) {
        push_visible_descendants(graph, id, rows);
    }
}

/// Like [`push_expanded_subtree`] but ignores the expansion flag of `id`
/// itself.
pub(crate) fn push_visible_descendants<Id: ItemId>(graph: &ItemGraph<Id>, id: Id, rows: &mut Vec<Id>) {
    let mut stack: SmallVec<[Id; 16]> = SmallVec::new();
    stack.extend(graph.visible_children(id).rev());
    while let Some(child) = stack.pop() {
        rows.push(child);
        if graph.get(child).is_some_and(ItemNode::is_expanded) {
            stack.extend(graph.visible_children(child).rev());
        }
    }
}

/// Appends the descendants of `id` whose subtree matches `filter`, recording
/// the expansion each visited expandable is forced into.
pub(crate) fn push_filtered_subtree<Id: ItemId>(
    graph: &ItemGraph<Id>,
    id: Id,
    filter: &dyn ItemFilter<Id>,
    memo: &mut FxHashMap<Id, bool>,
    rows: &mut Vec<Id>,
    forced: &mut Vec<(Id, bool)>,
) {
    let mut stack: SmallVec<[Id; 16]> = SmallVec::new();
    push_matching_children(graph, id, filter, memo, &mut stack, forced);
    while let Some(child) = stack.pop() {
        rows.push(child);
        push_matching_children(graph, child, filter, memo, &mut stack, forced);
    }
}

fn push_matching_children<Id: ItemId>(
    graph: &ItemGraph<Id>,
    id: Id,
    filter: &dyn ItemFilter<Id>,
    memo: &mut FxHashMap<Id, bool>,
    stack: &mut SmallVec<[Id; 16]>,
    forced: &mut Vec<(Id, bool)>,
) {
    if !graph.get(id).is_some_and(ItemNode::is_expandable) {
        return;
    }
    let matching: SmallVec<[Id; 8]> = graph
        .visible_children(id)
        .filter(|child| graph.subtree_matches(*child, filter, memo))
        .collect();
    forced.push((id, !matching.is_empty()));
    stack.extend(matching.into_iter().rev());
}

/// Drops plain headers without section items when `should_prune` agrees.
pub(crate) fn prune_orphan_headers<Id: ItemId>(
    graph: &ItemGraph<Id>,
    rows: &mut Vec<Id>,
    should_prune: impl Fn(Id) -> bool,
) {
    let mut orphans = FxHashSet::default();
    let mut current: Option<(Id, bool)> = None;
    for &id in rows.iter() {
        let Some(node) = graph.get(id) else {
            continue;
        };
        if node.is_plain_header() {
            if let Some((header, false)) = current
                && should_prune(header)
            {
                orphans.insert(header);
            }
            current = Some((id, false));
            continue;
        }
        if let Some((header, has_items)) = current.as_mut()
            && node.section() == Some(*header)
        {
            *has_items = true;
        }
    }
    if let Some((header, false)) = current
        && should_prune(header)
    {
        orphans.insert(header);
    }
    if !orphans.is_empty() {
        rows.retain(|id| !orphans.contains(id));
    }
}

/// Checks structural invariants over the rows produced by `row`.
///
/// Rows from `start` are checked until the first header at or after `end`;
/// rows past that header cannot be affected by an edit inside `start..end`.
/// Two rules hold for every checked row: a sectionable item sits below its
/// own header with no other header in between, and a child directly follows
/// its parent or a descendant of its parent.
pub(crate) fn rows_are_consistent<Id: ItemId>(
    graph: &ItemGraph<Id>,
    len: usize,
    row: impl Fn(usize) -> Id,
    start: usize,
    end: usize,
) -> bool {
    let mut header = (0..start.min(len))
        .rev()
        .map(&row)
        .find(|id| graph.get(*id).is_some_and(ItemNode::is_header));

    for i in start..len {
        let id = row(i);
        let Some(node) = graph.get(id) else {
            return false;
        };
        if i >= end && node.is_header() {
            break;
        }
        if let Some(parent) = node.parent() {
            let Some(prev) = i.checked_sub(1).map(&row) else {
                return false;
            };
            if prev != parent && !graph.is_ancestor(parent, prev) {
                return false;
            }
        }
        if node.is_header() {
            header = Some(id);
            continue;
        }
        if let Some(section) = node.section()
            && graph.is_visible_header(section)
            && header != Some(section)
        {
            return false;
        }
    }
    true
}

/// Full-list consistency check, including duplicate detection.
pub(crate) fn projection_is_consistent<Id: ItemId>(graph: &ItemGraph<Id>, rows: &[Id]) -> bool {
    let mut seen = FxHashSet::default();
    rows.iter().all(|id| seen.insert(*id))
        && rows_are_consistent(graph, rows.len(), |i| rows[i], 0, rows.len())
}

/// Index one past the last row of the section starting at `header_pos`.
pub(crate) fn section_end<Id: ItemId>(graph: &ItemGraph<Id>, rows: &[Id], header_pos: usize) -> usize {
    rows.iter()
        .enumerate()
        .skip(header_pos + 1)
        .find(|(_, id)| graph.get(**id).is_some_and(ItemNode::is_header))
        .map_or(rows.len(), |(index, _)| index)
}

/// Index one past the visible subtree rooted at `position`.
pub(crate) fn subtree_end<Id: ItemId>(graph: &ItemGraph<Id>, rows: &[Id], position: usize) -> usize {
    let Some(&root) = rows.get(position) else {
        return position;
    };
    let mut end = position + 1;
    while end < rows.len() && graph.is_ancestor(root, rows[end]) {
        end += 1;
    }
    end
}

/// Describes `old -> new` as removals (descending) followed by insertions
/// (ascending). Returns `None` if survivors changed relative order, which
/// cannot be expressed without moves.
pub(crate) fn transition<Id: ItemId>(old: &[Id], new: &[Id]) -> Option<Vec<ListChange>> {
    let keep: FxHashSet<Id> = new.iter().copied().collect();
    let mut events = Vec::new();

    let mut i = old.len();
    while i > 0 {
        i -= 1;
        if keep.contains(&old[i]) {
            continue;
        }
        let end = i + 1;
        let mut start = i;
        while start > 0 && !keep.contains(&old[start - 1]) {
            start -= 1;
        }
        events.push(ListChange::Removed {
            position: start,
            count: end - start,
        });
        i = start;
    }

    let survivors: Vec<Id> = old.iter().copied().filter(|id| keep.contains(id)).collect();
    let mut j = 0;
    let mut i = 0;
    while i < new.len() {
        if survivors.get(j) == Some(&new[i]) {
            i += 1;
            j += 1;
            continue;
        }
        let start = i;
        while i < new.len() && survivors.get(j) != Some(&new[i]) {
            i += 1;
        }
        events.push(ListChange::Inserted {
            position: start,
            count: i - start,
        });
    }

    (j == survivors.len()).then_some(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Item;
    use pretty_assertions::assert_eq;

    fn sectioned() -> ItemGraph<u32> {
        let mut graph = ItemGraph::new();
        graph
            .register(
                vec![
                    Item::header(10),
                    Item::new(1).section(10),
                    Item::new(2)
                        .section(10)
                        .children([Item::new(21), Item::new(22)])
                        .expanded(true),
                    Item::header(20),
                    Item::new(3).section(20),
                    Item::header(30),
                ],
                None,
                None,
            )
            .expect("register");
        graph
    }

    #[test]
    fn materialize_places_headers_and_children() {
        let graph = sectioned();
        let built = materialize(&graph, &[1, 2, 3, 10, 20, 30], None);
        assert_eq!(built.rows, vec![10, 1, 2, 21, 22, 20, 3, 30]);
        assert!(projection_is_consistent(&graph, &built.rows));
    }

    fn child_in_foreign_section() -> ItemGraph<u32> {
        let mut graph = ItemGraph::new();
        graph
            .register(
                vec![
                    Item::new(1)
                        .children([Item::new(11).section(100), Item::new(12)])
                        .expanded(true),
                    Item::header(100),
                    Item::new(2),
                ],
                None,
                None,
            )
            .expect("register");
        graph
    }

    #[test]
    fn child_pulls_its_header_before_the_root() {
        let graph = child_in_foreign_section();
        let mut rows = materialize(&graph, &[1, 100, 2], None).rows;
        prune_orphan_headers(&graph, &mut rows, |_| true);
        assert_eq!(rows, vec![100, 1, 11, 12, 2]);
        assert!(projection_is_consistent(&graph, &rows));
    }

    #[test]
    fn filtered_child_keeps_its_header() {
        let graph = child_in_foreign_section();
        let filter = |node: &ItemNode<u32>| node.id() == 11;
        let built = materialize(&graph, &[1, 100, 2], Some(&filter));
        assert_eq!(built.rows, vec![100, 1, 11]);
        assert!(projection_is_consistent(&graph, &built.rows));
    }

    #[test]
    fn prune_drops_empty_sections_only() {
        let graph = sectioned();
        let mut rows = materialize(&graph, &[10, 1, 2, 20, 3, 30], None).rows;
        prune_orphan_headers(&graph, &mut rows, |_| true);
        assert_eq!(rows, vec![10, 1, 2, 21, 22, 20, 3]);
    }

    #[test]
    fn filter_forces_matching_paths_open() {
        let mut graph = sectioned();
        graph.set_expanded(2, false);
        let filter = |node: &ItemNode<u32>| node.id() == 22;
        let built = materialize(&graph, &[10, 1, 2, 20, 3, 30], Some(&filter));
        assert_eq!(built.rows, vec![10, 2, 22]);
        assert_eq!(built.forced, vec![(2, true)]);
    }

    #[test]
    fn matching_parent_without_matching_children_stays_collapsed() {
        let graph = sectioned();
        let filter = |node: &ItemNode<u32>| node.id() == 2;
        let built = materialize(&graph, &[10, 1, 2, 20, 3, 30], Some(&filter));
        assert_eq!(built.rows, vec![10, 2]);
        assert_eq!(built.forced, vec![(2, false)]);
    }

    #[test]
    fn consistency_rejects_split_sections_and_runs() {
        let graph = sectioned();
        assert!(!projection_is_consistent(&graph, &[10, 1, 20, 2, 21, 22, 3]));
        assert!(!projection_is_consistent(&graph, &[10, 1, 2, 21, 3, 22]));
        assert!(!projection_is_consistent(&graph, &[10, 1, 1]));
    }

    #[test]
    fn subtree_and_section_bounds() {
        let graph = sectioned();
        let rows = vec![10, 1, 2, 21, 22, 20, 3];
        assert_eq!(subtree_end(&graph, &rows, 2), 5);
        assert_eq!(subtree_end(&graph, &rows, 1), 2);
        assert_eq!(section_end(&graph, &rows, 0), 5);
        assert_eq!(section_end(&graph, &rows, 5), 7);
    }

    #[test]
    fn transition_coalesces_runs() {
        let old = [1, 2, 3, 4, 5, 6];
        let new = [1, 4, 7, 8, 6];
        let events = transition(&old, &new).expect("orderable");
        assert_eq!(
            events,
            vec![
                ListChange::Removed {
                    position: 4,
                    count: 1
                },
                ListChange::Removed {
                    position: 1,
                    count: 2
                },
                ListChange::Inserted {
                    position: 2,
                    count: 2
                },
            ]
        );
    }

    #[test]
    fn transition_refuses_reordering() {
        assert_eq!(transition(&[1, 2], &[2, 1]), None);
    }
}
