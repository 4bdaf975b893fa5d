use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::filter::ItemFilter;
use crate::item::{Item, ItemFlags, ItemId, ViewKind};

/// Expansion state of an expandable node.
#[derive(Clone, Debug)]
pub(crate) struct Expansion<Id> {
    pub(crate) children: Vec<Id>,
    pub(crate) expanded: bool,
    pub(crate) level: u16,
}

/// Registered item metadata.
///
/// This is what filter predicates and renderers see; the engine owns the
/// node and hands out shared references only.
#[derive(Clone, Debug)]
pub struct ItemNode<Id> {
    id: Id,
    kind: ViewKind,
    flags: ItemFlags,
    is_header: bool,
    sticky: bool,
    section: Option<Id>,
    parent: Option<Id>,
    expansion: Option<Expansion<Id>>,
    pending: bool,
}

impl<Id: ItemId> ItemNode<Id> {
    pub const fn id(&self) -> Id {
        self.id
    }

    pub const fn kind(&self) -> ViewKind {
        self.kind
    }

    pub const fn flags(&self) -> ItemFlags {
        self.flags
    }

    pub const fn is_header(&self) -> bool {
        self.is_header
    }

    pub const fn is_sticky(&self) -> bool {
        self.sticky
    }

    /// Header owning the section this item belongs to.
    pub const fn section(&self) -> Option<Id> {
        self.section
    }

    /// Owning expandable, `None` for top-level items.
    pub const fn parent(&self) -> Option<Id> {
        self.parent
    }

    pub const fn is_expandable(&self) -> bool {
        self.expansion.is_some()
    }

    pub fn is_expanded(&self) -> bool {
        self.expansion.as_ref().is_some_and(|e| e.expanded)
    }

    pub fn expansion_level(&self) -> Option<u16> {
        self.expansion.as_ref().map(|e| e.level)
    }

    /// Children in their registered order, including pending and hidden ones.
    pub fn children(&self) -> &[Id] {
        self.expansion.as_ref().map_or(&[], |e| e.children.as_slice())
    }

    pub const fn is_selectable(&self) -> bool {
        self.flags.selectable && self.flags.enabled
    }

    /// `true` while the item sits in the undo bin.
    pub const fn is_pending_delete(&self) -> bool {
        self.pending
    }

    /// Headers that are not also expandable: pure section boundaries.
    pub(crate) const fn is_plain_header(&self) -> bool {
        self.is_header && self.expansion.is_none()
    }

    pub(crate) const fn is_materializable(&self) -> bool {
        !self.pending && !self.flags.hidden
    }
}

/// Identity-keyed store of every registered item.
///
/// Mutation happens through `Arc::make_mut` on the owning list, so a filter
/// job holding an older snapshot keeps reading a consistent graph.
#[derive(Clone, Debug)]
pub struct ItemGraph<Id> {
    nodes: FxHashMap<Id, ItemNode<Id>>,
}

impl<Id: ItemId> Default for ItemGraph<Id> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: ItemId> ItemGraph<Id> {
    pub fn new() -> Self {
        Self {
            nodes: FxHashMap::default(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: FxHashMap::with_capacity_and_hasher(capacity, FxBuildHasher),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: Id) -> Option<&ItemNode<Id>> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: Id) -> bool {
        self.nodes.contains_key(&id)
    }

    pub(crate) fn get_mut(&mut self, id: Id) -> Option<&mut ItemNode<Id>> {
        self.nodes.get_mut(&id)
    }

    /// Returns `true` if `ancestor` is a strict ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: Id, id: Id) -> bool {
        let mut cursor = self.get(id).and_then(ItemNode::parent);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.get(current).and_then(ItemNode::parent);
        }
        false
    }

    /// Number of ancestors above `id`.
    pub fn depth(&self, id: Id) -> u16 {
        let mut depth = 0u16;
        let mut cursor = self.get(id).and_then(ItemNode::parent);
        while let Some(current) = cursor {
            depth = depth.saturating_add(1);
            cursor = self.get(current).and_then(ItemNode::parent);
        }
        depth
    }

    /// Top-level ancestor of `id` (or `id` itself).
    pub fn root_of(&self, id: Id) -> Id {
        let mut root = id;
        while let Some(parent) = self.get(root).and_then(ItemNode::parent) {
            root = parent;
        }
        root
    }

    /// Children eligible for materialization: not pending, not hidden.
    pub fn visible_children(&self, id: Id) -> impl DoubleEndedIterator<Item = Id> + '_ {
        self.get(id)
            .map(ItemNode::children)
            .unwrap_or_default()
            .iter()
            .copied()
            .filter(|child| self.get(*child).is_some_and(ItemNode::is_materializable))
    }

    pub(crate) fn is_visible_header(&self, id: Id) -> bool {
        self.get(id)
            .is_some_and(|node| node.is_header && node.is_materializable())
    }

    /// Sets the expansion flag and returns the previous value.
    pub(crate) fn set_expanded(&mut self, id: Id, expanded: bool) -> Option<bool> {
        let expansion = self.get_mut(id)?.expansion.as_mut()?;
        Some(std::mem::replace(&mut expansion.expanded, expanded))
    }

    pub(crate) fn set_pending(&mut self, id: Id, pending: bool) {
        if let Some(node) = self.get_mut(id) {
            node.pending = pending;
        }
    }

    pub(crate) fn set_flags(&mut self, id: Id, flags: ItemFlags) {
        if let Some(node) = self.get_mut(id) {
            node.flags = flags;
        }
    }

    pub(crate) fn set_section(&mut self, id: Id, section: Option<Id>) {
        if let Some(node) = self.get_mut(id) {
            node.section = section;
        }
    }

    /// Moves `child` inside its parent's child order so that it lands right
    /// before `before` (or last when `before` is `None`).
    pub(crate) fn reorder_child(&mut self, parent: Id, child: Id, before: Option<Id>) {
        let Some(expansion) = self.get_mut(parent).and_then(|n| n.expansion.as_mut()) else {
            return;
        };
        expansion.children.retain(|c| *c != child);
        let index = before
            .and_then(|b| expansion.children.iter().position(|c| *c == b))
            .unwrap_or(expansion.children.len());
        expansion.children.insert(index, child);
    }

    pub(crate) fn swap_children(&mut self, parent: Id, a: Id, b: Id) {
        let Some(expansion) = self.get_mut(parent).and_then(|n| n.expansion.as_mut()) else {
            return;
        };
        let children = &mut expansion.children;
        if let (Some(i), Some(j)) = (
            children.iter().position(|c| *c == a),
            children.iter().position(|c| *c == b),
        ) {
            children.swap(i, j);
        }
    }

    /// Registers `items` (and their children) atomically.
    ///
    /// Children of `parent` are inserted at `index` (clamped) in the parent's
    /// child order. Returns the ids registered, parents before children.
    pub(crate) fn register(
        &mut self,
        items: Vec<Item<Id>>,
        parent: Option<Id>,
        index: Option<usize>,
    ) -> Result<Vec<Id>> {
        self.check_registrable(&items, parent)?;

        let parent_level = parent
            .and_then(|p| self.get(p))
            .and_then(ItemNode::expansion_level);
        let parent_header = parent.filter(|p| self.get(*p).is_some_and(ItemNode::is_header));
        let top_ids: Vec<Id> = items.iter().map(|item| item.id).collect();

        let mut registered = Vec::with_capacity(items.len());
        let mut stack: Vec<(Item<Id>, Option<Id>, Option<u16>, Option<Id>)> = items
            .into_iter()
            .rev()
            .map(|item| (item, parent, parent_level, parent_header))
            .collect();

        while let Some((item, parent, parent_level, inherited_section)) = stack.pop() {
            let Item {
                id,
                kind,
                flags,
                is_header,
                sticky,
                section,
                expansion,
            } = item;

            let expansion = expansion.map(|descriptor| {
                let level = descriptor
                    .level
                    .unwrap_or_else(|| parent_level.map_or(0, |l| l.saturating_add(1)));
                let children: Vec<Id> = descriptor.children.iter().map(|c| c.id).collect();
                let child_section = if is_header { Some(id) } else { None };
                for child in descriptor.children.into_iter().rev() {
                    stack.push((child, Some(id), Some(level), child_section));
                }
                Expansion {
                    children,
                    expanded: descriptor.expanded,
                    level,
                }
            });

            self.nodes.insert(
                id,
                ItemNode {
                    id,
                    kind,
                    flags,
                    is_header,
                    sticky,
                    section: section.or(inherited_section),
                    parent,
                    expansion,
                    pending: false,
                },
            );
            registered.push(id);
        }

        if let Some(parent) = parent
            && let Some(expansion) = self.get_mut(parent).and_then(|n| n.expansion.as_mut())
        {
            let at = index
                .unwrap_or(expansion.children.len())
                .min(expansion.children.len());
            expansion.children.splice(at..at, top_ids);
        }

        Ok(registered)
    }

    fn check_registrable(&self, items: &[Item<Id>], parent: Option<Id>) -> Result<()> {
        if let Some(parent) = parent {
            match self.get(parent) {
                None => return Err(Error::unknown_item(parent)),
                Some(node) if !node.is_expandable() => {
                    return Err(Error::unknown_item(parent));
                }
                Some(_) => {}
            }
        }

        let mut seen = FxHashSet::default();
        let mut stack: SmallVec<[&Item<Id>; 16]> = items.iter().collect();
        let mut headers_here = FxHashSet::default();
        while let Some(item) = stack.pop() {
            if self.contains(item.id) || !seen.insert(item.id) {
                return Err(Error::duplicate_item(item.id));
            }
            if item.is_header {
                headers_here.insert(item.id);
            }
            if let Some(expansion) = &item.expansion {
                stack.extend(expansion.children.iter());
            }
        }

        let mut stack: SmallVec<[&Item<Id>; 16]> = items.iter().collect();
        while let Some(item) = stack.pop() {
            if let Some(section) = item.section {
                let known = headers_here.contains(&section)
                    || self.get(section).is_some_and(ItemNode::is_header);
                if !known {
                    return Err(Error::unknown_item(section));
                }
            }
            if let Some(expansion) = &item.expansion {
                stack.extend(expansion.children.iter());
            }
        }
        Ok(())
    }

    /// Removes `id` and its descendants, detaching it from its parent.
    /// Returns the removed ids.
    pub(crate) fn unregister(&mut self, id: Id) -> Vec<Id> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        if let Some(parent) = node.parent
            && let Some(expansion) = self.get_mut(parent).and_then(|n| n.expansion.as_mut())
        {
            expansion.children.retain(|c| *c != id);
        }

        let mut removed = Vec::new();
        let mut stack: SmallVec<[Id; 16]> = SmallVec::new();
        stack.push(id);
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                if let Some(expansion) = node.expansion {
                    stack.extend(expansion.children);
                }
                removed.push(current);
            }
        }
        removed
    }

    /// Whether `id` or any materializable descendant matches `filter`.
    ///
    /// Results are memoized in `memo` so repeated checks over siblings stay
    /// linear in the size of the graph.
    pub(crate) fn subtree_matches(
        &self,
        id: Id,
        filter: &dyn ItemFilter<Id>,
        memo: &mut FxHashMap<Id, bool>,
    ) -> bool {
        if let Some(known) = memo.get(&id) {
            return *known;
        }

        // Post-order walk: each node is visited once to schedule children
        // and once more to fold their results.
        let mut stack: Vec<(Id, bool)> = vec![(id, false)];
        while let Some((current, folded)) = stack.pop() {
            if memo.contains_key(&current) {
                continue;
            }
            let Some(node) = self.get(current) else {
                memo.insert(current, false);
                continue;
            };
            if !node.is_materializable() {
                memo.insert(current, false);
                continue;
            }
            if folded {
                let matched = filter.is_match(node)
                    || node
                        .children()
                        .iter()
                        .any(|child| memo.get(child).copied().unwrap_or(false));
                memo.insert(current, matched);
            } else {
                stack.push((current, true));
                for child in node.children() {
                    if !memo.contains_key(child) {
                        stack.push((*child, false));
                    }
                }
            }
        }
        memo.get(&id).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ItemGraph<u32> {
        let mut graph = ItemGraph::new();
        graph
            .register(
                vec![
                    Item::header(1),
                    Item::new(2)
                        .section(1)
                        .children([Item::new(3), Item::new(4).children([Item::new(5)])]),
                ],
                None,
                None,
            )
            .expect("register");
        graph
    }

    #[test]
    fn register_links_parents_and_levels() {
        let graph = sample();
        assert_eq!(graph.len(), 5);
        assert_eq!(graph.get(3).and_then(ItemNode::parent), Some(2));
        assert_eq!(graph.get(2).and_then(ItemNode::expansion_level), Some(0));
        assert_eq!(graph.get(4).and_then(ItemNode::expansion_level), Some(1));
        assert!(graph.is_ancestor(2, 5));
        assert!(!graph.is_ancestor(3, 5));
        assert_eq!(graph.depth(5), 2);
        assert_eq!(graph.root_of(5), 2);
    }

    #[test]
    fn register_rejects_duplicates_atomically() {
        let mut graph = sample();
        let err = graph
            .register(vec![Item::new(9), Item::new(3)], None, None)
            .unwrap_err();
        assert_eq!(err, Error::duplicate_item(3u32));
        assert!(!graph.contains(9));
    }

    #[test]
    fn register_rejects_unknown_section() {
        let mut graph = sample();
        let err = graph
            .register(vec![Item::new(9).section(77)], None, None)
            .unwrap_err();
        assert_eq!(err, Error::unknown_item(77u32));
    }

    #[test]
    fn children_register_at_index() {
        let mut graph = sample();
        graph
            .register(vec![Item::new(6)], Some(2), Some(1))
            .expect("register child");
        assert_eq!(graph.get(2).map(ItemNode::children), Some(&[3, 6, 4][..]));
    }

    #[test]
    fn unregister_drops_subtree() {
        let mut graph = sample();
        let mut removed = graph.unregister(4);
        removed.sort_unstable();
        assert_eq!(removed, vec![4, 5]);
        assert_eq!(graph.get(2).map(ItemNode::children), Some(&[3][..]));
    }

    #[test]
    fn subtree_match_sees_descendants() {
        let graph = sample();
        let filter = |node: &ItemNode<u32>| node.id() == 5;
        let mut memo = FxHashMap::default();
        assert!(graph.subtree_matches(2, &filter, &mut memo));
        assert!(!graph.subtree_matches(3, &filter, &mut memo));
    }

    #[test]
    fn pending_children_are_not_visible() {
        let mut graph = sample();
        graph.set_pending(3, true);
        let visible: Vec<_> = graph.visible_children(2).collect();
        assert_eq!(visible, vec![4]);
    }
}
