use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::change::{ListChange, Payload};
use crate::error::{Error, Result};
use crate::graph::ItemNode;
use crate::item::{Item, ItemFlags, ItemId, ViewKind};
use crate::list::{Disposal, FlexList};
use crate::projection::{self, section_end, subtree_end};
use crate::targets;

/// Validated removal: disjoint ranges in descending order plus the side
/// effects that go with them.
#[derive(Clone, Debug)]
pub(crate) struct RemovalPlan<Id> {
    ranges: Vec<Range<usize>>,
    unlink: Vec<Id>,
    parents: Vec<Id>,
}

impl<Id> Default for RemovalPlan<Id> {
    fn default() -> Self {
        Self {
            ranges: Vec::new(),
            unlink: Vec::new(),
            parents: Vec::new(),
        }
    }
}

impl<Id> RemovalPlan<Id> {
    pub(crate) fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl<Id: ItemId> FlexList<Id> {
    /// Registers `item` and inserts it at `position`.
    ///
    /// A sectionable item whose header is not shown brings the header along,
    /// right before it; an expanded item brings its visible descendants.
    /// Returns the number of rows inserted.
    pub fn insert(&mut self, position: usize, item: Item<Id>) -> Result<usize> {
        self.insert_many(position, vec![item])
    }

    /// Registers `items` and inserts them, in order, starting at `position`.
    ///
    /// Fails with `InvalidPosition` if `position` is past the end, splits a
    /// section, or lands inside an expanded parent's child run.
    pub fn insert_many(&mut self, position: usize, items: Vec<Item<Id>>) -> Result<usize> {
        self.ensure_editable()?;
        let len = self.rows.len();
        if position > len {
            return Err(Error::invalid_position(position, len));
        }
        if items.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Id> = items.iter().map(Item::id).collect();
        self.graph_mut().register(items, None, None)?;
        let (block, forced) = self.plan_block(&ids);
        if !self.block_fits(position, &block) {
            let graph = self.graph_mut();
            for id in ids {
                graph.unregister(id);
            }
            return Err(Error::invalid_position(position, len));
        }

        self.revive_headers(&block);
        self.apply_forced(forced);
        self.splice_insert(position, &block);
        trace!(target: targets::EDIT, position, count = block.len(), "inserted");
        Ok(block.len())
    }

    /// Adds `items` as children of the expandable at `parent_position`,
    /// starting at index `sub_position` of its child order.
    ///
    /// They show up right away if the parent is expanded; otherwise the
    /// parent is expanded when `expand_parent` is set. Returns the number of
    /// rows inserted.
    pub fn add_sub_items(
        &mut self,
        parent_position: usize,
        sub_position: usize,
        items: Vec<Item<Id>>,
        expand_parent: bool,
    ) -> Result<usize> {
        self.ensure_editable()?;
        let parent = self.id_at(parent_position)?;
        if !self.graph.get(parent).is_some_and(ItemNode::is_expandable) {
            return Err(Error::NotExpandable {
                position: parent_position,
            });
        }
        if items.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Id> = items.iter().map(Item::id).collect();
        self.graph_mut().register(items, Some(parent), Some(sub_position))?;

        let inserted = if self.graph.get(parent).is_some_and(ItemNode::is_expanded) {
            let at = self.child_insert_position(parent_position, ids[0]);
            let visible: Vec<Id> = ids.into_iter().filter(|id| self.passes_filter(*id)).collect();
            let (block, forced) = self.plan_block(&visible);
            self.apply_forced(forced);
            self.splice_insert(at, &block);
            block.len() + self.place_child_header(parent, &block)
        } else if expand_parent {
            self.expand_at(parent_position, false)
        } else {
            0
        };

        if let Some(position) = self.position_of(parent) {
            self.changes.push(ListChange::Changed {
                position,
                payload: Some(Payload::AddSubItem),
            });
        }
        Ok(inserted)
    }

    /// Inserts `item` into the section of `header`, ordered by `cmp`.
    ///
    /// For an expandable header the item becomes one of its children.
    /// Returns the resulting position, if the item is visible.
    pub fn add_item_to_section(
        &mut self,
        item: Item<Id>,
        header: Id,
        mut cmp: impl FnMut(Id, Id) -> Ordering,
    ) -> Result<Option<usize>> {
        self.ensure_editable()?;
        let Some(node) = self.graph.get(header).filter(|n| n.is_header()) else {
            return Err(Error::unknown_item(header));
        };
        let item = item.section(header);
        let id = item.id();

        if node.is_expandable() {
            let index = node
                .children()
                .partition_point(|child| cmp(*child, id) != Ordering::Greater);
            match self.position_of(header) {
                Some(header_position) => {
                    self.add_sub_items(header_position, index, vec![item], false)?;
                }
                None => {
                    self.graph_mut().register(vec![item], Some(header), Some(index))?;
                }
            }
        } else {
            let position = self.calculate_position_for(&item, cmp);
            self.insert(position, item)?;
        }

        if let Some(position) = self.position_of(header) {
            self.changes.push(ListChange::Changed {
                position,
                payload: Some(Payload::Link),
            });
        }
        Ok(self.position_of(id))
    }

    /// Inserts a new section header among the existing headers, ordered by
    /// `cmp`. Returns its position.
    pub fn add_section(&mut self, header: Item<Id>, cmp: impl FnMut(Id, Id) -> Ordering) -> Result<usize> {
        let position = self.calculate_position_for(&header, cmp);
        self.insert(position, header)?;
        Ok(position)
    }

    /// Where `item` belongs given the comparator `cmp`, assuming the target
    /// slice is already sorted.
    ///
    /// Headers are placed among headers. Section items are placed among the
    /// top-level items of their section (or, with the header not shown, where
    /// their header would go). Other items are placed among top-level items.
    /// Equal items go after existing ones.
    pub fn calculate_position_for(&self, item: &Item<Id>, mut cmp: impl FnMut(Id, Id) -> Ordering) -> usize {
        let id = item.id();
        let len = self.rows.len();
        let header_slot = |key: Id, cmp: &mut dyn FnMut(Id, Id) -> Ordering| {
            let slots: Vec<usize> = (0..len)
                .filter(|&p| {
                    self.rows[p] != key && self.graph.get(self.rows[p]).is_some_and(ItemNode::is_header)
                })
                .collect();
            let index = slots.partition_point(|&p| cmp(self.rows[p], key) != Ordering::Greater);
            slots.get(index).copied().unwrap_or(len)
        };

        if item.is_header() {
            return header_slot(id, &mut cmp);
        }

        let (slots, fallback): (Vec<usize>, usize) = match item.section_id() {
            Some(header) => {
                let Some(header_position) = self.position_of(header) else {
                    return header_slot(header, &mut cmp);
                };
                let end = section_end(&self.graph, &self.rows, header_position);
                let slots = (header_position + 1..end)
                    .filter(|&p| {
                        self.rows[p] != id
                            && self.graph.get(self.rows[p]).is_some_and(|n| {
                                n.parent().is_none() && n.section() == Some(header)
                            })
                    })
                    .collect();
                (slots, subtree_end(&self.graph, &self.rows, header_position))
            }
            None => {
                let slots = (0..len)
                    .filter(|&p| {
                        self.rows[p] != id
                            && self.graph.get(self.rows[p]).is_some_and(|n| {
                                n.parent().is_none() && !n.is_header()
                            })
                    })
                    .collect();
                (slots, len)
            }
        };

        let index = slots.partition_point(|&p| cmp(self.rows[p], id) != Ordering::Greater);
        match slots.get(index) {
            Some(&position) => position,
            None => slots
                .last()
                .map_or(fallback, |&last| subtree_end(&self.graph, &self.rows, last)),
        }
    }

    /// Removes the row at `position` (with its visible descendants).
    /// Returns the number of rows removed.
    pub fn remove(&mut self, position: usize) -> Result<usize> {
        self.remove_many(&[position])
    }

    /// Removes `count` rows starting at `start`.
    pub fn remove_range(&mut self, start: usize, count: usize) -> Result<usize> {
        if count == 0 {
            return Ok(0);
        }
        let len = self.rows.len();
        let Some(end) = start.checked_add(count).filter(|end| *end <= len) else {
            return Err(Error::invalid_position(start.saturating_add(count - 1), len));
        };
        let positions: Vec<usize> = (start..end).collect();
        self.remove_many(&positions)
    }

    /// Removes the rows at `positions` in any order.
    ///
    /// Positions are grouped into contiguous runs and each run is removed as
    /// one ranged change, highest run first. Expanded parents take their
    /// visible descendants; a header whose section ends up empty goes too
    /// unless orphan headers are kept.
    pub fn remove_many(&mut self, positions: &[usize]) -> Result<usize> {
        self.ensure_editable()?;
        let plan = self.plan_removal(positions)?;
        Ok(self.apply_removal(&plan, Disposal::Drop).len())
    }

    /// Removes every row whose kind is in `kinds`.
    pub fn remove_items_of_kind(&mut self, kinds: &[ViewKind]) -> Result<usize> {
        let positions: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, id)| self.graph.get(**id).is_some_and(|n| kinds.contains(&n.kind())))
            .map(|(position, _)| position)
            .collect();
        self.remove_many(&positions)
    }

    /// Removes every selected row.
    pub fn remove_selected(&mut self) -> Result<usize> {
        let positions = self.selected_positions();
        self.remove_many(&positions)
    }

    /// `true` if [`move_item`](Self::move_item) would accept the move.
    pub fn should_move(&self, from: usize, to: usize) -> bool {
        let len = self.rows.len();
        if from >= len || to >= len {
            return false;
        }
        if from == to {
            return true;
        }
        let is_header = |p: usize| self.graph.get(self.rows[p]).is_some_and(ItemNode::is_header);
        if is_header(from) || is_header(to) {
            return false;
        }
        let end = subtree_end(&self.graph, &self.rows, from);
        let carried = end - from;
        if to + carried > len {
            return false;
        }

        let mut scratch = self.rows.clone();
        let block: Vec<Id> = scratch.drain(from..end).collect();
        scratch.splice(to..to, block);
        projection::rows_are_consistent(
            &self.graph,
            scratch.len(),
            |i| scratch[i],
            from.min(to),
            from.max(to) + carried,
        )
    }

    /// Moves the row at `from` so that it ends up at `to`, carrying its
    /// visible descendants.
    ///
    /// Rows in between shift by the size of the moved block. Moves that
    /// would break a section or a child run fail with `InvalidMove`.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<()> {
        self.ensure_editable()?;
        let len = self.rows.len();
        if from >= len {
            return Err(Error::invalid_position(from, len));
        }
        if to >= len {
            return Err(Error::invalid_position(to, len));
        }
        if from == to {
            return Ok(());
        }
        if !self.should_move(from, to) {
            return Err(Error::InvalidMove { from, to });
        }

        let id = self.rows[from];
        let carried = subtree_end(&self.graph, &self.rows, from) - from;
        if to < from {
            for offset in 0..carried {
                self.splice_move(from + offset, to + offset);
            }
        } else {
            for _ in 0..carried {
                self.splice_move(from, to + carried - 1);
            }
        }
        self.sync_child_order(id);
        trace!(target: targets::EDIT, from, to, carried, "moved");
        Ok(())
    }

    /// Swaps two rows without descendants. Reported as one move for
    /// neighbours and two moves otherwise.
    pub fn swap(&mut self, a: usize, b: usize) -> Result<()> {
        self.ensure_editable()?;
        let len = self.rows.len();
        for position in [a, b] {
            if position >= len {
                return Err(Error::invalid_position(position, len));
            }
        }
        if a == b {
            return Ok(());
        }
        let (lo, hi) = (a.min(b), a.max(b));
        let movable = |p: usize| {
            self.graph.get(self.rows[p]).is_some_and(|n| !n.is_header())
                && subtree_end(&self.graph, &self.rows, p) == p + 1
        };
        if !movable(lo) || !movable(hi) {
            return Err(Error::InvalidMove { from: a, to: b });
        }
        let mut scratch = self.rows.clone();
        scratch.swap(lo, hi);
        if !projection::rows_are_consistent(&self.graph, len, |i| scratch[i], lo, hi + 1) {
            return Err(Error::InvalidMove { from: a, to: b });
        }

        let (first, second) = (self.rows[lo], self.rows[hi]);
        self.rows.swap(lo, hi);
        self.selection.on_swapped(lo, hi);
        if let Some(active) = self.filter.as_mut() {
            active.record_swap(first, second);
        }
        if let Some(parent) = self.graph.get(first).and_then(ItemNode::parent) {
            self.graph_mut().swap_children(parent, first, second);
        }
        self.bump();
        self.changes.push(ListChange::Moved { from: lo, to: hi });
        if hi - lo > 1 {
            self.changes.push(ListChange::Moved { from: hi - 1, to: lo });
        }
        Ok(())
    }

    /// Notifies that the row at `position` changed.
    pub fn update_item(&mut self, position: usize, payload: Option<Payload>) -> Result<()> {
        self.id_at(position)?;
        self.changes.push(ListChange::Changed { position, payload });
        Ok(())
    }

    /// Replaces the capability flags of the item at `position`.
    ///
    /// `hidden` is consulted when rows are materialized; it does not remove a
    /// row already shown.
    pub fn set_flags(&mut self, position: usize, flags: ItemFlags) -> Result<()> {
        let id = self.id_at(position)?;
        self.graph_mut().set_flags(id, flags);
        if !flags.selectable && self.selection.remove(position) {
            self.notify_selection(&[position]);
        }
        self.bump();
        self.changes.push(ListChange::Changed {
            position,
            payload: Some(Payload::Change),
        });
        Ok(())
    }

    /// Rows to insert for the top-level or sibling items `ids`: a missing
    /// header, the item, and its visible descendants (filtered when a filter
    /// is applied). Also returns the expansion flags a filter forces.
    pub(crate) fn plan_block(&self, ids: &[Id]) -> (Vec<Id>, Vec<(Id, bool)>) {
        let mut block = Vec::with_capacity(ids.len());
        let mut forced = Vec::new();
        let mut memo = FxHashMap::default();
        for &id in ids {
            let Some(node) = self.graph.get(id) else {
                continue;
            };
            if !node.is_materializable() {
                continue;
            }
            let is_top_level = node.parent().is_none();
            let mut subtree = Vec::new();
            match &self.filter {
                Some(active) => projection::push_filtered_subtree(
                    &self.graph,
                    id,
                    active.predicate.get(),
                    &mut memo,
                    &mut subtree,
                    &mut forced,
                ),
                None => projection::push_expanded_subtree(&self.graph, id, &mut subtree),
            }
            if is_top_level
                && let Some(header) = projection::leading_header(&self.graph, id, &subtree, |h| {
                    !block.contains(&h) && self.is_placeable_header(h)
                })
            {
                block.push(header);
            }
            block.push(id);
            block.extend(subtree);
        }
        (block, forced)
    }

    /// A registered, non-hidden header missing from the rows. Headers parked
    /// in the undo bin count as missing.
    fn is_placeable_header(&self, header: Id) -> bool {
        !self.rows.contains(&header)
            && self
                .graph
                .get(header)
                .is_some_and(|h| h.is_header() && !h.flags().hidden)
    }

    /// Puts back the header a freshly materialized child `block` links to
    /// when the top-level root above `anchor` has no section of its own.
    /// Returns the number of rows inserted.
    pub(crate) fn place_child_header(&mut self, anchor: Id, block: &[Id]) -> usize {
        let root = self.graph.root_of(anchor);
        if self.graph.get(root).and_then(ItemNode::section).is_some() {
            return 0;
        }
        let Some(header) =
            projection::leading_header(&self.graph, root, block, |h| self.is_placeable_header(h))
        else {
            return 0;
        };
        let Some(root_position) = self.position_of(root) else {
            return 0;
        };
        self.revive_headers(&[header]);
        self.splice_insert(root_position, &[header]);
        1
    }

    /// Whether inserting `block` at `position` keeps the projection
    /// consistent.
    pub(crate) fn block_fits(&self, position: usize, block: &[Id]) -> bool {
        let rows = &self.rows;
        let count = block.len();
        let row = |i: usize| {
            if i < position {
                rows[i]
            } else if i < position + count {
                block[i - position]
            } else {
                rows[i - count]
            }
        };
        projection::rows_are_consistent(&self.graph, rows.len() + count, row, position, position + count)
    }

    pub(crate) fn apply_forced(&mut self, forced: Vec<(Id, bool)>) {
        if forced.is_empty() {
            return;
        }
        let graph = Arc::make_mut(&mut self.graph);
        for (id, expanded) in forced {
            if let Some(before) = graph.set_expanded(id, expanded)
                && let Some(active) = self.filter.as_mut()
            {
                active.note_expansion(id, before);
            }
        }
    }

    /// Headers parked in the undo bin come back when a new item needs them.
    pub(crate) fn revive_headers(&mut self, block: &[Id]) {
        let parked: Vec<Id> = block
            .iter()
            .copied()
            .filter(|id| self.graph.get(*id).is_some_and(ItemNode::is_pending_delete))
            .collect();
        for id in parked {
            self.bin.forget(id);
            self.graph_mut().set_pending(id, false);
        }
    }

    /// End of the section of `id`'s header, or the end of the list.
    pub(crate) fn fallback_position(&self, id: Id) -> usize {
        self.graph
            .get(id)
            .and_then(ItemNode::section)
            .and_then(|header| self.position_of(header))
            .map_or(self.rows.len(), |header_position| {
                section_end(&self.graph, &self.rows, header_position)
            })
    }

    /// Position for `child` inside the visible run of the parent at
    /// `parent_position`, honouring the parent's child order.
    pub(crate) fn child_insert_position(&self, parent_position: usize, child: Id) -> usize {
        let parent = self.rows[parent_position];
        let siblings = self.graph.get(parent).map(ItemNode::children).unwrap_or_default();
        let Some(target) = siblings.iter().position(|c| *c == child) else {
            return subtree_end(&self.graph, &self.rows, parent_position);
        };
        let mut position = parent_position + 1;
        while position < self.rows.len() && self.graph.is_ancestor(parent, self.rows[position]) {
            let row = self.rows[position];
            let is_later_sibling = self.graph.get(row).and_then(ItemNode::parent) == Some(parent)
                && siblings.iter().position(|c| *c == row).is_some_and(|index| index > target);
            if is_later_sibling {
                return position;
            }
            position += 1;
        }
        position
    }

    /// Re-derives the child order of `id`'s parent after `id` was moved.
    fn sync_child_order(&mut self, id: Id) {
        let Some(parent) = self.graph.get(id).and_then(ItemNode::parent) else {
            return;
        };
        let Some(position) = self.position_of(id) else {
            return;
        };
        let after = subtree_end(&self.graph, &self.rows, position);
        let before = self
            .rows
            .get(after)
            .copied()
            .filter(|next| self.graph.get(*next).and_then(ItemNode::parent) == Some(parent));
        self.graph_mut().reorder_child(parent, id, before);
    }

    /// Validates `positions` and expands them into ranged removals.
    pub(crate) fn plan_removal(&self, positions: &[usize]) -> Result<RemovalPlan<Id>> {
        let len = self.rows.len();
        let mut marked = BTreeSet::new();
        for &position in positions {
            if position >= len {
                return Err(Error::invalid_position(position, len));
            }
            marked.insert(position);
        }
        if marked.is_empty() {
            return Ok(RemovalPlan::default());
        }

        let heads: Vec<usize> = marked.iter().copied().collect();
        for position in heads {
            marked.extend(position + 1..subtree_end(&self.graph, &self.rows, position));
        }

        let section_of = |p: usize| self.graph.get(self.rows[p]).and_then(ItemNode::section);
        let mut unlink = Vec::new();
        for &position in &marked {
            let header = self.rows[position];
            if !self.graph.get(header).is_some_and(ItemNode::is_header) {
                continue;
            }
            let end = section_end(&self.graph, &self.rows, position);
            let survivors: Vec<Id> = (position + 1..end)
                .filter(|p| !marked.contains(p) && section_of(*p) == Some(header))
                .map(|p| self.rows[p])
                .collect();
            if survivors.is_empty() {
                continue;
            }
            if !self.config.unlink_on_remove_header {
                return Err(Error::invalid_position(position, len));
            }
            unlink.extend(survivors);
        }

        if !self.config.keep_orphan_headers {
            let mut candidates = BTreeSet::new();
            for &position in &marked {
                let Some(header) = section_of(position) else {
                    continue;
                };
                let Some(header_position) = self.rows[..position].iter().rposition(|id| *id == header)
                else {
                    continue;
                };
                if !marked.contains(&header_position)
                    && self.graph.get(header).is_some_and(ItemNode::is_plain_header)
                {
                    candidates.insert(header_position);
                }
            }
            for header_position in candidates {
                let header = self.rows[header_position];
                let end = section_end(&self.graph, &self.rows, header_position);
                let remaining = (header_position + 1..end)
                    .any(|p| !marked.contains(&p) && section_of(p) == Some(header));
                if !remaining {
                    marked.insert(header_position);
                }
            }
        }

        let removed_ids: FxHashSet<Id> = marked.iter().map(|p| self.rows[*p]).collect();
        let mut parents: Vec<Id> = Vec::new();
        for id in &removed_ids {
            if let Some(parent) = self.graph.get(*id).and_then(ItemNode::parent)
                && !removed_ids.contains(&parent)
                && !parents.contains(&parent)
            {
                parents.push(parent);
            }
        }

        Ok(RemovalPlan {
            ranges: descending_runs(&marked),
            unlink,
            parents,
        })
    }

    /// Executes a plan from [`plan_removal`](Self::plan_removal). Returns the
    /// removed ids.
    pub(crate) fn apply_removal(&mut self, plan: &RemovalPlan<Id>, disposal: Disposal) -> Vec<Id> {
        let mut removed = Vec::new();
        for range in &plan.ranges {
            removed.extend(self.splice_remove(range.clone(), disposal));
        }

        if !plan.unlink.is_empty() {
            let graph = self.graph_mut();
            for id in &plan.unlink {
                graph.set_section(*id, None);
            }
            for id in &plan.unlink {
                if let Some(position) = self.position_of(*id) {
                    self.changes.push(ListChange::Changed {
                        position,
                        payload: Some(Payload::Unlink),
                    });
                }
            }
        }

        if disposal == Disposal::Drop {
            let graph = self.graph_mut();
            for id in &removed {
                if !graph.get(*id).is_some_and(ItemNode::is_header) {
                    graph.unregister(*id);
                }
            }
            self.bin.retain_registered(&self.graph);
        }

        for parent in &plan.parents {
            if let Some(position) = self.position_of(*parent) {
                self.changes.push(ListChange::Changed {
                    position,
                    payload: Some(Payload::RemSubItem),
                });
            }
        }
        trace!(
            target: targets::EDIT,
            runs = plan.ranges.len(),
            removed = removed.len(),
            "removed"
        );
        removed
    }
}

/// Groups positions into contiguous ranges, highest first.
fn descending_runs(positions: &BTreeSet<usize>) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut iter = positions.iter().rev().copied();
    let Some(first) = iter.next() else {
        return runs;
    };
    let (mut start, mut end) = (first, first + 1);
    for position in iter {
        if position + 1 == start {
            start = position;
        } else {
            runs.push(start..end);
            start = position;
            end = position + 1;
        }
    }
    runs.push(start..end);
    runs
}
