use std::collections::BTreeSet;

use tracing::trace;

use crate::change::{ListChange, Payload};
use crate::error::{Error, Result};
use crate::graph::ItemNode;
use crate::item::{ItemId, ViewKind};
use crate::list::FlexList;
use crate::targets;

/// How many rows may be selected at once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SelectionMode {
    /// Toggling does nothing.
    #[default]
    Idle,
    Single,
    Multi,
}

/// Positions currently selected.
///
/// Positions are kept in step with every structural edit, so a selected item
/// stays selected while rows around it come and go.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    mode: SelectionMode,
    positions: BTreeSet<usize>,
}

impl Selection {
    pub const fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn is_selected(&self, position: usize) -> bool {
        self.positions.contains(&position)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Selected positions in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.positions.iter().copied()
    }

    /// Switches mode; any transition clears the selection. Returns the
    /// positions that were deselected.
    pub(crate) fn set_mode(&mut self, mode: SelectionMode) -> Vec<usize> {
        if self.mode == mode {
            return Vec::new();
        }
        self.mode = mode;
        self.clear()
    }

    pub(crate) fn insert(&mut self, position: usize) -> bool {
        self.positions.insert(position)
    }

    pub(crate) fn remove(&mut self, position: usize) -> bool {
        self.positions.remove(&position)
    }

    pub(crate) fn clear(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.positions).into_iter().collect()
    }

    pub(crate) fn reset(&mut self, positions: impl IntoIterator<Item = usize>) {
        self.positions = positions.into_iter().collect();
    }

    pub(crate) fn on_inserted(&mut self, position: usize, count: usize) {
        if count == 0 || self.positions.range(position..).next().is_none() {
            return;
        }
        self.positions = self
            .positions
            .iter()
            .map(|&p| if p >= position { p + count } else { p })
            .collect();
    }

    pub(crate) fn on_removed(&mut self, start: usize, count: usize) {
        if count == 0 || self.positions.range(start..).next().is_none() {
            return;
        }
        let end = start + count;
        self.positions = self
            .positions
            .iter()
            .filter(|&&p| p < start || p >= end)
            .map(|&p| if p >= end { p - count } else { p })
            .collect();
    }

    pub(crate) fn on_moved(&mut self, from: usize, to: usize) {
        if from == to {
            return;
        }
        self.positions = self
            .positions
            .iter()
            .map(|&p| {
                if p == from {
                    to
                } else if from < to && p > from && p <= to {
                    p - 1
                } else if to < from && p >= to && p < from {
                    p + 1
                } else {
                    p
                }
            })
            .collect();
    }

    pub(crate) fn on_swapped(&mut self, a: usize, b: usize) {
        let has_a = self.positions.remove(&a);
        let has_b = self.positions.remove(&b);
        if has_a {
            self.positions.insert(b);
        }
        if has_b {
            self.positions.insert(a);
        }
    }
}

impl<Id: ItemId> FlexList<Id> {
    pub const fn selection(&self) -> &Selection {
        &self.selection
    }

    pub const fn selection_mode(&self) -> SelectionMode {
        self.selection.mode()
    }

    /// Changes the selection mode. Any transition clears the selection.
    pub fn set_selection_mode(&mut self, mode: SelectionMode) {
        let cleared = self.selection.set_mode(mode);
        self.notify_selection(&cleared);
    }

    pub fn is_selected(&self, position: usize) -> bool {
        self.selection.is_selected(position)
    }

    pub fn selected_positions(&self) -> Vec<usize> {
        self.selection.iter().collect()
    }

    pub fn selected_ids(&self) -> Vec<Id> {
        self.selection
            .iter()
            .filter_map(|p| self.rows.get(p).copied())
            .collect()
    }

    pub fn selected_count(&self) -> usize {
        self.selection.len()
    }

    /// Toggles the row at `position`. Returns the new membership.
    ///
    /// Idle mode and non-selectable items leave the selection untouched and
    /// return `false`. In single mode any other selected row is deselected.
    pub fn toggle_selection(&mut self, position: usize) -> Result<bool> {
        let id = self.id_at(position)?;
        if self.selection.mode() == SelectionMode::Idle || !self.is_item_selectable(id) {
            return Ok(false);
        }

        if self.selection.remove(position) {
            self.notify_selection(&[position]);
            return Ok(false);
        }

        if self.selection.mode() == SelectionMode::Single {
            let cleared = self.selection.clear();
            self.notify_selection(&cleared);
        }
        self.selection.insert(position);
        self.notify_selection(&[position]);
        trace!(target: targets::SELECTION, position, "selected");
        Ok(true)
    }

    /// Selects every selectable row, restricted to `kinds` when not empty.
    /// Returns how many rows were newly selected. Only multi mode selects.
    pub fn select_all(&mut self, kinds: &[ViewKind]) -> usize {
        if self.selection.mode() != SelectionMode::Multi {
            return 0;
        }
        let candidates: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, id)| {
                self.graph.get(**id).is_some_and(|node| {
                    node.is_selectable() && (kinds.is_empty() || kinds.contains(&node.kind()))
                })
            })
            .map(|(position, _)| position)
            .filter(|position| !self.selection.is_selected(*position))
            .collect();
        for &position in &candidates {
            self.selection.insert(position);
        }
        self.notify_selection(&candidates);
        candidates.len()
    }

    /// Deselects everything. Returns how many rows were deselected.
    pub fn clear_selection(&mut self) -> usize {
        let cleared = self.selection.clear();
        self.notify_selection(&cleared);
        cleared.len()
    }

    fn is_item_selectable(&self, id: Id) -> bool {
        self.graph.get(id).is_some_and(ItemNode::is_selectable)
    }

    pub(crate) fn notify_selection(&mut self, positions: &[usize]) {
        self.changes
            .extend(positions.iter().map(|&position| ListChange::Changed {
                position,
                payload: Some(Payload::Selection),
            }));
    }

    pub(crate) fn id_at(&self, position: usize) -> Result<Id> {
        self.rows
            .get(position)
            .copied()
            .ok_or_else(|| Error::invalid_position(position, self.rows.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlexListConfig;
    use crate::item::Item;
    use pretty_assertions::assert_eq;

    fn selection(positions: &[usize]) -> Selection {
        let mut selection = Selection {
            mode: SelectionMode::Multi,
            positions: BTreeSet::new(),
        };
        selection.reset(positions.iter().copied());
        selection
    }

    fn positions(selection: &Selection) -> Vec<usize> {
        selection.iter().collect()
    }

    #[test]
    fn insert_shifts_at_and_after() {
        let mut s = selection(&[1, 4, 6]);
        s.on_inserted(4, 2);
        assert_eq!(positions(&s), vec![1, 6, 8]);
    }

    #[test]
    fn remove_evicts_and_shifts() {
        let mut s = selection(&[1, 4, 6]);
        s.on_removed(3, 2);
        assert_eq!(positions(&s), vec![1, 4]);
    }

    #[test]
    fn move_follows_the_item() {
        let mut s = selection(&[1, 3]);
        s.on_moved(1, 4);
        assert_eq!(positions(&s), vec![2, 4]);
        s.on_moved(4, 0);
        assert_eq!(positions(&s), vec![0, 3]);
    }

    #[test]
    fn swap_exchanges_membership() {
        let mut s = selection(&[2]);
        s.on_swapped(2, 5);
        assert_eq!(positions(&s), vec![5]);
    }

    fn kinded() -> FlexList<u32> {
        FlexList::with_items(
            vec![
                Item::header(100),
                Item::new(1).section(100).kind(ViewKind(1)),
                Item::new(2).section(100).kind(ViewKind(2)),
                Item::new(3).section(100).kind(ViewKind(1)).selectable(false),
                Item::new(4).section(100).kind(ViewKind(1)),
            ],
            FlexListConfig::default(),
        )
        .expect("data set")
    }

    #[test]
    fn select_all_skips_headers_and_unselectable_rows() {
        let mut list = kinded();
        list.set_selection_mode(SelectionMode::Multi);
        assert_eq!(list.select_all(&[]), 3);
        assert_eq!(list.selected_ids(), vec![1, 2, 4]);
        assert_eq!(list.select_all(&[]), 0);
    }

    #[test]
    fn select_all_honours_kinds() {
        let mut list = kinded();
        list.set_selection_mode(SelectionMode::Multi);
        assert_eq!(list.select_all(&[ViewKind(1)]), 2);
        assert_eq!(list.selected_positions(), vec![1, 4]);
    }

    #[test]
    fn select_all_needs_multi_mode() {
        let mut list = kinded();
        list.set_selection_mode(SelectionMode::Single);
        assert_eq!(list.select_all(&[]), 0);
        assert_eq!(list.selected_count(), 0);
    }

    #[test]
    fn single_mode_keeps_one_row() {
        let mut list = kinded();
        list.set_selection_mode(SelectionMode::Single);
        assert_eq!(list.toggle_selection(1), Ok(true));
        assert_eq!(list.toggle_selection(2), Ok(true));
        assert_eq!(list.selected_positions(), vec![2]);
        assert_eq!(list.toggle_selection(2), Ok(false));
        assert_eq!(list.selected_count(), 0);
    }

    #[test]
    fn idle_mode_ignores_toggles() {
        let mut list = kinded();
        list.take_changes();
        assert_eq!(list.toggle_selection(1), Ok(false));
        assert_eq!(list.selected_count(), 0);
        assert!(list.take_changes().is_empty());
        assert_eq!(
            list.toggle_selection(9),
            Err(Error::invalid_position(9, 5))
        );
    }

    #[test]
    fn headers_are_not_selectable() {
        let mut list = kinded();
        list.set_selection_mode(SelectionMode::Multi);
        assert_eq!(list.toggle_selection(0), Ok(false));
        assert_eq!(list.toggle_selection(3), Ok(false));
        assert_eq!(list.selected_count(), 0);
    }

    #[test]
    fn mode_transition_clears() {
        let mut s = selection(&[0, 1]);
        assert_eq!(s.set_mode(SelectionMode::Single), vec![0, 1]);
        assert!(s.is_empty());
        assert!(s.set_mode(SelectionMode::Single).is_empty());
    }
}
