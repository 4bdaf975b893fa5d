//! Pending deletion with a grace period.
//!
//! Removed rows are parked in an [`UndoBin`] instead of being dropped. Each
//! entry remembers its slot in "virtual" coordinates, the live rows plus every
//! binned row, and every edit made while entries are parked remaps those
//! slots. Restoring in ascending slot order therefore puts each row back into
//! its original neighbourhood.

use std::ops::Range;
use std::time::Instant;

use rustc_hash::{FxBuildHasher, FxHashMap};
use tracing::debug;

use crate::change::{ListChange, Payload};
use crate::error::{Error, Result};
use crate::graph::{ItemGraph, ItemNode};
use crate::item::ItemId;
use crate::list::{Disposal, FlexList};
use crate::selection::{Selection, SelectionMode};
use crate::targets;

/// One parked row (plus the visible descendants it carried along).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinEntry<Id> {
    /// Slot in virtual coordinates.
    pub position: usize,
    pub id: Id,
    /// Slots occupied: the row and its carried descendants.
    pub span: usize,
    /// Parent at the time of removal, for children.
    pub parent: Option<Id>,
    /// Whether the row was selected when it was removed.
    pub selected: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct UndoBin<Id> {
    entries: Vec<BinEntry<Id>>,
}

impl<Id> Default for UndoBin<Id> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

/// Ids whose pending flag changes after [`UndoBin::absorb`].
pub(crate) struct Absorbed<Id> {
    pub(crate) heads: Vec<Id>,
    pub(crate) merged: Vec<Id>,
}

impl<Id: ItemId> UndoBin<Id> {
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> &[BinEntry<Id>] {
        &self.entries
    }

    pub(crate) fn take_entries(&mut self) -> Vec<BinEntry<Id>> {
        std::mem::take(&mut self.entries)
    }

    /// Virtual slot of the live row at `live`.
    pub(crate) fn virtual_of(&self, live: usize) -> usize {
        let mut slot = live;
        for entry in &self.entries {
            if entry.position <= slot {
                slot += entry.span;
            } else {
                break;
            }
        }
        slot
    }

    pub(crate) fn on_inserted(&mut self, position: usize, count: usize) {
        if self.entries.is_empty() || count == 0 {
            return;
        }
        let slot = self.virtual_of(position);
        for entry in &mut self.entries {
            if entry.position >= slot {
                entry.position += count;
            }
        }
    }

    pub(crate) fn on_removed(&mut self, start: usize, count: usize) {
        if self.entries.is_empty() {
            return;
        }
        for live in (start..start + count).rev() {
            let slot = self.virtual_of(live);
            for entry in &mut self.entries {
                if entry.position > slot {
                    entry.position -= 1;
                }
            }
        }
    }

    /// Parks the live rows in `range`. Rows whose ancestor is also in the
    /// range ride along in the ancestor's entry, as do entries already parked
    /// under such an ancestor.
    pub(crate) fn absorb(
        &mut self,
        rows: &[Id],
        range: Range<usize>,
        graph: &ItemGraph<Id>,
        selection: &Selection,
    ) -> Absorbed<Id> {
        let mut heads: Vec<(usize, Id, usize)> = Vec::new();
        for live in range {
            let id = rows[live];
            if let Some(last) = heads.last_mut()
                && graph.is_ancestor(last.1, id)
            {
                last.2 += 1;
                continue;
            }
            heads.push((live, id, 1));
        }

        let slots: Vec<usize> = heads.iter().map(|(live, ..)| self.virtual_of(*live)).collect();

        let mut merged = Vec::new();
        for head in &mut heads {
            self.entries.retain(|entry| {
                if graph.is_ancestor(head.1, entry.id) {
                    head.2 += entry.span;
                    merged.push(entry.id);
                    false
                } else {
                    true
                }
            });
        }

        let ids = heads.iter().map(|(_, id, _)| *id).collect();
        for ((live, id, span), position) in heads.into_iter().zip(slots) {
            self.entries.push(BinEntry {
                position,
                id,
                span,
                parent: graph.get(id).and_then(ItemNode::parent),
                selected: selection.is_selected(live),
            });
        }
        self.entries.sort_by_key(|entry| entry.position);
        Absorbed { heads: ids, merged }
    }

    /// Drops the entry for `id`, closing its slots.
    pub(crate) fn forget(&mut self, id: Id) -> bool {
        let Some(index) = self.entries.iter().position(|entry| entry.id == id) else {
            return false;
        };
        let entry = self.entries.remove(index);
        for later in &mut self.entries[index..] {
            later.position = later.position.saturating_sub(entry.span);
        }
        true
    }

    /// Forgets entries whose item is no longer registered.
    pub(crate) fn retain_registered(&mut self, graph: &ItemGraph<Id>) {
        let gone: Vec<Id> = self
            .entries
            .iter()
            .filter(|entry| !graph.contains(entry.id))
            .map(|entry| entry.id)
            .collect();
        for id in gone {
            self.forget(id);
        }
    }

    /// Re-anchors entries after the projection was swapped wholesale: each
    /// entry follows the live row that preceded it.
    pub(crate) fn reanchor(&mut self, old_rows: &[Id], new_rows: &[Id]) {
        if self.entries.is_empty() {
            return;
        }
        let mut index = FxHashMap::with_capacity_and_hasher(new_rows.len(), FxBuildHasher);
        index.extend(new_rows.iter().enumerate().map(|(position, id)| (*id, position)));

        let mut carried = 0;
        let mut next_free = 0;
        for entry in &mut self.entries {
            let live_before = entry.position.saturating_sub(carried);
            let new_live = match live_before.checked_sub(1).and_then(|p| old_rows.get(p)) {
                None => 0,
                Some(predecessor) => index
                    .get(predecessor)
                    .map_or(live_before.min(new_rows.len()), |p| p + 1),
            };
            entry.position = (new_live + carried).max(next_free);
            next_free = entry.position + entry.span;
            carried += entry.span;
        }
    }
}

/// Deadline of a pending deletion episode.
///
/// Single use: polling it past the deadline, restoring, or committing all
/// take it out of the list, so exactly one of them acts on the episode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UndoTimer {
    deadline: Instant,
}

impl UndoTimer {
    pub(crate) const fn new(deadline: Instant) -> Self {
        Self { deadline }
    }

    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

/// Outcome of [`FlexList::start_pending_delete`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteReport<Id> {
    /// Rows that left the projection.
    pub removed: usize,
    /// Items deleted for good by this call: a committed earlier episode, or
    /// everything when deletion is permanent.
    pub committed: Vec<Id>,
    /// When the current episode commits unless restored.
    pub deadline: Option<Instant>,
}

impl<Id> Default for DeleteReport<Id> {
    fn default() -> Self {
        Self {
            removed: 0,
            committed: Vec::new(),
            deadline: None,
        }
    }
}

impl<Id: ItemId> FlexList<Id> {
    /// Removes the rows at `positions` into the undo bin and arms the undo
    /// timer for `now + undo_timeout`.
    ///
    /// Expanded parents take their visible descendants along; headers left
    /// without items go too. A second call while an episode is pending
    /// extends it (or commits it first with `consecutive_deletes`).
    pub fn start_pending_delete(&mut self, positions: &[usize], now: Instant) -> Result<DeleteReport<Id>> {
        self.ensure_editable()?;
        let plan = self.plan_removal(positions)?;
        if plan.is_empty() {
            return Ok(DeleteReport {
                deadline: self.undo_deadline(),
                ..DeleteReport::default()
            });
        }

        if self.config.permanent_delete {
            let removed = self.apply_removal(&plan, Disposal::Drop);
            return Ok(DeleteReport {
                removed: removed.len(),
                committed: removed,
                deadline: None,
            });
        }

        let committed = if self.config.consecutive_deletes && !self.bin.is_empty() {
            self.commit_bin()
        } else {
            Vec::new()
        };
        let removed = self.apply_removal(&plan, Disposal::Bin);
        let deadline = now + self.config.undo_timeout;
        self.undo_timer = Some(UndoTimer::new(deadline));
        debug!(
            target: targets::UNDO,
            removed = removed.len(),
            parked = self.bin.entries().len(),
            "pending delete started"
        );
        Ok(DeleteReport {
            removed: removed.len(),
            committed,
            deadline: Some(deadline),
        })
    }

    /// Puts every parked row back. Returns the number of rows re-inserted.
    ///
    /// Children come back only under an expanded, visible parent; otherwise
    /// they reappear on the next expand. While filtered, rows that do not
    /// match stay hidden until the filter is cleared.
    pub fn restore(&mut self) -> Result<usize> {
        self.ensure_editable()?;
        if self.bin.is_empty() {
            return Err(Error::UndoBinEmpty);
        }
        self.undo_timer = None;

        let entries = self.bin.take_entries();
        let mut offset = 0isize;
        let mut restored = 0;
        let mut reselect = Vec::new();
        for entry in entries {
            self.graph_mut().set_pending(entry.id, false);
            let inserted = if !self.graph.contains(entry.id) || self.contains(entry.id) {
                0
            } else if let Some(parent) = entry.parent {
                self.restore_child(parent, entry.id)
            } else {
                self.restore_top_level(&entry, offset)
            };
            offset += signed(inserted) - signed(entry.span);
            restored += inserted;
            if entry.selected && inserted > 0 {
                reselect.push(entry.id);
            }
        }

        if self.config.restore_selection_on_undo && self.selection.mode() != SelectionMode::Idle {
            self.reselect(&reselect);
        }
        debug!(target: targets::UNDO, restored, "pending delete restored");
        Ok(restored)
    }

    /// Deletes every parked item for good and returns their ids.
    pub fn commit(&mut self) -> Result<Vec<Id>> {
        if self.bin.is_empty() {
            return Err(Error::UndoBinEmpty);
        }
        self.undo_timer = None;
        let committed = self.commit_bin();
        debug!(target: targets::UNDO, committed = committed.len(), "pending delete committed");
        Ok(committed)
    }

    /// Commits the pending episode if its deadline has passed. Returns the
    /// committed ids when it fired.
    pub fn poll_undo(&mut self, now: Instant) -> Option<Vec<Id>> {
        if !self.undo_timer.is_some_and(|timer| timer.is_due(now)) {
            return None;
        }
        self.undo_timer = None;
        let committed = self.commit_bin();
        debug!(target: targets::UNDO, committed = committed.len(), "undo timer fired");
        Some(committed)
    }

    pub fn undo_deadline(&self) -> Option<Instant> {
        self.undo_timer.map(|timer| timer.deadline())
    }

    /// `true` while parked rows can still be restored at `now`.
    pub fn is_restore_in_time(&self, now: Instant) -> bool {
        !self.bin.is_empty() && self.undo_timer.is_some_and(|timer| !timer.is_due(now))
    }

    /// Parked entries in slot order.
    pub fn pending_deletes(&self) -> &[BinEntry<Id>] {
        self.bin.entries()
    }

    /// Ids of every parked row.
    pub fn deleted_items(&self) -> Vec<Id> {
        self.bin.entries().iter().map(|entry| entry.id).collect()
    }

    /// Parked children of `parent`.
    pub fn deleted_children_of(&self, parent: Id) -> Vec<Id> {
        self.bin
            .entries()
            .iter()
            .filter(|entry| entry.parent == Some(parent))
            .map(|entry| entry.id)
            .collect()
    }

    pub(crate) fn commit_bin(&mut self) -> Vec<Id> {
        let entries = self.bin.take_entries();
        let graph = self.graph_mut();
        let mut committed = Vec::with_capacity(entries.len());
        for entry in entries {
            if graph.get(entry.id).is_some_and(ItemNode::is_header) {
                graph.set_pending(entry.id, false);
            } else {
                graph.unregister(entry.id);
            }
            committed.push(entry.id);
        }
        committed
    }

    fn restore_child(&mut self, parent: Id, id: Id) -> usize {
        let Some(parent_position) = self.position_of(parent) else {
            return 0;
        };
        if !self.graph.get(parent).is_some_and(ItemNode::is_expanded) || !self.passes_filter(id) {
            return 0;
        }
        let at = self.child_insert_position(parent_position, id);
        let (block, forced) = self.plan_block(&[id]);
        self.apply_forced(forced);
        self.splice_insert(at, &block);
        let placed = self.place_child_header(parent, &block);
        self.changes.push(ListChange::Changed {
            position: parent_position + placed,
            payload: Some(Payload::Undo),
        });
        block.len() + placed
    }

    fn restore_top_level(&mut self, entry: &BinEntry<Id>, offset: isize) -> usize {
        let len = self.rows.len();
        let target = usize::try_from(signed(entry.position) + offset)
            .unwrap_or(0)
            .min(len);

        if !self.passes_filter(entry.id) {
            if let Some(active) = self.filter.as_mut() {
                active.record_insert(&self.rows[..target], &[entry.id], &self.graph);
            }
            return 0;
        }

        let (block, forced) = self.plan_block(&[entry.id]);
        let at = if self.block_fits(target, &block) {
            target
        } else {
            self.fallback_position(entry.id)
        };
        self.apply_forced(forced);
        self.splice_insert(at, &block);
        block.len()
    }

    fn reselect(&mut self, ids: &[Id]) {
        for &id in ids {
            let Some(position) = self.position_of(id) else {
                continue;
            };
            if !self.graph.get(id).is_some_and(ItemNode::is_selectable) {
                continue;
            }
            if self.selection.mode() == SelectionMode::Single {
                let cleared = self.selection.clear();
                self.notify_selection(&cleared);
            }
            if self.selection.insert(position) {
                self.notify_selection(&[position]);
            }
        }
    }
}

#[allow(clippy::cast_possible_wrap)]
const fn signed(value: usize) -> isize {
    value as isize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlexListConfig;
    use crate::item::Item;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn plain(count: u32) -> FlexList<u32> {
        FlexList::with_items((0..count).map(Item::new).collect(), FlexListConfig::default())
            .expect("data set")
    }

    fn entry(position: usize, id: u32, span: usize) -> BinEntry<u32> {
        BinEntry {
            position,
            id,
            span,
            parent: None,
            selected: false,
        }
    }

    #[test]
    fn virtual_slots_skip_parked_rows() {
        let bin = UndoBin {
            entries: vec![entry(1, 9, 1), entry(3, 8, 2)],
        };
        assert_eq!(bin.virtual_of(0), 0);
        assert_eq!(bin.virtual_of(1), 2);
        assert_eq!(bin.virtual_of(2), 5);
    }

    #[test]
    fn restore_puts_rows_back_in_place() {
        let mut list = plain(6);
        let now = Instant::now();
        list.start_pending_delete(&[1, 4], now).expect("delete");
        assert_eq!(list.rows(), &[0, 2, 3, 5]);
        assert_eq!(list.deleted_items(), vec![1, 4]);
        assert_eq!(list.restore(), Ok(2));
        assert_eq!(list.rows(), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(list.restore(), Err(Error::UndoBinEmpty));
    }

    #[test]
    fn edits_while_pending_are_remapped() {
        let mut list = plain(5);
        let now = Instant::now();
        list.start_pending_delete(&[2], now).expect("delete");
        list.insert(0, Item::new(10)).expect("insert");
        list.remove(4).expect("remove 4");
        assert_eq!(list.rows(), &[10, 0, 1, 3]);
        list.restore().expect("restore");
        assert_eq!(list.rows(), &[10, 0, 1, 2, 3]);
    }

    #[test]
    fn second_delete_extends_episode() {
        let mut list = plain(5);
        let now = Instant::now();
        list.start_pending_delete(&[0], now).expect("delete");
        let later = now + Duration::from_secs(3);
        let report = list.start_pending_delete(&[0], later).expect("delete");
        assert!(report.committed.is_empty());
        assert_eq!(report.deadline, Some(later + list.config().undo_timeout));
        assert_eq!(list.poll_undo(now + Duration::from_secs(6)), None);
        assert_eq!(list.restore(), Ok(2));
        assert_eq!(list.rows(), &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn consecutive_mode_commits_previous_episode() {
        let mut list = plain(5);
        list.config_mut().consecutive_deletes = true;
        let now = Instant::now();
        list.start_pending_delete(&[0], now).expect("delete");
        let report = list.start_pending_delete(&[0], now).expect("delete");
        assert_eq!(report.committed, vec![0]);
        assert!(!list.graph().contains(0));
        assert_eq!(list.restore(), Ok(1));
        assert_eq!(list.rows(), &[1, 2, 3, 4]);
    }

    #[test]
    fn timer_commits_once() {
        let mut list = plain(3);
        let now = Instant::now();
        list.start_pending_delete(&[1], now).expect("delete");
        assert!(list.is_restore_in_time(now));
        assert_eq!(list.poll_undo(now), None);
        let due = now + list.config().undo_timeout;
        assert_eq!(list.poll_undo(due), Some(vec![1]));
        assert_eq!(list.poll_undo(due), None);
        assert_eq!(list.restore(), Err(Error::UndoBinEmpty));
        assert!(!list.graph().contains(1));
    }

    #[test]
    fn restore_cancels_timer() {
        let mut list = plain(3);
        let now = Instant::now();
        list.start_pending_delete(&[1], now).expect("delete");
        list.restore().expect("restore");
        assert_eq!(list.undo_deadline(), None);
        assert_eq!(list.poll_undo(now + Duration::from_secs(60)), None);
    }

    #[test]
    fn permanent_mode_commits_immediately() {
        let mut list = plain(3);
        list.config_mut().permanent_delete = true;
        let report = list
            .start_pending_delete(&[0, 2], Instant::now())
            .expect("delete");
        assert_eq!(report.removed, 2);
        assert_eq!(report.deadline, None);
        assert_eq!(list.rows(), &[1]);
        assert_eq!(list.commit(), Err(Error::UndoBinEmpty));
    }

    #[test]
    fn restore_brings_selection_back_when_configured() {
        let mut list = plain(4);
        list.config_mut().restore_selection_on_undo = true;
        list.set_selection_mode(SelectionMode::Multi);
        list.toggle_selection(2).expect("select");
        list.start_pending_delete(&[2], Instant::now()).expect("delete");
        assert!(list.selected_positions().is_empty());
        list.restore().expect("restore");
        assert_eq!(list.selected_positions(), vec![2]);
    }

    #[test]
    fn parent_takes_children_along() {
        let mut list = FlexList::with_items(
            vec![
                Item::new(1),
                Item::new(2)
                    .children([Item::new(21), Item::new(22)])
                    .expanded(true),
                Item::new(3),
            ],
            FlexListConfig::default(),
        )
        .expect("data set");
        list.start_pending_delete(&[1], Instant::now()).expect("delete");
        assert_eq!(list.rows(), &[1, 3]);
        assert_eq!(list.pending_deletes().len(), 1);
        assert_eq!(list.pending_deletes()[0].span, 3);
        assert_eq!(list.restore(), Ok(3));
        assert_eq!(list.rows(), &[1, 2, 21, 22, 3]);
    }

    #[test]
    fn child_stays_parked_while_parent_collapsed() {
        let mut list = FlexList::with_items(
            vec![
                Item::new(2)
                    .children([Item::new(21), Item::new(22)])
                    .expanded(true),
                Item::new(3),
            ],
            FlexListConfig::default(),
        )
        .expect("data set");
        list.start_pending_delete(&[1], Instant::now()).expect("delete");
        assert_eq!(list.deleted_children_of(2), vec![21]);
        assert_eq!(list.toggle_expansion(0), Ok(1));
        assert_eq!(list.toggle_expansion(0), Ok(1));
        assert_eq!(list.rows(), &[2, 22, 3]);
        list.toggle_expansion(0).expect("collapse");
        assert_eq!(list.restore(), Ok(0));
        assert_eq!(list.toggle_expansion(0), Ok(2));
        assert_eq!(list.rows(), &[2, 21, 22, 3]);
    }
}
