use std::ops::Range;
use std::sync::Arc;

use rustc_hash::{FxBuildHasher, FxHashMap};
use tracing::debug;

use crate::change::ListChange;
use crate::config::{FlexListConfig, PendingFilterPolicy};
use crate::endless::EndlessScroll;
use crate::error::{Error, Result};
use crate::filter::{ActiveFilter, SharedFilter};
use crate::graph::{ItemGraph, ItemNode};
use crate::item::{Item, ItemId, ViewKind};
use crate::projection;
use crate::selection::Selection;
use crate::targets;
use crate::undo::{UndoBin, UndoTimer};

/// What happens to undo bookkeeping when rows leave the projection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Disposal {
    /// Rows are gone (removed or hidden by collapse); binned positions after
    /// them shift down.
    Drop,
    /// Rows move into the undo bin and keep their virtual slots.
    Bin,
}

/// Flat, position-addressed projection of an item graph.
///
/// The list owns item metadata keyed by identity and arranges identities
/// into rows. Every structural edit goes through the `splice_*` primitives,
/// which keep rows, selection, undo bin, filter snapshot and the change queue
/// in step with each other.
#[derive(Clone, Debug)]
pub struct FlexList<Id: ItemId> {
    pub(crate) rows: Vec<Id>,
    pub(crate) graph: Arc<ItemGraph<Id>>,
    pub(crate) config: FlexListConfig,
    pub(crate) selection: Selection,
    pub(crate) bin: UndoBin<Id>,
    pub(crate) undo_timer: Option<UndoTimer>,
    pub(crate) staged_filter: Option<SharedFilter<Id>>,
    pub(crate) filter: Option<ActiveFilter<Id>>,
    pub(crate) pending_filter: Option<u64>,
    pub(crate) generation: u64,
    pub(crate) changes: Vec<ListChange>,
    pub(crate) endless: Option<EndlessScroll<Id>>,
}

impl<Id: ItemId> Default for FlexList<Id> {
    fn default() -> Self {
        Self::new(FlexListConfig::default())
    }
}

impl<Id: ItemId> FlexList<Id> {
    /// Creates an empty list.
    pub fn new(config: FlexListConfig) -> Self {
        Self {
            rows: Vec::new(),
            graph: Arc::new(ItemGraph::new()),
            config,
            selection: Selection::default(),
            bin: UndoBin::default(),
            undo_timer: None,
            staged_filter: None,
            filter: None,
            pending_filter: None,
            generation: 0,
            changes: Vec::new(),
            endless: None,
        }
    }

    /// Creates a list over an initial data set. See [`Self::update_data_set`].
    pub fn with_items(items: Vec<Item<Id>>, config: FlexListConfig) -> Result<Self> {
        let mut list = Self::new(config);
        list.update_data_set(items)?;
        list.changes.clear();
        Ok(list)
    }

    /// Replaces the whole data set and queues a single `DataSetReplaced`.
    ///
    /// Headers may be listed anywhere; each one is placed right before the
    /// first top-level row of its section, or before the top-level root of a
    /// child linked to it. Selection, the undo bin and any filter state are
    /// cleared.
    pub fn update_data_set(&mut self, items: Vec<Item<Id>>) -> Result<()> {
        self.swap_data_set(items, false)
    }

    /// Like [`Self::update_data_set`], but reports the swap as removals of
    /// the rows that left and insertions of the rows that joined. Falls back
    /// to `DataSetReplaced` when surviving rows changed their relative order.
    pub fn update_data_set_animated(&mut self, items: Vec<Item<Id>>) -> Result<()> {
        self.swap_data_set(items, true)
    }

    fn swap_data_set(&mut self, items: Vec<Item<Id>>, animate: bool) -> Result<()> {
        let top_level: Vec<Id> = items.iter().map(Item::id).collect();
        let mut graph = ItemGraph::with_capacity(items.len());
        graph.register(items, None, None)?;

        let mut rows = projection::materialize(&graph, &top_level, None).rows;
        if !self.config.keep_orphan_headers {
            projection::prune_orphan_headers(&graph, &mut rows, |_| true);
        }

        let events = if animate {
            projection::transition(&self.rows, &rows)
        } else {
            None
        };
        self.graph = Arc::new(graph);
        self.rows = rows;
        self.selection.clear();
        self.bin = UndoBin::default();
        self.undo_timer = None;
        self.filter = None;
        self.pending_filter = None;
        if let Some(endless) = self.endless.as_mut() {
            endless.reset();
        }
        self.bump();
        match events {
            Some(events) => self.changes.extend(events),
            None => self.changes.push(ListChange::DataSetReplaced),
        }
        debug!(target: targets::EDIT, rows = self.rows.len(), animate, "data set replaced");
        Ok(())
    }

    pub const fn config(&self) -> &FlexListConfig {
        &self.config
    }

    pub const fn config_mut(&mut self) -> &mut FlexListConfig {
        &mut self.config
    }

    /// Read access to every registered item, visible or not.
    pub fn graph(&self) -> &ItemGraph<Id> {
        &self.graph
    }

    /// Number of rows in the projection, headers included. See
    /// [`Self::item_count`] for the count without plain headers.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in display order.
    pub fn rows(&self) -> &[Id] {
        &self.rows
    }

    /// Identity at `position`.
    pub fn get(&self, position: usize) -> Option<Id> {
        self.rows.get(position).copied()
    }

    /// Metadata of the item at `position`.
    pub fn item(&self, position: usize) -> Option<&ItemNode<Id>> {
        self.rows.get(position).and_then(|id| self.graph.get(*id))
    }

    pub fn position_of(&self, id: Id) -> Option<usize> {
        self.rows.iter().position(|row| *row == id)
    }

    /// `true` if `id` is currently materialized.
    pub fn contains(&self, id: Id) -> bool {
        self.position_of(id).is_some()
    }

    /// Rows that are not plain headers.
    pub fn item_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|id| !self.graph.get(**id).is_some_and(ItemNode::is_plain_header))
            .count()
    }

    /// Rows whose kind is one of `kinds`.
    pub fn item_count_of_kinds(&self, kinds: &[ViewKind]) -> usize {
        self.rows
            .iter()
            .filter(|id| self.graph.get(**id).is_some_and(|n| kinds.contains(&n.kind())))
            .count()
    }

    /// Header linked to the item at `position`.
    pub fn header_of(&self, position: usize) -> Option<Id> {
        self.item(position).and_then(ItemNode::section)
    }

    /// Visible items linked to `header`, in display order.
    pub fn section_items(&self, header: Id) -> Vec<Id> {
        self.rows
            .iter()
            .copied()
            .filter(|id| self.graph.get(*id).and_then(ItemNode::section) == Some(header))
            .collect()
    }

    /// Index of the item at `position` among the visible items of its section.
    pub fn section_index(&self, position: usize) -> Option<usize> {
        let id = self.get(position)?;
        let header = self.header_of(position)?;
        self.section_items(header).iter().position(|item| *item == id)
    }

    /// Visible headers in display order.
    pub fn headers(&self) -> Vec<Id> {
        self.rows
            .iter()
            .copied()
            .filter(|id| self.graph.get(*id).is_some_and(ItemNode::is_header))
            .collect()
    }

    /// Visible plain headers with no visible section item.
    pub fn orphan_headers(&self) -> Vec<Id> {
        let mut rows = self.rows.clone();
        projection::prune_orphan_headers(&self.graph, &mut rows, |_| true);
        self.headers()
            .into_iter()
            .filter(|header| !rows.contains(header))
            .collect()
    }

    /// Position of the parent of the item at `position`.
    pub fn parent_of(&self, position: usize) -> Option<usize> {
        let parent = self.item(position)?.parent()?;
        self.rows[..position].iter().rposition(|id| *id == parent)
    }

    /// Nesting depth of the item at `position` (zero at the top).
    pub fn level_of(&self, position: usize) -> Option<u16> {
        self.get(position).map(|id| self.graph.depth(id))
    }

    pub fn is_expanded(&self, position: usize) -> bool {
        self.item(position).is_some_and(ItemNode::is_expanded)
    }

    /// Positions of expanded items in ascending order.
    pub fn expanded_positions(&self) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, id)| self.graph.get(**id).is_some_and(ItemNode::is_expanded))
            .map(|(position, _)| position)
            .collect()
    }

    /// Drains queued change notifications.
    pub fn take_changes(&mut self) -> Vec<ListChange> {
        std::mem::take(&mut self.changes)
    }

    /// Queued change notifications, oldest first.
    pub fn pending_changes(&self) -> &[ListChange] {
        &self.changes
    }

    /// Counter advanced by every structural change.
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn graph_mut(&mut self) -> &mut ItemGraph<Id> {
        Arc::make_mut(&mut self.graph)
    }

    pub(crate) const fn bump(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// Fails while a background filter job is outstanding under the reject
    /// policy.
    pub(crate) fn ensure_editable(&self) -> Result<()> {
        if self.pending_filter.is_some()
            && self.config.pending_filter_policy == PendingFilterPolicy::Reject
        {
            return Err(Error::FilterInProgress);
        }
        Ok(())
    }

    pub(crate) fn splice_insert(&mut self, position: usize, ids: &[Id]) {
        if ids.is_empty() {
            return;
        }
        if let Some(filter) = self.filter.as_mut() {
            filter.record_insert(&self.rows[..position], ids, &self.graph);
        }
        self.rows.splice(position..position, ids.iter().copied());
        self.selection.on_inserted(position, ids.len());
        self.bin.on_inserted(position, ids.len());
        self.bump();
        self.changes.push(ListChange::Inserted {
            position,
            count: ids.len(),
        });
    }

    pub(crate) fn splice_remove(&mut self, range: Range<usize>, disposal: Disposal) -> Vec<Id> {
        let start = range.start;
        let count = range.len();
        if count == 0 {
            return Vec::new();
        }
        match disposal {
            Disposal::Drop => self.bin.on_removed(start, count),
            Disposal::Bin => {
                let absorbed = self
                    .bin
                    .absorb(&self.rows, range.clone(), &self.graph, &self.selection);
                let graph = self.graph_mut();
                for id in absorbed.heads {
                    graph.set_pending(id, true);
                }
                for id in absorbed.merged {
                    graph.set_pending(id, false);
                }
            }
        }
        let removed: Vec<Id> = self.rows.drain(range).collect();
        if let Some(filter) = self.filter.as_mut() {
            filter.record_remove(&removed, &self.graph);
        }
        self.selection.on_removed(start, count);
        self.bump();
        self.changes.push(ListChange::Removed {
            position: start,
            count,
        });
        removed
    }

    pub(crate) fn splice_move(&mut self, from: usize, to: usize) {
        if from == to {
            return;
        }
        let id = self.rows.remove(from);
        self.rows.insert(to, id);
        if let Some(filter) = self.filter.as_mut() {
            filter.record_insert(&self.rows[..to], &[id], &self.graph);
        }
        self.selection.on_moved(from, to);
        self.bin.on_removed(from, 1);
        self.bin.on_inserted(to, 1);
        self.bump();
        self.changes.push(ListChange::Moved { from, to });
    }

    /// Swaps in a wholly new projection, carrying selection by identity.
    pub(crate) fn replace_rows(&mut self, rows: Vec<Id>) {
        let index: FxHashMap<Id, usize> = {
            let mut index = FxHashMap::with_capacity_and_hasher(rows.len(), FxBuildHasher);
            index.extend(rows.iter().enumerate().map(|(position, id)| (*id, position)));
            index
        };
        let selected: Vec<usize> = self
            .selection
            .iter()
            .filter_map(|p| self.rows.get(p))
            .filter_map(|id| index.get(id).copied())
            .collect();

        self.bin.reanchor(&self.rows, &rows);
        let events = if self.config.animate_filter {
            projection::transition(&self.rows, &rows)
        } else {
            None
        };
        self.rows = rows;
        self.selection.reset(selected);
        self.bump();
        match events {
            Some(events) => self.changes.extend(events),
            None => self.changes.push(ListChange::DataSetReplaced),
        }
    }

    /// Full consistency check of the projection.
    pub fn is_consistent(&self) -> bool {
        projection::projection_is_consistent(&self.graph, &self.rows)
    }
}
