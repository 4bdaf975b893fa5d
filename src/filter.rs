//! Filtering the projection, synchronously or on a worker thread.
//!
//! A filter is computed from an immutable snapshot (`FilterJob`), so the
//! computation can run anywhere; applying the result (`FilterOutcome`) always
//! happens on the thread that owns the list and is rejected if the list
//! changed since the job was prepared.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace, warn};

use crate::graph::{ItemGraph, ItemNode};
use crate::item::ItemId;
use crate::list::FlexList;
use crate::projection;
use crate::targets;

/// Capacity of the job queue of a [`BackgroundFilter`].
const JOB_QUEUE_CAPACITY: usize = 16;

/// Predicate deciding whether an item survives filtering.
///
/// Must be pure: it may run on a worker thread against a snapshot.
pub trait ItemFilter<Id>: Send + Sync {
    fn is_match(&self, item: &ItemNode<Id>) -> bool;
}

impl<Id, F> ItemFilter<Id> for F
where
    F: Fn(&ItemNode<Id>) -> bool + Send + Sync,
{
    #[inline]
    fn is_match(&self, item: &ItemNode<Id>) -> bool {
        self(item)
    }
}

/// Filter that matches every item.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFilter;

impl<Id> ItemFilter<Id> for NoFilter {
    #[inline]
    fn is_match(&self, _item: &ItemNode<Id>) -> bool {
        true
    }
}

/// Shared handle to a predicate.
pub struct SharedFilter<Id>(Arc<dyn ItemFilter<Id>>);

impl<Id> SharedFilter<Id> {
    pub fn new(filter: impl ItemFilter<Id> + 'static) -> Self {
        Self(Arc::new(filter))
    }

    pub fn get(&self) -> &dyn ItemFilter<Id> {
        &*self.0
    }
}

impl<Id> Clone for SharedFilter<Id> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<Id> fmt::Debug for SharedFilter<Id> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedFilter(..)")
    }
}

/// State kept while a filter is applied: the unfiltered top-level order and
/// every expansion flag the filter overrode.
#[derive(Clone, Debug)]
pub(crate) struct ActiveFilter<Id> {
    pub(crate) predicate: SharedFilter<Id>,
    pub(crate) top_level: Vec<Id>,
    pub(crate) expanded_before: FxHashMap<Id, bool>,
    pub(crate) removed_headers: FxHashSet<Id>,
}

impl<Id: ItemId> ActiveFilter<Id> {
    fn new(predicate: SharedFilter<Id>, top_level: Vec<Id>) -> Self {
        Self {
            predicate,
            top_level,
            expanded_before: FxHashMap::default(),
            removed_headers: FxHashSet::default(),
        }
    }

    /// Remembers the pre-filter expansion of `id`; only the first call per id
    /// counts.
    pub(crate) fn note_expansion(&mut self, id: Id, before: bool) {
        self.expanded_before.entry(id).or_insert(before);
    }

    pub(crate) fn matches(&self, graph: &ItemGraph<Id>, id: Id) -> bool {
        graph.subtree_matches(id, self.predicate.get(), &mut FxHashMap::default())
    }

    /// Replays an insertion made in the filtered view: top-level ids land
    /// after the top-level ancestor of their nearest visible predecessor.
    pub(crate) fn record_insert(&mut self, visible_before: &[Id], ids: &[Id], graph: &ItemGraph<Id>) {
        let tops: Vec<Id> = ids
            .iter()
            .copied()
            .filter(|id| graph.get(*id).is_some_and(|n| n.parent().is_none()))
            .collect();
        if tops.is_empty() {
            return;
        }
        let anchor = visible_before
            .iter()
            .rev()
            .map(|id| graph.root_of(*id))
            .find(|root| !tops.contains(root) && self.top_level.contains(root));

        self.top_level.retain(|id| !tops.contains(id));
        for id in &tops {
            self.removed_headers.remove(id);
        }
        let at = anchor
            .and_then(|root| self.top_level.iter().position(|id| *id == root))
            .map_or(0, |index| index + 1);
        self.top_level.splice(at..at, tops);
    }

    /// Replays a swap of two top-level rows in the filtered view.
    pub(crate) fn record_swap(&mut self, a: Id, b: Id) {
        let i = self.top_level.iter().position(|id| *id == a);
        let j = self.top_level.iter().position(|id| *id == b);
        if let (Some(i), Some(j)) = (i, j) {
            self.top_level.swap(i, j);
        }
    }

    /// Replays a removal made in the filtered view. Headers stay in the
    /// snapshot (their section may still hold filtered-out items) and are
    /// pruned on clear if they end up empty.
    pub(crate) fn record_remove(&mut self, removed: &[Id], graph: &ItemGraph<Id>) {
        let mut dropped = FxHashSet::default();
        for &id in removed {
            let Some(node) = graph.get(id) else {
                continue;
            };
            if node.is_plain_header() {
                self.removed_headers.insert(id);
            } else if node.parent().is_none() {
                dropped.insert(id);
            }
        }
        if !dropped.is_empty() {
            self.top_level.retain(|id| !dropped.contains(id));
        }
    }
}

/// Self-contained filter computation over a snapshot of the list.
#[derive(Debug)]
pub struct FilterJob<Id: ItemId> {
    generation: u64,
    graph: Arc<ItemGraph<Id>>,
    top_level: Vec<Id>,
    predicate: SharedFilter<Id>,
}

impl<Id: ItemId> FilterJob<Id> {
    /// Generation of the list this job was prepared against.
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Runs the predicate over the snapshot. Pure; safe on any thread.
    pub fn compute(self) -> FilterOutcome<Id> {
        let built = projection::materialize(&self.graph, &self.top_level, Some(self.predicate.get()));
        trace!(
            target: targets::FILTER,
            generation = self.generation,
            rows = built.rows.len(),
            "filter computed"
        );
        FilterOutcome {
            generation: self.generation,
            rows: built.rows,
            forced: built.forced,
            top_level: self.top_level,
            predicate: self.predicate,
        }
    }
}

/// Result of a [`FilterJob`], ready to be applied by the owning thread.
#[derive(Debug)]
pub struct FilterOutcome<Id: ItemId> {
    generation: u64,
    rows: Vec<Id>,
    forced: Vec<(Id, bool)>,
    top_level: Vec<Id>,
    predicate: SharedFilter<Id>,
}

impl<Id: ItemId> FilterOutcome<Id> {
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Rows the projection will show once applied.
    pub fn rows(&self) -> &[Id] {
        &self.rows
    }
}

impl<Id: ItemId> FlexList<Id> {
    /// Stages a predicate; nothing changes until the filter is applied.
    pub fn set_filter(&mut self, filter: impl ItemFilter<Id> + 'static) {
        self.staged_filter = Some(SharedFilter::new(filter));
    }

    /// `true` if a predicate is staged.
    pub const fn has_filter(&self) -> bool {
        self.staged_filter.is_some()
    }

    /// `true` while a filter result is applied to the projection.
    pub const fn is_filtered(&self) -> bool {
        self.filter.is_some()
    }

    /// `true` while a prepared job has not been applied or cancelled.
    pub const fn is_filter_pending(&self) -> bool {
        self.pending_filter.is_some()
    }

    /// Applies the staged predicate synchronously. Without a staged predicate
    /// this clears any applied filter. Returns `true` if the projection was
    /// replaced.
    pub fn apply_filter(&mut self) -> bool {
        match self.prepare_filter() {
            Some(job) => self.apply_filter_outcome(job.compute()),
            None => self.clear_filter(),
        }
    }

    /// Snapshots the list for an off-thread filter computation.
    ///
    /// The job supersedes any job prepared earlier. Until its outcome is
    /// applied or cancelled, structural edits follow
    /// [`PendingFilterPolicy`](crate::PendingFilterPolicy).
    pub fn prepare_filter(&mut self) -> Option<FilterJob<Id>> {
        let predicate = self.staged_filter.clone()?;
        self.bump();
        self.pending_filter = Some(self.generation);
        let top_level = match &self.filter {
            Some(active) => active.top_level.clone(),
            None => self.top_level_rows(),
        };
        debug!(target: targets::FILTER, generation = self.generation, "filter job prepared");
        Some(FilterJob {
            generation: self.generation,
            graph: Arc::clone(&self.graph),
            top_level,
            predicate,
        })
    }

    /// Applies a computed outcome. Outcomes of a superseded job, or computed
    /// before an edit, are discarded and `false` is returned.
    pub fn apply_filter_outcome(&mut self, outcome: FilterOutcome<Id>) -> bool {
        if outcome.generation != self.generation {
            if self.pending_filter == Some(outcome.generation) {
                self.pending_filter = None;
            }
            debug!(
                target: targets::FILTER,
                stale = outcome.generation,
                current = self.generation,
                "stale filter outcome discarded"
            );
            return false;
        }

        self.pending_filter = None;
        let FilterOutcome {
            rows,
            forced,
            top_level,
            predicate,
            ..
        } = outcome;
        let mut active = self
            .filter
            .take()
            .unwrap_or_else(|| ActiveFilter::new(predicate.clone(), top_level));
        active.predicate = predicate;

        let graph = self.graph_mut();
        for (id, expanded) in forced {
            if let Some(before) = graph.set_expanded(id, expanded) {
                active.note_expansion(id, before);
            }
        }
        self.filter = Some(active);
        self.replace_rows(rows);
        debug!(target: targets::FILTER, rows = self.rows.len(), "filter applied");
        true
    }

    /// Drops the staged predicate, cancels any pending job and restores the
    /// unfiltered projection with every pre-filter expansion flag. Returns
    /// `true` if a filter was applied.
    pub fn clear_filter(&mut self) -> bool {
        self.staged_filter = None;
        self.pending_filter = None;
        let Some(active) = self.filter.take() else {
            return false;
        };

        let graph = self.graph_mut();
        for (id, expanded) in &active.expanded_before {
            graph.set_expanded(*id, *expanded);
        }
        let mut rows = projection::materialize(&self.graph, &active.top_level, None).rows;
        if !self.config.keep_orphan_headers {
            projection::prune_orphan_headers(&self.graph, &mut rows, |header| {
                active.removed_headers.contains(&header)
            });
        }
        self.replace_rows(rows);
        debug!(target: targets::FILTER, rows = self.rows.len(), "filter cleared");
        true
    }

    /// Forgets an outstanding job without applying it. Returns `true` if one
    /// was pending.
    pub const fn cancel_pending_filter(&mut self) -> bool {
        self.pending_filter.take().is_some()
    }

    pub(crate) fn top_level_rows(&self) -> Vec<Id> {
        self.rows
            .iter()
            .copied()
            .filter(|id| self.graph.get(*id).is_some_and(|n| n.parent().is_none()))
            .collect()
    }

    /// Whether `id` would survive the applied filter (always `true` when
    /// unfiltered).
    pub(crate) fn passes_filter(&self, id: Id) -> bool {
        self.filter
            .as_ref()
            .is_none_or(|active| active.matches(&self.graph, id))
    }
}

/// Worker thread computing filter jobs off the owning thread.
///
/// Jobs are queued through a bounded channel; outcomes come back through a
/// second channel and are applied with [`try_apply`](Self::try_apply) on the
/// owning thread.
pub struct BackgroundFilter<Id: ItemId> {
    jobs: Option<Sender<FilterJob<Id>>>,
    outcomes: Receiver<FilterOutcome<Id>>,
    handle: Option<JoinHandle<()>>,
}

impl<Id: ItemId> BackgroundFilter<Id> {
    /// Starts the worker thread.
    pub fn spawn() -> io::Result<Self> {
        let (job_tx, job_rx) = bounded::<FilterJob<Id>>(JOB_QUEUE_CAPACITY);
        let (outcome_tx, outcome_rx) = unbounded();
        let handle = thread::Builder::new()
            .name("flexlist-filter".to_string())
            .spawn(move || {
                for job in &job_rx {
                    if outcome_tx.send(job.compute()).is_err() {
                        break;
                    }
                }
                trace!(target: targets::FILTER, "filter worker stopped");
            })?;
        Ok(Self {
            jobs: Some(job_tx),
            outcomes: outcome_rx,
            handle: Some(handle),
        })
    }

    /// Prepares a job from `list` and queues it. Returns `false` if no
    /// predicate is staged or the worker is gone.
    pub fn submit(&self, list: &mut FlexList<Id>) -> bool {
        let Some(job) = list.prepare_filter() else {
            return false;
        };
        let Some(jobs) = &self.jobs else {
            return false;
        };
        if jobs.send(job).is_err() {
            warn!(target: targets::FILTER, "filter worker disconnected");
            list.cancel_pending_filter();
            return false;
        }
        true
    }

    /// Applies every outcome that has arrived. Stale ones are discarded by
    /// the list. Returns `true` if the projection changed.
    pub fn try_apply(&self, list: &mut FlexList<Id>) -> bool {
        let mut applied = false;
        for outcome in self.outcomes.try_iter() {
            applied |= list.apply_filter_outcome(outcome);
        }
        applied
    }

    /// Waits up to `timeout` for the next outcome and applies it.
    pub fn wait_apply(&self, list: &mut FlexList<Id>, timeout: Duration) -> bool {
        match self.outcomes.recv_timeout(timeout) {
            Ok(outcome) => list.apply_filter_outcome(outcome),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => false,
        }
    }
}

impl<Id: ItemId> Drop for BackgroundFilter<Id> {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!(target: targets::FILTER, "filter worker panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ListChange;
    use crate::config::{FlexListConfig, PendingFilterPolicy};
    use crate::error::Error;
    use crate::item::Item;
    use pretty_assertions::assert_eq;

    fn list() -> FlexList<u32> {
        FlexList::with_items(
            vec![
                Item::header(100),
                Item::new(1).section(100),
                Item::new(2)
                    .section(100)
                    .children([Item::new(21), Item::new(22)]),
                Item::header(200),
                Item::new(3).section(200),
            ],
            FlexListConfig::default(),
        )
        .expect("data set")
    }

    fn only(id: u32) -> impl Fn(&ItemNode<u32>) -> bool + Send + Sync {
        move |node| node.id() == id
    }

    #[test]
    fn filter_keeps_matching_paths_and_headers() {
        let mut list = list();
        list.set_filter(only(22));
        assert!(list.apply_filter());
        assert_eq!(list.rows(), &[100, 2, 22]);
        assert!(list.is_expanded(1));
        assert!(list.is_consistent());
    }

    #[test]
    fn clear_restores_projection_and_flags() {
        let mut list = list();
        let before = list.rows().to_vec();
        list.set_filter(only(22));
        list.apply_filter();
        assert!(list.clear_filter());
        assert_eq!(list.rows(), before.as_slice());
        assert!(!list.is_expanded(2));
        assert!(!list.has_filter());
    }

    #[test]
    fn transition_is_reported_as_runs() {
        let mut list = list();
        list.set_filter(only(3));
        list.apply_filter();
        assert_eq!(
            list.take_changes(),
            vec![ListChange::Removed {
                position: 0,
                count: 3
            }]
        );
    }

    #[test]
    fn non_animated_filter_replaces_data_set() {
        let mut list = list();
        list.config_mut().animate_filter = false;
        list.set_filter(only(3));
        list.apply_filter();
        assert_eq!(list.take_changes(), vec![ListChange::DataSetReplaced]);
    }

    #[test]
    fn stale_outcome_is_discarded() {
        let mut list = list();
        list.config_mut().pending_filter_policy = PendingFilterPolicy::Supersede;
        list.set_filter(only(3));
        let job = list.prepare_filter().expect("job");
        list.remove(1).expect("remove under supersede");
        assert!(!list.apply_filter_outcome(job.compute()));
        assert!(!list.is_filtered());
        assert!(!list.is_filter_pending());
    }

    #[test]
    fn pending_job_rejects_edits() {
        let mut list = list();
        list.set_filter(only(3));
        let job = list.prepare_filter().expect("job");
        assert_eq!(list.remove(1), Err(Error::FilterInProgress));
        assert!(list.apply_filter_outcome(job.compute()));
        assert_eq!(list.rows(), &[200, 3]);
    }

    #[test]
    fn newer_job_supersedes_older() {
        let mut list = list();
        list.set_filter(only(3));
        let first = list.prepare_filter().expect("job");
        list.set_filter(only(1));
        let second = list.prepare_filter().expect("job");
        assert!(!list.apply_filter_outcome(first.compute()));
        assert!(list.apply_filter_outcome(second.compute()));
        assert_eq!(list.rows(), &[100, 1]);
    }

    #[test]
    fn background_worker_round_trip() {
        let mut list = list();
        let worker = BackgroundFilter::spawn().expect("spawn");
        list.set_filter(only(1));
        assert!(worker.submit(&mut list));
        assert!(worker.wait_apply(&mut list, Duration::from_secs(5)));
        assert_eq!(list.rows(), &[100, 1]);
    }

    #[test]
    fn removal_while_filtered_survives_clear() {
        let mut list = list();
        list.set_filter(|node: &ItemNode<u32>| node.id() == 1 || node.id() == 3);
        list.apply_filter();
        assert_eq!(list.rows(), &[100, 1, 200, 3]);
        list.remove(3).expect("remove 3");
        list.clear_filter();
        assert_eq!(list.rows(), &[100, 1, 2]);
    }
}
