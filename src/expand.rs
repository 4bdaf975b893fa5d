use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::change::{ListChange, Payload};
use crate::config::OrphanHeaderOrder;
use crate::error::Result;
use crate::graph::ItemNode;
use crate::item::ItemId;
use crate::list::{Disposal, FlexList};
use crate::projection::{self, subtree_end};
use crate::targets;

impl<Id: ItemId> FlexList<Id> {
    /// Expands a collapsed item or collapses an expanded one.
    ///
    /// Returns the number of rows inserted or removed; `0` for items that are
    /// not expandable.
    pub fn toggle_expansion(&mut self, position: usize) -> Result<usize> {
        self.ensure_editable()?;
        let id = self.id_at(position)?;
        let (expandable, expanded) = self
            .graph
            .get(id)
            .map_or((false, false), |node| (node.is_expandable(), node.is_expanded()));
        Ok(if expanded {
            self.collapse_at(position)
        } else if expandable {
            self.expand_at(position, false)
        } else {
            0
        })
    }

    /// Expands the item at `position`. Returns the number of rows inserted.
    pub fn expand(&mut self, position: usize) -> Result<usize> {
        self.ensure_editable()?;
        let id = self.id_at(position)?;
        let collapsed = self
            .graph
            .get(id)
            .is_some_and(|node| node.is_expandable() && !node.is_expanded());
        Ok(if collapsed { self.expand_at(position, false) } else { 0 })
    }

    /// Collapses the item at `position`. Returns the number of rows removed.
    pub fn collapse(&mut self, position: usize) -> Result<usize> {
        self.ensure_editable()?;
        let id = self.id_at(position)?;
        let expanded = self.graph.get(id).is_some_and(ItemNode::is_expanded);
        Ok(if expanded { self.collapse_at(position) } else { 0 })
    }

    /// Expands every collapsed item front to back, children included, skipping
    /// items below the minimum collapsible level. Returns the number of rows
    /// inserted.
    pub fn expand_all(&mut self) -> Result<usize> {
        self.ensure_editable()?;
        let min_level = self.config.min_collapsible_level;
        let mut inserted = 0;
        let mut position = 0;
        while position < self.rows.len() {
            let eligible = self.graph.get(self.rows[position]).is_some_and(|node| {
                !node.is_expanded() && node.expansion_level().is_some_and(|level| level >= min_level)
            });
            if eligible {
                inserted += self.expand_at(position, true);
            }
            position += 1;
        }
        trace!(target: targets::EXPAND, inserted, "expanded all");
        Ok(inserted)
    }

    /// Collapses every expanded item, deepest rows first, skipping items below
    /// the minimum collapsible level. Returns the number of rows removed.
    pub fn collapse_all(&mut self) -> Result<usize> {
        self.ensure_editable()?;
        let min_level = self.config.min_collapsible_level;
        let expanded: Vec<Id> = self
            .rows
            .iter()
            .rev()
            .copied()
            .filter(|id| {
                self.graph.get(*id).is_some_and(|node| {
                    node.is_expanded() && node.expansion_level().is_some_and(|level| level >= min_level)
                })
            })
            .collect();

        let mut removed = 0;
        for id in expanded {
            if let Some(position) = self.position_of(id) {
                removed += self.collapse_at(position);
            }
        }
        trace!(target: targets::EXPAND, removed, "collapsed all");
        Ok(removed)
    }

    /// Materializes the children of the item at `position`.
    ///
    /// Unless `sweep` is set, auto-collapse first folds every other expanded
    /// branch at the same or a deeper level.
    pub(crate) fn expand_at(&mut self, position: usize, sweep: bool) -> usize {
        let id = self.rows[position];
        let Some(level) = self.graph.get(id).and_then(ItemNode::expansion_level) else {
            return 0;
        };
        if self.config.auto_collapse_on_expand && !sweep {
            self.collapse_others(id, level);
        }
        let Some(position) = self.position_of(id) else {
            return 0;
        };

        let mut block = Vec::new();
        let mut forced = Vec::new();
        match &self.filter {
            Some(active) => {
                let mut memo = FxHashMap::default();
                projection::push_filtered_subtree(
                    &self.graph,
                    id,
                    active.predicate.get(),
                    &mut memo,
                    &mut block,
                    &mut forced,
                );
                forced.retain(|(forced_id, _)| *forced_id != id);
            }
            None => projection::push_visible_descendants(&self.graph, id, &mut block),
        }
        if block.is_empty() {
            self.graph_mut().set_expanded(id, false);
            return 0;
        }

        self.graph_mut().set_expanded(id, true);
        self.apply_forced(forced);
        self.splice_insert(position + 1, &block);
        let placed = self.place_child_header(id, &block);
        let position = position + placed;
        self.changes.push(ListChange::Changed {
            position,
            payload: Some(Payload::Expanded),
        });
        trace!(target: targets::EXPAND, position, count = block.len(), "expanded");
        block.len() + placed
    }

    /// Hides the visible descendants of the item at `position` and clears the
    /// expansion flag on it and on every expanded descendant.
    pub(crate) fn collapse_at(&mut self, position: usize) -> usize {
        let id = self.rows[position];
        let end = subtree_end(&self.graph, &self.rows, position);
        let descendants: Vec<Id> = self.rows[position + 1..end].to_vec();

        let graph = self.graph_mut();
        graph.set_expanded(id, false);
        for descendant in &descendants {
            graph.set_expanded(*descendant, false);
        }

        let sections: FxHashSet<Id> = descendants
            .iter()
            .filter_map(|d| self.graph.get(*d).and_then(ItemNode::section))
            .filter(|header| self.graph.get(*header).is_some_and(ItemNode::is_plain_header))
            .collect();

        self.splice_remove(position + 1..end, Disposal::Drop);
        self.changes.push(ListChange::Changed {
            position,
            payload: Some(Payload::Collapsed),
        });
        if !sections.is_empty() && self.should_prune_after_collapse() {
            self.prune_headers(&sections);
        }
        trace!(target: targets::EXPAND, position, count = descendants.len(), "collapsed");
        descendants.len()
    }

    fn should_prune_after_collapse(&self) -> bool {
        if self.config.keep_orphan_headers {
            return false;
        }
        match self.config.orphan_header_order {
            OrphanHeaderOrder::CollapseFirst => true,
            OrphanHeaderOrder::FilterFirst => self.filter.is_none() && self.pending_filter.is_none(),
        }
    }

    /// Removes the headers in `candidates` whose section has no visible item
    /// left.
    fn prune_headers(&mut self, candidates: &FxHashSet<Id>) {
        let mut kept = self.rows.clone();
        projection::prune_orphan_headers(&self.graph, &mut kept, |header| candidates.contains(&header));
        let mut orphaned: Vec<usize> = candidates
            .iter()
            .filter(|header| !kept.contains(header))
            .filter_map(|header| self.position_of(*header))
            .collect();
        orphaned.sort_unstable_by(|a, b| b.cmp(a));
        for position in orphaned {
            self.splice_remove(position..position + 1, Disposal::Drop);
        }
    }

    /// Collapses every expanded item at `level` or deeper that is not an
    /// ancestor of `keep`.
    fn collapse_others(&mut self, keep: Id, level: u16) {
        let others: Vec<Id> = self
            .rows
            .iter()
            .copied()
            .filter(|other| {
                *other != keep
                    && !self.graph.is_ancestor(*other, keep)
                    && self.graph.get(*other).is_some_and(|node| {
                        node.is_expanded() && node.expansion_level().is_some_and(|l| l >= level)
                    })
            })
            .collect();
        for other in others.into_iter().rev() {
            let still_expanded = self.graph.get(other).is_some_and(ItemNode::is_expanded);
            if let Some(position) = self.position_of(other)
                && still_expanded
            {
                self.collapse_at(position);
            }
        }
    }
}
