use std::time::Duration;

/// Default grace period before pending deletions are committed.
pub const DEFAULT_UNDO_TIMEOUT: Duration = Duration::from_secs(5);

/// What structural edits do while a background filter result is outstanding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PendingFilterPolicy {
    /// Edits fail with `Error::FilterInProgress` until the result is applied
    /// or the job is cancelled.
    #[default]
    Reject,
    /// Edits proceed and the outstanding result is discarded when it arrives.
    Supersede,
}

/// Who removes a header orphaned by a collapse while a filter is involved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OrphanHeaderOrder {
    /// While a filter is applied or pending, collapse leaves orphaned headers
    /// alone and the filter derives header visibility.
    #[default]
    FilterFirst,
    /// Collapse removes orphaned headers immediately, filter or not.
    CollapseFirst,
}

/// Behavior switches for a [`FlexList`](crate::FlexList).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FlexListConfig {
    /// Keeps headers whose section became empty instead of removing them.
    pub keep_orphan_headers: bool,
    /// Expanding an item collapses other expanded items of the same or deeper
    /// level.
    pub auto_collapse_on_expand: bool,
    /// `expand_all`/`collapse_all` skip items whose level is below this.
    pub min_collapsible_level: u16,
    /// Grace period of a pending deletion episode.
    pub undo_timeout: Duration,
    /// A new pending deletion commits the previous episode first.
    pub consecutive_deletes: bool,
    /// Pending deletion commits immediately; nothing can be restored.
    pub permanent_delete: bool,
    /// Restored items get their previous selection back.
    pub restore_selection_on_undo: bool,
    /// Removing a header that still has section items unlinks those items
    /// instead of rejecting the removal.
    pub unlink_on_remove_header: bool,
    pub pending_filter_policy: PendingFilterPolicy,
    /// Reports filter transitions as individual insert/remove notifications
    /// rather than a single data set replacement.
    pub animate_filter: bool,
    pub orphan_header_order: OrphanHeaderOrder,
    /// Rows left below the shown row that trigger loading the next batch.
    pub endless_scroll_threshold: usize,
}

impl FlexListConfig {
    /// Creates the default configuration.
    pub const fn new() -> Self {
        Self {
            keep_orphan_headers: false,
            auto_collapse_on_expand: false,
            min_collapsible_level: 0,
            undo_timeout: DEFAULT_UNDO_TIMEOUT,
            consecutive_deletes: false,
            permanent_delete: false,
            restore_selection_on_undo: false,
            unlink_on_remove_header: false,
            pending_filter_policy: PendingFilterPolicy::Reject,
            animate_filter: true,
            orphan_header_order: OrphanHeaderOrder::FilterFirst,
            endless_scroll_threshold: 1,
        }
    }

    pub const fn with_keep_orphan_headers(mut self, keep: bool) -> Self {
        self.keep_orphan_headers = keep;
        self
    }

    pub const fn with_auto_collapse(mut self, enabled: bool) -> Self {
        self.auto_collapse_on_expand = enabled;
        self
    }

    pub const fn with_min_collapsible_level(mut self, level: u16) -> Self {
        self.min_collapsible_level = level;
        self
    }

    pub const fn with_undo_timeout(mut self, timeout: Duration) -> Self {
        self.undo_timeout = timeout;
        self
    }

    pub const fn with_consecutive_deletes(mut self, enabled: bool) -> Self {
        self.consecutive_deletes = enabled;
        self
    }

    pub const fn with_permanent_delete(mut self, enabled: bool) -> Self {
        self.permanent_delete = enabled;
        self
    }

    pub const fn with_restore_selection(mut self, enabled: bool) -> Self {
        self.restore_selection_on_undo = enabled;
        self
    }

    pub const fn with_unlink_on_remove_header(mut self, enabled: bool) -> Self {
        self.unlink_on_remove_header = enabled;
        self
    }

    pub const fn with_pending_filter_policy(mut self, policy: PendingFilterPolicy) -> Self {
        self.pending_filter_policy = policy;
        self
    }

    pub const fn with_animate_filter(mut self, enabled: bool) -> Self {
        self.animate_filter = enabled;
        self
    }

    pub const fn with_orphan_header_order(mut self, order: OrphanHeaderOrder) -> Self {
        self.orphan_header_order = order;
        self
    }

    pub const fn with_endless_scroll_threshold(mut self, rows: usize) -> Self {
        self.endless_scroll_threshold = rows;
        self
    }
}

impl Default for FlexListConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_builder_start() {
        let config = FlexListConfig::default();
        assert!(!config.keep_orphan_headers);
        assert_eq!(config.undo_timeout, DEFAULT_UNDO_TIMEOUT);
        assert_eq!(config.pending_filter_policy, PendingFilterPolicy::Reject);
        assert!(config.animate_filter);
    }

    #[test]
    fn builders_chain() {
        let config = FlexListConfig::new()
            .with_keep_orphan_headers(true)
            .with_min_collapsible_level(2)
            .with_undo_timeout(Duration::from_millis(250));
        assert!(config.keep_orphan_headers);
        assert_eq!(config.min_collapsible_level, 2);
        assert_eq!(config.undo_timeout, Duration::from_millis(250));
    }
}
