//! Loading more rows when the view nears the end of the list.
//!
//! The list appends a progress row while the host loads the next batch, and
//! swaps it for the batch once [`FlexList::on_load_more_complete`] is called.

use tracing::debug;

use crate::error::Result;
use crate::item::{Item, ItemId};
use crate::list::{Disposal, FlexList};
use crate::targets;

#[derive(Clone, Debug)]
pub(crate) struct EndlessScroll<Id> {
    progress: Item<Id>,
    loading: bool,
}

impl<Id> EndlessScroll<Id> {
    /// The progress row went away with the data set it was part of.
    pub(crate) const fn reset(&mut self) {
        self.loading = false;
    }
}

impl<Id: ItemId> FlexList<Id> {
    /// Turns endless scrolling on. `progress` is shown as the last row while
    /// a batch is loading; it is never selectable.
    pub fn set_endless_scroll(&mut self, progress: Item<Id>) {
        self.endless = Some(EndlessScroll {
            progress: progress.selectable(false).enabled(false),
            loading: false,
        });
    }

    /// Turns endless scrolling off, dropping the progress row if shown.
    pub fn disable_endless_scroll(&mut self) {
        if let Some(endless) = self.endless.take() {
            self.drop_progress_row(endless.progress.id());
        }
    }

    pub const fn is_endless_scroll_enabled(&self) -> bool {
        self.endless.is_some()
    }

    /// `true` between a load request and its completion.
    pub fn is_loading_more(&self) -> bool {
        self.endless.as_ref().is_some_and(|endless| endless.loading)
    }

    /// Reports that the row at `position` came into view.
    ///
    /// Within `endless_scroll_threshold` rows of the end, appends the progress
    /// row and returns `true`: the host should start loading the next batch.
    /// Returns `false` while a batch is already loading.
    pub fn check_load_more(&mut self, position: usize) -> Result<bool> {
        let threshold = self.config.endless_scroll_threshold.max(1);
        let near_end = position.saturating_add(threshold) >= self.rows.len();
        let Some(endless) = self.endless.as_ref() else {
            return Ok(false);
        };
        if endless.loading || !near_end {
            return Ok(false);
        }
        self.ensure_editable()?;

        let progress = endless.progress.clone();
        let id = progress.id();
        self.graph_mut().register(vec![progress], None, None)?;
        let end = self.rows.len();
        self.splice_insert(end, &[id]);
        if let Some(endless) = self.endless.as_mut() {
            endless.loading = true;
        }
        debug!(target: targets::EDIT, position, "loading more");
        Ok(true)
    }

    /// Completes a load: drops the progress row and appends `items`.
    ///
    /// An empty batch means there is nothing more to load and turns endless
    /// scrolling off. Returns the number of rows inserted.
    pub fn on_load_more_complete(&mut self, items: Vec<Item<Id>>) -> Result<usize> {
        self.ensure_editable()?;
        let Some(progress) = self.endless.as_ref().map(|endless| endless.progress.id()) else {
            return self.insert_many(self.rows.len(), items);
        };
        self.drop_progress_row(progress);

        if items.is_empty() {
            self.endless = None;
            debug!(target: targets::EDIT, "nothing more to load");
            return Ok(0);
        }
        if let Some(endless) = self.endless.as_mut() {
            endless.loading = false;
        }
        self.insert_many(self.rows.len(), items)
    }

    fn drop_progress_row(&mut self, id: Id) {
        if let Some(position) = self.position_of(id) {
            self.splice_remove(position..position + 1, Disposal::Drop);
        }
        if self.graph.contains(id) {
            self.graph_mut().unregister(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::change::ListChange;
    use crate::config::FlexListConfig;
    use crate::item::Item;
    use crate::list::FlexList;
    use pretty_assertions::assert_eq;

    const PROGRESS: u32 = 999;

    fn endless(count: u32) -> FlexList<u32> {
        let mut list = FlexList::with_items(
            (0..count).map(Item::new).collect(),
            FlexListConfig::default().with_endless_scroll_threshold(2),
        )
        .expect("data set");
        list.set_endless_scroll(Item::new(PROGRESS));
        list
    }

    #[test]
    fn progress_row_appears_near_the_end_once() {
        let mut list = endless(5);
        assert_eq!(list.check_load_more(1), Ok(false));
        assert_eq!(list.check_load_more(3), Ok(true));
        assert_eq!(list.rows(), &[0, 1, 2, 3, 4, PROGRESS]);
        assert!(list.is_loading_more());
        assert_eq!(list.check_load_more(5), Ok(false));
        assert!(!list.item(5).is_some_and(|node| node.is_selectable()));
    }

    #[test]
    fn completed_batch_replaces_progress_row() {
        let mut list = endless(3);
        list.check_load_more(2).expect("load");
        list.take_changes();
        assert_eq!(list.on_load_more_complete(vec![Item::new(3), Item::new(4)]), Ok(2));
        assert_eq!(list.rows(), &[0, 1, 2, 3, 4]);
        assert!(!list.is_loading_more());
        assert!(!list.graph().contains(PROGRESS));
        assert_eq!(
            list.take_changes(),
            vec![
                ListChange::Removed {
                    position: 3,
                    count: 1
                },
                ListChange::Inserted {
                    position: 3,
                    count: 2
                },
            ]
        );
        assert_eq!(list.check_load_more(4), Ok(true));
    }

    #[test]
    fn empty_batch_ends_endless_scrolling() {
        let mut list = endless(2);
        list.check_load_more(1).expect("load");
        assert_eq!(list.on_load_more_complete(Vec::new()), Ok(0));
        assert_eq!(list.rows(), &[0, 1]);
        assert!(!list.is_endless_scroll_enabled());
        assert_eq!(list.check_load_more(1), Ok(false));
    }

    #[test]
    fn disabling_drops_the_progress_row() {
        let mut list = endless(2);
        list.check_load_more(1).expect("load");
        list.disable_endless_scroll();
        assert_eq!(list.rows(), &[0, 1]);
        assert!(!list.graph().contains(PROGRESS));
    }
}
