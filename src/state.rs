use std::time::Instant;

use ratatui::widgets::TableState;
use tracing::debug;

use crate::action::{ListAction, ListEvent};
use crate::change::ListChange;
use crate::error::Result;
use crate::item::ItemId;
use crate::list::FlexList;
use crate::projection::subtree_end;
use crate::style::ScrollPolicy;
use crate::targets;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "keymap")]
use crate::keymap::ListKeyBindings;
#[cfg(feature = "keymap")]
use crossterm::event::KeyEvent;

/// Widget state: cursor row and scroll offset.
///
/// The cursor is separate from the list's selection set: it is where keyboard
/// actions apply, while selection is what bulk actions operate on.
#[derive(Clone, Debug, Default)]
pub struct FlexListViewState {
    list_state: TableState,
    #[cfg(feature = "keymap")]
    keymap: ListKeyBindings,
}

/// Snapshot of the cursor and scroll offset.
///
/// With the `serde` feature enabled, this type derives `Serialize`/`Deserialize`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlexListViewSnapshot {
    pub cursor: Option<usize>,
    pub offset: usize,
}

impl FlexListViewState {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(feature = "keymap")]
    /// Returns a mutable reference to the key binding set.
    pub const fn keymap_mut(&mut self) -> &mut ListKeyBindings {
        &mut self.keymap
    }

    pub(crate) const fn list_state(&self) -> &TableState {
        &self.list_state
    }

    pub(crate) const fn list_state_mut(&mut self) -> &mut TableState {
        &mut self.list_state
    }

    /// Row under the cursor.
    pub const fn cursor(&self) -> Option<usize> {
        self.list_state.selected()
    }

    pub fn set_cursor(&mut self, cursor: Option<usize>) {
        self.list_state.select(cursor);
    }

    /// Scroll offset: the first row in the viewport.
    pub const fn offset(&self) -> usize {
        self.list_state.offset()
    }

    /// Identity of the row under the cursor.
    pub fn cursor_id<Id: ItemId>(&self, list: &FlexList<Id>) -> Option<Id> {
        self.cursor().and_then(|position| list.get(position))
    }

    pub const fn snapshot(&self) -> FlexListViewSnapshot {
        FlexListViewSnapshot {
            cursor: self.list_state.selected(),
            offset: self.list_state.offset(),
        }
    }

    pub fn restore(&mut self, snapshot: FlexListViewSnapshot) {
        self.list_state.select(snapshot.cursor);
        *self.list_state.offset_mut() = snapshot.offset;
    }

    /// Moves the cursor to the first row.
    pub const fn select_first(&mut self) {
        self.list_state.select_first();
    }

    /// Moves the cursor to the last row.
    pub const fn select_last(&mut self) {
        self.list_state.select_last();
    }

    /// Scrolls the view down by the given number of rows.
    pub fn scroll_down_by(&mut self, amount: u16) {
        self.list_state.scroll_down_by(amount);
    }

    /// Scrolls the view up by the given number of rows.
    pub fn scroll_up_by(&mut self, amount: u16) {
        self.list_state.scroll_up_by(amount);
    }

    /// Moves the cursor to the previous row of a list of `len` rows.
    pub fn select_prev(&mut self, len: usize) {
        if len == 0 {
            self.list_state.select(None);
            return;
        }
        let cursor = self.list_state.selected().unwrap_or(0);
        self.list_state.select(Some(cursor.saturating_sub(1).min(len - 1)));
    }

    /// Moves the cursor to the next row of a list of `len` rows.
    pub fn select_next(&mut self, len: usize) {
        if len == 0 {
            self.list_state.select(None);
            return;
        }
        let next = self.list_state.selected().map_or(0, |cursor| cursor + 1);
        self.list_state.select(Some(next.min(len - 1)));
    }

    /// Keeps the cursor on the same row across queued list changes.
    ///
    /// Call with the notifications drained from the list before they are
    /// forwarded elsewhere.
    pub fn follow_changes(&mut self, changes: &[ListChange]) {
        let Some(mut cursor) = self.list_state.selected() else {
            return;
        };
        for change in changes {
            cursor = match *change {
                ListChange::Inserted { position, count } if position <= cursor => cursor + count,
                ListChange::Removed { position, count } if position + count <= cursor => cursor - count,
                ListChange::Removed { position, count } if position <= cursor => position,
                ListChange::Moved { from, to } if from == cursor => to,
                ListChange::Moved { from, to } if from < cursor && to >= cursor => cursor - 1,
                ListChange::Moved { from, to } if from > cursor && to <= cursor => cursor + 1,
                _ => cursor,
            };
        }
        self.list_state.select(Some(cursor));
    }

    /// Adjusts scroll offset so the cursor is within the viewport.
    pub fn ensure_cursor_visible(&mut self, len: usize, viewport_height: usize) {
        self.clamp_cursor(len);
        let Some(cursor) = self.list_state.selected() else {
            return;
        };
        let viewport_height = viewport_height.max(1);
        let offset = self.list_state.offset();
        if cursor < offset {
            *self.list_state.offset_mut() = cursor;
        } else if cursor >= offset + viewport_height {
            *self.list_state.offset_mut() = cursor + 1 - viewport_height;
        }
    }

    /// Adjusts cursor visibility according to the provided scroll policy.
    pub fn ensure_cursor_visible_with_policy(
        &mut self,
        len: usize,
        viewport_height: usize,
        policy: ScrollPolicy,
    ) {
        match policy {
            ScrollPolicy::KeepInView => self.ensure_cursor_visible(len, viewport_height),
            ScrollPolicy::CenterOnSelect => self.ensure_cursor_centered(len, viewport_height),
        }
    }

    fn ensure_cursor_centered(&mut self, len: usize, viewport_height: usize) {
        self.clamp_cursor(len);
        let Some(cursor) = self.list_state.selected() else {
            return;
        };
        let viewport_height = viewport_height.max(1);
        if len <= viewport_height {
            *self.list_state.offset_mut() = 0;
            return;
        }

        // Center the cursor, then clamp to the valid scroll range.
        let offset = cursor
            .saturating_sub(viewport_height / 2)
            .min(len.saturating_sub(viewport_height));
        *self.list_state.offset_mut() = offset;
    }

    /// Handles a list action and returns the resulting event.
    ///
    /// Navigation, expansion and selection are applied here; edit actions
    /// (see [`ListAction::is_edit`]) and custom actions are forwarded.
    pub fn handle_action<Id: ItemId, C>(
        &mut self,
        list: &mut FlexList<Id>,
        action: ListAction<C>,
    ) -> ListEvent<C> {
        if matches!(&action, ListAction::Custom(_)) || action.is_edit() {
            return ListEvent::Action(action);
        }
        if list.is_empty() {
            self.list_state.select(None);
            return ListEvent::Unhandled;
        }
        self.clamp_cursor(list.len());

        let focused = self.cursor_id(list);
        let reshapes = matches!(
            action,
            ListAction::ToggleExpansion | ListAction::ExpandAll | ListAction::CollapseAll
        );
        let event = match action {
            ListAction::SelectPrev => {
                self.select_prev(list.len());
                ListEvent::Handled
            }
            ListAction::SelectNext => {
                self.select_next(list.len());
                ListEvent::Handled
            }
            ListAction::SelectFirst => {
                self.select_first();
                ListEvent::Handled
            }
            ListAction::SelectLast => {
                self.select_last();
                ListEvent::Handled
            }
            ListAction::SelectParent => match self.cursor().and_then(|p| list.parent_of(p)) {
                Some(parent) => {
                    self.list_state.select(Some(parent));
                    ListEvent::Handled
                }
                None => ListEvent::Unhandled,
            },
            ListAction::ToggleExpansion => {
                Self::counted(self.cursor().map(|p| list.toggle_expansion(p)))
            }
            ListAction::ExpandAll => Self::counted(Some(list.expand_all())),
            ListAction::CollapseAll => Self::counted(Some(list.collapse_all())),
            ListAction::ToggleSelection => match self.cursor().map(|p| list.toggle_selection(p)) {
                Some(Ok(true)) => ListEvent::Handled,
                Some(Err(err)) => {
                    debug!(target: targets::SELECTION, %err, "toggle rejected");
                    ListEvent::Unhandled
                }
                Some(Ok(false)) | None => ListEvent::Unhandled,
            },
            ListAction::SelectAll => {
                if list.select_all(&[]) > 0 {
                    ListEvent::Handled
                } else {
                    ListEvent::Unhandled
                }
            }
            ListAction::ClearSelection => {
                if list.clear_selection() > 0 {
                    ListEvent::Handled
                } else {
                    ListEvent::Unhandled
                }
            }
            ListAction::MoveUp
            | ListAction::MoveDown
            | ListAction::Delete
            | ListAction::Undo
            | ListAction::Commit
            | ListAction::Custom(_) => ListEvent::Action(action),
        };
        if reshapes {
            self.refocus(list, focused);
            self.clamp_cursor(list.len());
        }
        event
    }

    /// Applies an edit action to the list. Returns the ids deleted for good,
    /// which the caller removes from its own store.
    ///
    /// Non-edit actions are ignored.
    pub fn handle_edit_action<Id: ItemId, C>(
        &mut self,
        list: &mut FlexList<Id>,
        action: ListAction<C>,
        now: Instant,
    ) -> Result<Vec<Id>> {
        let focused = self.cursor_id(list);
        let committed = match action {
            ListAction::MoveUp => {
                if let Some((from, to)) = self.sibling_move(list, false) {
                    list.move_item(from, to)?;
                }
                Vec::new()
            }
            ListAction::MoveDown => {
                if let Some((from, to)) = self.sibling_move(list, true) {
                    list.move_item(from, to)?;
                }
                Vec::new()
            }
            ListAction::Delete => {
                let mut positions = list.selected_positions();
                if positions.is_empty() {
                    positions.extend(self.cursor().filter(|p| *p < list.len()));
                }
                list.start_pending_delete(&positions, now)?.committed
            }
            ListAction::Undo => {
                list.restore()?;
                Vec::new()
            }
            ListAction::Commit => list.commit()?,
            _ => Vec::new(),
        };
        self.refocus(list, focused);
        self.clamp_cursor(list.len());
        Ok(committed)
    }

    #[cfg(feature = "keymap")]
    /// Resolves a key event into an action and handles it.
    pub fn handle_key<Id: ItemId>(&mut self, list: &mut FlexList<Id>, key: KeyEvent) -> ListEvent<()> {
        let Some(action) = self.keymap.resolve(key) else {
            return ListEvent::Unhandled;
        };
        self.handle_action(list, action)
    }

    #[cfg(feature = "keymap")]
    /// Resolves a key event with a custom mapping and handles it.
    pub fn handle_key_with<Id, C, F>(&mut self, list: &mut FlexList<Id>, key: KeyEvent, custom: F) -> ListEvent<C>
    where
        Id: ItemId,
        F: Fn(KeyEvent) -> Option<C>,
    {
        let Some(action) = self.keymap.resolve_with(key, custom) else {
            return ListEvent::Unhandled;
        };
        self.handle_action(list, action)
    }

    fn counted<C>(result: Option<Result<usize>>) -> ListEvent<C> {
        match result {
            Some(Ok(count)) if count > 0 => ListEvent::Handled,
            Some(Err(err)) => {
                debug!(target: targets::EXPAND, %err, "expansion rejected");
                ListEvent::Unhandled
            }
            _ => ListEvent::Unhandled,
        }
    }

    /// Positions for moving the cursor row past its previous (or next)
    /// sibling, descendants included.
    fn sibling_move<Id: ItemId>(&self, list: &FlexList<Id>, down: bool) -> Option<(usize, usize)> {
        let from = self.cursor()?;
        let parent = list.item(from)?.parent();
        let is_sibling = |p: usize| list.item(p).is_some_and(|n| !n.is_header() && n.parent() == parent);
        if down {
            let next = subtree_end(list.graph(), list.rows(), from);
            if next >= list.len() || !is_sibling(next) {
                return None;
            }
            Some((from, from + subtree_end(list.graph(), list.rows(), next) - next))
        } else {
            let prev = (0..from)
                .rev()
                .take_while(|p| list.item(*p).is_some_and(|n| !n.is_header() && Some(n.id()) != parent))
                .find(|p| is_sibling(*p))?;
            Some((from, prev))
        }
    }

    fn refocus<Id: ItemId>(&mut self, list: &FlexList<Id>, focused: Option<Id>) {
        if let Some(position) = focused.and_then(|id| list.position_of(id)) {
            self.list_state.select(Some(position));
        }
    }

    const fn clamp_cursor(&mut self, len: usize) {
        if len == 0 {
            self.list_state.select(None);
            return;
        }

        if let Some(cursor) = self.list_state.selected()
            && cursor >= len
        {
            self.list_state.select(Some(len - 1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlexListConfig;
    use crate::item::Item;
    use crate::selection::SelectionMode;
    use pretty_assertions::assert_eq;

    fn list() -> FlexList<u32> {
        FlexList::with_items(
            vec![
                Item::header(100),
                Item::new(1).section(100),
                Item::new(2).section(100).children([Item::new(21), Item::new(22)]),
                Item::new(3).section(100),
            ],
            FlexListConfig::default(),
        )
        .expect("data set")
    }

    #[test]
    fn navigation_clamps_to_rows() {
        let mut list = list();
        let mut state = FlexListViewState::new();
        assert_eq!(state.handle_action::<_, ()>(&mut list, ListAction::SelectPrev), ListEvent::Handled);
        assert_eq!(state.cursor(), Some(0));
        for _ in 0..10 {
            state.handle_action::<_, ()>(&mut list, ListAction::SelectNext);
        }
        assert_eq!(state.cursor(), Some(3));
    }

    #[test]
    fn toggle_keeps_cursor_on_item() {
        let mut list = list();
        let mut state = FlexListViewState::new();
        state.set_cursor(Some(2));
        assert_eq!(
            state.handle_action::<_, ()>(&mut list, ListAction::ToggleExpansion),
            ListEvent::Handled
        );
        assert_eq!(list.rows(), &[100, 1, 2, 21, 22, 3]);
        state.set_cursor(Some(4));
        assert_eq!(
            state.handle_action::<_, ()>(&mut list, ListAction::SelectParent),
            ListEvent::Handled
        );
        assert_eq!(state.cursor(), Some(2));
    }

    #[test]
    fn edit_actions_are_forwarded() {
        let mut list = list();
        let mut state = FlexListViewState::new();
        assert_eq!(
            state.handle_action::<_, u8>(&mut list, ListAction::Delete),
            ListEvent::Action(ListAction::Delete)
        );
        assert_eq!(
            state.handle_action(&mut list, ListAction::Custom(7u8)),
            ListEvent::Action(ListAction::Custom(7))
        );
    }

    #[test]
    fn delete_undo_and_commit_through_state() {
        let mut list = list();
        let mut state = FlexListViewState::new();
        let now = Instant::now();
        state.set_cursor(Some(3));
        let committed = state
            .handle_edit_action::<_, ()>(&mut list, ListAction::Delete, now)
            .expect("delete");
        assert!(committed.is_empty());
        assert_eq!(list.rows(), &[100, 1, 2]);
        assert_eq!(state.cursor(), Some(2));
        state
            .handle_edit_action::<_, ()>(&mut list, ListAction::Undo, now)
            .expect("undo");
        assert_eq!(list.rows(), &[100, 1, 2, 3]);
        state.set_cursor(Some(1));
        state
            .handle_edit_action::<_, ()>(&mut list, ListAction::Delete, now)
            .expect("delete");
        let committed = state
            .handle_edit_action::<_, ()>(&mut list, ListAction::Commit, now)
            .expect("commit");
        assert_eq!(committed, vec![1]);
    }

    #[test]
    fn delete_prefers_selection() {
        let mut list = list();
        list.set_selection_mode(SelectionMode::Multi);
        list.toggle_selection(1).expect("select");
        list.toggle_selection(3).expect("select");
        let mut state = FlexListViewState::new();
        state.set_cursor(Some(2));
        state
            .handle_edit_action::<_, ()>(&mut list, ListAction::Delete, Instant::now())
            .expect("delete");
        assert_eq!(list.rows(), &[100, 2]);
        assert_eq!(state.cursor(), Some(1));
    }

    #[test]
    fn move_down_and_up_follow_siblings() {
        let mut list = list();
        list.expand(2).expect("expand");
        let mut state = FlexListViewState::new();
        state.set_cursor(Some(1));
        state
            .handle_edit_action::<_, ()>(&mut list, ListAction::MoveDown, Instant::now())
            .expect("move down");
        assert_eq!(list.rows(), &[100, 2, 21, 22, 1, 3]);
        assert_eq!(state.cursor(), Some(4));
        state.set_cursor(Some(3));
        state
            .handle_edit_action::<_, ()>(&mut list, ListAction::MoveUp, Instant::now())
            .expect("move up");
        assert_eq!(list.rows(), &[100, 2, 22, 21, 1, 3]);
        assert_eq!(state.cursor(), Some(2));
    }

    #[test]
    fn follow_changes_tracks_cursor() {
        let mut state = FlexListViewState::new();
        state.set_cursor(Some(5));
        state.follow_changes(&[
            ListChange::Inserted {
                position: 0,
                count: 2,
            },
            ListChange::Removed {
                position: 6,
                count: 3,
            },
            ListChange::Moved { from: 0, to: 9 },
        ]);
        assert_eq!(state.cursor(), Some(5));
    }

    #[test]
    fn center_policy_clamps_offset() {
        let mut state = FlexListViewState::new();
        state.set_cursor(Some(18));
        state.ensure_cursor_visible_with_policy(20, 6, ScrollPolicy::CenterOnSelect);
        assert_eq!(state.offset(), 14);
        state.set_cursor(Some(1));
        state.ensure_cursor_visible(20, 6);
        assert_eq!(state.offset(), 1);
    }
}
