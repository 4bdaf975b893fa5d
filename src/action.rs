/// Actions that a user or application can initiate on the list view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListAction<Custom = ()> {
    /// Move the cursor to the previous row.
    SelectPrev,
    /// Move the cursor to the next row.
    SelectNext,
    /// Move the cursor to the first row.
    SelectFirst,
    /// Move the cursor to the last row.
    SelectLast,
    /// Move the cursor to the parent of the current row.
    SelectParent,
    /// Expand or collapse the row under the cursor.
    ToggleExpansion,
    /// Expand every expandable row.
    ExpandAll,
    /// Collapse every expanded row.
    CollapseAll,
    /// Toggle selection membership of the row under the cursor.
    ToggleSelection,
    /// Select every selectable row (multi mode only).
    SelectAll,
    /// Deselect every row.
    ClearSelection,
    /// Move the row under the cursor above its previous sibling.
    MoveUp,
    /// Move the row under the cursor below its next sibling.
    MoveDown,
    /// Start a pending delete of the selected rows, or of the cursor row.
    Delete,
    /// Restore the pending delete.
    Undo,
    /// Make the pending delete permanent.
    Commit,
    /// Custom action forwarded to the caller without internal handling.
    Custom(Custom),
}

impl<Custom> ListAction<Custom> {
    /// Actions that change the list's structure or its undo bin.
    pub const fn is_edit(&self) -> bool {
        matches!(
            self,
            Self::MoveUp | Self::MoveDown | Self::Delete | Self::Undo | Self::Commit
        )
    }
}

/// Result of handling an action or key event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListEvent<Custom = ()> {
    /// The action was handled internally and state was updated.
    Handled,
    /// The action was ignored (e.g., nothing under the cursor / nothing to do).
    Unhandled,
    /// The action is forwarded to the caller for handling.
    Action(ListAction<Custom>),
}
