pub use crate::{
    Error, FlexList, FlexListConfig, FlexListView, FlexListViewSnapshot, FlexListViewState,
    FlexListViewStyle, Item, ItemFilter, ItemFlags, ItemId, ItemNode, ListAction, ListChange,
    ListEvent, ListGlyphs, NoFilter, Payload, PendingFilterPolicy, Result, RowContext, RowLabel,
    RowLabelProvider, RowRenderer, ScrollPolicy, SelectionMode, ViewKind, row_label_line,
};

#[cfg(feature = "keymap")]
pub use crate::{KeymapProfile, ListKeyBindings};
