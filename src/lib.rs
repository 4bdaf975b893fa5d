//! Flat list engine with sections, expandable items, filtering, undoable
//! deletes, endless scrolling and sticky headers, plus a ratatui widget that
//! renders it.
//!
//! [`FlexList`] owns the item graph and its flat projection; every
//! structural edit queues [`ListChange`] notifications for the renderer.
//! [`FlexListView`] draws a list through a [`RowRenderer`].
//!
//! Feature flags:
//! - `keymap`: crossterm-based key bindings and `FlexListViewState::handle_key*` helpers.
//! - `serde`: serde support for `FlexListViewSnapshot` and the plain config types.

mod action;
mod change;
mod config;
mod context;
mod edit;
mod endless;
mod error;
mod expand;
mod filter;
mod glyphs;
mod graph;
mod item;
#[cfg(feature = "keymap")]
mod keymap;
mod list;
pub mod prelude;
mod projection;
mod selection;
mod state;
mod sticky;
mod style;
mod undo;
mod widget;

/// `tracing` targets used by the engine, for per-concern filtering.
pub mod targets {
    pub const EDIT: &str = "tui_flexlist::edit";
    pub const EXPAND: &str = "tui_flexlist::expand";
    pub const FILTER: &str = "tui_flexlist::filter";
    pub const UNDO: &str = "tui_flexlist::undo";
    pub const SELECTION: &str = "tui_flexlist::selection";
}

pub use action::{ListAction, ListEvent};
pub use change::{ListChange, Payload};
pub use config::{DEFAULT_UNDO_TIMEOUT, FlexListConfig, OrphanHeaderOrder, PendingFilterPolicy};
pub use context::RowContext;
pub use error::{Error, Result};
pub use filter::{BackgroundFilter, FilterJob, FilterOutcome, ItemFilter, NoFilter, SharedFilter};
pub use glyphs::{ListGlyphs, RowLabel, RowLabelProvider, RowRenderer, row_label_line};
pub use graph::{ItemGraph, ItemNode};
pub use item::{Item, ItemFlags, ItemId, ViewKind};
#[cfg(feature = "keymap")]
pub use keymap::{KeymapProfile, ListKeyBindings};
pub use list::FlexList;
pub use selection::{Selection, SelectionMode};
pub use state::{FlexListViewSnapshot, FlexListViewState};
pub use sticky::{OnScreen, StickyHeader};
pub use style::{FlexListViewStyle, ScrollPolicy};
pub use undo::{BinEntry, DeleteReport, UndoTimer};
pub use widget::FlexListView;
