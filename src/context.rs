use ratatui::style::Style;

use crate::item::ViewKind;

/// What a row renderer knows about the row being drawn.
#[derive(Clone, Copy, Debug)]
pub struct RowContext {
    pub level: u16,
    pub kind: ViewKind,
    pub is_header: bool,
    pub is_expandable: bool,
    pub is_expanded: bool,
    pub is_selected: bool,
    /// Row is drawn as the pinned sticky header.
    pub is_pinned: bool,
    pub header_style: Style,
}
