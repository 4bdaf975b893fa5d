use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::Borders;

/// Политика скролла при перемещении курсора.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScrollPolicy {
    #[default]
    KeepInView,
    CenterOnSelect,
}

/// Визуальные настройки виджета списка.
#[derive(Clone)]
pub struct FlexListViewStyle<'a> {
    pub title: Option<Line<'a>>,
    pub block_style: Style,
    pub border_style: Style,
    pub highlight_style: Style,
    /// Style of rows in the selection set.
    pub selected_style: Style,
    pub header_style: Style,
    pub highlight_symbol: &'a str,
    pub borders: Borders,
    pub virtualize_rows: bool,
    pub scroll_policy: ScrollPolicy,
    /// Pin the current section header to the top of the viewport.
    pub sticky_headers: bool,
}

impl Default for FlexListViewStyle<'_> {
    fn default() -> Self {
        Self {
            title: None,
            block_style: Style::default(),
            border_style: Style::default(),
            highlight_style: Style::default(),
            selected_style: Style::default(),
            header_style: Style::default().add_modifier(Modifier::BOLD),
            highlight_symbol: ">> ",
            borders: Borders::ALL,
            virtualize_rows: false,
            scroll_policy: ScrollPolicy::KeepInView,
            sticky_headers: true,
        }
    }
}
