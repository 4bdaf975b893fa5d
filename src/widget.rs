use ratatui::layout::{Constraint, Rect};
use ratatui::prelude::Buffer;
use ratatui::text::Span;
use ratatui::widgets::{
    Block, Borders, Clear, Row, Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget,
    Table, TableState, Widget,
};

use crate::context::RowContext;
use crate::glyphs::{ListGlyphs, RowRenderer};
use crate::item::ItemId;
use crate::list::FlexList;
use crate::state::FlexListViewState;
use crate::style::FlexListViewStyle;

/// Основной виджет списка (table + stateful).
pub struct FlexListView<'a, Id, R>
where
    Id: ItemId,
    R: RowRenderer<Id>,
{
    list: &'a FlexList<Id>,
    renderer: &'a R,
    style: FlexListViewStyle<'a>,
    glyphs: ListGlyphs<'a>,
}

impl<'a, Id, R> FlexListView<'a, Id, R>
where
    Id: ItemId,
    R: RowRenderer<Id>,
{
    pub const fn new(list: &'a FlexList<Id>, renderer: &'a R, style: FlexListViewStyle<'a>) -> Self {
        Self {
            list,
            renderer,
            style,
            glyphs: ListGlyphs::unicode(),
        }
    }

    #[must_use]
    pub const fn glyphs(mut self, glyphs: ListGlyphs<'a>) -> Self {
        self.glyphs = glyphs;
        self
    }

    fn row_context(&self, position: usize, pinned: bool) -> Option<RowContext> {
        let node = self.list.item(position)?;
        Some(RowContext {
            level: self.list.level_of(position).unwrap_or_default(),
            kind: node.kind(),
            is_header: node.is_header(),
            is_expandable: node.is_expandable(),
            is_expanded: node.is_expanded(),
            is_selected: self.list.is_selected(position),
            is_pinned: pinned,
            header_style: self.style.header_style,
        })
    }

    #[inline]
    fn build_rows(&self, range: std::ops::Range<usize>) -> Vec<Row<'a>> {
        let mut rows = Vec::with_capacity(range.len());
        for position in range {
            let (Some(id), Some(ctx)) = (self.list.get(position), self.row_context(position, false))
            else {
                continue;
            };
            let line = self.renderer.line(id, &ctx, &self.glyphs);
            let mut row = Row::new([line]);
            if ctx.is_selected {
                row = row.style(self.style.selected_style);
            }
            rows.push(row);
        }
        rows
    }

    #[inline]
    fn build_table(&self, rows: Vec<Row<'a>>, block: Block<'a>) -> Table<'a> {
        Table::new(rows, [Constraint::Fill(1)])
            .style(self.style.block_style)
            .block(block)
            .row_highlight_style(self.style.highlight_style)
            .highlight_symbol(self.style.highlight_symbol)
    }

    /// Draws the header owning the first visible row over the top row, once
    /// the header itself has scrolled out of view.
    fn render_pinned_header(&self, inner: Rect, buf: &mut Buffer, offset: usize, indent: u16) {
        if inner.height == 0 {
            return;
        }
        let Some(header) = self.list.header_at(offset) else {
            return;
        };
        if header.position >= offset {
            return;
        }
        let viewport = offset..offset + inner.height as usize;
        if self
            .list
            .next_header_boundary_offset(header.position, offset, 1, &viewport)
            > 0
        {
            return;
        }
        let Some(ctx) = self.row_context(header.position, true) else {
            return;
        };

        let row_area = Rect { height: 1, ..inner };
        Clear.render(row_area, buf);
        buf.set_style(row_area, self.style.block_style);
        let line_area = Rect {
            x: inner.x.saturating_add(indent),
            width: inner.width.saturating_sub(indent),
            height: 1,
            ..inner
        };
        self.renderer
            .line(header.id, &ctx, &self.glyphs)
            .render(line_area, buf);
    }

    #[inline]
    fn render_scrollbar(
        area: Rect,
        buf: &mut Buffer,
        state: &FlexListViewState,
        inner_height: usize,
        scroll_rows: usize,
    ) {
        let scroll_len = scroll_rows.saturating_add(1);
        let position = state
            .list_state()
            .offset()
            .min(scroll_len.saturating_sub(1));
        let mut scrollbar_state = ScrollbarState::new(scroll_len)
            .position(position)
            .viewport_content_length(inner_height);
        Scrollbar::default()
            .orientation(ScrollbarOrientation::VerticalRight)
            .render(area, buf, &mut scrollbar_state);
    }
}

impl<Id, R> StatefulWidget for FlexListView<'_, Id, R>
where
    Id: ItemId,
    R: RowRenderer<Id>,
{
    type State = FlexListViewState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let mut block = Block::default().borders(self.style.borders);
        if let Some(title) = self.style.title.clone() {
            block = block.title(title);
        }
        block = block
            .style(self.style.block_style)
            .border_style(self.style.border_style);

        let total_rows = self.list.len();
        let inner_height = block.inner(area).height as usize;
        state.ensure_cursor_visible_with_policy(total_rows, inner_height, self.style.scroll_policy);

        let (range_start, range_end) = if self.style.virtualize_rows {
            let start = state.list_state().offset().min(total_rows);
            let end = (start + inner_height).min(total_rows);
            (start, end)
        } else {
            (0, total_rows)
        };
        let rows = self.build_rows(range_start..range_end);

        let scroll_rows = total_rows.saturating_sub(inner_height);

        let mut local_state = if self.style.virtualize_rows {
            Some(*state.list_state())
        } else {
            None
        };
        let table_state: &mut TableState = local_state.as_mut().map_or_else(
            || state.list_state_mut(),
            |state_ref| {
                *state_ref.offset_mut() = 0;
                if let Some(selected) = state_ref.selected() {
                    if selected < range_start || selected >= range_end {
                        state_ref.select(None);
                    } else {
                        state_ref.select(Some(selected - range_start));
                    }
                }
                state_ref
            },
        );
        let has_cursor = table_state.selected().is_some();

        let (table_area, table_block, scrollbar_area) = if scroll_rows > 0 {
            let table_area = Rect {
                width: area.width.saturating_sub(1),
                ..area
            };
            let scrollbar_area = Rect {
                x: area.x + area.width.saturating_sub(1),
                y: area.y,
                width: 1,
                height: area.height,
            };
            let mut table_borders = self.style.borders;
            table_borders.remove(Borders::RIGHT);
            (table_area, block.borders(table_borders), Some(scrollbar_area))
        } else {
            (area, block, None)
        };

        let inner = table_block.inner(table_area);
        let table = self.build_table(rows, table_block);
        StatefulWidget::render(table, table_area, buf, table_state);

        if self.style.sticky_headers {
            let offset = if self.style.virtualize_rows {
                range_start
            } else {
                state.offset()
            };
            let indent = if has_cursor {
                u16::try_from(Span::raw(self.style.highlight_symbol).width()).unwrap_or(u16::MAX)
            } else {
                0
            };
            self.render_pinned_header(inner, buf, offset, indent);
        }

        if let Some(scrollbar_area) = scrollbar_area {
            Self::render_scrollbar(scrollbar_area, buf, state, inner_height, scroll_rows);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlexListConfig;
    use crate::glyphs::{RowLabel, RowLabelProvider};
    use crate::item::Item;

    struct Labels;

    impl RowLabelProvider<u32> for Labels {
        fn label(&self, id: u32) -> RowLabel<'_> {
            if id >= 100 {
                RowLabel::new(format!("Section {id}"))
            } else {
                RowLabel::new(format!("Item {id}"))
            }
        }
    }

    fn list() -> FlexList<u32> {
        let mut items = vec![Item::header(100)];
        items.extend((1..=10).map(|id| Item::new(id).section(100)));
        FlexList::with_items(items, FlexListConfig::default()).expect("data set")
    }

    fn row_text(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width).map(|x| buf[(x, y)].symbol()).collect()
    }

    #[test]
    fn render_smoke_with_scrollbar() {
        let list = list();
        let widget = FlexListView::new(&list, &Labels, FlexListViewStyle::default());
        let mut state = FlexListViewState::new();

        let area = Rect::new(0, 0, 20, 6);
        let mut buffer = Buffer::empty(area);
        widget.render(area, &mut buffer, &mut state);

        assert!(row_text(&buffer, 1).contains("Section 100"));
        assert!(row_text(&buffer, 2).contains("Item 1"));
    }

    #[test]
    fn scrolled_section_pins_its_header() {
        let list = list();
        let widget = FlexListView::new(&list, &Labels, FlexListViewStyle::default());
        let mut state = FlexListViewState::new();
        state.set_cursor(Some(8));

        let area = Rect::new(0, 0, 20, 6);
        let mut buffer = Buffer::empty(area);
        widget.render(area, &mut buffer, &mut state);

        assert_eq!(state.offset(), 5);
        let top = row_text(&buffer, 1);
        assert!(top.contains("Section 100"), "{top}");
        assert!(!top.contains("Item 5"), "{top}");
        assert!(row_text(&buffer, 4).contains("Item 8"));
    }

    #[test]
    fn pinning_can_be_disabled() {
        let list = list();
        let style = FlexListViewStyle {
            sticky_headers: false,
            virtualize_rows: true,
            ..FlexListViewStyle::default()
        };
        let widget = FlexListView::new(&list, &Labels, style);
        let mut state = FlexListViewState::new();
        state.set_cursor(Some(8));

        let area = Rect::new(0, 0, 20, 6);
        let mut buffer = Buffer::empty(area);
        widget.render(area, &mut buffer, &mut state);

        assert!(row_text(&buffer, 1).contains("Item 5"));
    }
}
