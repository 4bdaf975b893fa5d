// Minimal example: two sections with one expandable item, default styling.
use ratatui::layout::Rect;
use ratatui::prelude::Buffer;
use ratatui::widgets::StatefulWidget;

use tui_flexlist::{
    FlexList, FlexListConfig, FlexListView, FlexListViewState, FlexListViewStyle, Item, RowLabel,
    RowLabelProvider,
};

// Row text keyed by item id.
struct Names(Vec<&'static str>);

impl RowLabelProvider<usize> for Names {
    fn label(&self, id: usize) -> RowLabel<'_> {
        RowLabel::new(self.0[id])
    }
}

fn main() -> tui_flexlist::Result<()> {
    let names = Names(vec!["Fruit", "apple", "pear", "Vegetables", "cabbage", "red", "white"]);

    // Items point at their section header; headers are materialized on demand.
    let mut list = FlexList::with_items(
        vec![
            Item::header(0),
            Item::new(1).section(0),
            Item::new(2).section(0),
            Item::header(3),
            Item::new(4)
                .section(3)
                .children([Item::new(5), Item::new(6)]),
        ],
        FlexListConfig::default(),
    )?;
    list.expand(4)?;

    // State holds the cursor and scroll offset and must live across frames.
    let mut state = FlexListViewState::new();
    state.set_cursor(Some(1));

    let widget = FlexListView::new(&list, &names, FlexListViewStyle::default());

    // Render into an in-memory buffer (no terminal required for the example).
    let area = Rect::new(0, 0, 40, 10);
    let mut buffer = Buffer::empty(area);
    widget.render(area, &mut buffer, &mut state);
    Ok(())
}
