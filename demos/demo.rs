use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::{DefaultTerminal, Frame};

use tui_flexlist::{
    FlexList, FlexListConfig, FlexListView, FlexListViewState, FlexListViewStyle, Item, ListEvent,
    RowLabel, RowLabelProvider, SelectionMode,
};

/// Contacts grouped by initial; people with several numbers expand.
struct Contacts {
    names: Vec<String>,
}

impl Contacts {
    fn build() -> (Self, Vec<Item<usize>>) {
        let people: &[(&str, &[&str])] = &[
            ("Ada Lovelace", &["+44 20 7946 0001"]),
            ("Alan Turing", &["+44 20 7946 0002", "+44 161 496 0003"]),
            ("Barbara Liskov", &[]),
            ("Brian Kernighan", &["+1 908 555 0104"]),
            ("Claude Shannon", &[]),
            ("Donald Knuth", &["+1 650 555 0199", "+1 650 555 0100"]),
            ("Edsger Dijkstra", &[]),
            ("Frances Allen", &[]),
            ("Grace Hopper", &["+1 202 555 0155"]),
            ("Ken Thompson", &[]),
            ("Leslie Lamport", &[]),
            ("Margaret Hamilton", &["+1 617 555 0121", "+1 617 555 0122"]),
        ];

        let mut names = Vec::new();
        let mut items = Vec::new();
        let mut header_of = std::collections::BTreeMap::new();
        for (name, phones) in people {
            let initial = name.chars().next().unwrap_or('#');
            let header = *header_of.entry(initial).or_insert_with(|| {
                names.push(initial.to_string());
                let id = names.len() - 1;
                items.push(Item::header(id));
                id
            });

            names.push((*name).to_string());
            let id = names.len() - 1;
            let mut item = Item::new(id).section(header);
            if !phones.is_empty() {
                let children: Vec<_> = phones
                    .iter()
                    .map(|phone| {
                        names.push((*phone).to_string());
                        Item::new(names.len() - 1)
                    })
                    .collect();
                item = item.children(children);
            }
            items.push(item);
        }
        (Self { names }, items)
    }
}

impl RowLabelProvider<usize> for Contacts {
    fn label(&self, id: usize) -> RowLabel<'_> {
        RowLabel::new(self.names[id].as_str())
    }
}

fn render(
    frame: &mut Frame,
    list: &FlexList<usize>,
    contacts: &Contacts,
    state: &mut FlexListViewState,
    style: &FlexListViewStyle<'_>,
) {
    let widget = FlexListView::new(list, contacts, style.clone());
    frame.render_stateful_widget(widget, frame.area(), state);
}

fn run_app(
    mut terminal: DefaultTerminal,
    mut list: FlexList<usize>,
    contacts: &Contacts,
    mut style: FlexListViewStyle<'_>,
) -> io::Result<()> {
    let mut state = FlexListViewState::new();
    state.select_first();

    loop {
        if let Some(committed) = list.poll_undo(Instant::now()) {
            style.title = Some(Line::from(format!("{} deleted", committed.len())));
        }
        // The state refocuses its cursor itself; no row cache to patch here.
        let _ = list.take_changes();
        terminal.draw(|frame| render(frame, &list, contacts, &mut state, &style))?;

        if event::poll(Duration::from_millis(200))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') => break,
                    _ => {
                        if let ListEvent::Action(action) = state.handle_key(&mut list, key) {
                            match state.handle_edit_action(&mut list, action, Instant::now()) {
                                Ok(committed) if !committed.is_empty() => {
                                    style.title =
                                        Some(Line::from(format!("{} deleted", committed.len())));
                                }
                                Ok(_) => {}
                                Err(err) => style.title = Some(Line::from(err.to_string())),
                            }
                        }
                    }
                },
                _ => {}
            }
        }
    }

    Ok(())
}

fn main() -> io::Result<()> {
    let (contacts, items) = Contacts::build();
    let config = FlexListConfig::default()
        .with_undo_timeout(Duration::from_secs(4))
        .with_auto_collapse(true);
    let mut list = FlexList::with_items(items, config).map_err(io::Error::other)?;
    list.set_selection_mode(SelectionMode::Multi);

    let mut style = FlexListViewStyle::default();
    style.block_style = Style::default()
        .fg(Color::Rgb(221, 227, 235))
        .bg(Color::Rgb(24, 28, 36));
    style.border_style = Style::default().fg(Color::Rgb(92, 110, 140));
    style.header_style = Style::default()
        .fg(Color::Rgb(229, 201, 133))
        .add_modifier(Modifier::BOLD);
    style.selected_style = Style::default().fg(Color::Rgb(136, 192, 208));
    style.highlight_style = Style::default()
        .fg(Color::Rgb(255, 255, 255))
        .bg(Color::Rgb(52, 66, 96))
        .add_modifier(Modifier::BOLD);
    style.title = Some(Line::from("Contacts"));

    let terminal = ratatui::init();
    let result = run_app(terminal, list, &contacts, style);
    ratatui::restore();
    result
}
