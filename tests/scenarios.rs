use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use tui_flexlist::{
    Error, FlexList, FlexListConfig, Item, ItemNode, ListChange, SelectionMode, StickyHeader,
};

const H1: u32 = 100;
const H2: u32 = 200;
const A: u32 = 1;
const B: u32 = 2;
const C: u32 = 3;
const D: u32 = 4;
const E: u32 = 5;

fn two_sections() -> FlexList<u32> {
    FlexList::with_items(
        vec![
            Item::header(H1),
            Item::new(A).section(H1),
            Item::new(B).section(H1),
            Item::new(C).section(H1),
            Item::header(H2),
            Item::new(D).section(H2),
            Item::new(E).section(H2),
        ],
        FlexListConfig::default(),
    )
    .expect("data set")
}

fn plain(count: u32) -> FlexList<u32> {
    FlexList::with_items((0..count).map(Item::new).collect(), FlexListConfig::default())
        .expect("data set")
}

#[test]
fn remove_then_filter_then_clear() {
    let mut list = two_sections();
    let position = list.position_of(B).expect("B is visible");
    list.remove(position).expect("remove B");
    assert_eq!(list.rows(), &[H1, A, C, H2, D, E]);
    // Four items in six rows: headers are rows too.
    assert_eq!(list.item_count(), 4);
    assert_eq!(list.len(), 6);

    list.set_filter(|node: &ItemNode<u32>| node.id() == D);
    assert!(list.apply_filter());
    assert_eq!(list.rows(), &[H2, D]);

    assert!(list.clear_filter());
    assert_eq!(list.rows(), &[H1, A, C, H2, D, E]);
    assert!(list.is_consistent());
}

#[test]
fn toggle_twice_reports_children_both_ways() {
    let mut list = FlexList::with_items(
        vec![Item::new(1u32).children([Item::new(11), Item::new(12)])],
        FlexListConfig::default(),
    )
    .expect("data set");

    assert_eq!(list.toggle_expansion(0), Ok(2));
    assert_eq!(list.rows(), &[1, 11, 12]);
    assert_eq!(list.toggle_expansion(0), Ok(2));
    assert_eq!(list.rows(), &[1]);

    let structural: Vec<_> = list
        .take_changes()
        .into_iter()
        .filter(ListChange::is_structural)
        .collect();
    assert_eq!(
        structural,
        vec![
            ListChange::Inserted {
                position: 1,
                count: 2
            },
            ListChange::Removed {
                position: 1,
                count: 2
            },
        ]
    );
}

#[test]
fn scattered_removal_is_reported_as_runs() {
    let mut list = plain(10);
    assert_eq!(list.remove_many(&[1, 2, 3, 7]), Ok(4));
    assert_eq!(list.rows(), &[0, 4, 5, 6, 8, 9]);
    assert_eq!(
        list.take_changes(),
        vec![
            ListChange::Removed {
                position: 7,
                count: 1
            },
            ListChange::Removed {
                position: 1,
                count: 3
            },
        ]
    );
}

#[test]
fn range_removal_matches_repeated_single_removal() {
    let mut ranged = plain(8);
    let mut single = plain(8);
    ranged.remove_range(2, 3).expect("range");
    for _ in 0..3 {
        single.remove(2).expect("single");
    }
    assert_eq!(ranged.rows(), single.rows());
}

#[test]
fn restore_is_exact_and_only_once() {
    let mut list = two_sections();
    let before = list.rows().to_vec();
    let now = Instant::now();

    let report = list.start_pending_delete(&[2, 5], now).expect("delete");
    assert_eq!(report.removed, 2);
    assert_eq!(list.rows(), &[H1, A, C, H2, E]);
    assert!(list.is_restore_in_time(now));

    list.restore().expect("restore");
    assert_eq!(list.rows(), before.as_slice());
    assert_eq!(list.restore(), Err(Error::UndoBinEmpty));
}

#[test]
fn expired_episode_commits_on_poll() {
    let mut list = two_sections();
    list.config_mut().undo_timeout = Duration::from_millis(10);
    let now = Instant::now();
    list.start_pending_delete(&[1], now).expect("delete");

    assert_eq!(list.poll_undo(now), None);
    assert_eq!(list.poll_undo(now + Duration::from_millis(20)), Some(vec![A]));
    assert_eq!(list.restore(), Err(Error::UndoBinEmpty));
    assert!(!list.graph().contains(A));
}

#[test]
fn selection_follows_items_across_inserts() {
    let mut list = plain(5);
    list.set_selection_mode(SelectionMode::Multi);
    list.toggle_selection(3).expect("select");
    list.insert(0, Item::new(50)).expect("insert");
    assert_eq!(list.selected_positions(), vec![4]);
    assert_eq!(list.selected_ids(), vec![3]);
}

#[test]
fn filter_round_trip_restores_expansion() {
    let mut list = FlexList::with_items(
        vec![
            Item::header(H1),
            Item::new(A)
                .section(H1)
                .children([Item::new(11), Item::new(12)]),
            Item::new(B).section(H1),
        ],
        FlexListConfig::default(),
    )
    .expect("data set");

    list.set_filter(|node: &ItemNode<u32>| node.id() == 12);
    list.apply_filter();
    assert_eq!(list.rows(), &[H1, A, 12]);
    assert!(list.is_expanded(1));

    list.clear_filter();
    assert_eq!(list.rows(), &[H1, A, B]);
    assert!(!list.is_expanded(1));
}

#[test]
fn sticky_header_is_pushed_by_the_next_one() {
    let list = two_sections();
    let header = list.header_at(3).expect("sticky header");
    assert_eq!(header, StickyHeader { position: 0, id: H1 });
    assert_eq!(list.header_at(5).map(|h| h.id), Some(H2));
    assert_eq!(list.next_header_boundary_offset(0, 3, 2, &(3..7)), 1);
    assert_eq!(list.next_header_boundary_offset(0, 3, 2, &|p: usize| p < 4), 0);
}

/// A child linked to a section its parent is not part of.
fn child_in_foreign_section() -> Vec<Item<u32>> {
    vec![
        Item::header(H1),
        Item::new(A)
            .children([Item::new(11).section(H1), Item::new(12)])
            .expanded(true),
        Item::new(B),
    ]
}

#[test]
fn foreign_section_child_stays_under_its_header() {
    let mut list = FlexList::with_items(child_in_foreign_section(), FlexListConfig::default())
        .expect("data set");
    assert_eq!(list.rows(), &[H1, A, 11, 12, B]);
    assert!(list.is_consistent());

    list.collapse(1).expect("collapse");
    assert_eq!(list.rows(), &[A, B]);
    assert!(list.is_consistent());

    list.expand(0).expect("expand");
    assert_eq!(list.rows(), &[H1, A, 11, 12, B]);
    assert!(list.is_consistent());

    list.set_filter(|node: &ItemNode<u32>| node.id() == 11);
    assert!(list.apply_filter());
    assert_eq!(list.rows(), &[H1, A, 11]);
    assert!(list.is_consistent());

    assert!(list.clear_filter());
    assert_eq!(list.rows(), &[H1, A, 11, 12, B]);
    assert!(list.is_consistent());
}

#[test]
fn foreign_section_child_comes_back_from_the_undo_bin() {
    let mut list = FlexList::with_items(child_in_foreign_section(), FlexListConfig::default())
        .expect("data set");
    list.start_pending_delete(&[2], Instant::now())
        .expect("delete");
    assert!(list.is_consistent());
    list.restore().expect("restore");
    assert_eq!(list.rows(), &[H1, A, 11, 12, B]);
    assert!(list.is_consistent());
}
