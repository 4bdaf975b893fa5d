//! Sticky header lookups for renderers that pin the current section header
//! above the viewport.

use std::ops::Range;

use crate::graph::ItemNode;
use crate::item::ItemId;
use crate::list::FlexList;

/// Renderer-side query: is the row at `position` currently on screen?
pub trait OnScreen {
    fn is_on_screen(&self, position: usize) -> bool;
}

impl OnScreen for Range<usize> {
    fn is_on_screen(&self, position: usize) -> bool {
        self.contains(&position)
    }
}

impl<F> OnScreen for F
where
    F: Fn(usize) -> bool,
{
    fn is_on_screen(&self, position: usize) -> bool {
        self(position)
    }
}

/// A header row together with its position in the projection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StickyHeader<Id> {
    pub position: usize,
    pub id: Id,
}

impl<Id: ItemId> FlexList<Id> {
    /// Header owning the row at `position`: the row itself when it is a
    /// header, otherwise the nearest header above it, provided the row
    /// belongs to that header's section or sits under it as a child.
    pub fn section_header_at(&self, position: usize) -> Option<StickyHeader<Id>> {
        let row = self.get(position)?;
        let header_position = self.rows[..=position]
            .iter()
            .rposition(|id| self.graph.get(*id).is_some_and(ItemNode::is_header))?;
        let header = self.rows[header_position];
        let belongs = header == row
            || self.graph.get(row).and_then(ItemNode::section) == Some(header)
            || self
                .graph
                .get(self.graph.root_of(row))
                .and_then(ItemNode::section)
                == Some(header)
            || self.graph.is_ancestor(header, row);
        belongs.then_some(StickyHeader {
            position: header_position,
            id: header,
        })
    }

    /// Header to pin while the row at `position` is the first one on screen.
    ///
    /// `None` when the owning header is not sticky or is a collapsed
    /// expandable.
    pub fn header_at(&self, position: usize) -> Option<StickyHeader<Id>> {
        self.section_header_at(position).filter(|header| {
            self.graph
                .get(header.id)
                .is_some_and(|node| node.is_sticky() && (!node.is_expandable() || node.is_expanded()))
        })
    }

    /// How far the pinned header at `current` must be pushed up so the next
    /// header appears to displace it.
    ///
    /// Scans forward from `viewport_start` for the first header other than
    /// `current` that is on screen. Returns `0` when that header is at least
    /// `header_extent` rows below the viewport top, or when there is none.
    pub fn next_header_boundary_offset(
        &self,
        current: usize,
        viewport_start: usize,
        header_extent: usize,
        on_screen: &impl OnScreen,
    ) -> usize {
        let next = (viewport_start..self.rows.len()).find(|&position| {
            position != current
                && on_screen.is_on_screen(position)
                && self.item(position).is_some_and(ItemNode::is_header)
        });
        next.map_or(0, |position| {
            header_extent.saturating_sub(position - viewport_start)
        })
    }
}
