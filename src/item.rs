use std::fmt::Debug;
use std::hash::Hash;

/// Identity of an item in the list.
///
/// Identities must be stable for the lifetime of the item: selection,
/// expansion and undo all track items by identity across edits.
pub trait ItemId: Copy + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> ItemId for T where T: Copy + Eq + Hash + Debug + Send + Sync + 'static {}

/// Rendering route tag. The engine never interprets it beyond equality.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewKind(pub u16);

/// Per-item capability flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemFlags {
    pub selectable: bool,
    pub draggable: bool,
    pub swipeable: bool,
    /// Hidden items are registered but never materialized.
    pub hidden: bool,
    pub enabled: bool,
}

impl ItemFlags {
    /// Selectable and enabled; not draggable, swipeable or hidden.
    pub const DEFAULT: Self = Self {
        selectable: true,
        draggable: false,
        swipeable: false,
        hidden: false,
        enabled: true,
    };

    /// Flags used by headers: enabled but not selectable.
    pub const HEADER: Self = Self {
        selectable: false,
        ..Self::DEFAULT
    };
}

impl Default for ItemFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ItemExpansion<Id> {
    pub(crate) children: Vec<Item<Id>>,
    pub(crate) expanded: bool,
    pub(crate) level: Option<u16>,
}

/// Description of an item handed to the list for registration.
///
/// Items are built with chained setters:
///
/// ```
/// use tui_flexlist::Item;
///
/// let header = Item::header(1u32);
/// let folder = Item::new(2u32)
///     .section(1)
///     .children([Item::new(3u32), Item::new(4u32)])
///     .expanded(true);
/// # let _ = (header, folder);
/// ```
#[derive(Clone, Debug)]
pub struct Item<Id> {
    pub(crate) id: Id,
    pub(crate) kind: ViewKind,
    pub(crate) flags: ItemFlags,
    pub(crate) is_header: bool,
    pub(crate) sticky: bool,
    pub(crate) section: Option<Id>,
    pub(crate) expansion: Option<ItemExpansion<Id>>,
}

impl<Id> Item<Id> {
    /// Plain item: no header role, no children.
    pub fn new(id: Id) -> Self {
        Self {
            id,
            kind: ViewKind::default(),
            flags: ItemFlags::DEFAULT,
            is_header: false,
            sticky: false,
            section: None,
            expansion: None,
        }
    }

    /// Section header, sticky unless told otherwise.
    pub fn header(id: Id) -> Self {
        Self {
            is_header: true,
            sticky: true,
            flags: ItemFlags::HEADER,
            ..Self::new(id)
        }
    }

    #[must_use]
    pub const fn kind(mut self, kind: ViewKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub const fn flags(mut self, flags: ItemFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub const fn selectable(mut self, selectable: bool) -> Self {
        self.flags.selectable = selectable;
        self
    }

    #[must_use]
    pub const fn draggable(mut self, draggable: bool) -> Self {
        self.flags.draggable = draggable;
        self
    }

    #[must_use]
    pub const fn swipeable(mut self, swipeable: bool) -> Self {
        self.flags.swipeable = swipeable;
        self
    }

    #[must_use]
    pub const fn hidden(mut self, hidden: bool) -> Self {
        self.flags.hidden = hidden;
        self
    }

    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.flags.enabled = enabled;
        self
    }

    /// Only meaningful for headers.
    #[must_use]
    pub const fn sticky(mut self, sticky: bool) -> Self {
        self.sticky = sticky;
        self
    }

    /// Links the item to the section owned by `header`.
    #[must_use]
    pub fn section(mut self, header: Id) -> Self {
        self.section = Some(header);
        self
    }

    /// Makes the item expandable without children.
    #[must_use]
    pub fn expandable(mut self) -> Self {
        self.expansion_mut();
        self
    }

    /// Makes the item expandable and appends `children` in order.
    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = Self>) -> Self {
        self.expansion_mut().children.extend(children);
        self
    }

    /// Initial expansion state; makes the item expandable.
    #[must_use]
    pub fn expanded(mut self, expanded: bool) -> Self {
        self.expansion_mut().expanded = expanded;
        self
    }

    /// Nesting level bound for recursive expand/collapse. Defaults to the
    /// parent's level plus one (zero at the top).
    #[must_use]
    pub fn expansion_level(mut self, level: u16) -> Self {
        self.expansion_mut().level = Some(level);
        self
    }

    pub const fn id_ref(&self) -> &Id {
        &self.id
    }

    pub const fn is_header(&self) -> bool {
        self.is_header
    }

    pub const fn is_expandable(&self) -> bool {
        self.expansion.is_some()
    }

    fn expansion_mut(&mut self) -> &mut ItemExpansion<Id> {
        self.expansion.get_or_insert_with(|| ItemExpansion {
            children: Vec::new(),
            expanded: false,
            level: None,
        })
    }
}

impl<Id: Copy> Item<Id> {
    pub const fn id(&self) -> Id {
        self.id
    }

    pub const fn section_id(&self) -> Option<Id> {
        self.section
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_defaults() {
        let header = Item::header(1u8);
        assert!(header.is_header());
        assert!(header.sticky);
        assert!(!header.flags.selectable);
    }

    #[test]
    fn children_make_item_expandable() {
        let item = Item::new(1u8).children([Item::new(2), Item::new(3)]);
        assert!(item.is_expandable());
        let expansion = item.expansion.as_ref().map(|e| e.children.len());
        assert_eq!(expansion, Some(2));
        assert!(!item.expansion.as_ref().is_some_and(|e| e.expanded));
    }
}
