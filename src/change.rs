/// Hint attached to a change notification so the view can do a partial
/// refresh instead of a full redraw of the row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Payload {
    /// Content of the row changed.
    Change,
    /// The row survived a filter transition.
    Filter,
    /// The row was restored or its child set was restored.
    Undo,
    AddSubItem,
    RemSubItem,
    Move,
    /// A header gained a section item.
    Link,
    /// A section item lost its header.
    Unlink,
    /// Selection membership toggled.
    Selection,
    Expanded,
    Collapsed,
}

/// Positional change notification consumed by the rendering side.
///
/// Notifications are queued in the order the mutations happened; positions
/// always refer to the list as it was right after the notified mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ListChange {
    Inserted { position: usize, count: usize },
    Removed { position: usize, count: usize },
    Moved { from: usize, to: usize },
    Changed {
        position: usize,
        payload: Option<Payload>,
    },
    /// The whole projection was swapped; positions from before are stale.
    DataSetReplaced,
}

impl ListChange {
    /// Signed change in list length caused by this notification.
    #[allow(clippy::cast_possible_wrap)]
    pub const fn len_delta(&self) -> isize {
        match *self {
            Self::Inserted { count, .. } => count as isize,
            Self::Removed { count, .. } => -(count as isize),
            Self::Moved { .. } | Self::Changed { .. } | Self::DataSetReplaced => 0,
        }
    }

    pub const fn is_structural(&self) -> bool {
        !matches!(self, Self::Changed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_delta_tracks_structure() {
        let events = [
            ListChange::Inserted {
                position: 0,
                count: 3,
            },
            ListChange::Removed {
                position: 1,
                count: 2,
            },
            ListChange::Moved { from: 0, to: 1 },
            ListChange::Changed {
                position: 0,
                payload: Some(Payload::Selection),
            },
        ];
        let delta: isize = events.iter().map(ListChange::len_delta).sum();
        assert_eq!(delta, 1);
        assert!(!events[3].is_structural());
    }
}
