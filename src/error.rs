//! Error types for list edits.

/// Result type alias for list operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Conditions under which a list operation is rejected.
///
/// Every rejected operation leaves the flat list, the selection and the undo
/// bin exactly as they were before the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Index outside the list, or inside a structurally protected boundary
    /// (splitting a section or an expanded parent's child run).
    #[error("invalid position {position} (list length {len})")]
    InvalidPosition { position: usize, len: usize },

    /// The move would break header/section contiguity or move a child out of
    /// its parent's child run.
    #[error("cannot move item from {from} to {to}")]
    InvalidMove { from: usize, to: usize },

    /// A background filter computation has been prepared but not applied yet.
    #[error("a filter computation is in progress")]
    FilterInProgress,

    /// Restore or commit was requested with nothing pending.
    #[error("the undo bin is empty")]
    UndoBinEmpty,

    /// An item references an identity that is not registered.
    #[error("unknown item {0}")]
    UnknownItem(String),

    /// An identity is already registered.
    #[error("duplicate item {0}")]
    DuplicateItem(String),

    /// The item at the position cannot own children.
    #[error("item at position {position} is not expandable")]
    NotExpandable { position: usize },
}

impl Error {
    pub(crate) const fn invalid_position(position: usize, len: usize) -> Self {
        Self::InvalidPosition { position, len }
    }

    pub(crate) fn unknown_item(id: impl std::fmt::Debug) -> Self {
        Self::UnknownItem(format!("{id:?}"))
    }

    pub(crate) fn duplicate_item(id: impl std::fmt::Debug) -> Self {
        Self::DuplicateItem(format!("{id:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_values() {
        assert_eq!(
            Error::invalid_position(7, 3).to_string(),
            "invalid position 7 (list length 3)"
        );
        assert_eq!(Error::unknown_item(42u32).to_string(), "unknown item 42");
    }
}
