//! Error types for primitive storage.

use thiserror::Error;

/// Result type alias for fallible storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors reported by [`Storage`](crate::Storage), its cursors and the
/// [`DataSet`](crate::DataSet) built on top of it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Construction parameter out of range (zero or overflowing capacity).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An equivalent element is already stored.
    #[error("an equivalent element is already stored")]
    DuplicateElement,

    /// The storage was restructured in a way the cursor cannot follow.
    #[error("storage was structurally modified outside the active cursor")]
    ConcurrentStructuralChange,

    /// `Cursor::remove` called before `next` or twice for the same element.
    #[error("cursor has no current element to remove")]
    NoCurrentElement,

    /// Cursor used with a storage other than the one that created it.
    #[error("cursor belongs to a different storage")]
    ForeignCursor,

    /// Growing the slot table failed; the table is unchanged.
    #[error("failed to allocate {slots} slots")]
    AllocationFailed { slots: usize },
}
