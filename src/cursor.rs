//! Safe iteration: a detached cursor and the borrowing `SafeIter` on top.
//!
//! A [`Cursor`] remembers a slot position instead of borrowing the storage,
//! so the caller may mutate the storage between steps. Because removal
//! only tombstones a slot, positions stay valid until the table is rebuilt
//! or cleared; from then on the cursor fails with
//! [`StorageError::ConcurrentStructuralChange`].

use crate::error::{Result, StorageError};
use crate::storage::{Slot, Storage};
use crate::strategy::Strategy;

/// Detached position inside one particular [`Storage`].
#[derive(Clone, Debug)]
pub struct Cursor {
    owner: u64,
    generation: u64,
    next_slot: usize,
    current: Option<usize>,
    // mod_count observed when `current` was yielded
    yielded_at: u64,
}

impl Cursor {
    pub(crate) fn new<T, H>(storage: &Storage<T, H>) -> Self
    where
        H: Strategy<T>,
    {
        Self {
            owner: storage.owner(),
            generation: storage.table().generation(),
            next_slot: 0,
            current: None,
            yielded_at: storage.mod_count(),
        }
    }

    fn check<T, H>(&self, storage: &Storage<T, H>) -> Result<()>
    where
        H: Strategy<T>,
    {
        if storage.owner() != self.owner {
            return Err(StorageError::ForeignCursor);
        }
        if storage.table().generation() != self.generation {
            return Err(StorageError::ConcurrentStructuralChange);
        }
        Ok(())
    }

    /// Yields the next live element in slot order, or `None` once the end
    /// of the table is reached.
    ///
    /// Elements removed since the cursor passed their slot are never
    /// yielded, and no element is yielded twice. Fails if the table was
    /// rebuilt or cleared after the cursor was created.
    pub fn next<'a, T, H>(&mut self, storage: &'a Storage<T, H>) -> Result<Option<&'a T>>
    where
        H: Strategy<T>,
    {
        self.check(storage)?;
        let slots = storage.table().slots();
        while self.next_slot < slots.len() {
            let idx = self.next_slot;
            self.next_slot += 1;
            if let Slot::Full { value, .. } = &slots[idx] {
                self.current = Some(idx);
                self.yielded_at = storage.mod_count();
                return Ok(Some(value));
            }
        }
        self.current = None;
        Ok(None)
    }

    /// Removes the element yielded by the last call to [`Cursor::next`].
    ///
    /// Fails with [`StorageError::NoCurrentElement`] if nothing is pending,
    /// and with [`StorageError::ConcurrentStructuralChange`] if the storage
    /// changed structurally since that element was yielded.
    pub fn remove<T, H>(&mut self, storage: &mut Storage<T, H>) -> Result<T>
    where
        H: Strategy<T>,
    {
        self.check(storage)?;
        let idx = self.current.ok_or(StorageError::NoCurrentElement)?;
        if storage.mod_count() != self.yielded_at {
            return Err(StorageError::ConcurrentStructuralChange);
        }
        self.current = None;
        Ok(storage.table_mut().take_at(idx))
    }

    /// Removes the pending element for a caller that can only have removed
    /// elements since it was yielded, so its slot cannot hold another one.
    fn take_current<T, H>(&mut self, storage: &mut Storage<T, H>) -> Result<T>
    where
        H: Strategy<T>,
    {
        self.check(storage)?;
        let idx = self.current.take().ok_or(StorageError::NoCurrentElement)?;
        if !matches!(storage.table().slots()[idx], Slot::Full { .. }) {
            return Err(StorageError::NoCurrentElement);
        }
        Ok(storage.table_mut().take_at(idx))
    }
}

/// Iterator over clones of the stored elements that can remove elements
/// mid-traversal:
///
/// ```
/// use primitive_storage::Storage;
///
/// let mut s: Storage<i32> = (1..=5).collect();
/// let mut it = s.safe_iter();
/// while let Some(v) = it.next() {
///     if v % 2 == 0 {
///         it.remove(&v);
///     }
/// }
/// let mut left: Vec<i32> = s.iter().copied().collect();
/// left.sort();
/// assert_eq!(left, vec![1, 3, 5]);
/// ```
///
/// The iterator holds the only borrow of the storage and offers removal
/// alone, so the table is never rebuilt under it. To insert while walking,
/// use a [`Cursor`], which reports a rebuild as an error.
pub struct SafeIter<'a, T, H> {
    storage: &'a mut Storage<T, H>,
    cursor: Cursor,
}

impl<'a, T, H> SafeIter<'a, T, H>
where
    T: Clone,
    H: Strategy<T>,
{
    pub(crate) fn new(storage: &'a mut Storage<T, H>) -> Self {
        let cursor = storage.cursor();
        Self { storage, cursor }
    }

    /// Removes the element returned by the last `next`. Fails with
    /// [`StorageError::NoCurrentElement`] if nothing was yielded yet or the
    /// element is already gone.
    pub fn remove_current(&mut self) -> Result<T> {
        self.cursor.take_current(&mut *self.storage)
    }

    /// Removes any element, ahead of or behind the iterator.
    pub fn remove(&mut self, value: &T) -> Option<T> {
        self.storage.remove(value)
    }

    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&T) -> bool,
    {
        self.storage.retain(keep)
    }

    pub fn storage(&self) -> &Storage<T, H> {
        &*self.storage
    }
}

impl<T, H> Iterator for SafeIter<'_, T, H>
where
    T: Clone,
    H: Strategy<T>,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        match self.cursor.next(&*self.storage) {
            Ok(value) => value.cloned(),
            // Removals never rebuild and the cursor is this storage's own.
            Err(e) => unreachable!("SafeIter: {e}"),
        }
    }
}
