//! Lookup of stored elements by a foreign key type.

use crate::storage::{Iter, Storage};
use crate::strategy::{KeyStrategy, Strategy};
use core::marker::PhantomData;

/// Read-only map view `K -> &T` over a [`Storage`].
///
/// The key strategy must hash a key the same way the storage's strategy
/// hashes the element it matches; see [`KeyStrategy`].
pub struct ForeignKey<'a, K: ?Sized, T, H, F> {
    storage: &'a Storage<T, H>,
    keys: F,
    _key: PhantomData<fn(&K)>,
}

impl<'a, K, T, H, F> ForeignKey<'a, K, T, H, F>
where
    K: ?Sized,
    H: Strategy<T>,
    F: KeyStrategy<K, T>,
{
    pub(crate) fn new(storage: &'a Storage<T, H>, keys: F) -> Self {
        Self {
            storage,
            keys,
            _key: PhantomData,
        }
    }

    pub fn get(&self, key: &K) -> Option<&'a T> {
        self.storage.get_by_key(&self.keys, key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn iter(&self) -> Iter<'a, T> {
        self.storage.iter()
    }
}
