//! Hash and equivalence strategies.
//!
//! A [`Storage`](crate::Storage) never calls `T: Hash` or `T: Eq` directly.
//! It asks its [`Strategy`] instead, so the same element type can be stored
//! under different notions of equality (semantic equality, pointer
//! identity, equality by primitive id).

use core::hash::{BuildHasher, Hash};
use hashbrown::hash_map::DefaultHashBuilder;
use std::rc::Rc;

/// Hash/equivalence pair used by a storage.
///
/// Implementations must keep `equivalent(a, b)` implying
/// `hash(a) == hash(b)`. A strategy that breaks this gets unspecified
/// (but memory-safe) lookup results.
pub trait Strategy<T: ?Sized> {
    fn hash(&self, value: &T) -> u64;
    fn equivalent(&self, a: &T, b: &T) -> bool;
}

/// Lookup of stored `T` elements by a different key type `K`.
///
/// `matches(k, t)` must imply that `hash_key(k)` equals the hash the
/// storage's own [`Strategy`] computes for `t`.
pub trait KeyStrategy<K: ?Sized, T: ?Sized> {
    fn hash_key(&self, key: &K) -> u64;
    fn matches(&self, key: &K, value: &T) -> bool;
}

/// `T: Hash + Eq` based strategy with an explicit build hasher.
#[derive(Clone, Debug, Default)]
pub struct DefaultStrategy<S = DefaultHashBuilder> {
    hasher: S,
}

impl<S> DefaultStrategy<S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self { hasher }
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }
}

impl<T, S> Strategy<T> for DefaultStrategy<S>
where
    T: ?Sized + Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    fn hash(&self, value: &T) -> u64 {
        self.hasher.hash_one(value)
    }

    #[inline]
    fn equivalent(&self, a: &T, b: &T) -> bool {
        a == b
    }
}

/// Pointer identity for `Rc` handles: two handles are equivalent only when
/// they point at the same allocation.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityStrategy;

impl<T: ?Sized> Strategy<Rc<T>> for IdentityStrategy {
    #[inline]
    fn hash(&self, value: &Rc<T>) -> u64 {
        // Drop pointer metadata; allocations are at least 8-aligned in practice,
        // so fold the low bits away before the table mixes the value.
        let addr = Rc::as_ptr(value) as *const () as usize as u64;
        addr.rotate_right(3)
    }

    #[inline]
    fn equivalent(&self, a: &Rc<T>, b: &Rc<T>) -> bool {
        Rc::ptr_eq(a, b)
    }
}
