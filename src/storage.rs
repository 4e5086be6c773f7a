//! Storage: open-addressing set with pluggable strategies and tombstones.

use crate::cursor::{Cursor, SafeIter};
use crate::error::{Result, StorageError};
use crate::foreign_key::ForeignKey;
use crate::reentrancy::Reentrancy;
use crate::strategy::{DefaultStrategy, KeyStrategy, Strategy};
use core::fmt;
use core::hash::{BuildHasher, Hash, Hasher};
use core::iter::FusedIterator;
use core::sync::atomic::{AtomicU64, Ordering};
use hashbrown::hash_map::DefaultHashBuilder;

/// Element capacity of [`Storage::new`].
pub const DEFAULT_CAPACITY: usize = 16;

const MIN_SLOTS: usize = 4;

// Owner ids tie cursors to the storage that created them.
static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

fn next_owner() -> u64 {
    NEXT_OWNER.fetch_add(1, Ordering::Relaxed)
}

/// Live + tombstone slots allowed in a table of `slots` slots (3/4).
#[inline]
fn max_load(slots: usize) -> usize {
    slots - slots / 4
}

/// Smallest power-of-two slot count holding `capacity` elements.
fn slots_for(capacity: usize) -> Option<usize> {
    let wanted = capacity.checked_mul(4)?.div_ceil(3);
    wanted.max(MIN_SLOTS).checked_next_power_of_two()
}

#[inline]
fn bucket(hash: u64, mask: usize) -> usize {
    // Fibonacci mixing; id and address hashes have weak low bits.
    let h = hash.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    ((h ^ (h >> 32)) as usize) & mask
}

#[derive(Clone, Debug)]
pub(crate) enum Slot<T> {
    Empty,
    Tombstone,
    Full { hash: u64, value: T },
}

pub(crate) enum Probe {
    Found(usize),
    /// First reusable slot on the probe path (tombstone or empty).
    Vacant(usize),
    /// Every slot was visited without finding an empty one.
    Exhausted,
}

/// Slot table and its bookkeeping. Never calls into user code: hashes are
/// computed by the owning `Storage` and stored next to each element.
#[derive(Clone, Debug)]
pub(crate) struct Table<T> {
    slots: Vec<Slot<T>>,
    len: usize,
    tombstones: usize,
    mod_count: u64,
    generation: u64,
}

impl<T> Table<T> {
    fn with_slots(slots: usize) -> Self {
        let mut v = Vec::with_capacity(slots);
        v.resize_with(slots, || Slot::Empty);
        Self {
            slots: v,
            len: 0,
            tombstones: 0,
            mod_count: 0,
            generation: 0,
        }
    }

    pub(crate) fn slots(&self) -> &[Slot<T>] {
        &self.slots
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    fn probe<F>(&self, hash: u64, mut is_match: F) -> Probe
    where
        F: FnMut(&T) -> bool,
    {
        let mask = self.slots.len() - 1;
        let mut idx = bucket(hash, mask);
        let mut first_tombstone = None;
        for _ in 0..self.slots.len() {
            match &self.slots[idx] {
                Slot::Empty => return Probe::Vacant(first_tombstone.unwrap_or(idx)),
                Slot::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(idx);
                    }
                }
                Slot::Full { hash: h, value } => {
                    if *h == hash && is_match(value) {
                        return Probe::Found(idx);
                    }
                }
            }
            idx = (idx + 1) & mask;
        }
        match first_tombstone {
            Some(idx) => Probe::Vacant(idx),
            None => Probe::Exhausted,
        }
    }

    /// Picks the slot a new element with `hash` goes into, rebuilding the
    /// table first if filling an empty slot would cross the load threshold.
    fn slot_for_insert(&mut self, probe: Probe, hash: u64) -> Result<usize> {
        match probe {
            Probe::Vacant(idx) if matches!(self.slots[idx], Slot::Tombstone) => Ok(idx),
            Probe::Vacant(idx) if self.len + self.tombstones < max_load(self.slots.len()) => {
                Ok(idx)
            }
            _ => {
                self.rebuild(self.len + 1)?;
                Ok(self.find_empty(hash))
            }
        }
    }

    fn find_empty(&self, hash: u64) -> usize {
        let mask = self.slots.len() - 1;
        let mut idx = bucket(hash, mask);
        while !matches!(self.slots[idx], Slot::Empty) {
            idx = (idx + 1) & mask;
        }
        idx
    }

    fn fill(&mut self, idx: usize, hash: u64, value: T) {
        if matches!(self.slots[idx], Slot::Tombstone) {
            self.tombstones -= 1;
        }
        debug_assert!(!matches!(self.slots[idx], Slot::Full { .. }));
        self.slots[idx] = Slot::Full { hash, value };
        self.len += 1;
        self.mod_count = self.mod_count.wrapping_add(1);
    }

    pub(crate) fn value_at(&self, idx: usize) -> &T {
        match &self.slots[idx] {
            Slot::Full { value, .. } => value,
            _ => unreachable!("slot {idx} must hold a live element"),
        }
    }

    /// Tombstones a live slot and returns its element.
    pub(crate) fn take_at(&mut self, idx: usize) -> T {
        match core::mem::replace(&mut self.slots[idx], Slot::Tombstone) {
            Slot::Full { value, .. } => {
                self.len -= 1;
                self.tombstones += 1;
                self.mod_count = self.mod_count.wrapping_add(1);
                value
            }
            other => {
                self.slots[idx] = other;
                unreachable!("slot {idx} must hold a live element")
            }
        }
    }

    fn swap_at(&mut self, idx: usize, new: T) -> T {
        match &mut self.slots[idx] {
            Slot::Full { value, .. } => core::mem::replace(value, new),
            _ => unreachable!("slot {idx} must hold a live element"),
        }
    }

    /// Rebuilds the table so `min_len` elements fit. Same size when at most
    /// half the load threshold is live (tombstone cleanup), else doubled.
    /// The new slots are allocated before anything moves; on failure the
    /// table is untouched.
    fn rebuild(&mut self, min_len: usize) -> Result<()> {
        let current = self.slots.len();
        let target = if min_len <= max_load(current) / 2 {
            current
        } else {
            let mut n = current;
            while max_load(n) < min_len {
                n = n
                    .checked_mul(2)
                    .ok_or(StorageError::AllocationFailed { slots: usize::MAX })?;
            }
            n
        };

        let mut fresh: Vec<Slot<T>> = Vec::new();
        fresh
            .try_reserve_exact(target)
            .map_err(|_| StorageError::AllocationFailed { slots: target })?;
        fresh.resize_with(target, || Slot::Empty);

        let old = core::mem::replace(&mut self.slots, fresh);
        let mask = target - 1;
        for slot in old {
            if let Slot::Full { hash, value } = slot {
                let mut idx = bucket(hash, mask);
                while !matches!(self.slots[idx], Slot::Empty) {
                    idx = (idx + 1) & mask;
                }
                self.slots[idx] = Slot::Full { hash, value };
            }
        }
        self.tombstones = 0;
        self.generation = self.generation.wrapping_add(1);
        self.mod_count = self.mod_count.wrapping_add(1);
        Ok(())
    }

    /// Empties every slot, keeping the slot count. Returns the old slots so
    /// the caller decides when element destructors run.
    fn reset(&mut self) -> Vec<Slot<T>> {
        let mut fresh = Vec::with_capacity(self.slots.len());
        fresh.resize_with(self.slots.len(), || Slot::Empty);
        let old = core::mem::replace(&mut self.slots, fresh);
        self.len = 0;
        self.tombstones = 0;
        self.generation = self.generation.wrapping_add(1);
        self.mod_count = self.mod_count.wrapping_add(1);
        old
    }
}

enum Placed<T> {
    Existing(usize, T),
    Inserted(usize),
}

/// Deduplicating set of `T` under the strategy `H`.
///
/// Elements are stored in a power-of-two open-addressing table with linear
/// probing. Removal leaves a tombstone so no element ever moves except when
/// the table is rebuilt; that is what lets a [`Cursor`] keep its place
/// while elements are removed (see the crate docs for the full policy).
pub struct Storage<T, H = DefaultStrategy> {
    strategy: H,
    table: Table<T>,
    owner: u64,
    reentrancy: Reentrancy,
}

impl<T> Storage<T>
where
    T: Hash + Eq,
{
    pub fn new() -> Self {
        Self::with_strategy(DefaultStrategy::default())
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_capacity_and_strategy(capacity, DefaultStrategy::default())
    }
}

impl<T> Default for Storage<T>
where
    T: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, H> Storage<T, H>
where
    H: Strategy<T>,
{
    pub fn with_strategy(strategy: H) -> Self {
        let slots = slots_for(DEFAULT_CAPACITY).unwrap_or(MIN_SLOTS);
        Self::from_parts(strategy, slots)
    }

    /// Creates a storage that holds `capacity` elements before its first
    /// resize.
    ///
    /// Fails with [`StorageError::InvalidArgument`] for a zero capacity or
    /// one whose slot count does not fit in `usize`.
    pub fn with_capacity_and_strategy(capacity: usize, strategy: H) -> Result<Self> {
        if capacity == 0 {
            return Err(StorageError::InvalidArgument(
                "capacity must be positive".to_string(),
            ));
        }
        let slots = slots_for(capacity).ok_or_else(|| {
            StorageError::InvalidArgument(format!("capacity {capacity} is too large"))
        })?;
        Ok(Self::from_parts(strategy, slots))
    }

    fn from_parts(strategy: H, slots: usize) -> Self {
        Self {
            strategy,
            table: Table::with_slots(slots),
            owner: next_owner(),
            reentrancy: Reentrancy::new(),
        }
    }

    pub fn strategy(&self) -> &H {
        &self.strategy
    }

    pub fn len(&self) -> usize {
        self.table.len
    }

    pub fn is_empty(&self) -> bool {
        self.table.len == 0
    }

    /// Live plus tombstoned slots the table allows before it is rebuilt.
    /// Reinserting into a tombstone does not count against it twice.
    pub fn capacity(&self) -> usize {
        max_load(self.table.slots.len())
    }

    /// Structural change counter: bumped by every insertion, removal,
    /// rebuild and clear.
    pub fn mod_count(&self) -> u64 {
        self.table.mod_count
    }

    pub(crate) fn owner(&self) -> u64 {
        self.owner
    }

    pub(crate) fn table(&self) -> &Table<T> {
        &self.table
    }

    pub(crate) fn table_mut(&mut self) -> &mut Table<T> {
        &mut self.table
    }

    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        self.table.slots.len()
    }

    fn place(&mut self, value: T) -> Result<Placed<T>> {
        let _g = self.reentrancy.enter();
        let hash = self.strategy.hash(&value);
        let strategy = &self.strategy;
        match self
            .table
            .probe(hash, |stored| strategy.equivalent(stored, &value))
        {
            Probe::Found(idx) => Ok(Placed::Existing(idx, value)),
            probe => {
                let idx = self.table.slot_for_insert(probe, hash)?;
                self.table.fill(idx, hash, value);
                Ok(Placed::Inserted(idx))
            }
        }
    }

    /// Inserts `value` unless an equivalent element is already stored, and
    /// returns the stored element either way. A duplicate argument is
    /// dropped.
    ///
    /// # Panics
    ///
    /// Panics if the table needs to grow and the allocation fails, like
    /// `Vec::push`. Use [`Storage::try_put`] to handle that case.
    pub fn put(&mut self, value: T) -> &T {
        match self.try_put(value) {
            Ok(stored) => stored,
            Err(e) => panic!("Storage::put: {e}"),
        }
    }

    /// Like [`Storage::put`], but reports a failed resize as
    /// [`StorageError::AllocationFailed`] and leaves the table as it was.
    pub fn try_put(&mut self, value: T) -> Result<&T> {
        let idx = match self.place(value)? {
            Placed::Existing(idx, duplicate) => {
                drop(duplicate);
                idx
            }
            Placed::Inserted(idx) => idx,
        };
        Ok(self.table.value_at(idx))
    }

    /// Inserts `value`, failing with [`StorageError::DuplicateElement`] if an
    /// equivalent element is already stored.
    pub fn insert_unique(&mut self, value: T) -> Result<&T> {
        match self.place(value)? {
            Placed::Existing(..) => Err(StorageError::DuplicateElement),
            Placed::Inserted(idx) => Ok(self.table.value_at(idx)),
        }
    }

    /// Stores `value`, returning the equivalent element it displaced.
    ///
    /// # Panics
    ///
    /// Panics if the table needs to grow and the allocation fails, like
    /// [`Storage::put`].
    pub fn replace(&mut self, value: T) -> Option<T> {
        match self.place(value) {
            Ok(Placed::Existing(idx, value)) => Some(self.table.swap_at(idx, value)),
            Ok(Placed::Inserted(_)) => None,
            Err(e) => panic!("Storage::replace: {e}"),
        }
    }

    pub fn get(&self, value: &T) -> Option<&T> {
        let _g = self.reentrancy.enter();
        let hash = self.strategy.hash(value);
        match self
            .table
            .probe(hash, |stored| self.strategy.equivalent(stored, value))
        {
            Probe::Found(idx) => Some(self.table.value_at(idx)),
            _ => None,
        }
    }

    pub fn contains(&self, value: &T) -> bool {
        self.get(value).is_some()
    }

    /// Removes the element equivalent to `value`. The slot becomes a
    /// tombstone, so active cursors keep their position.
    pub fn remove(&mut self, value: &T) -> Option<T> {
        let _g = self.reentrancy.enter();
        let hash = self.strategy.hash(value);
        let strategy = &self.strategy;
        match self
            .table
            .probe(hash, |stored| strategy.equivalent(stored, value))
        {
            Probe::Found(idx) => Some(self.table.take_at(idx)),
            _ => None,
        }
    }

    pub fn get_by_key<K, F>(&self, keys: &F, key: &K) -> Option<&T>
    where
        K: ?Sized,
        F: KeyStrategy<K, T>,
    {
        let _g = self.reentrancy.enter();
        let hash = keys.hash_key(key);
        match self.table.probe(hash, |stored| keys.matches(key, stored)) {
            Probe::Found(idx) => Some(self.table.value_at(idx)),
            _ => None,
        }
    }

    pub fn remove_by_key<K, F>(&mut self, keys: &F, key: &K) -> Option<T>
    where
        K: ?Sized,
        F: KeyStrategy<K, T>,
    {
        let _g = self.reentrancy.enter();
        let hash = keys.hash_key(key);
        match self.table.probe(hash, |stored| keys.matches(key, stored)) {
            Probe::Found(idx) => Some(self.table.take_at(idx)),
            _ => None,
        }
    }

    /// Read-only view that looks elements up by a foreign key type.
    pub fn foreign_key<K, F>(&self, keys: F) -> ForeignKey<'_, K, T, H, F>
    where
        K: ?Sized,
        F: KeyStrategy<K, T>,
    {
        ForeignKey::new(self, keys)
    }

    /// Keeps only the elements for which `keep` returns true.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&T) -> bool,
    {
        for idx in 0..self.table.slots.len() {
            let evict = match &self.table.slots[idx] {
                Slot::Full { value, .. } => !keep(value),
                _ => false,
            };
            if evict {
                drop(self.table.take_at(idx));
            }
        }
    }

    /// Removes every element and keeps the slot count. Invalidates cursors.
    pub fn clear(&mut self) {
        let old = {
            let _g = self.reentrancy.enter();
            self.table.reset()
        };
        // Element destructors run once the table is consistent again.
        drop(old);
    }

    /// Borrowing iterator in slot order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            slots: self.table.slots.iter(),
            remaining: self.table.len,
        }
    }

    /// Detached cursor for removal during traversal.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self)
    }

    /// Iterator that hands out clones and lets the caller mutate the
    /// storage between steps.
    pub fn safe_iter(&mut self) -> SafeIter<'_, T, H>
    where
        T: Clone,
    {
        SafeIter::new(self)
    }

    /// Order-independent hash of the contents: the wrapping sum of the
    /// strategy hash of every element. Only comparable between storages
    /// whose strategies hash alike; [`Hash`] for default-strategy storages
    /// does not depend on the strategy instance.
    pub fn content_hash(&self) -> u64 {
        self.table
            .slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Full { hash, .. } => Some(*hash),
                _ => None,
            })
            .fold(0u64, u64::wrapping_add)
    }
}

impl<T, H, H2> PartialEq<Storage<T, H2>> for Storage<T, H>
where
    H: Strategy<T>,
    H2: Strategy<T>,
{
    fn eq(&self, other: &Storage<T, H2>) -> bool {
        self.len() == other.len()
            && self.iter().all(|e| other.contains(e))
            && other.iter().all(|e| self.contains(e))
    }
}

impl<T, H> Eq for Storage<T, H> where H: Strategy<T> {}

/// Hashes the contents with fixed keys, independent of the strategy's build
/// hasher, so equal storages hash alike across `RandomState`s. Only
/// default-strategy storages are hashable.
impl<T, S> Hash for Storage<T, DefaultStrategy<S>>
where
    T: Hash + Eq,
    S: BuildHasher,
{
    fn hash<W: Hasher>(&self, state: &mut W) {
        let fixed = DefaultHashBuilder::default();
        let sum = self
            .iter()
            .fold(0u64, |acc, value| acc.wrapping_add(fixed.hash_one(value)));
        state.write_usize(self.len());
        state.write_u64(sum);
    }
}

impl<T: fmt::Debug, H> fmt::Debug for Storage<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let live = self.table.slots.iter().filter_map(|slot| match slot {
            Slot::Full { value, .. } => Some(value),
            _ => None,
        });
        f.debug_set().entries(live).finish()
    }
}

impl<T: Clone, H: Clone> Clone for Storage<T, H> {
    fn clone(&self) -> Self {
        Self {
            strategy: self.strategy.clone(),
            table: self.table.clone(),
            owner: next_owner(),
            reentrancy: Reentrancy::new(),
        }
    }
}

impl<T, H> Extend<T> for Storage<T, H>
where
    H: Strategy<T>,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.put(value);
        }
    }
}

impl<T, S> FromIterator<T> for Storage<T, DefaultStrategy<S>>
where
    T: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut storage = Self::with_strategy(DefaultStrategy::default());
        storage.extend(iter);
        storage
    }
}

/// Borrowing iterator over live elements in slot order.
pub struct Iter<'a, T> {
    slots: core::slice::Iter<'a, Slot<T>>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        for slot in self.slots.by_ref() {
            if let Slot::Full { value, .. } = slot {
                self.remaining -= 1;
                return Some(value);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
impl<T> FusedIterator for Iter<'_, T> {}

impl<'a, T, H> IntoIterator for &'a Storage<T, H>
where
    H: Strategy<T>,
{
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Owning iterator over the elements of a storage.
pub struct IntoIter<T> {
    slots: std::vec::IntoIter<Slot<T>>,
    remaining: usize,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        for slot in self.slots.by_ref() {
            if let Slot::Full { value, .. } = slot {
                self.remaining -= 1;
                return Some(value);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}
impl<T> FusedIterator for IntoIter<T> {}

impl<T, H> IntoIterator for Storage<T, H> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            remaining: self.table.len,
            slots: self.table.slots.into_iter(),
        }
    }
}
