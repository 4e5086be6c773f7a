//! primitive-storage: a deduplicating open-addressing set with pluggable
//! hash strategies and iteration that tolerates removal mid-traversal.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: store OSM primitives (nodes, ways, relations) once per
//!   identity, where "identity" is chosen per container: semantic
//!   equality, `Rc` pointer identity, or primitive id.
//! - Layers:
//!   - Strategy / KeyStrategy: hash + equivalence supplied as values at
//!     construction; no global hashing state.
//!   - Table: power-of-two slot vector with linear probing. Slots are
//!     empty, tombstoned or full; a full slot caches the element's hash.
//!   - Storage<T, H>: public set API (put, get, remove, resize, equality)
//!     over a Table, with a debug-only reentrancy guard around every call
//!     into strategy code.
//!   - Cursor / SafeIter: detached traversal that survives removals.
//!   - DataSet: owner of `Rc<OsmPrimitive>` elements keyed by id.
//!
//! Constraints
//! - Single-threaded: no locking. `Storage` is `Send` (when `T` and `H`
//!   are) so it can live behind an external `Mutex`, but not `Sync`.
//! - All operations are synchronous. Resize is the only O(n) operation.
//! - Strategies must keep `equivalent(a, b)` implying equal hashes.
//!   Violations give unspecified lookups, never memory unsafety.
//!
//! Hashes and rebuilds
//! - The strategy hashes an element exactly once, on insertion. Rebuilds
//!   and `content_hash` use the cached value, so they never call into
//!   user code.
//! - A rebuild happens when filling an empty slot would push
//!   live + tombstone slots past 3/4 of the table. If at most half of that
//!   threshold is live, the table is rehashed at the same size (tombstone
//!   cleanup); otherwise it doubles. The new slots are allocated before
//!   anything moves, so a failed allocation leaves the old table intact.
//!
//! Safe iteration policy
//! - Removal writes a tombstone and never moves other elements, so a
//!   `Cursor` stays valid across any number of removals, whether made
//!   through the cursor itself or through `Storage::remove`/`retain`.
//!   Removed elements are never yielded afterwards; nothing is yielded
//!   twice.
//! - Insertions that do not rebuild are tolerated: an element landing
//!   ahead of the cursor is yielded, one landing behind it is not.
//! - A rebuild or `clear` bumps the table generation. The cursor checks
//!   it on every step and fails with `ConcurrentStructuralChange`.
//! - `Cursor::remove` also fails if any structural change happened since
//!   the element was yielded (`mod_count`), so it can never remove a
//!   different element that reused the slot.
//! - `SafeIter` holds the storage's only borrow and exposes removal alone
//!   (`remove_current`, `remove`, `retain`), so it is never rebuilt under
//!   and never fails.
//!
//! Equality
//! - Two storages are equal when each element of one has an equivalent
//!   in the other under the other's strategy. Capacity, tombstones,
//!   counters and slot order do not take part.
//! - `Hash` is only implemented for `DefaultStrategy` storages, summing a
//!   fixed-key hash of every element, so it agrees with `Eq` whatever
//!   build hasher each storage uses.

mod cursor;
mod dataset;
mod error;
mod foreign_key;
mod primitive;
mod reentrancy;
mod storage;
pub mod strategy;

#[cfg(test)]
mod storage_proptest;

// Public surface
pub use cursor::{Cursor, SafeIter};
pub use dataset::DataSet;
pub use error::{Result, StorageError};
pub use foreign_key::ForeignKey;
pub use primitive::{OsmPrimitive, PrimitiveId, PrimitiveIdStrategy, PrimitiveType};
pub use storage::{IntoIter, Iter, Storage, DEFAULT_CAPACITY};
pub use strategy::{DefaultStrategy, IdentityStrategy, KeyStrategy, Strategy};
