//! Debug-only reentrancy check.
//!
//! `Storage` calls into user code (`Strategy::hash`, `Strategy::equivalent`,
//! `KeyStrategy::matches`) while its slot table is borrowed. A strategy that
//! reaches back into the same storage from there is a programming error. In
//! debug builds the nested entry panics; in release builds the check
//! compiles away.

#[cfg(debug_assertions)]
use core::cell::Cell;
use core::marker::PhantomData;

/// Per-storage depth counter. Entry points start with
/// `let _g = self.reentrancy.enter();`.
#[derive(Debug)]
pub(crate) struct Reentrancy {
    #[cfg(debug_assertions)]
    depth: Cell<u32>,
}

impl Reentrancy {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            depth: Cell::new(0),
        }
    }

    /// Marks the storage as busy until the returned guard drops.
    #[inline]
    pub(crate) fn enter(&self) -> Entered<'_> {
        #[cfg(debug_assertions)]
        {
            let d = self.depth.get();
            assert!(d == 0, "reentrant call into storage from a hash strategy");
            self.depth.set(d + 1);
            Entered {
                owner: self,
                _lt: PhantomData,
            }
        }

        #[cfg(not(debug_assertions))]
        {
            Entered { _lt: PhantomData }
        }
    }
}

impl Default for Reentrancy {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by [`Reentrancy::enter`].
pub(crate) struct Entered<'a> {
    #[cfg(debug_assertions)]
    owner: &'a Reentrancy,
    _lt: PhantomData<&'a ()>,
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            let d = self.owner.depth.get();
            debug_assert!(d > 0);
            self.owner.depth.set(d - 1);
        }
    }
}
