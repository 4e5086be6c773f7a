// Property tests for Storage kept inside the crate so they can check table
// internals (tombstone accounting, load threshold) alongside the public API.

use crate::storage::{Slot, Storage};
use crate::StorageError;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};

// Pool-indexed operations: indices shrink to earlier values and op lists
// shrink in length.
#[derive(Clone, Debug)]
enum Op {
    Put(usize),
    InsertUnique(usize),
    Replace(usize),
    Remove(usize),
    Get(usize),
    Retain(u8),
    Clear,
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<u16>, Vec<Op>)> {
    proptest::collection::vec(any::<u16>(), 1..=24).prop_flat_map(|pool| {
        let idx = 0..pool.len();
        let op = prop_oneof![
            4 => idx.clone().prop_map(Op::Put),
            2 => idx.clone().prop_map(Op::InsertUnique),
            1 => idx.clone().prop_map(Op::Replace),
            3 => idx.clone().prop_map(Op::Remove),
            2 => idx.clone().prop_map(Op::Get),
            1 => (2u8..5).prop_map(Op::Retain),
            1 => Just(Op::Clear),
            1 => Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

#[derive(Clone, Copy, Debug)]
struct LowBits(u64);

impl crate::strategy::Strategy<u16> for LowBits {
    fn hash(&self, value: &u16) -> u64 {
        (*value as u64) % self.0
    }
    fn equivalent(&self, a: &u16, b: &u16) -> bool {
        a == b
    }
}

fn run_state_machine<H>(
    mut sut: Storage<u16, H>,
    pool: &[u16],
    ops: Vec<Op>,
) -> Result<(), TestCaseError>
where
    H: crate::strategy::Strategy<u16>,
{
    let mut model: HashSet<u16> = HashSet::new();
    for op in ops {
        match op {
            Op::Put(i) => {
                let v = pool[i];
                prop_assert_eq!(*sut.put(v), v);
                model.insert(v);
            }
            Op::InsertUnique(i) => {
                let v = pool[i];
                match sut.insert_unique(v) {
                    Ok(stored) => {
                        prop_assert_eq!(*stored, v);
                        prop_assert!(model.insert(v), "insert_unique succeeded on duplicate");
                    }
                    Err(StorageError::DuplicateElement) => {
                        prop_assert!(model.contains(&v), "duplicate error only when present");
                    }
                    Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                }
            }
            Op::Replace(i) => {
                let v = pool[i];
                let previous = sut.replace(v);
                prop_assert_eq!(previous.is_some(), !model.insert(v));
            }
            Op::Remove(i) => {
                let v = pool[i];
                let before = sut.len();
                let removed = sut.remove(&v);
                prop_assert_eq!(removed.is_some(), model.remove(&v));
                if removed.is_some() {
                    prop_assert_eq!(sut.len(), before - 1);
                    prop_assert!(sut.get(&v).is_none());
                }
            }
            Op::Get(i) => {
                let v = pool[i];
                prop_assert_eq!(sut.get(&v).copied(), model.get(&v).copied());
            }
            Op::Retain(m) => {
                sut.retain(|v| v % m as u16 != 0);
                model.retain(|v| v % m as u16 != 0);
            }
            Op::Clear => {
                sut.clear();
                model.clear();
            }
            Op::Iterate => {
                let seen: Vec<u16> = sut.iter().copied().collect();
                let unique: BTreeSet<u16> = seen.iter().copied().collect();
                prop_assert_eq!(seen.len(), unique.len(), "iteration yielded a duplicate");
                prop_assert_eq!(unique, model.iter().copied().collect::<BTreeSet<_>>());
            }
        }

        // Post-conditions after each op
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        let slots = sut.table().slots();
        let live = slots.iter().filter(|s| matches!(s, Slot::Full { .. })).count();
        prop_assert_eq!(live, sut.len());
        let used = slots.iter().filter(|s| !matches!(s, Slot::Empty)).count();
        prop_assert!(used < sut.slot_count(), "at least one empty slot must remain");
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashSet.
// - put is idempotent and returns the stored value.
// - insert_unique / replace report presence exactly as the model does.
// - remove then get misses; len drops by one.
// - iteration yields each live element once.
// - live slot count equals len and an empty slot always remains.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_state_machine(Storage::new(), &pool, ops)?;
    }

    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let sut: Storage<u16, LowBits> =
            Storage::with_capacity_and_strategy(1, LowBits(3)).unwrap();
        run_state_machine(sut, &pool, ops)?;
    }
}

// Property: a cursor that removes a random subset while traversing visits
// every element exactly once, and the survivors are exactly the kept ones.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_cursor_removal(
        values in proptest::collection::btree_set(any::<u16>(), 0..200),
        modulus in 1u16..6,
    ) {
        let mut sut: Storage<u16, LowBits> = Storage::with_strategy(LowBits(17));
        sut.extend(values.iter().copied());

        let mut cursor = sut.cursor();
        let mut visited = BTreeSet::new();
        while let Some(v) = cursor.next(&sut).unwrap().copied() {
            prop_assert!(visited.insert(v), "element {} visited twice", v);
            if v % modulus == 0 {
                prop_assert_eq!(cursor.remove(&mut sut).unwrap(), v);
            }
        }
        prop_assert_eq!(&visited, &values);
        let kept: BTreeSet<u16> = values.iter().copied().filter(|v| v % modulus != 0).collect();
        prop_assert_eq!(sut.iter().copied().collect::<BTreeSet<_>>(), kept);
    }

    // Equality law: same contents in any insertion order, any capacity and
    // any removal history compare equal and hash alike.
    #[test]
    fn prop_equality_ignores_layout(
        values in proptest::collection::vec(any::<u16>(), 0..100),
        extra in proptest::collection::vec(any::<u16>(), 0..50),
        cap in 1usize..300,
    ) {
        let strategy = LowBits(1 << 16);
        let mut a: Storage<u16, LowBits> = Storage::with_strategy(strategy);
        a.extend(values.iter().copied());

        let mut b: Storage<u16, LowBits> =
            Storage::with_capacity_and_strategy(cap, strategy).unwrap();
        b.extend(extra.iter().copied());
        b.extend(values.iter().rev().copied());
        for v in &extra {
            if !values.contains(v) {
                b.remove(v);
            }
        }
        prop_assert!(a == b);
        prop_assert_eq!(a.content_hash(), b.content_hash());

        if let Some(v) = values.first() {
            b.remove(v);
            prop_assert!(a != b);
        }
    }
}
