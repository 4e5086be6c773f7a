//! DataSet: in-memory owner of OSM primitives, keyed by primitive id.

use crate::error::Result;
use crate::primitive::{OsmPrimitive, PrimitiveId, PrimitiveIdStrategy, PrimitiveType};
use crate::storage::Storage;
use std::rc::Rc;

#[derive(Debug)]
pub struct DataSet {
    primitives: Storage<Rc<OsmPrimitive>, PrimitiveIdStrategy>,
}

impl DataSet {
    pub fn new() -> Self {
        Self {
            primitives: Storage::with_strategy(PrimitiveIdStrategy),
        }
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self {
            primitives: Storage::with_capacity_and_strategy(capacity, PrimitiveIdStrategy)?,
        })
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Adds a primitive. A primitive with the same type and id must not be
    /// present yet ([`StorageError::DuplicateElement`](crate::StorageError)).
    pub fn add_primitive(&mut self, primitive: Rc<OsmPrimitive>) -> Result<()> {
        self.primitives.insert_unique(primitive).map(|_| ())
    }

    pub fn get_primitive_by_id(&self, id: PrimitiveId) -> Option<&Rc<OsmPrimitive>> {
        self.primitives.get_by_key(&PrimitiveIdStrategy, &id)
    }

    pub fn contains_id(&self, id: PrimitiveId) -> bool {
        self.get_primitive_by_id(id).is_some()
    }

    pub fn remove_primitive(&mut self, id: PrimitiveId) -> Option<Rc<OsmPrimitive>> {
        self.primitives.remove_by_key(&PrimitiveIdStrategy, &id)
    }

    pub fn primitives(&self) -> impl Iterator<Item = &Rc<OsmPrimitive>> + '_ {
        self.primitives.iter()
    }

    pub fn primitives_of(
        &self,
        kind: PrimitiveType,
    ) -> impl Iterator<Item = &Rc<OsmPrimitive>> + '_ {
        self.primitives.iter().filter(move |p| p.id().kind() == kind)
    }

    /// Removes every primitive flagged deleted and returns them.
    pub fn purge_deleted(&mut self) -> Result<Vec<Rc<OsmPrimitive>>> {
        let mut purged = Vec::new();
        let mut cursor = self.primitives.cursor();
        loop {
            let deleted = match cursor.next(&self.primitives)? {
                Some(p) => p.is_deleted(),
                None => break,
            };
            if deleted {
                purged.push(cursor.remove(&mut self.primitives)?);
            }
        }
        Ok(purged)
    }
}

impl Default for DataSet {
    fn default() -> Self {
        Self::new()
    }
}
