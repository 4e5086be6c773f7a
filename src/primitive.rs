//! OSM primitive model and the id-based storage strategy.

use crate::strategy::{KeyStrategy, Strategy};
use core::borrow::Borrow;
use core::cell::Cell;
use core::fmt;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveType {
    Node,
    Way,
    Relation,
}

impl PrimitiveType {
    /// Name used by the OSM API and file formats.
    pub fn api_name(self) -> &'static str {
        match self {
            PrimitiveType::Node => "node",
            PrimitiveType::Way => "way",
            PrimitiveType::Relation => "relation",
        }
    }
}

/// Type plus unique id. Ids `<= 0` belong to primitives that only exist
/// locally and were never uploaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimitiveId {
    id: i64,
    kind: PrimitiveType,
}

impl PrimitiveId {
    pub const fn new(id: i64, kind: PrimitiveType) -> Self {
        Self { id, kind }
    }

    pub fn unique_id(&self) -> i64 {
        self.id
    }

    pub fn kind(&self) -> PrimitiveType {
        self.kind
    }

    pub fn is_new(&self) -> bool {
        self.id <= 0
    }
}

impl fmt::Display for PrimitiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.api_name(), self.id)
    }
}

/// Minimal primitive: identity, version, tags and a deleted flag.
///
/// Primitives are shared as `Rc<OsmPrimitive>`, so the deleted flag is a
/// `Cell` that can be set through any handle.
#[derive(Debug)]
pub struct OsmPrimitive {
    id: PrimitiveId,
    version: u32,
    deleted: Cell<bool>,
    tags: BTreeMap<String, String>,
}

impl OsmPrimitive {
    pub fn new(id: PrimitiveId) -> Self {
        Self {
            id,
            version: 0,
            deleted: Cell::new(false),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> PrimitiveId {
        self.id
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.get()
    }

    pub fn set_deleted(&self, deleted: bool) {
        self.deleted.set(deleted);
    }
}

#[inline]
fn id_hash(id: &PrimitiveId) -> u64 {
    // Type in the two low bits, id above; the table mixes the result.
    let kind = match id.kind {
        PrimitiveType::Node => 0,
        PrimitiveType::Way => 1,
        PrimitiveType::Relation => 2,
    };
    (id.id as u64).wrapping_shl(2) | kind
}

/// Primitives are equivalent when they share type and unique id,
/// regardless of version, tags or deletion state.
///
/// Works for anything that borrows as an [`OsmPrimitive`] (`OsmPrimitive`,
/// `Rc<OsmPrimitive>`, `&OsmPrimitive`) and doubles as a [`KeyStrategy`]
/// for lookups by [`PrimitiveId`].
#[derive(Clone, Copy, Debug, Default)]
pub struct PrimitiveIdStrategy;

impl<P: Borrow<OsmPrimitive>> Strategy<P> for PrimitiveIdStrategy {
    fn hash(&self, value: &P) -> u64 {
        id_hash(&value.borrow().id)
    }

    fn equivalent(&self, a: &P, b: &P) -> bool {
        a.borrow().id == b.borrow().id
    }
}

impl<P: Borrow<OsmPrimitive>> KeyStrategy<PrimitiveId, P> for PrimitiveIdStrategy {
    fn hash_key(&self, key: &PrimitiveId) -> u64 {
        id_hash(key)
    }

    fn matches(&self, key: &PrimitiveId, value: &P) -> bool {
        value.borrow().id == *key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn id_display_and_newness() {
        let id = PrimitiveId::new(42, PrimitiveType::Way);
        assert_eq!(id.to_string(), "way 42");
        assert!(!id.is_new());
        assert!(PrimitiveId::new(-1, PrimitiveType::Node).is_new());
    }

    #[test]
    fn same_number_different_type_are_distinct() {
        let node = Rc::new(OsmPrimitive::new(PrimitiveId::new(7, PrimitiveType::Node)));
        let way = Rc::new(OsmPrimitive::new(PrimitiveId::new(7, PrimitiveType::Way)));
        let s = PrimitiveIdStrategy;
        assert!(!s.equivalent(&node, &way));
        assert_ne!(Strategy::<Rc<OsmPrimitive>>::hash(&s, &node), s.hash(&way));
    }

    #[test]
    fn key_hash_matches_element_hash() {
        let p = OsmPrimitive::new(PrimitiveId::new(-12, PrimitiveType::Relation)).with_version(3);
        let s = PrimitiveIdStrategy;
        assert_eq!(
            KeyStrategy::<PrimitiveId, OsmPrimitive>::hash_key(&s, &p.id()),
            Strategy::<OsmPrimitive>::hash(&s, &p)
        );
        assert!(s.matches(&p.id(), &p));
    }

    #[test]
    fn deleted_flag_through_shared_handle() {
        let p = Rc::new(
            OsmPrimitive::new(PrimitiveId::new(1, PrimitiveType::Node)).with_tag("highway", "stop"),
        );
        let other = Rc::clone(&p);
        other.set_deleted(true);
        assert!(p.is_deleted());
        assert_eq!(p.tag("highway"), Some("stop"));
    }
}
