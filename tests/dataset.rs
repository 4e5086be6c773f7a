use primitive_storage::{DataSet, OsmPrimitive, PrimitiveId, PrimitiveType, StorageError};
use std::rc::Rc;

fn primitive(id: i64, kind: PrimitiveType) -> Rc<OsmPrimitive> {
    Rc::new(OsmPrimitive::new(PrimitiveId::new(id, kind)).with_version(1))
}

#[test]
fn lookup_by_id_across_types() {
    let mut ds = DataSet::new();
    ds.add_primitive(primitive(1, PrimitiveType::Node)).unwrap();
    ds.add_primitive(primitive(1, PrimitiveType::Way)).unwrap();
    ds.add_primitive(primitive(1, PrimitiveType::Relation)).unwrap();
    assert_eq!(ds.len(), 3);

    let way = ds
        .get_primitive_by_id(PrimitiveId::new(1, PrimitiveType::Way))
        .expect("way present");
    assert_eq!(way.id().kind(), PrimitiveType::Way);
    assert!(!ds.contains_id(PrimitiveId::new(2, PrimitiveType::Node)));
    assert_eq!(ds.primitives_of(PrimitiveType::Node).count(), 1);
}

#[test]
fn duplicate_primitive_is_rejected_without_side_effects() {
    let mut ds = DataSet::new();
    let original = primitive(5, PrimitiveType::Node);
    ds.add_primitive(Rc::clone(&original)).unwrap();

    let newer =
        Rc::new(OsmPrimitive::new(PrimitiveId::new(5, PrimitiveType::Node)).with_version(9));
    assert_eq!(ds.add_primitive(newer), Err(StorageError::DuplicateElement));

    let stored = ds.get_primitive_by_id(original.id()).unwrap();
    assert!(Rc::ptr_eq(stored, &original));
    assert_eq!(stored.version(), 1);
}

#[test]
fn remove_then_readd() {
    let mut ds = DataSet::with_capacity(4).unwrap();
    let id = PrimitiveId::new(-3, PrimitiveType::Node);
    ds.add_primitive(Rc::new(OsmPrimitive::new(id))).unwrap();
    let removed = ds.remove_primitive(id).expect("present");
    assert_eq!(removed.id(), id);
    assert!(ds.remove_primitive(id).is_none());
    assert!(ds.is_empty());
    ds.add_primitive(removed).unwrap();
    assert!(ds.contains_id(id));
}

#[test]
fn purge_deleted_after_many_inserts() {
    let mut ds = DataSet::with_capacity(1).unwrap();
    for id in 1..=500 {
        ds.add_primitive(tagged_node(id)).unwrap();
    }
    for p in ds.primitives() {
        if p.tag("parity") == Some("odd") {
            p.set_deleted(true);
        }
    }
    let purged = ds.purge_deleted().unwrap();
    assert_eq!(purged.len(), 250);
    assert_eq!(ds.len(), 250);
    assert!(ds.primitives().all(|p| p.tag("parity") == Some("even")));
    assert!(ds.purge_deleted().unwrap().is_empty());
}

fn tagged_node(id: i64) -> Rc<OsmPrimitive> {
    let parity = if id % 2 == 0 { "even" } else { "odd" };
    Rc::new(
        OsmPrimitive::new(PrimitiveId::new(id, PrimitiveType::Node))
            .with_version(1)
            .with_tag("parity", parity),
    )
}

#[test]
fn zero_capacity_dataset_rejected() {
    assert!(matches!(
        DataSet::with_capacity(0),
        Err(StorageError::InvalidArgument(_))
    ));
}
