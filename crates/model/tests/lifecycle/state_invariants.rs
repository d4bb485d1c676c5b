//! State invariants
//!
//! FRESH becomes VALID only through create, DIRTY blocks fetch, update
//! clears dirtiness, and refused operations never reach the server.

use crate::test_utils::*;

#[test]
fn test_fresh_becomes_valid_only_through_create() {
    let (couch, db) = setup();
    let doc = db.new_document(Some("Fishstew"), JsonMap::new()).unwrap();
    assert_eq!(doc.state(), DocState::Fresh);

    // Edits keep it FRESH
    doc.set("servings", 4).unwrap();
    assert_eq!(doc.state(), DocState::Fresh);

    assert_illegal(doc.fetch());
    assert_illegal(doc.update());
    assert_illegal(doc.delete());
    assert_illegal(doc.is_current());
    assert_eq!(doc.state(), DocState::Fresh);
    assert_eq!(couch.request_count(), 0);

    doc.create().unwrap();
    assert_eq!(doc.state(), DocState::Valid);
    assert_eq!(doc.rev(), server_rev(&couch, "Fishstew"));
    assert_eq!(doc.rev().and_then(|r| r.generation()), Some(1));

    // Create is one-shot
    assert_illegal(doc.create());
}

#[test]
fn test_create_with_taken_id_stays_fresh() {
    let (couch, db) = setup();
    couch.overwrite(DB, "taken", json!({"n": 1}));

    let doc = db.new_document(Some("taken"), body(json!({"n": 2}))).unwrap();
    let err = doc.create().unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(doc.state(), DocState::Fresh);
    assert_eq!(doc.get("n"), Some(json!(2)));
}

#[test]
fn test_server_assigned_id_joins_registry() {
    let (_couch, db) = setup();
    let doc = db.new_document(None, body(json!({"kind": "soup"}))).unwrap();
    assert_eq!(doc.id(), None);
    assert_eq!(db.registry_stats().active, 0);

    doc.create().unwrap();
    let id = doc.id().expect("server assigned an id");
    assert!(db.registry().is_active(&id));
    assert!(db.document(id.as_str()).unwrap().ptr_eq(&doc));
}

#[test]
fn test_dirty_blocks_fetch_without_network() {
    let (couch, db) = setup();
    let doc = create_doc(&db, "a", json!({"n": 1}));
    doc.set("n", 2).unwrap();
    assert_eq!(doc.state(), DocState::Dirty);

    let before = couch.request_count();
    assert_illegal(doc.fetch());
    assert_eq!(couch.request_count(), before);
    assert_eq!(doc.get("n"), Some(json!(2)));
    assert_eq!(doc.state(), DocState::Dirty);
}

#[test]
fn test_update_clears_dirty_and_adopts_revision() {
    let (couch, db) = setup();
    let doc = create_doc(&db, "a", json!({"n": 1}));
    let first = doc.rev().unwrap();

    doc.set("n", 2).unwrap();
    doc.update().unwrap();

    assert_eq!(doc.state(), DocState::Valid);
    let second = doc.rev().unwrap();
    assert_ne!(first, second);
    assert_eq!(second.generation(), Some(2));
    assert_eq!(Some(second), server_rev(&couch, "a"));
    assert_eq!(
        couch.document(DB, "a").unwrap().get("n"),
        Some(&json!(2))
    );
}

#[test]
fn test_equal_value_write_marks_dirty() {
    let (couch, db) = setup();
    let doc = create_doc(&db, "a", json!({"n": 1}));

    doc.set("n", 1).unwrap();
    assert_eq!(doc.state(), DocState::Dirty);
    doc.update().unwrap();
    assert_eq!(doc.state(), DocState::Valid);
    assert_eq!(couch.revision_count(DB, "a"), 2);

    // Nothing left to persist
    assert_illegal(doc.update());
    assert_eq!(couch.revision_count(DB, "a"), 2);
}

#[test]
fn test_stale_document_must_be_fetched_before_update() {
    let (couch, db) = setup();
    couch.overwrite(DB, "a", json!({"n": 1}));

    let doc = db.document("a").unwrap();
    assert_eq!(doc.state(), DocState::Stale);
    assert_illegal(doc.update());

    doc.fetch().unwrap();
    assert_eq!(doc.state(), DocState::Valid);
    assert_eq!(doc.get("n"), Some(json!(1)));
    assert_eq!(doc.rev(), server_rev(&couch, "a"));
}

#[test]
fn test_reserved_fields_are_protected() {
    let (_couch, db) = setup();
    let doc = create_doc(&db, "a", json!({"n": 1}));
    let rev = doc.rev();

    assert!(matches!(
        doc.set("_rev", "9-z"),
        Err(Error::ReservedField { .. })
    ));
    assert!(matches!(doc.remove("_id"), Err(Error::ReservedField { .. })));
    assert_eq!(doc.state(), DocState::Valid);

    doc.extend(vec![("_rev", json!("9-z")), ("m", json!(2))]).unwrap();
    assert_eq!(doc.rev(), rev);
    assert_eq!(doc.get("m"), Some(json!(2)));
    assert_eq!(doc.state(), DocState::Dirty);
}

#[test]
fn test_get_returns_valid_document() {
    let (couch, db) = setup();
    couch.overwrite(DB, "a", json!({"n": 1}));

    let doc = db.get("a").unwrap();
    assert_eq!(doc.state(), DocState::Valid);
    assert_eq!(doc.get_as::<u32>("n").unwrap(), Some(1));
    assert!(doc.is_current().unwrap());

    couch.overwrite(DB, "a", json!({"n": 2}));
    assert!(!doc.is_current().unwrap());
}

#[test]
fn test_get_missing_document() {
    let (_couch, db) = setup();
    let err = db.get("ghost").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(db.registry_stats().active, 0);
    assert_eq!(db.exists("ghost").unwrap(), None);
}
