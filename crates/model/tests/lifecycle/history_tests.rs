//! History
//!
//! Pinned revisions are read-only snapshots that never enter the registry.

use crate::test_utils::*;
use settee_core::RevisionStatus;

/// `a` with two revisions: n=1 then n=2
fn two_revisions(db: &Database) -> (Document, Revision, Revision) {
    let doc = create_doc(db, "a", json!({"n": 1}));
    let first = doc.rev().unwrap();
    doc.set("n", 2).unwrap();
    doc.update().unwrap();
    let second = doc.rev().unwrap();
    (doc, first, second)
}

#[test]
fn test_historical_revision_is_immutable() {
    let (_couch, db) = setup();
    let (doc, first, second) = two_revisions(&db);

    let opened = db.open("a", OpenOptions::new().rev(first.clone())).unwrap();
    assert!(!opened.is_live());
    assert_eq!(opened.rev(), Some(first.clone()));
    let snapshot = opened.into_historical().unwrap();
    assert_eq!(snapshot.get("n"), Some(&json!(1)));

    assert!(matches!(
        snapshot.set("n", 3),
        Err(Error::ImmutableRevision { .. })
    ));
    assert!(matches!(
        snapshot.remove("n"),
        Err(Error::ImmutableRevision { .. })
    ));

    // Id-only construction still yields the live instance
    let live = db.document("a").unwrap();
    assert!(live.ptr_eq(&doc));
    assert_eq!(live.rev(), Some(second));
    assert_eq!(live.get("n"), Some(json!(2)));
    assert_eq!(db.registry_stats().active, 1);
}

#[test]
fn test_pinning_live_revision_returns_instance() {
    let (_couch, db) = setup();
    let (doc, _first, second) = two_revisions(&db);

    let opened = db
        .open("a", OpenOptions::new().rev(second).header("X-Trace", "t1"))
        .unwrap();
    let live = opened.into_live().unwrap();
    assert!(live.ptr_eq(&doc));
    assert_eq!(live.headers().get("X-Trace").map(String::as_str), Some("t1"));
}

#[test]
fn test_historical_open_without_live_instance() {
    let (_couch, db) = setup();
    let (doc, first, _second) = two_revisions(&db);
    doc.detach().unwrap();
    let cached = db.registry_stats().cached;

    let snapshot = db
        .open("a", OpenOptions::new().rev(first))
        .unwrap()
        .into_historical()
        .unwrap();
    assert_eq!(snapshot.get("n"), Some(&json!(1)));
    let stats = db.registry_stats();
    assert_eq!((stats.active, stats.cached), (0, cached));
}

#[test]
fn test_revision_list_newest_first() {
    let (_couch, db) = setup();
    let (doc, first, second) = two_revisions(&db);
    assert_eq!(doc.revisions().unwrap(), vec![second, first]);
}

#[test]
fn test_compaction_makes_old_revisions_missing() {
    let (couch, db) = setup();
    let (doc, first, second) = two_revisions(&db);
    couch.compact(DB);

    let info = doc.revisions_info().unwrap();
    assert_eq!(info.len(), 2);
    assert_eq!(info[0].rev, second);
    assert_eq!(info[0].status, RevisionStatus::Available);
    assert_eq!(info[1].rev, first);
    assert_eq!(info[1].status, RevisionStatus::Missing);

    let err = db.open("a", OpenOptions::new().rev(first)).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_copy_to_new_destination() {
    let (couch, db) = setup();
    let doc = create_doc(&db, "a", json!({"n": 1}));

    let outcome = doc.copy_to("b", None).unwrap();
    assert_eq!(outcome.id.as_str(), "b");
    assert_eq!(outcome.rev.generation(), Some(1));
    assert_eq!(couch.document(DB, "b").unwrap().get("n"), Some(&json!(1)));
    assert_eq!(doc.state(), DocState::Valid);
}

#[test]
fn test_copy_over_existing_marks_destination_stale() {
    let (couch, db) = setup();
    let source = create_doc(&db, "a", json!({"n": 1}));
    let target = create_doc(&db, "b", json!({"n": 2}));

    let outcome = source.copy_to("b", target.rev().as_ref()).unwrap();
    assert_eq!(target.state(), DocState::Stale);
    assert_eq!(Some(outcome.rev.clone()), server_rev(&couch, "b"));

    target.fetch().unwrap();
    assert_eq!(target.get("n"), Some(json!(1)));
    assert_eq!(target.rev(), Some(outcome.rev));
}

#[test]
fn test_copy_over_existing_without_revision_conflicts() {
    let (_couch, db) = setup();
    let source = create_doc(&db, "a", json!({"n": 1}));
    let target = create_doc(&db, "b", json!({"n": 2}));

    assert!(source.copy_to("b", None).unwrap_err().is_conflict());
    assert_eq!(target.state(), DocState::Valid);
}

#[test]
fn test_copy_leaves_dirty_destination_alone() {
    let (_couch, db) = setup();
    let source = create_doc(&db, "a", json!({"n": 1}));
    let target = create_doc(&db, "b", json!({"n": 2}));
    let rev = target.rev();
    target.set("n", 3).unwrap();

    source.copy_to("b", rev.as_ref()).unwrap();
    assert_eq!(target.state(), DocState::Dirty);
    assert_eq!(target.get("n"), Some(json!(3)));
}
