//! Concurrency
//!
//! Identity must hold when threads race to construct the same id.

use crate::common::*;
use settee::{Transport, TransportError};
use settee_transport::{Method, Request, Response};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

const THREADS: usize = 8;

#[test]
fn test_racing_constructions_share_one_instance() {
    let (couch, client) = memory_client(&["recipes"]);
    couch.overwrite("recipes", "hot", json!({"n": 0}));
    let db = client.database("recipes").unwrap();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let db = db.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                if i % 2 == 0 {
                    db.get("hot").unwrap()
                } else {
                    db.document("hot").unwrap()
                }
            })
        })
        .collect();

    let docs: Vec<Document> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for doc in &docs[1..] {
        assert!(doc.ptr_eq(&docs[0]));
    }
    assert_eq!(db.registry_stats().active, 1);
}

#[test]
fn test_concurrent_edits_through_shared_handles() {
    let (_couch, client) = memory_client(&["recipes"]);
    let db = client.database("recipes").unwrap();
    let doc = db.new_document(Some("tally"), JsonMap::new()).unwrap();
    doc.create().unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let db = db.clone();
            thread::spawn(move || {
                let doc = db.document("tally").unwrap();
                doc.set(&format!("field{}", i), i).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(doc.state(), DocState::Dirty);
    assert_eq!(doc.len(), THREADS + 2);
    doc.update().unwrap();
    assert_eq!(doc.state(), DocState::Valid);
}

#[test]
fn test_one_update_wins_under_contention() {
    let (_couch, client) = memory_client(&["recipes"]);
    let db = client.database("recipes").unwrap();
    let doc = db.new_document(Some("race"), JsonMap::new()).unwrap();
    doc.create().unwrap();
    doc.set("n", 1).unwrap();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let doc = doc.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                doc.update().is_ok()
            })
        })
        .collect();
    let wins = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    // The first update clears DIRTY; the rest are refused
    assert_eq!(wins, 1);
    assert_eq!(doc.state(), DocState::Valid);
}

/// Holds every DELETE until the test lets it through
struct GatedDeletes {
    inner: MemoryCouch,
    entered: Barrier,
    release: Barrier,
}

impl Transport for GatedDeletes {
    fn send(&self, request: Request) -> Result<Response, TransportError> {
        if request.method == Method::Delete {
            self.entered.wait();
            self.release.wait();
        }
        self.inner.send(request)
    }
}

#[test]
fn test_construction_during_delete_gets_a_live_instance() {
    init_tracing();
    let couch = MemoryCouch::new();
    couch.create_database("recipes");
    let gate = Arc::new(GatedDeletes {
        inner: couch,
        entered: Barrier::new(2),
        release: Barrier::new(2),
    });
    let client = Client::from_shared(gate.clone());
    let db = client.database("recipes").unwrap();
    let doc = db.new_document(Some("a"), body(json!({"n": 1}))).unwrap();
    doc.create().unwrap();

    let deleter = {
        let doc = doc.clone();
        thread::spawn(move || doc.delete())
    };
    gate.entered.wait();

    // The delete now holds the document lock
    let constructor = {
        let db = db.clone();
        thread::spawn(move || db.document("a").unwrap())
    };
    thread::sleep(Duration::from_millis(50));
    gate.release.wait();

    deleter.join().unwrap().unwrap();
    let constructed = constructor.join().unwrap();

    assert_eq!(doc.state(), DocState::Evicted);
    assert!(!constructed.ptr_eq(&doc));
    assert_eq!(constructed.state(), DocState::Stale);
    assert!(db.registry().is_active(&constructed.id().unwrap()));
    assert!(db.document("a").unwrap().ptr_eq(&constructed));
    constructed.set("n", 2).unwrap();
}

#[test]
fn test_construction_after_detach_promotes_the_same_instance() {
    let (_couch, client) = memory_client(&["recipes"]);
    let db = client.database("recipes").unwrap();
    let doc = db.new_document(Some("a"), JsonMap::new()).unwrap();
    doc.create().unwrap();
    let barrier = Arc::new(Barrier::new(THREADS + 1));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let db = db.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                db.document("a").unwrap()
            })
        })
        .collect();
    barrier.wait();
    doc.detach().unwrap();

    let docs: Vec<Document> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    // Whichever side of the detach a thread landed on, it got the one instance
    for constructed in &docs {
        assert!(constructed.ptr_eq(&doc));
    }
    let current = db.document("a").unwrap();
    assert!(current.ptr_eq(&doc));
    assert_ne!(current.state(), DocState::Evicted);
    assert_eq!(db.registry_stats().active, 1);
    assert_eq!(db.registry_stats().cached, 0);
}
