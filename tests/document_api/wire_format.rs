//! Wire format
//!
//! Each operation sends exactly one request of a known shape.

use crate::common::*;
use settee::Transport;
use settee_transport::{Body, Method, Response};
use std::sync::Arc;

fn scripted() -> (Arc<ScriptedTransport>, Database) {
    init_tracing();
    let transport = Arc::new(ScriptedTransport::new());
    let client = Client::from_shared(transport.clone());
    let db = client.database("recipes").unwrap();
    (transport, db)
}

fn ack(id: &str, rev: &str) -> Value {
    json!({"ok": true, "id": id, "rev": rev})
}

#[test]
fn test_create_posts_to_database() {
    let (transport, db) = scripted();
    transport.respond_json(201, ack("Fishstew", "1-a"));

    let doc = db
        .new_document(Some("Fishstew"), body(json!({"servings": 4})))
        .unwrap();
    doc.create().unwrap();

    let request = transport.last_request().unwrap();
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.path_string(), "/recipes");
    let sent = request.body.as_json().unwrap();
    assert_eq!(sent["_id"], json!("Fishstew"));
    assert_eq!(sent["servings"], json!(4));
    assert!(sent.get("_rev").is_none());
    assert_eq!(doc.rev(), Some(Revision::new("1-a")));
}

#[test]
fn test_update_puts_body_with_revision() {
    let (transport, db) = scripted();
    transport
        .respond_json(200, json!({"_id": "a", "_rev": "1-a", "n": 1}))
        .respond_json(201, ack("a", "2-b"));

    let doc = db.get("a").unwrap();
    doc.set("n", 2).unwrap();
    doc.update().unwrap();

    let request = transport.last_request().unwrap();
    assert_eq!(request.method, Method::Put);
    assert_eq!(request.path_string(), "/recipes/a");
    let sent = request.body.as_json().unwrap();
    assert_eq!(sent["_rev"], json!("1-a"));
    assert_eq!(sent["n"], json!(2));
    assert_eq!(doc.rev(), Some(Revision::new("2-b")));
}

#[test]
fn test_delete_sends_revision_query() {
    let (transport, db) = scripted();
    transport
        .respond_json(200, json!({"_id": "a", "_rev": "1-a"}))
        .respond_json(200, ack("a", "2-c"));

    let doc = db.get("a").unwrap();
    doc.delete().unwrap();

    let request = transport.last_request().unwrap();
    assert_eq!(request.method, Method::Delete);
    assert_eq!(request.query_value("rev"), Some("1-a"));
    assert_eq!(doc.rev(), Some(Revision::new("2-c")));
}

#[test]
fn test_delete_without_acknowledgement_is_a_protocol_error() {
    let (transport, db) = scripted();
    transport
        .respond_json(200, json!({"_id": "a", "_rev": "1-x"}))
        .respond_json(200, json!({"ok": true}));

    let doc = db.get("a").unwrap();
    let err = doc.delete().unwrap_err();
    assert!(matches!(err, Error::Protocol { .. }), "got {:?}", err);

    assert_eq!(doc.state(), DocState::Valid);
    assert_eq!(doc.rev(), Some(Revision::new("1-x")));
    assert!(doc.get("_deleted").is_none());
    assert!(db.registry().is_active(&doc.id().unwrap()));
    assert!(db.document("a").unwrap().ptr_eq(&doc));
}

#[test]
fn test_attachment_read_keeps_json_payload_raw() {
    let (transport, db) = scripted();
    let payload = br#"{"zeta": 1, "alpha": 2.50}"#.to_vec();
    transport
        .respond_json(200, json!({"_id": "a", "_rev": "1-a"}))
        .respond(Response::new(
            200,
            Body::Bytes {
                content_type: "application/json".into(),
                data: payload.clone(),
            },
        ));

    let doc = db.get("a").unwrap();
    let attachment = doc.attachment("data.json").unwrap();
    assert_eq!(attachment.data, payload);
    assert_eq!(attachment.content_type, "application/json");

    let request = transport.last_request().unwrap();
    assert_eq!(request.method, Method::Get);
    assert_eq!(request.path_string(), "/recipes/a/data.json");
    assert!(request.raw);
}

#[test]
fn test_ids_are_escaped_in_paths() {
    let (transport, db) = scripted();
    transport.respond_json(200, json!({"_id": "a/b c", "_rev": "1-a"}));
    db.get("a/b c").unwrap();
    assert_eq!(transport.last_request().unwrap().path_string(), "/recipes/a%2Fb%20c");

    transport.respond_json(200, json!({"_id": "_design/app", "_rev": "1-a"}));
    db.get("_design/app").unwrap();
    assert_eq!(
        transport.last_request().unwrap().path_string(),
        "/recipes/_design/app"
    );
}

#[test]
fn test_put_attachment_sends_raw_bytes() {
    let (transport, db) = scripted();
    transport
        .respond_json(200, json!({"_id": "a", "_rev": "1-a"}))
        .respond_json(201, ack("a", "2-d"));

    let doc = db.get("a").unwrap();
    doc.put_attachment("note.txt", "text/plain", b"hi".to_vec())
        .unwrap();

    let request = transport.last_request().unwrap();
    assert_eq!(request.method, Method::Put);
    assert_eq!(request.path_string(), "/recipes/a/note.txt");
    assert_eq!(request.query_value("rev"), Some("1-a"));
    assert_eq!(
        request.body,
        Body::Bytes {
            content_type: "text/plain".to_string(),
            data: b"hi".to_vec(),
        }
    );
}

#[test]
fn test_copy_sends_destination_header() {
    let (transport, db) = scripted();
    transport
        .respond_json(200, json!({"_id": "a", "_rev": "1-a"}))
        .respond_json(201, json!({"id": "b", "rev": "3-e"}));

    let doc = db.get("a").unwrap();
    let outcome = doc.copy_to("b", Some(&Revision::new("2-x"))).unwrap();

    let request = transport.last_request().unwrap();
    assert_eq!(request.method, Method::Copy);
    assert_eq!(request.header_value("destination"), Some("b?rev=2-x"));
    assert_eq!(outcome.rev, Revision::new("3-e"));
}

#[test]
fn test_headers_follow_the_document() {
    let (transport, db) = scripted();
    transport
        .respond_json(200, json!({"_id": "a", "_rev": "1-a"}))
        .respond_json(201, ack("a", "2-b"));

    let doc = db
        .open("a", OpenOptions::new().header("X-Tenant", "blue"))
        .unwrap()
        .into_live()
        .unwrap();
    doc.set("n", 1).unwrap();
    doc.update().unwrap();

    for request in transport.requests() {
        assert_eq!(request.header_value("x-tenant"), Some("blue"));
    }
}

#[test]
fn test_transport_failure_leaves_state_untouched() {
    let (transport, db) = scripted();
    transport
        .respond_json(200, json!({"_id": "a", "_rev": "1-a"}))
        .fail(settee::TransportError::Timeout);

    let doc = db.get("a").unwrap();
    doc.set("n", 1).unwrap();
    let err = doc.update().unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert!(err.is_retryable());
    assert_eq!(doc.state(), DocState::Dirty);
    assert_eq!(doc.rev(), Some(Revision::new("1-a")));
}

#[test]
fn test_server_errors_carry_couch_fields() {
    let (transport, db) = scripted();
    transport.respond(Response::json(
        401,
        json!({"error": "unauthorized", "reason": "Name or password is incorrect."}),
    ));

    match db.get("a").unwrap_err() {
        Error::Server { status, error, .. } => {
            assert_eq!(status, 401);
            assert_eq!(error, "unauthorized");
        }
        other => panic!("Expected Server error, got {:?}", other),
    }
    assert_eq!(transport.remaining(), 0);
}

#[test]
fn test_refusals_send_nothing() {
    let (transport, db) = scripted();
    let doc = db.new_document(Some("a"), JsonMap::new()).unwrap();
    assert!(doc.fetch().unwrap_err().is_illegal_transition());
    assert!(doc.update().unwrap_err().is_illegal_transition());
    assert_eq!(transport.request_count(), 0);

    // The seam is object-safe
    let _: &dyn Transport = &*transport;
}
