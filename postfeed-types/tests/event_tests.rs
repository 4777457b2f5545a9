use postfeed_types::{ChangeEvent, DeletedPost, EventKind, Post, PostId};
use serde_json::json;

fn id(s: &str) -> PostId {
    PostId::parse(s).unwrap()
}

// ── EventKind ─────────────────────────────────────────────────────

#[test]
fn subscription_fields() {
    assert_eq!(EventKind::Created.subscription_field(), "onCreatePost");
    assert_eq!(EventKind::Deleted.subscription_field(), "onDeletePost");
}

#[test]
fn kind_display() {
    assert_eq!(EventKind::Created.to_string(), "created");
    assert_eq!(EventKind::Deleted.to_string(), "deleted");
}

// ── DeletedPost ───────────────────────────────────────────────────

#[test]
fn deleted_from_bare_id() {
    let deleted = DeletedPost::from_value(json!({ "id": "9" })).unwrap();
    assert_eq!(deleted.id, id("9"));
}

#[test]
fn deleted_ignores_extra_fields() {
    let deleted = DeletedPost::from_value(json!({
        "id": "9",
        "title": "gone",
        "description": "soon",
        "owner": "alice"
    }))
    .unwrap();
    assert_eq!(deleted, DeletedPost::new(id("9")));
}

#[test]
fn deleted_without_id_is_rejected() {
    assert!(DeletedPost::from_value(json!({ "title": "x" })).is_err());
    assert!(DeletedPost::from_value(json!({ "id": "" })).is_err());
}

// ── ChangeEvent ───────────────────────────────────────────────────

#[test]
fn change_event_accessors() {
    let created: ChangeEvent = Post::new(id("1"), "A", "a").into();
    assert_eq!(created.id(), &id("1"));
    assert_eq!(created.kind(), EventKind::Created);

    let deleted: ChangeEvent = DeletedPost::new(id("2")).into();
    assert_eq!(deleted.id(), &id("2"));
    assert_eq!(deleted.kind(), EventKind::Deleted);
}
