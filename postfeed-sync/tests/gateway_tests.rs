mod common;

use common::{id, post};
use postfeed_sync::remote::memory::{Call, InMemoryRemote};
use postfeed_sync::{FeedError, MutationGateway, RemoteError, GENERIC_REMOTE_FAILURE};
use postfeed_types::NewPost;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn gateway(remote: &Arc<InMemoryRemote>) -> MutationGateway {
    MutationGateway::new(remote.clone())
}

fn remote_message(err: FeedError) -> String {
    match err {
        FeedError::Remote(msg) => msg,
        other => panic!("expected remote failure, got {other:?}"),
    }
}

#[tokio::test]
async fn fetch_all_returns_collection() {
    let remote = Arc::new(InMemoryRemote::new().with_posts(vec![post("1", "A", "a")]));
    let snapshot = gateway(&remote).fetch_all().await.unwrap();

    assert_eq!(snapshot.posts, vec![post("1", "A", "a")]);
    assert!(!snapshot.truncated);
}

#[tokio::test]
async fn create_reaches_remote() {
    let remote = Arc::new(InMemoryRemote::new().with_owner("alice"));
    let input = NewPost::new("Hello", "World").unwrap();

    gateway(&remote).create(&input).await.unwrap();

    let stored = remote.posts();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "Hello");
    assert_eq!(stored[0].owner.as_deref(), Some("alice"));
    assert_eq!(
        remote.call_log().entries(),
        vec![Call::CreatePost {
            title: "Hello".into()
        }]
    );
}

#[tokio::test]
async fn remove_reaches_remote() {
    let remote = Arc::new(InMemoryRemote::new().with_posts(vec![post("1", "A", "a")]));
    gateway(&remote).remove(&id("1")).await.unwrap();
    assert!(remote.posts().is_empty());
}

#[tokio::test]
async fn remove_of_missing_record_is_remote_failure() {
    let remote = Arc::new(InMemoryRemote::new());
    let err = gateway(&remote).remove(&id("9")).await.unwrap_err();
    assert!(remote_message(err).contains("does not exist"));
}

#[tokio::test]
async fn all_reasons_are_joined() {
    let remote = Arc::new(InMemoryRemote::new());
    remote.fail_next_create(RemoteError::from_messages(["title too long", "rate limited"]));

    let err = gateway(&remote)
        .create(&NewPost::new("t", "d").unwrap())
        .await
        .unwrap_err();
    assert_eq!(remote_message(err), "title too long\nrate limited");
}

#[tokio::test]
async fn reasonless_failure_uses_generic_message() {
    let remote = Arc::new(InMemoryRemote::new());
    remote.fail_next_list(RemoteError::from_messages(Vec::<String>::new()));
    let err = gateway(&remote).fetch_all().await.unwrap_err();
    assert_eq!(remote_message(err), GENERIC_REMOTE_FAILURE);

    remote.fail_next_delete(RemoteError::new("   "));
    let err = gateway(&remote).remove(&id("1")).await.unwrap_err();
    assert_eq!(remote_message(err), GENERIC_REMOTE_FAILURE);
}
