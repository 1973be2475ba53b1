//! Chat manager integration tests against the SQLite interaction log

use std::sync::Arc;

use tutor_gateway::Role;
use tutor_gateway::db::InteractionRepo;

mod common;
use common::{FakeCompletion, build_chat, setup_test_db};

#[tokio::test]
async fn test_interactions_persisted_in_order() {
    let db = setup_test_db();
    let chat = build_chat(&db, Arc::new(FakeCompletion::default()));

    let first = chat.handle_query("u1", "Explain BFS").await.unwrap();
    let second = chat.handle_query("u1", "And DFS?").await.unwrap();

    let stored = InteractionRepo::new(db).list_for_user("u1", 10).unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].id, second.id);
    assert_eq!(stored[1].id, first.id);
    assert_eq!(stored[1].reply, "reply 1");
}

#[tokio::test]
async fn test_long_conversation_stays_bounded() {
    let db = setup_test_db();
    let completion = Arc::new(FakeCompletion::default());
    let chat = build_chat(&db, completion.clone());

    let long_query = "x".repeat(4_000);
    for _ in 0..10 {
        chat.handle_query("u1", &long_query).await.unwrap();
    }

    // Every outbound call holds the system message plus a short tail
    let sent = completion.last_call();
    assert_eq!(sent[0].role, Role::System);
    assert!(sent.len() <= 4);
    assert!(chat.history("u1").len() <= 4);

    // The durable log keeps everything
    let stored = InteractionRepo::new(db).count_for_user("u1").unwrap();
    assert_eq!(stored, 10);
}

#[tokio::test]
async fn test_failed_completion_is_not_logged() {
    let db = setup_test_db();
    let chat = build_chat(&db, Arc::new(FakeCompletion::failing()));

    assert!(chat.handle_query("u1", "hi").await.is_err());

    assert_eq!(InteractionRepo::new(db).count_for_user("u1").unwrap(), 0);
    // The user message is retained
    assert_eq!(chat.history("u1").len(), 1);
}
