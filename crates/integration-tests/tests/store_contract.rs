mod support;

use chat_core::{Feedback, MessageStore, MessageStoreError, NewMessage, Thumbs};
use serde_json::{Value, json};

use support::{TEST_API_KEY, TestStore};

#[tokio::test]
async fn messages_list_in_submission_order() {
    let store = TestStore::start().await;
    let client = store.client();

    let posts = [
        NewMessage::greeting(),
        NewMessage::user("Book me a flight", Some(vec!["passport.pdf".to_string()])),
        NewMessage::assistant("To where?"),
        NewMessage::user("Lisbon", None),
        NewMessage::closing("Booked."),
    ];
    for message in posts.clone() {
        client.post_message(message).await.expect("post should succeed");
    }

    let messages = client.get_messages().await.expect("messages should load");
    assert_eq!(messages.len(), posts.len());
    for (stored, posted) in messages.iter().zip(posts.iter()) {
        assert_eq!(stored.role, posted.role);
        assert_eq!(stored.content, posted.content);
        assert_eq!(stored.files, posted.files);
        assert!(stored.created_at.is_some());
    }
    assert_eq!(messages[4].content, "Booked.</s>");

    store.stop().await;
}

#[tokio::test]
async fn clear_empties_conversation_and_is_repeatable() {
    let store = TestStore::start().await;
    let client = store.client();
    client
        .post_message(NewMessage::greeting())
        .await
        .expect("greeting should post");

    client.clear_messages().await.expect("first clear should succeed");
    client.clear_messages().await.expect("second clear should succeed");

    assert!(client.get_messages().await.expect("list should load").is_empty());

    store.stop().await;
}

#[tokio::test]
async fn wrong_api_key_is_unauthorized() {
    let store = TestStore::start().await;
    let client = store.client_with_key("API_KEY");

    let err = client
        .get_messages()
        .await
        .expect_err("wrong key should be rejected");
    assert!(matches!(
        err,
        MessageStoreError::Unauthorized { ref code } if code == "unauthorized"
    ));

    store.stop().await;
}

#[tokio::test]
async fn feedback_round_trips_on_the_wire() {
    let store = TestStore::start().await;
    let client = store.client();
    client
        .post_message(NewMessage::greeting())
        .await
        .expect("greeting should post");
    client
        .post_message(NewMessage::assistant("Here are three options."))
        .await
        .expect("reply should post");
    client
        .update_message(1, Feedback::Thumbs(Thumbs::Up))
        .await
        .expect("feedback should save");

    let missing = client
        .update_message(5, Feedback::Thumbs(Thumbs::Up))
        .await
        .expect_err("missing index should fail");
    assert!(matches!(missing, MessageStoreError::NotFound { index: 5 }));

    let http = reqwest::Client::new();
    let health = http
        .get(format!("{}/health", store.url))
        .send()
        .await
        .expect("health request should send");
    assert_eq!(health.status(), reqwest::StatusCode::OK);

    let raw = http
        .get(format!("{}/messages", store.url))
        .bearer_auth(TEST_API_KEY)
        .send()
        .await
        .expect("list request should send")
        .json::<Value>()
        .await
        .expect("list should be json");
    assert_eq!(raw[0]["content"], "<s>");
    assert_eq!(raw[0]["feedback"], Value::Null);
    assert_eq!(raw[1]["feedback"], json!({ "kind": "thumbs", "value": "up" }));

    store.stop().await;
}

#[tokio::test]
async fn server_rejects_blank_assistant_content() {
    let store = TestStore::start().await;
    let client = store.client();

    let err = client
        .post_message(NewMessage::assistant("  "))
        .await
        .expect_err("blank content should be rejected");
    assert!(matches!(
        err,
        MessageStoreError::Validation { ref code, .. } if code == "missing_content"
    ));
    assert!(client.get_messages().await.expect("list should load").is_empty());

    store.stop().await;
}
