mod support;

use std::time::Duration;

use chat_core::{
    Block, ConversationError, Feedback, FeedbackControlKind, FeedbackOutcome, MessageStore,
    MessageStoreError, NewMessage, NoopObserver, PollPolicy, Role, START_MARKER, Session, Thumbs,
    UserTurn, cancellation,
};
use tokio::time::sleep;

use support::{TestStore, fast_poll, operator_replies};

#[tokio::test]
async fn booking_turn_gets_reply_and_thumbs_rating() {
    let store = TestStore::start().await;
    let mut session = Session::open(store.client(), fast_poll())
        .await
        .expect("session should open");
    session.start_new().await.expect("new chat should start");

    assert_eq!(session.messages().len(), 1);
    assert_eq!(session.messages()[0].content, START_MARKER);

    let operator = operator_replies(
        store.client(),
        NewMessage::assistant("Where would you like to fly?")
            .with_reasoning(Some("destination unknown".to_string())),
    );

    let (_handle, mut cancel) = cancellation();
    let reply = session
        .send_user_turn(
            UserTurn::new("Book me a flight"),
            &mut cancel,
            &mut NoopObserver,
        )
        .await
        .expect("assistant should reply");
    assert_eq!(operator.await.expect("operator task should join"), 2);

    assert_eq!(reply.index, 2);
    let rendered = reply.render();
    assert_eq!(
        rendered.blocks,
        vec![
            Block::Thoughts("destination unknown".to_string()),
            Block::Text("Where would you like to fly?".to_string()),
        ]
    );
    let control = rendered.feedback.expect("reply should offer thumbs");
    assert_eq!(control.kind, FeedbackControlKind::Thumbs);

    let outcome = session
        .rate(2, Feedback::Thumbs(Thumbs::Up))
        .await
        .expect("rating should save");
    assert_eq!(outcome, FeedbackOutcome::Saved);

    let messages = store.client().get_messages().await.expect("messages should load");
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].role, Role::User);
    assert_eq!(messages[1].content, "Book me a flight");
    assert_eq!(messages[2].feedback, Some(Feedback::Thumbs(Thumbs::Up)));

    store.stop().await;
}

#[tokio::test]
async fn closing_reply_renders_prefix_then_closing_and_takes_stars() {
    let store = TestStore::start().await;
    let mut session = Session::open(store.client(), fast_poll())
        .await
        .expect("session should open");

    let operator = operator_replies(store.client(), NewMessage::assistant("Safe travels!</s>"));
    let (_handle, mut cancel) = cancellation();
    let reply = session
        .send_user_turn(UserTurn::new("That's all, thanks"), &mut cancel, &mut NoopObserver)
        .await
        .expect("closing reply should arrive");
    operator.await.expect("operator task should join");

    let rendered = reply.render();
    assert_eq!(
        rendered.blocks,
        vec![Block::Text("Safe travels!".to_string()), Block::Closing]
    );
    assert_eq!(
        rendered.feedback.map(|control| control.kind),
        Some(FeedbackControlKind::Stars)
    );

    let mismatch = session
        .rate(reply.index, Feedback::Thumbs(Thumbs::Up))
        .await
        .expect_err("thumbs on the closing message should be refused");
    assert!(matches!(mismatch, ConversationError::FeedbackMismatch { .. }));

    let outcome = session
        .rate(reply.index, Feedback::Stars(4))
        .await
        .expect("stars should save");
    assert_eq!(outcome, FeedbackOutcome::Saved);

    store.stop().await;
}

#[tokio::test]
async fn rating_is_write_once_across_clients() {
    let store = TestStore::start().await;
    let operator_client = store.client();
    operator_client
        .post_message(NewMessage::greeting())
        .await
        .expect("greeting should post");
    operator_client
        .post_message(NewMessage::user("Any hotels?", None))
        .await
        .expect("user message should post");
    operator_client
        .post_message(NewMessage::assistant("Three near the beach."))
        .await
        .expect("reply should post");

    let mut first = Session::open(store.client(), fast_poll())
        .await
        .expect("first session should open");
    let mut second = Session::open(store.client(), fast_poll())
        .await
        .expect("second session should open");

    assert_eq!(
        first
            .rate(2, Feedback::Thumbs(Thumbs::Down))
            .await
            .expect("first rating should save"),
        FeedbackOutcome::Saved
    );
    assert_eq!(
        second
            .rate(2, Feedback::Thumbs(Thumbs::Up))
            .await
            .expect("stale session should not fail"),
        FeedbackOutcome::AlreadyRated
    );
    assert_eq!(
        second.messages()[2].feedback,
        Some(Feedback::Thumbs(Thumbs::Down))
    );

    let direct = operator_client
        .update_message(2, Feedback::Thumbs(Thumbs::Up))
        .await
        .expect_err("direct re-rating should conflict");
    assert!(matches!(
        direct,
        MessageStoreError::FeedbackAlreadySet { index: 2 }
    ));

    assert_eq!(
        first
            .rate(40, Feedback::Stars(3))
            .await
            .expect("missing index is not an error"),
        FeedbackOutcome::MissingMessage
    );

    store.stop().await;
}

#[tokio::test]
async fn posted_turn_index_matches_server_after_other_clients_wrote() {
    let store = TestStore::start().await;
    let mut session = Session::open(store.client(), fast_poll())
        .await
        .expect("session should open");

    let operator_client = store.client();
    operator_client
        .post_message(NewMessage::user("first", None))
        .await
        .expect("user message should post");
    operator_client
        .post_message(NewMessage::assistant("late reply"))
        .await
        .expect("late reply should post");

    let index = session
        .post_user_turn(UserTurn::new("second"), &mut NoopObserver)
        .await
        .expect("post should succeed");

    let messages = operator_client
        .get_messages()
        .await
        .expect("messages should load");
    assert_eq!(index, 3);
    assert_eq!(messages[index].content, "second");
    assert_eq!(session.messages(), &messages[..]);

    store.stop().await;
}

#[tokio::test]
async fn cancelling_wait_keeps_posted_message() {
    let store = TestStore::start().await;
    let mut session = Session::open(store.client(), fast_poll())
        .await
        .expect("session should open");

    let (handle, mut cancel) = cancellation();
    let canceller = tokio::spawn(async move {
        sleep(Duration::from_millis(60)).await;
        handle.cancel();
    });

    let err = session
        .send_user_turn(UserTurn::new("Anyone there?"), &mut cancel, &mut NoopObserver)
        .await
        .expect_err("wait should be cancelled");
    canceller.await.expect("canceller should join");
    assert!(matches!(err, ConversationError::Cancelled { polls } if polls >= 1));

    let messages = store.client().get_messages().await.expect("messages should load");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "Anyone there?");

    store.stop().await;
}

#[tokio::test]
async fn silent_operator_times_out() {
    let store = TestStore::start().await;
    let poll = PollPolicy {
        interval: Duration::from_millis(10),
        timeout: Duration::from_millis(80),
    };
    let mut session = Session::open(store.client(), poll)
        .await
        .expect("session should open");

    let (_handle, mut cancel) = cancellation();
    let err = session
        .send_user_turn(UserTurn::new("Hello?"), &mut cancel, &mut NoopObserver)
        .await
        .expect_err("no reply should time out");
    assert!(matches!(err, ConversationError::ReplyTimedOut { .. }));

    store.stop().await;
}
