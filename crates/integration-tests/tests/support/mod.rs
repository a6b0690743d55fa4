use std::time::Duration;

use chat_core::{ClientConfig, MessageStore, MessageStoreClient, NewMessage, PollPolicy, Role};
use message_store::{AppState, ConversationStore, build_router};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;

pub const TEST_API_KEY: &str = "integration-test-key";

pub struct TestStore {
    pub url: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_task: Option<JoinHandle<()>>,
}

impl TestStore {
    pub async fn start() -> Self {
        let app = build_router(AppState::new(ConversationStore::new(), TEST_API_KEY));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let local_addr = listener
            .local_addr()
            .expect("listener address should resolve");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let server_task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });

            server.await.expect("store server should run");
        });

        Self {
            url: format!("http://{local_addr}"),
            shutdown_tx: Some(shutdown_tx),
            server_task: Some(server_task),
        }
    }

    pub fn client(&self) -> MessageStoreClient {
        self.client_with_key(TEST_API_KEY)
    }

    pub fn client_with_key(&self, api_key: &str) -> MessageStoreClient {
        let mut config = ClientConfig::new(&self.url, api_key).expect("client config should build");
        config.retry_base_backoff_ms = 0;
        MessageStoreClient::new(&config).expect("client should build")
    }

    pub async fn stop(mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(server_task) = self.server_task.take() {
            server_task.await.expect("server task should join");
        }
    }
}

pub fn fast_poll() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(10),
        timeout: Duration::from_secs(5),
    }
}

/// Plays the human operator: waits until the newest message is from the
/// user, then posts `reply`.
pub fn operator_replies(client: MessageStoreClient, reply: NewMessage) -> JoinHandle<usize> {
    tokio::spawn(async move {
        for _ in 0..500 {
            let messages = client
                .get_messages()
                .await
                .expect("operator should read messages");
            if messages.last().is_some_and(|message| message.role == Role::User) {
                client
                    .post_message(reply)
                    .await
                    .expect("operator reply should post");
                return messages.len();
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("user message never arrived");
    })
}
