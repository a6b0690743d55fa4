use std::sync::Arc;

use axum::routing::{get, patch};
use axum::{Router, middleware};

use crate::store::ConversationStore;

mod authn;
mod errors;
mod health;
mod messages;

#[derive(Clone)]
pub struct AppState {
    pub store: ConversationStore,
    pub api_key: Arc<str>,
}

impl AppState {
    pub fn new(store: ConversationStore, api_key: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            api_key: api_key.into(),
        }
    }
}

pub fn build_router(app_state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health::health));

    let protected_routes = Router::new()
        .route(
            "/messages",
            get(messages::list_messages)
                .post(messages::create_message)
                .delete(messages::clear_messages),
        )
        .route("/messages/{index}", patch(messages::update_message))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            authn::auth_middleware,
        ))
        .with_state(app_state);

    public_routes.merge(protected_routes)
}
