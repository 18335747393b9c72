use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use braid_api::auth::{self, AppState};
use braid_api::error::ApiError;
use braid_api::middleware::{require_session, validate_session};
use braid_api::{channels, messages, replies, tasks};
use braid_gateway::connection;

/// Assemble the full application router around shared state.
pub fn app(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/channels", get(channels::list_channels))
        .route("/channels", post(channels::create_channel))
        .route("/channels/{channel_id}/threads", get(channels::list_threads))
        .route("/channels/{channel_id}/threads", post(channels::create_thread))
        .route("/threads/{thread_id}/messages", get(messages::list_messages))
        .route("/threads/{thread_id}/messages", post(messages::post_message))
        .route("/threads/{thread_id}/read", post(messages::mark_thread_read))
        .route("/messages/{message_id}", patch(messages::edit_message))
        .route("/messages/{message_id}", delete(messages::delete_message))
        .route(
            "/messages/{message_id}/checklist",
            post(messages::toggle_message_checklist),
        )
        .route("/messages/{message_id}/replies", get(replies::list_replies))
        .route("/messages/{message_id}/replies", post(replies::post_reply))
        .route("/replies/{reply_id}", patch(replies::edit_reply))
        .route("/replies/{reply_id}", delete(replies::delete_reply))
        .route(
            "/replies/{reply_id}/checklist",
            post(replies::toggle_reply_checklist),
        )
        .route("/tasks", get(tasks::list_tasks))
        .route("/tasks", post(tasks::create_task))
        .route("/tasks/{task_id}", patch(tasks::update_task))
        .route("/tasks/{task_id}", delete(tasks::delete_task))
        .route("/tasks/{task_id}/checklist", post(tasks::toggle_task_checklist))
        .layer(middleware::from_fn_with_state(state.clone(), require_session))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Deserialize)]
struct GatewayParams {
    token: String,
}

/// The push channel authenticates via query parameter — browsers cannot set
/// headers on a WebSocket upgrade. Validation slides the session like any
/// other authenticated call.
async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<GatewayParams>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let user = validate_session(&state, &params.token)?;
    let dispatcher = state.dispatcher.clone();
    Ok(ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, dispatcher, user.id, user.name)
    }))
}
