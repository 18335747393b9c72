use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use braid_types::api::{CreateChannelRequest, CreateThreadRequest};
use braid_types::events::ServerEvent;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::CurrentUser;
use crate::view;

/// Creating a channel always creates its default "main" thread in the same
/// operation, and both events go out back to back.
pub async fn create_channel(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateChannelRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("name must not be empty".into()));
    }

    let (channel, thread) = state
        .db
        .create_channel(name, user.id)?
        .ok_or_else(|| ApiError::Conflict("channel name already exists".into()))?;

    let channel = view::channel(channel);
    let thread = view::thread(thread);
    state.dispatcher.emit(&ServerEvent::ChannelCreated {
        channel: channel.clone(),
    });
    state.dispatcher.emit(&ServerEvent::ThreadCreated {
        thread: thread.clone(),
    });

    Ok((
        StatusCode::CREATED,
        Json(json!({ "channel": channel, "thread": thread })),
    ))
}

pub async fn list_channels(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    let channels: Vec<_> = state
        .db
        .list_channels()?
        .into_iter()
        .map(view::channel)
        .collect();
    Ok(Json(channels))
}

pub async fn create_thread(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateThreadRequest>,
) -> ApiResult<impl IntoResponse> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::Validation("title must not be empty".into()));
    }
    state
        .db
        .get_channel(channel_id)?
        .ok_or(ApiError::NotFound("channel"))?;

    let thread = view::thread(state.db.create_thread(channel_id, title, user.id)?);
    state.dispatcher.emit(&ServerEvent::ThreadCreated {
        thread: thread.clone(),
    });

    Ok((StatusCode::CREATED, Json(thread)))
}

pub async fn list_threads(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
    Extension(_user): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    state
        .db
        .get_channel(channel_id)?
        .ok_or(ApiError::NotFound("channel"))?;

    let threads: Vec<_> = state
        .db
        .list_threads(channel_id)?
        .into_iter()
        .map(view::thread)
        .collect();
    Ok(Json(threads))
}
