use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::error;

use braid_types::api::{EditContentRequest, PostMessageRequest, ToggleChecklistRequest};
use braid_types::events::ServerEvent;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::messages::task_draft;
use crate::middleware::CurrentUser;
use crate::view;

/// Mirrors message posting, task extraction included. A task spawned from a
/// reply links to the parent message; if that message already has its task
/// the extraction is a no-op.
pub async fn post_reply(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<PostMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.content.trim().is_empty() {
        return Err(ApiError::Validation("content must not be empty".into()));
    }
    state
        .db
        .get_message(message_id)?
        .ok_or(ApiError::NotFound("message"))?;

    let body = braid_parse::message_body(&req.content);
    let draft = task_draft(&req.content, req.create_task);

    let db = state.clone();
    let author_id = user.id;
    let (reply, reply_count, task) = tokio::task::spawn_blocking(move || {
        db.db
            .insert_reply_with_task(message_id, author_id, &body, draft.as_ref())
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal
    })??;

    let reply = view::reply(reply);
    state.dispatcher.emit(&ServerEvent::ReplyCreated {
        reply: reply.clone(),
        message_reply_count: reply_count,
    });
    let task = task.map(view::task);
    if let Some(ref task) = task {
        state
            .dispatcher
            .emit(&ServerEvent::TaskCreated { task: task.clone() });
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({ "reply": reply, "task": task })),
    ))
}

pub async fn list_replies(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Extension(_user): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    state
        .db
        .get_message(message_id)?
        .ok_or(ApiError::NotFound("message"))?;

    let replies: Vec<_> = state
        .db
        .list_replies(message_id)?
        .into_iter()
        .map(view::reply)
        .collect();
    Ok(Json(replies))
}

pub async fn edit_reply(
    State(state): State<AppState>,
    Path(reply_id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<EditContentRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.content.trim().is_empty() {
        return Err(ApiError::Validation("content must not be empty".into()));
    }
    let existing = state
        .db
        .get_reply(reply_id)?
        .ok_or(ApiError::NotFound("reply"))?;
    if existing.author_id != user.id {
        return Err(ApiError::Forbidden);
    }

    state.db.update_reply_content(reply_id, &req.content)?;
    let reply = state
        .db
        .get_reply(reply_id)?
        .map(view::reply)
        .ok_or(ApiError::Internal)?;

    state
        .dispatcher
        .emit(&ServerEvent::ReplyUpdated { reply: reply.clone() });
    Ok(Json(reply))
}

/// Author-only; deleting a reply does not cascade further.
pub async fn delete_reply(
    State(state): State<AppState>,
    Path(reply_id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    let existing = state
        .db
        .get_reply(reply_id)?
        .ok_or(ApiError::NotFound("reply"))?;
    if existing.author_id != user.id {
        return Err(ApiError::Forbidden);
    }

    state.db.delete_reply(reply_id)?;

    state.dispatcher.emit(&ServerEvent::ReplyDeleted {
        reply_id,
        message_id: existing.message_id,
        thread_id: existing.thread_id,
    });
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_reply_checklist(
    State(state): State<AppState>,
    Path(reply_id): Path<i64>,
    Extension(_user): Extension<CurrentUser>,
    Json(req): Json<ToggleChecklistRequest>,
) -> ApiResult<impl IntoResponse> {
    let existing = state
        .db
        .get_reply(reply_id)?
        .ok_or(ApiError::NotFound("reply"))?;

    let toggled = braid_parse::toggle_checklist(&existing.content, req.ordinal, req.checked);
    if toggled == existing.content {
        return Err(ApiError::NotFound("checklist item"));
    }

    state.db.update_reply_content(reply_id, &toggled)?;
    let reply = state
        .db
        .get_reply(reply_id)?
        .map(view::reply)
        .ok_or(ApiError::Internal)?;

    state
        .dispatcher
        .emit(&ServerEvent::ReplyUpdated { reply: reply.clone() });
    Ok(Json(reply))
}
