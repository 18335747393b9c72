use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::error;

use braid_db::messages::TaskDraft;
use braid_types::api::{
    EditContentRequest, MarkReadRequest, PostMessageRequest, ToggleChecklistRequest,
};
use braid_types::events::ServerEvent;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::CurrentUser;
use crate::view;

/// Decide whether posted content spawns a task, and derive its title/note.
///
/// Two trigger paths, deliberately kept distinct: explicit intent parses the
/// RAW content, while the `:task` text flag alone parses the flag-stripped
/// content. For content that sets the explicit flag AND contains `:task`,
/// the raw text wins — unifying the paths would change the extracted title.
pub(crate) fn task_draft(content: &str, explicit: bool) -> Option<TaskDraft> {
    let has_flag = braid_parse::contains_task_flag(content);
    if !explicit && !has_flag {
        return None;
    }
    let source = if explicit {
        content.to_string()
    } else {
        braid_parse::strip_task_flag(content)
    };
    let (title, note) = braid_parse::extract_title_note(&source)?;
    Some(TaskDraft { title, note })
}

pub async fn post_message(
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<PostMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.content.trim().is_empty() {
        return Err(ApiError::Validation("content must not be empty".into()));
    }
    state
        .db
        .get_thread(thread_id)?
        .ok_or(ApiError::NotFound("thread"))?;

    // Extraction is fully resolved before anything is stored.
    let body = braid_parse::message_body(&req.content);
    let draft = task_draft(&req.content, req.create_task);

    // Run blocking DB writes off the async runtime
    let db = state.clone();
    let author_id = user.id;
    let (message, task) = tokio::task::spawn_blocking(move || {
        db.db
            .insert_message_with_task(thread_id, author_id, &body, draft.as_ref())
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal
    })??;

    let message = view::message(message);
    state.dispatcher.emit(&ServerEvent::MessageCreated {
        message: message.clone(),
    });
    let task = task.map(view::task);
    if let Some(ref task) = task {
        state
            .dispatcher
            .emit(&ServerEvent::TaskCreated { task: task.clone() });
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": message, "task": task })),
    ))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
    Extension(_user): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    state
        .db
        .get_thread(thread_id)?
        .ok_or(ApiError::NotFound("thread"))?;

    let messages: Vec<_> = state
        .db
        .list_messages(thread_id)?
        .into_iter()
        .map(view::message)
        .collect();
    Ok(Json(messages))
}

pub async fn edit_message(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<EditContentRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.content.trim().is_empty() {
        return Err(ApiError::Validation("content must not be empty".into()));
    }
    let existing = state
        .db
        .get_message(message_id)?
        .ok_or(ApiError::NotFound("message"))?;
    if existing.author_id != user.id {
        return Err(ApiError::Forbidden);
    }

    state.db.update_message_content(message_id, &req.content)?;
    let message = state
        .db
        .get_message(message_id)?
        .map(view::message)
        .ok_or(ApiError::Internal)?;

    state.dispatcher.emit(&ServerEvent::MessageUpdated {
        message: message.clone(),
    });
    Ok(Json(message))
}

/// Author-only. Cascades to the message's replies and linked task.
pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    let existing = state
        .db
        .get_message(message_id)?
        .ok_or(ApiError::NotFound("message"))?;
    if existing.author_id != user.id {
        return Err(ApiError::Forbidden);
    }

    let db = state.clone();
    tokio::task::spawn_blocking(move || db.db.delete_message(message_id))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })??;

    state.dispatcher.emit(&ServerEvent::MessageDeleted {
        message_id,
        thread_id: existing.thread_id,
        channel_id: existing.channel_id,
    });
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_message_checklist(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Extension(_user): Extension<CurrentUser>,
    Json(req): Json<ToggleChecklistRequest>,
) -> ApiResult<impl IntoResponse> {
    let existing = state
        .db
        .get_message(message_id)?
        .ok_or(ApiError::NotFound("message"))?;

    let toggled = braid_parse::toggle_checklist(&existing.content, req.ordinal, req.checked);
    if toggled == existing.content {
        return Err(ApiError::NotFound("checklist item"));
    }

    state.db.update_message_content(message_id, &toggled)?;
    let message = state
        .db
        .get_message(message_id)?
        .map(view::message)
        .ok_or(ApiError::Internal)?;

    state.dispatcher.emit(&ServerEvent::MessageUpdated {
        message: message.clone(),
    });
    Ok(Json(message))
}

/// Advisory read cursor; only ever consulted for client-side unread counts.
pub async fn mark_thread_read(
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<MarkReadRequest>,
) -> ApiResult<impl IntoResponse> {
    state
        .db
        .get_thread(thread_id)?
        .ok_or(ApiError::NotFound("thread"))?;

    state
        .db
        .mark_thread_read(user.id, thread_id, req.last_message_id)?;
    Ok(StatusCode::NO_CONTENT)
}
