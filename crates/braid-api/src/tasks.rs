use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use tracing::error;

use braid_db::messages::TaskDraft;
use braid_db::tasks::TaskFilter;
use braid_types::api::{CreateTaskRequest, TaskListQuery, ToggleChecklistRequest, UpdateTaskRequest};
use braid_types::events::ServerEvent;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::CurrentUser;
use crate::view;

/// Dashboard listing. Done tasks older than the retention window stop
/// showing up here; they are not deleted.
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Query(query): Query<TaskListQuery>,
) -> ApiResult<impl IntoResponse> {
    let cutoff = braid_db::timestamp(Utc::now() - Duration::days(state.task_retention_days));
    let filter = TaskFilter {
        status: query.status.map(|s| s.as_str()),
        channel_id: query.channel_id,
        thread_id: query.thread_id,
    };

    let tasks: Vec<_> = state
        .db
        .list_tasks(&filter, &cutoff)?
        .into_iter()
        .map(view::task)
        .collect();
    Ok(Json(tasks))
}

/// Create a task straight from the dashboard. A synthetic origin message
/// keeps it consistent with organically-extracted tasks, and TaskBot posts
/// an announcement right after.
pub async fn create_task(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::Validation("title must not be empty".into()));
    }
    let thread = state
        .db
        .get_thread(req.thread_id)?
        .ok_or(ApiError::NotFound("thread"))?;

    let origin_content = if req.note.trim().is_empty() {
        title.clone()
    } else {
        format!("{}\n\n{}", title, req.note)
    };
    let bot = state.db.get_or_create_taskbot()?;
    let bot_content =
        braid_parse::render_bot_message(state.bot_template.as_deref(), &title, &user.name);
    let draft = TaskDraft {
        title,
        note: req.note.clone(),
    };

    let db = state.clone();
    let creator_id = user.id;
    let (origin, task, announcement) = tokio::task::spawn_blocking(move || {
        db.db.create_task_from_dashboard(
            thread.id,
            creator_id,
            &origin_content,
            &draft,
            bot.id,
            &bot_content,
        )
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal
    })??;

    let origin = view::message(origin);
    let task = view::task(task);
    let announcement = view::message(announcement);
    state
        .dispatcher
        .emit(&ServerEvent::MessageCreated { message: origin });
    state
        .dispatcher
        .emit(&ServerEvent::TaskCreated { task: task.clone() });
    state.dispatcher.emit(&ServerEvent::MessageCreated {
        message: announcement,
    });

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
    Extension(_user): Extension<CurrentUser>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.status.is_none() && req.title.is_none() && req.note.is_none() {
        return Err(ApiError::Validation(
            "at least one of status, title, note is required".into(),
        ));
    }
    let title = match req.title {
        Some(ref t) => {
            let t = t.trim();
            if t.is_empty() {
                return Err(ApiError::Validation("title must not be empty".into()));
            }
            Some(t.to_string())
        }
        None => None,
    };

    state
        .db
        .get_task(task_id)?
        .ok_or(ApiError::NotFound("task"))?;

    state.db.update_task(
        task_id,
        title.as_deref(),
        req.note.as_deref(),
        req.status.map(|s| s.as_str()),
    )?;
    let task = state
        .db
        .get_task(task_id)?
        .map(view::task)
        .ok_or(ApiError::Internal)?;

    state
        .dispatcher
        .emit(&ServerEvent::TaskUpdated { task: task.clone() });
    Ok(Json(task))
}

/// Toggle a checklist line inside the task's note.
pub async fn toggle_task_checklist(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
    Extension(_user): Extension<CurrentUser>,
    Json(req): Json<ToggleChecklistRequest>,
) -> ApiResult<impl IntoResponse> {
    let existing = state
        .db
        .get_task(task_id)?
        .ok_or(ApiError::NotFound("task"))?;

    let toggled = braid_parse::toggle_checklist(&existing.note, req.ordinal, req.checked);
    if toggled == existing.note {
        return Err(ApiError::NotFound("checklist item"));
    }

    state.db.update_task(task_id, None, Some(&toggled), None)?;
    let task = state
        .db
        .get_task(task_id)?
        .map(view::task)
        .ok_or(ApiError::Internal)?;

    state
        .dispatcher
        .emit(&ServerEvent::TaskUpdated { task: task.clone() });
    Ok(Json(task))
}

/// Removes the task record only; the origin message stays in its thread.
pub async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
    Extension(_user): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    let existing = state
        .db
        .get_task(task_id)?
        .ok_or(ApiError::NotFound("task"))?;

    state.db.delete_task(task_id)?;

    state.dispatcher.emit(&ServerEvent::TaskDeleted {
        task_id,
        message_id: existing.message_id,
        channel_id: existing.channel_id,
        thread_id: existing.thread_id,
    });
    Ok(StatusCode::NO_CONTENT)
}
