//! Router-level tests: every request goes through the real middleware,
//! handlers, store, and dispatcher, against an in-memory database.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use braid_api::auth::{AppState, AppStateInner};
use braid_db::Database;
use braid_gateway::dispatcher::Dispatcher;

fn test_state() -> AppState {
    Arc::new(AppStateInner {
        db: Database::open_in_memory().expect("in-memory db"),
        dispatcher: Dispatcher::new(),
        session_ttl_days: 7,
        task_retention_days: 14,
        bot_template: None,
    })
}

fn test_app() -> (Router, AppState) {
    let state = test_state();
    (braid_server::app(state.clone()), state)
}

async fn request(
    app: &Router,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    let resp = app.clone().oneshot(req).await.expect("response");
    let status = resp.status();
    let bytes = resp.into_body().collect().await.expect("body").to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

async fn signup(app: &Router, name: &str, email: &str) -> String {
    let (status, body) = request(
        app,
        "POST",
        "/auth/signup",
        None,
        Some(json!({ "name": name, "email": email, "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
    body["token"].as_str().expect("token").to_string()
}

/// Create a channel and return (channel_id, main_thread_id).
async fn make_channel(app: &Router, token: &str, name: &str) -> (i64, i64) {
    let (status, body) = request(
        app,
        "POST",
        "/channels",
        Some(token),
        Some(json!({ "name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "channel failed: {body}");
    (
        body["channel"]["id"].as_i64().expect("channel id"),
        body["thread"]["id"].as_i64().expect("thread id"),
    )
}

fn next_event(rx: &mut tokio::sync::broadcast::Receiver<braid_gateway::dispatcher::EventFrame>) -> Value {
    let frame = rx.try_recv().expect("expected a broadcast event");
    serde_json::from_str(&frame.json).expect("event json")
}

#[tokio::test]
async fn signup_login_logout_roundtrip() {
    let (app, _state) = test_app();
    let token = signup(&app, "Ada", "ada@example.com").await;

    // Duplicate email conflicts.
    let (status, _) = request(
        &app,
        "POST",
        "/auth/signup",
        None,
        Some(json!({ "name": "Imposter", "email": "ada@example.com", "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Login with the right password.
    let (status, body) = request(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "ada@example.com", "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Ada");

    // Wrong password and unknown email fail identically.
    let (status, wrong_pw) = request(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "ada@example.com", "password": "not-the-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, unknown) = request(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "nobody@example.com", "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_pw, unknown);

    // Logout revokes the session.
    let (status, _) = request(&app, "POST", "/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = request(&app, "GET", "/channels", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_reject_missing_and_bogus_tokens() {
    let (app, _state) = test_app();
    let (status, _) = request(&app, "GET", "/channels", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = request(&app, "GET", "/channels", Some("deadbeef"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_expiry_and_sliding() {
    let (app, state) = test_app();
    let token = signup(&app, "Ada", "ada@example.com").await;

    // Shrink the expiry to one hour out, then watch a request slide it.
    let soon = braid_db::timestamp(chrono::Utc::now() + chrono::Duration::hours(1));
    state
        .db
        .with_conn(|conn| {
            conn.execute(
                "UPDATE sessions SET expires_at = ?1 WHERE token = ?2",
                braid_db::rusqlite::params![soon, token],
            )?;
            Ok(())
        })
        .unwrap();

    let (status, _) = request(&app, "GET", "/channels", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let slid = state.db.session_expiry(&token).unwrap().unwrap();
    assert!(slid > soon, "expiry did not slide forward");

    // Force the expiry into the past: the session is dead even though it was
    // never revoked.
    let past = braid_db::timestamp(chrono::Utc::now() - chrono::Duration::hours(1));
    state
        .db
        .with_conn(|conn| {
            conn.execute(
                "UPDATE sessions SET expires_at = ?1 WHERE token = ?2",
                braid_db::rusqlite::params![past, token],
            )?;
            Ok(())
        })
        .unwrap();
    let (status, _) = request(&app, "GET", "/channels", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn creating_a_channel_creates_its_main_thread() {
    let (app, _state) = test_app();
    let token = signup(&app, "Ada", "ada@example.com").await;

    let (channel_id, _) = make_channel(&app, &token, "general").await;

    let (status, threads) = request(
        &app,
        "GET",
        &format!("/channels/{channel_id}/threads"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let threads = threads.as_array().unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0]["title"], "main");

    // Same name again: conflict, and no extra channel appears.
    let (status, _) = request(
        &app,
        "POST",
        "/channels",
        Some(&token),
        Some(json!({ "name": "general" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (_, channels) = request(&app, "GET", "/channels", Some(&token), None).await;
    assert_eq!(channels.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn task_flag_drives_the_full_flow() {
    let (app, state) = test_app();
    let token = signup(&app, "Ada", "ada@example.com").await;
    let (_, thread_id) = make_channel(&app, &token, "general").await;

    let mut rx = state.dispatcher.subscribe();

    let (status, body) = request(
        &app,
        "POST",
        &format!("/threads/{thread_id}/messages"),
        Some(&token),
        Some(json!({ "content": "Ship release :task" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"]["content"], "Ship release");
    assert_eq!(body["task"]["title"], "Ship release");
    assert_eq!(body["task"]["status"], "open");

    let created = next_event(&mut rx);
    assert_eq!(created["type"], "message_created");
    assert_eq!(created["data"]["message"]["channel_name"], "general");
    assert_eq!(created["data"]["message"]["thread_title"], "main");
    let task_event = next_event(&mut rx);
    assert_eq!(task_event["type"], "task_created");
    assert_eq!(task_event["data"]["task"]["title"], "Ship release");

    // Move the task to done and watch the update go out.
    let task_id = body["task"]["id"].as_i64().unwrap();
    let before = body["task"]["updated_at"].as_str().unwrap().to_string();
    let (status, updated) = request(
        &app,
        "PATCH",
        &format!("/tasks/{task_id}"),
        Some(&token),
        Some(json!({ "status": "done" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "done");
    let before: chrono::DateTime<chrono::Utc> = before.parse().unwrap();
    let after: chrono::DateTime<chrono::Utc> =
        updated["updated_at"].as_str().unwrap().parse().unwrap();
    assert!(after >= before);

    let update_event = next_event(&mut rx);
    assert_eq!(update_event["type"], "task_updated");
    assert_eq!(update_event["data"]["task"]["status"], "done");
}

#[tokio::test]
async fn flag_only_message_creates_no_task() {
    let (app, _state) = test_app();
    let token = signup(&app, "Ada", "ada@example.com").await;
    let (_, thread_id) = make_channel(&app, &token, "general").await;

    let (status, body) = request(
        &app,
        "POST",
        &format!("/threads/{thread_id}/messages"),
        Some(&token),
        Some(json!({ "content": ":task" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    // Stripping would leave nothing, so the original text is stored.
    assert_eq!(body["message"]["content"], ":task");
    assert!(body["task"].is_null());

    let (_, tasks) = request(&app, "GET", "/tasks", Some(&token), None).await;
    assert!(tasks.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn reply_retrigger_never_duplicates_the_task() {
    let (app, _state) = test_app();
    let token = signup(&app, "Ada", "ada@example.com").await;
    let (_, thread_id) = make_channel(&app, &token, "general").await;

    let (_, body) = request(
        &app,
        "POST",
        &format!("/threads/{thread_id}/messages"),
        Some(&token),
        Some(json!({ "content": "Ship release :task" })),
    )
    .await;
    let message_id = body["message"]["id"].as_i64().unwrap();

    // A reply flagging the same parent message is a no-op for tasks.
    let (status, reply_body) = request(
        &app,
        "POST",
        &format!("/messages/{message_id}/replies"),
        Some(&token),
        Some(json!({ "content": "also this :task" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(reply_body["task"].is_null());

    let (_, tasks) = request(&app, "GET", "/tasks", Some(&token), None).await;
    assert_eq!(tasks.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn deleting_a_message_cascades() {
    let (app, state) = test_app();
    let token = signup(&app, "Ada", "ada@example.com").await;
    let (_, thread_id) = make_channel(&app, &token, "general").await;

    let (_, body) = request(
        &app,
        "POST",
        &format!("/threads/{thread_id}/messages"),
        Some(&token),
        Some(json!({ "content": "Ship release :task" })),
    )
    .await;
    let message_id = body["message"]["id"].as_i64().unwrap();
    let task_id = body["task"]["id"].as_i64().unwrap();
    request(
        &app,
        "POST",
        &format!("/messages/{message_id}/replies"),
        Some(&token),
        Some(json!({ "content": "on it" })),
    )
    .await;

    let mut rx = state.dispatcher.subscribe();
    let (status, _) = request(
        &app,
        "DELETE",
        &format!("/messages/{message_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(next_event(&mut rx)["type"], "message_deleted");

    let (status, _) = request(
        &app,
        "GET",
        &format!("/messages/{message_id}/replies"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(
        &app,
        "PATCH",
        &format!("/tasks/{task_id}"),
        Some(&token),
        Some(json!({ "status": "doing" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_the_author_may_edit_or_delete() {
    let (app, _state) = test_app();
    let ada = signup(&app, "Ada", "ada@example.com").await;
    let eve = signup(&app, "Eve", "eve@example.com").await;
    let (_, thread_id) = make_channel(&app, &ada, "general").await;

    let (_, body) = request(
        &app,
        "POST",
        &format!("/threads/{thread_id}/messages"),
        Some(&ada),
        Some(json!({ "content": "mine" })),
    )
    .await;
    let message_id = body["message"]["id"].as_i64().unwrap();

    let (status, _) = request(
        &app,
        "PATCH",
        &format!("/messages/{message_id}"),
        Some(&eve),
        Some(json!({ "content": "hijacked" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = request(
        &app,
        "DELETE",
        &format!("/messages/{message_id}"),
        Some(&eve),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Empty-after-trim edits are rejected even for the author.
    let (status, _) = request(
        &app,
        "PATCH",
        &format!("/messages/{message_id}"),
        Some(&ada),
        Some(json!({ "content": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn checklist_toggle_is_fence_aware() {
    let (app, _state) = test_app();
    let token = signup(&app, "Ada", "ada@example.com").await;
    let (_, thread_id) = make_channel(&app, &token, "general").await;

    let content = "- [ ] a\n```\n- [ ] fake\n```\n- [ ] b";
    let (_, body) = request(
        &app,
        "POST",
        &format!("/threads/{thread_id}/messages"),
        Some(&token),
        Some(json!({ "content": content })),
    )
    .await;
    let message_id = body["message"]["id"].as_i64().unwrap();

    let (status, toggled) = request(
        &app,
        "POST",
        &format!("/messages/{message_id}/checklist"),
        Some(&token),
        Some(json!({ "ordinal": 1, "checked": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        toggled["content"].as_str().unwrap(),
        "- [ ] a\n```\n- [ ] fake\n```\n- [x] b"
    );

    // Ordinal past the end: not found, content untouched.
    let (status, _) = request(
        &app,
        "POST",
        &format!("/messages/{message_id}/checklist"),
        Some(&token),
        Some(json!({ "ordinal": 5, "checked": true })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dashboard_task_creation_posts_origin_and_bot_messages() {
    let (app, state) = test_app();
    let token = signup(&app, "Ada", "ada@example.com").await;
    let (_, thread_id) = make_channel(&app, &token, "general").await;

    let mut rx = state.dispatcher.subscribe();
    let (status, task) = request(
        &app,
        "POST",
        "/tasks",
        Some(&token),
        Some(json!({ "thread_id": thread_id, "title": "Write docs", "note": "- [ ] outline" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(task["title"], "Write docs");
    assert_eq!(task["creator_name"], "Ada");

    assert_eq!(next_event(&mut rx)["type"], "message_created");
    assert_eq!(next_event(&mut rx)["type"], "task_created");
    let bot_event = next_event(&mut rx);
    assert_eq!(bot_event["type"], "message_created");
    assert_eq!(
        bot_event["data"]["message"]["content"],
        "Task created: \"Write docs\" by Ada"
    );
    assert_eq!(bot_event["data"]["message"]["author_name"], "TaskBot");

    // Both the origin and the announcement are real thread messages.
    let (_, messages) = request(
        &app,
        "GET",
        &format!("/threads/{thread_id}/messages"),
        Some(&token),
        None,
    )
    .await;
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["content"], "Write docs\n\n- [ ] outline");
}

#[tokio::test]
async fn done_tasks_age_out_of_listings() {
    let (app, state) = test_app();
    let token = signup(&app, "Ada", "ada@example.com").await;
    let (_, thread_id) = make_channel(&app, &token, "general").await;

    let (_, body) = request(
        &app,
        "POST",
        &format!("/threads/{thread_id}/messages"),
        Some(&token),
        Some(json!({ "content": "Old chore :task" })),
    )
    .await;
    let task_id = body["task"]["id"].as_i64().unwrap();

    // Done 20 days ago, well past the 14-day window.
    let aged = braid_db::timestamp(chrono::Utc::now() - chrono::Duration::days(20));
    state
        .db
        .with_conn(|conn| {
            conn.execute(
                "UPDATE tasks SET status = 'done', updated_at = ?1 WHERE id = ?2",
                braid_db::rusqlite::params![aged, task_id],
            )?;
            Ok(())
        })
        .unwrap();

    let (_, tasks) = request(&app, "GET", "/tasks", Some(&token), None).await;
    assert!(tasks.as_array().unwrap().is_empty());
    let (_, tasks) = request(&app, "GET", "/tasks?status=done", Some(&token), None).await;
    assert!(tasks.as_array().unwrap().is_empty());

    // The row still exists — visibility window, not deletion.
    assert!(state.db.get_task(task_id).unwrap().is_some());
}

#[tokio::test]
async fn task_update_requires_a_field_and_a_nonempty_title() {
    let (app, _state) = test_app();
    let token = signup(&app, "Ada", "ada@example.com").await;
    let (_, thread_id) = make_channel(&app, &token, "general").await;

    let (_, body) = request(
        &app,
        "POST",
        &format!("/threads/{thread_id}/messages"),
        Some(&token),
        Some(json!({ "content": "Ship release :task" })),
    )
    .await;
    let task_id = body["task"]["id"].as_i64().unwrap();

    let (status, _) = request(
        &app,
        "PATCH",
        &format!("/tasks/{task_id}"),
        Some(&token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(
        &app,
        "PATCH",
        &format!("/tasks/{task_id}"),
        Some(&token),
        Some(json!({ "title": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn marking_a_thread_read_is_advisory_and_idempotent() {
    let (app, _state) = test_app();
    let token = signup(&app, "Ada", "ada@example.com").await;
    let (_, thread_id) = make_channel(&app, &token, "general").await;

    let (_, body) = request(
        &app,
        "POST",
        &format!("/threads/{thread_id}/messages"),
        Some(&token),
        Some(json!({ "content": "hello" })),
    )
    .await;
    let message_id = body["message"]["id"].as_i64().unwrap();

    for _ in 0..2 {
        let (status, _) = request(
            &app,
            "POST",
            &format!("/threads/{thread_id}/read"),
            Some(&token),
            Some(json!({ "last_message_id": message_id })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
