use crate::config::Config;
use crate::engine::achievement::{self, AchievementDay};
use crate::engine::dashboard::{DashboardView, TaskFilters};
use crate::engine::streak::{self, MilestoneProgress};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    BrainDump, BrainDumpDraft, Priority, StepDraft, Streak, Task, TaskDraft, TaskStep,
};
use crate::service::{AchievementReport, Planner, StepToggle, TaskDetail, TaskToggle};
use anyhow::anyhow;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::error;

pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct ApiState {
    pub planner: Planner,
    pub config: Arc<Config>,
}

impl ApiState {
    fn user_id(&self, headers: &HeaderMap) -> String {
        headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.config.user_id.clone())
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/tasks", get(task_list).post(task_create))
        .route(
            "/api/v1/tasks/:id",
            get(task_show).put(task_update).delete(task_delete),
        )
        .route("/api/v1/tasks/:id/toggle", post(task_toggle))
        .route("/api/v1/tasks/:id/steps", get(step_list).post(step_create))
        .route("/api/v1/steps/:id", put(step_update).delete(step_delete))
        .route("/api/v1/steps/:id/toggle", post(step_toggle))
        .route("/api/v1/dashboard", get(dashboard))
        .route("/api/v1/brain-dumps", get(dump_list).post(dump_create))
        .route(
            "/api/v1/brain-dumps/:id",
            put(dump_update).delete(dump_delete),
        )
        .route("/api/v1/achievements", get(achievements))
        .route("/api/v1/streak", get(streak_show))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct DashboardQuery {
    energy: Option<u8>,
    context: Option<String>,
    priority: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusPayload {
    store: &'static str,
    user_id: String,
    api_port: u16,
    streak_rule: &'static str,
    active_tasks: usize,
    completed_tasks: usize,
    streak: Option<Streak>,
}

#[derive(Debug, Serialize)]
struct AchievementsPayload {
    #[serde(flatten)]
    report: AchievementReport,
    timeline: Vec<AchievementDay>,
}

#[derive(Debug, Serialize)]
struct StreakPayload {
    streak: Option<Streak>,
    active: bool,
    milestone: Option<MilestoneProgress>,
}

async fn status(State(state): State<ApiState>, headers: HeaderMap) -> ApiResult<Json<StatusPayload>> {
    let user_id = state.user_id(&headers);
    let planner = state.planner.clone();
    let config = Arc::clone(&state.config);

    let payload = blocking(move || {
        let tasks = planner.list_tasks(&user_id)?;
        let completed_tasks = tasks.iter().filter(|task| task.is_completed()).count();

        Ok(StatusPayload {
            store: planner.backend(),
            active_tasks: tasks.len() - completed_tasks,
            completed_tasks,
            streak: planner.streak(&user_id)?,
            user_id,
            api_port: config.api_port,
            streak_rule: config.streak_rule.as_str(),
        })
    })
    .await?;

    Ok(Json(payload))
}

async fn task_list(State(state): State<ApiState>, headers: HeaderMap) -> ApiResult<Json<Vec<Task>>> {
    let user_id = state.user_id(&headers);
    let planner = state.planner;

    Ok(Json(blocking(move || planner.list_tasks(&user_id)).await?))
}

async fn task_create(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(draft): Json<TaskDraft>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let user_id = state.user_id(&headers);
    let planner = state.planner;

    let task = blocking(move || planner.create_task(&user_id, draft, Utc::now())).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn task_show(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<TaskDetail>> {
    let user_id = state.user_id(&headers);
    let planner = state.planner;

    Ok(Json(blocking(move || planner.task_detail(&user_id, id)).await?))
}

async fn task_update(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Task>> {
    let user_id = state.user_id(&headers);
    let planner = state.planner;

    Ok(Json(
        blocking(move || {
            let draft = TaskDraft::from(&planner.get_task(&user_id, id)?).merged(&body)?;
            planner.update_task(&user_id, id, draft)
        })
        .await?,
    ))
}

async fn task_delete(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let user_id = state.user_id(&headers);
    let planner = state.planner;

    blocking(move || planner.delete_task(&user_id, id)).await?;
    Ok(Json(json!({ "deleted": true, "id": id })))
}

async fn task_toggle(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<TaskToggle>> {
    let user_id = state.user_id(&headers);
    let planner = state.planner;

    Ok(Json(
        blocking(move || planner.toggle_task(&user_id, id, &Local::now())).await?,
    ))
}

async fn step_list(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(task_id): Path<i64>,
) -> ApiResult<Json<Vec<TaskStep>>> {
    let user_id = state.user_id(&headers);
    let planner = state.planner;

    Ok(Json(
        blocking(move || planner.list_steps(&user_id, task_id)).await?,
    ))
}

async fn step_create(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(task_id): Path<i64>,
    Json(draft): Json<StepDraft>,
) -> ApiResult<(StatusCode, Json<TaskStep>)> {
    let user_id = state.user_id(&headers);
    let planner = state.planner;

    let step = blocking(move || planner.add_step(&user_id, task_id, draft)).await?;
    Ok((StatusCode::CREATED, Json(step)))
}

async fn step_update(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(draft): Json<StepDraft>,
) -> ApiResult<Json<TaskStep>> {
    let user_id = state.user_id(&headers);
    let planner = state.planner;

    Ok(Json(
        blocking(move || planner.update_step(&user_id, id, draft)).await?,
    ))
}

async fn step_delete(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let user_id = state.user_id(&headers);
    let planner = state.planner;

    blocking(move || planner.delete_step(&user_id, id)).await?;
    Ok(Json(json!({ "deleted": true, "id": id })))
}

async fn step_toggle(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<StepToggle>> {
    let user_id = state.user_id(&headers);
    let planner = state.planner;

    Ok(Json(blocking(move || planner.toggle_step(&user_id, id)).await?))
}

async fn dashboard(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Json<DashboardView>> {
    let user_id = state.user_id(&headers);
    let energy = query.energy.unwrap_or(state.config.default_energy);
    let filters = TaskFilters {
        context: query.context.filter(|context| !context.trim().is_empty()),
        priority: query
            .priority
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(str::parse::<Priority>)
            .transpose()?,
    };
    let planner = state.planner;

    Ok(Json(
        blocking(move || planner.dashboard(&user_id, &filters, energy)).await?,
    ))
}

async fn dump_list(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<BrainDump>>> {
    let user_id = state.user_id(&headers);
    let planner = state.planner;

    Ok(Json(blocking(move || planner.list_brain_dumps(&user_id)).await?))
}

async fn dump_create(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(draft): Json<BrainDumpDraft>,
) -> ApiResult<(StatusCode, Json<BrainDump>)> {
    let user_id = state.user_id(&headers);
    let planner = state.planner;

    let dump = blocking(move || planner.create_brain_dump(&user_id, draft, Utc::now())).await?;
    Ok((StatusCode::CREATED, Json(dump)))
}

async fn dump_update(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(draft): Json<BrainDumpDraft>,
) -> ApiResult<Json<BrainDump>> {
    let user_id = state.user_id(&headers);
    let planner = state.planner;

    Ok(Json(
        blocking(move || planner.update_brain_dump(&user_id, id, draft)).await?,
    ))
}

async fn dump_delete(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let user_id = state.user_id(&headers);
    let planner = state.planner;

    blocking(move || planner.delete_brain_dump(&user_id, id)).await?;
    Ok(Json(json!({ "deleted": true, "id": id })))
}

async fn achievements(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Json<AchievementsPayload>> {
    let user_id = state.user_id(&headers);
    let planner = state.planner;

    let report = blocking(move || planner.achievement_report(&user_id, Utc::now())).await?;
    let timeline = achievement::timeline::<Local>(&report.achievements, &Local);

    Ok(Json(AchievementsPayload { report, timeline }))
}

async fn streak_show(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Json<StreakPayload>> {
    let user_id = state.user_id(&headers);
    let planner = state.planner;

    let streak = blocking(move || planner.streak(&user_id)).await?;
    let now = Utc::now();

    Ok(Json(StreakPayload {
        active: streak
            .as_ref()
            .is_some_and(|current| streak::is_active(current, now)),
        milestone: streak
            .as_ref()
            .filter(|current| current.count > 0)
            .map(|current| streak::milestone_progress(current.count)),
        streak,
    }))
}

/// Store backends block, so service calls run on the blocking pool.
async fn blocking<T, F>(operation: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ServiceResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(operation)
        .await
        .map_err(|join_error| ApiError::Internal(anyhow!("Service task failed: {join_error}")))?
        .map_err(ApiError::from)
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::Validation(message) => Self::BadRequest(message),
            ServiceError::NotFound(message) => Self::NotFound(message),
            ServiceError::Store(error) => Self::Internal(error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(error) => {
                error!(error = %error, "API request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": error.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiState, USER_HEADER, router};
    use crate::config::Config;
    use crate::engine::streak::StreakRule;
    use crate::service::Planner;
    use crate::store::TableStore;
    use crate::store::sqlite::SqliteStore;
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let store: Arc<dyn TableStore> = Arc::new(SqliteStore::open_in_memory().expect("store"));
        router(ApiState {
            planner: Planner::new(store, StreakRule::Calendar),
            config: Arc::new(Config::default()),
        })
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        call_as(app, method, uri, body, None).await
    }

    async fn call_as(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
        user: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            request = request.header(USER_HEADER, user);
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("request");

        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, value)
    }

    #[tokio::test]
    async fn create_then_complete_a_task() {
        let app = app();

        let (status, task) = call(
            &app,
            "POST",
            "/api/v1/tasks",
            Some(json!({ "title": "Book flights", "priority": "urgent", "energyLevel": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(task["status"], "active");
        assert_eq!(task["context"], "work");
        let id = task["id"].as_i64().expect("id");

        let (status, toggle) = call(&app, "POST", &format!("/api/v1/tasks/{id}/toggle"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(toggle["task"]["status"], "completed");
        assert!(toggle["task"]["completedAt"].is_string());
        assert_eq!(toggle["achievement"]["description"], "Completed task: Book flights");
        assert_eq!(toggle["streak"]["count"], 1);

        let (_, streak) = call(&app, "GET", "/api/v1/streak", None).await;
        assert_eq!(streak["streak"]["count"], 1);
        assert_eq!(streak["active"], true);

        let (_, report) = call(&app, "GET", "/api/v1/achievements", None).await;
        assert_eq!(report["overview"]["completedTasks"], 1);
        assert_eq!(report["achievements"].as_array().map(Vec::len), Some(1));
        assert_eq!(report["timeline"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn validation_errors_are_bad_requests() {
        let app = app();

        let (status, body) = call(&app, "POST", "/api/v1/tasks", Some(json!({ "title": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Title is required");

        let (status, _) = call(&app, "GET", "/api/v1/dashboard?energy=7", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, "GET", "/api/v1/dashboard?priority=someday", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn task_update_keeps_fields_missing_from_the_body() {
        let app = app();

        let (_, task) = call(
            &app,
            "POST",
            "/api/v1/tasks",
            Some(json!({
                "title": "Renew passport",
                "priority": "important",
                "energyLevel": 4,
                "context": "errands",
                "dueDate": "2026-03-01T12:00:00Z",
            })),
        )
        .await;
        let id = task["id"].as_i64().expect("id");

        let (status, updated) = call(
            &app,
            "PUT",
            &format!("/api/v1/tasks/{id}"),
            Some(json!({ "title": "Renew passport and ID" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["title"], "Renew passport and ID");
        assert_eq!(updated["priority"], "important");
        assert_eq!(updated["energyLevel"], 4);
        assert_eq!(updated["context"], "errands");
        assert_eq!(updated["dueDate"], task["dueDate"]);

        let (status, cleared) = call(
            &app,
            "PUT",
            &format!("/api/v1/tasks/{id}"),
            Some(json!({ "dueDate": null })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(cleared["dueDate"].is_null());

        let (status, _) = call(
            &app,
            "PUT",
            &format!("/api/v1/tasks/{id}"),
            Some(json!({ "energyLevel": 9 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, "PUT", "/api/v1/tasks/999", Some(json!({ "title": "x" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn user_header_scopes_every_record() {
        let app = app();

        let (_, task) = call_as(
            &app,
            "POST",
            "/api/v1/tasks",
            Some(json!({ "title": "Private" })),
            Some("alex"),
        )
        .await;
        let id = task["id"].as_i64().expect("id");
        assert_eq!(task["userId"], "alex");

        let (status, _) = call(&app, "GET", &format!("/api/v1/tasks/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, list) = call(&app, "GET", "/api/v1/tasks", None).await;
        assert_eq!(list, json!([]));

        let (status, detail) =
            call_as(&app, "GET", &format!("/api/v1/tasks/{id}"), None, Some("alex")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["task"]["title"], "Private");
    }

    #[tokio::test]
    async fn steps_and_cascade_delete() {
        let app = app();
        let (_, task) = call(&app, "POST", "/api/v1/tasks", Some(json!({ "title": "Garage" }))).await;
        let id = task["id"].as_i64().expect("id");

        let (status, step) = call(
            &app,
            "POST",
            &format!("/api/v1/tasks/{id}/steps"),
            Some(json!({ "stepTitle": "Sort boxes" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let step_id = step["id"].as_i64().expect("step id");

        let (_, toggled) = call(&app, "POST", &format!("/api/v1/steps/{step_id}/toggle"), None).await;
        assert_eq!(toggled["step"]["isCompleted"], true);
        assert_eq!(toggled["allStepsCompleted"], true);

        let (_, detail) = call(&app, "GET", &format!("/api/v1/tasks/{id}"), None).await;
        assert_eq!(detail["progress"]["percent"], 100);

        let (status, _) = call(&app, "DELETE", &format!("/api/v1/tasks/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&app, "GET", &format!("/api/v1/tasks/{id}/steps"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, "POST", &format!("/api/v1/steps/{step_id}/toggle"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn dashboard_buckets_and_filters() {
        let app = app();
        for (title, priority, context) in [
            ("Tax return", "urgent", "finances"),
            ("Reply to Sam", "quick-win", "work"),
            ("Refactor", "medium", "work"),
        ] {
            call(
                &app,
                "POST",
                "/api/v1/tasks",
                Some(json!({ "title": title, "priority": priority, "context": context, "energyLevel": 4 })),
            )
            .await;
        }

        let (status, view) = call(&app, "GET", "/api/v1/dashboard?energy=4", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["urgent"].as_array().map(Vec::len), Some(1));
        assert_eq!(view["quickWins"].as_array().map(Vec::len), Some(1));
        assert_eq!(view["energyMatched"].as_array().map(Vec::len), Some(3));

        let (_, filtered) = call(
            &app,
            "GET",
            "/api/v1/dashboard?context=work&priority=quick-win",
            None,
        )
        .await;
        assert_eq!(filtered["active"].as_array().map(Vec::len), Some(1));
        assert_eq!(filtered["active"][0]["title"], "Reply to Sam");
    }

    #[tokio::test]
    async fn brain_dump_lifecycle() {
        let app = app();

        let (status, dump) = call(
            &app,
            "POST",
            "/api/v1/brain-dumps",
            Some(json!({ "content": "buy stamps" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = dump["id"].as_i64().expect("id");

        let (_, edited) = call(
            &app,
            "PUT",
            &format!("/api/v1/brain-dumps/{id}"),
            Some(json!({ "content": "buy stamps and envelopes" })),
        )
        .await;
        assert_eq!(edited["createdAt"], dump["createdAt"]);

        let (status, _) = call(&app, "DELETE", &format!("/api/v1/brain-dumps/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, list) = call(&app, "GET", "/api/v1/brain-dumps", None).await;
        assert_eq!(list, json!([]));
    }

    #[tokio::test]
    async fn status_reports_backend_and_counts() {
        let app = app();
        call(&app, "POST", "/api/v1/tasks", Some(json!({ "title": "One" }))).await;

        let (status, body) = call(&app, "GET", "/api/v1/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["store"], "sqlite");
        assert_eq!(body["user_id"], "single-user");
        assert_eq!(body["activeTasks"], 1);
        assert_eq!(body["streak"], Value::Null);
    }
}
