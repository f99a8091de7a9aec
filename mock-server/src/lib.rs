use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub const MAX_TEXT_LEN: usize = 120;
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    fn rank(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: Uuid,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_date: Option<NaiveDateTime>,
    pub priority: Priority,
    pub creation_date: NaiveDateTime,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodo {
    pub text: String,
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodo {
    pub text: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    Priority,
    DueDate,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub text: Option<String>,
    pub priority: Option<Priority>,
    pub done: Option<bool>,
    pub sort_by: Option<SortKey>,
    #[serde(default)]
    pub sort_direction: SortDirection,
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub size: usize,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoPage {
    pub content: Vec<Todo>,
    pub total_elements: usize,
    pub total_pages: usize,
    pub current_page: usize,
    pub size: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityMetric {
    pub priority: Priority,
    pub average_completion_time: f64,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub average_completion_time: f64,
    pub priority_metrics: Vec<PriorityMetric>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

pub enum AppError {
    NotFound(Uuid),
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::NotFound(id) => (StatusCode::NOT_FOUND, "NOT_FOUND", format!("todo {id} not found")),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", message),
        };
        let body = ErrorBody {
            code: code.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

/// Source of "now" for creation and completion stamps.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Todos in creation order, which is also the unsorted list order.
pub type Db = Arc<RwLock<Vec<Todo>>>;

#[derive(Clone)]
pub struct AppState {
    db: Db,
    clock: Clock,
}

pub fn app() -> Router {
    app_with_clock(Arc::new(|| Local::now().naive_local()))
}

pub fn app_with_clock(clock: Clock) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(Vec::new())),
        clock,
    };
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route("/todos/metrics", get(get_metrics))
        .route("/todos/{id}", get(get_todo).put(update_todo).delete(delete_todo))
        .route("/todos/{id}/done", post(mark_done))
        .route("/todos/{id}/undone", put(mark_undone))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "todo mock server listening");
    }
    axum::serve(listener, app()).await
}

fn validate_text(text: &str) -> Result<String, AppError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("Text is required".to_string()));
    }
    if trimmed.chars().count() > MAX_TEXT_LEN {
        return Err(AppError::BadRequest(format!(
            "Text must not exceed {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn compare(a: &Todo, b: &Todo, key: SortKey, direction: SortDirection) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    let ordered = |ord: Ordering| match direction {
        SortDirection::Asc => ord,
        SortDirection::Desc => ord.reverse(),
    };
    match key {
        SortKey::Priority => ordered(a.priority.rank().cmp(&b.priority.rank())),
        // Todos without a due date go last in either direction.
        SortKey::DueDate => match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => ordered(x.cmp(&y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

async fn list_todos(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<TodoPage>, AppError> {
    if params.size == 0 {
        return Err(AppError::BadRequest("size must be positive".to_string()));
    }
    let needle = params
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase);

    let todos = state.db.read().await;
    let mut matching: Vec<Todo> = todos
        .iter()
        .filter(|t| needle.as_ref().map_or(true, |n| t.text.to_lowercase().contains(n)))
        .filter(|t| params.priority.map_or(true, |p| t.priority == p))
        .filter(|t| params.done.map_or(true, |d| t.done == d))
        .cloned()
        .collect();
    drop(todos);

    if let Some(key) = params.sort_by {
        matching.sort_by(|a, b| compare(a, b, key, params.sort_direction));
    }

    let total_elements = matching.len();
    let total_pages = total_elements.div_ceil(params.size);
    let content = matching
        .into_iter()
        .skip(params.page.saturating_mul(params.size))
        .take(params.size)
        .collect();
    debug!(total_elements, page = params.page, "listed todos");
    Ok(Json(TodoPage {
        content,
        total_elements,
        total_pages,
        current_page: params.page,
        size: params.size,
    }))
}

async fn create_todo(
    State(state): State<AppState>,
    Json(input): Json<CreateTodo>,
) -> Result<(StatusCode, Json<Todo>), AppError> {
    let text = validate_text(&input.text)?;
    let todo = Todo {
        id: Uuid::new_v4(),
        text,
        due_date: input.due_date,
        done: false,
        done_date: None,
        priority: input.priority,
        creation_date: (state.clock)(),
    };
    debug!(id = %todo.id, "created todo");
    state.db.write().await.push(todo.clone());
    Ok((StatusCode::CREATED, Json(todo)))
}

async fn get_todo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Todo>, AppError> {
    let todos = state.db.read().await;
    todos
        .iter()
        .find(|t| t.id == id)
        .cloned()
        .map(Json)
        .ok_or(AppError::NotFound(id))
}

async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateTodo>,
) -> Result<Json<Todo>, AppError> {
    let mut todos = state.db.write().await;
    let todo = todos
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or(AppError::NotFound(id))?;
    if let Some(text) = input.text.as_deref().map(validate_text).transpose()? {
        todo.text = text;
    }
    if let Some(priority) = input.priority {
        todo.priority = priority;
    }
    if let Some(due_date) = input.due_date {
        todo.due_date = Some(due_date);
    }
    Ok(Json(todo.clone()))
}

async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let mut todos = state.db.write().await;
    let position = todos
        .iter()
        .position(|t| t.id == id)
        .ok_or(AppError::NotFound(id))?;
    todos.remove(position);
    debug!(%id, "deleted todo");
    Ok(StatusCode::NO_CONTENT)
}

async fn mark_done(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Todo>, AppError> {
    let now = (state.clock)();
    let mut todos = state.db.write().await;
    let todo = todos
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or(AppError::NotFound(id))?;
    if !todo.done {
        todo.done = true;
        todo.done_date = Some(now);
    }
    Ok(Json(todo.clone()))
}

async fn mark_undone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Todo>, AppError> {
    let mut todos = state.db.write().await;
    let todo = todos
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or(AppError::NotFound(id))?;
    todo.done = false;
    todo.done_date = None;
    Ok(Json(todo.clone()))
}

fn completion_hours(todo: &Todo) -> Option<f64> {
    todo.done_date
        .map(|done| (done - todo.creation_date).num_minutes() as f64 / 60.0)
}

fn average(hours: &[f64]) -> f64 {
    if hours.is_empty() {
        0.0
    } else {
        hours.iter().sum::<f64>() / hours.len() as f64
    }
}

async fn get_metrics(State(state): State<AppState>) -> Json<Metrics> {
    let todos = state.db.read().await;
    let done: Vec<(Priority, f64)> = todos
        .iter()
        .filter(|t| t.done)
        .filter_map(|t| completion_hours(t).map(|h| (t.priority, h)))
        .collect();

    let all: Vec<f64> = done.iter().map(|(_, h)| *h).collect();
    let priority_metrics = Priority::ALL
        .iter()
        .map(|&priority| {
            let hours: Vec<f64> = done
                .iter()
                .filter(|(p, _)| *p == priority)
                .map(|(_, h)| *h)
                .collect();
            PriorityMetric {
                priority,
                average_completion_time: average(&hours),
                count: hours.len(),
            }
        })
        .collect();

    Json(Metrics {
        average_completion_time: average(&all),
        priority_metrics,
    })
}
