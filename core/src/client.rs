//! Stateless HTTP request builder and response parser for the todo API.
//!
//! # Design
//! `TodoClient` holds only a `base_url` and carries no mutable state between
//! calls. Each endpoint is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//! The caller executes the actual HTTP round-trip, keeping the core
//! deterministic and free of I/O dependencies.

use percent_encoding::utf8_percent_encode;
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::query::{RequestParameters, UNRESERVED};
use crate::types::{CreateTodo, Metrics, Todo, TodoId, TodoPage, UpdateTodo};

/// Synchronous, stateless client for the todo API.
#[derive(Debug, Clone)]
pub struct TodoClient {
    base_url: String,
}

impl TodoClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(&config.base_url)
    }

    fn request(&self, method: HttpMethod, path: String) -> HttpRequest {
        HttpRequest {
            method,
            path: format!("{}{path}", self.base_url),
            headers: Vec::new(),
            body: None,
        }
    }

    fn json_request<T: serde::Serialize>(
        &self,
        method: HttpMethod,
        path: String,
        input: &T,
    ) -> Result<HttpRequest, ApiError> {
        let body =
            serde_json::to_string(input).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        let mut req = self.request(method, path);
        req.headers
            .push(("content-type".to_string(), "application/json".to_string()));
        req.body = Some(body);
        Ok(req)
    }

    pub fn build_list_todos(&self, params: &RequestParameters) -> HttpRequest {
        let query = params.to_query_string();
        if query.is_empty() {
            self.request(HttpMethod::Get, "/todos".to_string())
        } else {
            self.request(HttpMethod::Get, format!("/todos?{query}"))
        }
    }

    pub fn build_get_todo(&self, id: &TodoId) -> HttpRequest {
        self.request(HttpMethod::Get, todo_path(id, ""))
    }

    pub fn build_create_todo(&self, input: &CreateTodo) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/todos".to_string(), input)
    }

    pub fn build_update_todo(&self, id: &TodoId, input: &UpdateTodo) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Put, todo_path(id, ""), input)
    }

    pub fn build_delete_todo(&self, id: &TodoId) -> HttpRequest {
        self.request(HttpMethod::Delete, todo_path(id, ""))
    }

    pub fn build_mark_done(&self, id: &TodoId) -> HttpRequest {
        self.request(HttpMethod::Post, todo_path(id, "/done"))
    }

    pub fn build_mark_undone(&self, id: &TodoId) -> HttpRequest {
        self.request(HttpMethod::Put, todo_path(id, "/undone"))
    }

    pub fn build_get_metrics(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/todos/metrics".to_string())
    }

    pub fn parse_list_todos(&self, response: HttpResponse) -> Result<TodoPage, ApiError> {
        check_status(&response, &[200])?;
        decode(&response)
    }

    pub fn parse_get_todo(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        check_status(&response, &[200])?;
        decode(&response)
    }

    pub fn parse_create_todo(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        check_status(&response, &[201, 200])?;
        decode(&response)
    }

    pub fn parse_update_todo(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        check_status(&response, &[200])?;
        decode(&response)
    }

    pub fn parse_delete_todo(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response, &[204, 200])?;
        Ok(())
    }

    /// Shared by the done and undone endpoints; both return the updated todo.
    pub fn parse_toggle_done(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        check_status(&response, &[200])?;
        decode(&response)
    }

    pub fn parse_get_metrics(&self, response: HttpResponse) -> Result<Metrics, ApiError> {
        check_status(&response, &[200])?;
        decode(&response)
    }
}

/// `/todos/{id}{suffix}` with the id encoded as a single path segment.
fn todo_path(id: &TodoId, suffix: &str) -> String {
    format!("/todos/{}{suffix}", utf8_percent_encode(id.as_str(), UNRESERVED))
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse, expected: &[u16]) -> Result<(), ApiError> {
    if expected.contains(&response.status) {
        return Ok(());
    }
    if response.status == 404 {
        return Err(ApiError::NotFound);
    }
    Err(ApiError::HttpError {
        status: response.status,
        body: response.body.clone(),
    })
}
