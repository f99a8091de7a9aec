//! Query and synchronization core for the todo service client.
//!
//! # Overview
//! Holds the user's filter, sort and page, derives list requests from them,
//! and reconciles paginated server responses, mutations and metrics into one
//! view state with a single error slot. The core never touches the network
//! (host-does-IO pattern): it hands out `HttpRequest` values and consumes
//! `HttpResponse` values, which keeps every state transition deterministic
//! and testable.
//!
//! # Design
//! - `QueryState` owns filter/sort/page and resets the page on every filter or
//!   sort change.
//! - `SyncController` splits each operation into `begin_*` / `complete_*` so
//!   overlapping requests are explicit tickets; stale list responses are
//!   detected by request signature and dropped.
//! - `TodoClient` is stateless; `build_*` produces requests and `parse_*`
//!   consumes responses.
//! - `TodoSession` runs intents end to end over any `Transport`.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod query;
pub mod session;
pub mod sync;
pub mod types;
pub mod validation;

pub use client::TodoClient;
pub use config::ClientConfig;
pub use error::{ApiError, DraftField, QueryError, SyncError, ValidationError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, TransportError};
pub use query::{QueryState, RequestParameters, RequestSignature};
pub use session::{TodoSession, Transport};
pub use sync::{FetchOutcome, FollowUps, MetricsFetch, MutationKind, MutationTicket, SyncController, TodosFetch};
pub use types::{
    CreateTodo, DueUrgency, Filter, Metrics, Priority, PriorityMetric, Sort, SortDirection,
    SortKey, Todo, TodoId, TodoPage, UpdateTodo, PAGE_SIZE,
};
pub use validation::MAX_TEXT_LEN;
