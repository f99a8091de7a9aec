//! Synchronization controller: reconciles the query state with the remote
//! paginated collection and owns everything the view renders.
//!
//! # Design
//! The controller never performs I/O. Every operation is split into a
//! `begin_*` call that returns a ticket holding the `HttpRequest` to execute,
//! and a `complete_*` call that takes the ticket back together with the
//! transport outcome. Holding several tickets at once is how overlapping
//! requests are expressed; the host decides the order in which they resolve.
//!
//! List fetches are tagged with the `RequestSignature` current at issue time.
//! At completion the tag is compared with the signature current *then*; a
//! mismatch means the user moved on and the response is dropped, success or
//! failure alike (last request wins, not first response).
//!
//! Mutations are never applied optimistically. The held page is only changed
//! from an authoritative server response, keyed by todo id, so overlapping
//! mutations on different ids cannot corrupt each other and same-id
//! mutations resolve last-write-wins.

use tracing::{debug, warn};

use crate::client::TodoClient;
use crate::error::{ApiError, QueryError, SyncError};
use crate::http::{HttpRequest, HttpResponse, TransportError};
use crate::query::{QueryState, RequestSignature};
use crate::types::{CreateTodo, Filter, Metrics, Sort, Todo, TodoId, TodoPage, UpdateTodo};

pub const LOAD_TODOS_FAILED: &str = "Failed to load todos";
pub const LOAD_METRICS_FAILED: &str = "Failed to load metrics";
pub const CREATE_FAILED: &str = "Failed to create todo";
pub const UPDATE_FAILED: &str = "Failed to update todo";
pub const DELETE_FAILED: &str = "Failed to delete todo";
pub const TOGGLE_FAILED: &str = "Failed to toggle todo status";

/// What the host observed for one request.
pub type Outcome = Result<HttpResponse, TransportError>;

/// Ticket for an in-flight list fetch.
#[derive(Debug)]
#[must_use = "the ticket must be completed to release the loading flag"]
pub struct TodosFetch {
    signature: RequestSignature,
    request: HttpRequest,
}

impl TodosFetch {
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }
}

/// Ticket for an in-flight metrics fetch.
#[derive(Debug)]
#[must_use = "the ticket must be completed to release the loading flag"]
pub struct MetricsFetch {
    request: HttpRequest,
}

impl MetricsFetch {
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update(TodoId),
    Delete(TodoId),
    MarkDone(TodoId),
    MarkUndone(TodoId),
}

impl MutationKind {
    fn failure_message(&self) -> &'static str {
        match self {
            MutationKind::Create => CREATE_FAILED,
            MutationKind::Update(_) => UPDATE_FAILED,
            MutationKind::Delete(_) => DELETE_FAILED,
            MutationKind::MarkDone(_) | MutationKind::MarkUndone(_) => TOGGLE_FAILED,
        }
    }
}

/// Ticket for an in-flight create, update, delete or done toggle.
#[derive(Debug)]
#[must_use = "the ticket must be completed to release the loading flag"]
pub struct MutationTicket {
    kind: MutationKind,
    request: HttpRequest,
}

impl MutationTicket {
    pub fn kind(&self) -> &MutationKind {
        &self.kind
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }
}

/// Fetches a successful mutation asks the host to run next.
#[derive(Debug, Default)]
#[must_use]
pub struct FollowUps {
    pub todos: Option<TodosFetch>,
    pub metrics: Option<MetricsFetch>,
}

/// Result of completing a list fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response matched the current query and replaced the held page.
    Applied,
    /// The query changed while the request was in flight.
    Discarded,
    /// The request failed; the error slot is set and the held data kept.
    Failed,
}

#[derive(Debug, Default, Clone, Copy)]
struct InFlight {
    todos: usize,
    metrics: usize,
    mutations: usize,
}

/// One per session. All view state is read from here and changed only
/// through the operations below.
#[derive(Debug)]
pub struct SyncController {
    client: TodoClient,
    query: QueryState,
    page: Option<TodoPage>,
    metrics: Option<Metrics>,
    error: Option<String>,
    in_flight: InFlight,
    pending_signatures: Vec<RequestSignature>,
}

impl SyncController {
    pub fn new(client: TodoClient) -> Self {
        Self {
            client,
            query: QueryState::new(),
            page: None,
            metrics: None,
            error: None,
            in_flight: InFlight::default(),
            pending_signatures: Vec::new(),
        }
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    /// The held page, if any list fetch has been committed.
    pub fn page(&self) -> Option<&TodoPage> {
        self.page.as_ref()
    }

    pub fn todos(&self) -> &[Todo] {
        match &self.page {
            Some(page) => &page.content,
            None => &[],
        }
    }

    pub fn total_elements(&self) -> u64 {
        self.page.as_ref().map_or(0, |p| p.total_elements)
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True while any request issued by this controller is unresolved.
    pub fn is_loading(&self) -> bool {
        self.in_flight.todos + self.in_flight.metrics + self.in_flight.mutations > 0
    }

    pub fn is_loading_todos(&self) -> bool {
        self.in_flight.todos > 0
    }

    pub fn is_loading_metrics(&self) -> bool {
        self.in_flight.metrics > 0
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.query.set_filter(filter);
    }

    pub fn set_sort(&mut self, sort: Sort) {
        self.query.set_sort(sort);
    }

    pub fn set_page(&mut self, page: u32) -> Result<(), QueryError> {
        self.query.set_page(page)
    }

    fn fail(&mut self, message: &'static str, err: &ApiError) {
        warn!(error = %err, "{message}");
        self.error = Some(message.to_string());
    }

    // --- list ---

    pub fn begin_refresh_todos(&mut self) -> Result<TodosFetch, SyncError> {
        let signature = self.query.signature();
        if self.pending_signatures.contains(&signature) {
            debug!(page = signature.page(), "list refresh already pending");
            return Err(SyncError::RefreshPending);
        }
        let request = self.client.build_list_todos(&self.query.to_request_parameters());
        debug!(path = %request.path, "issuing list refresh");
        self.pending_signatures.push(signature.clone());
        self.in_flight.todos += 1;
        Ok(TodosFetch { signature, request })
    }

    pub fn complete_refresh_todos(&mut self, fetch: TodosFetch, outcome: Outcome) -> FetchOutcome {
        self.in_flight.todos = self.in_flight.todos.saturating_sub(1);
        if let Some(pos) = self.pending_signatures.iter().position(|s| *s == fetch.signature) {
            self.pending_signatures.swap_remove(pos);
        }

        if fetch.signature != self.query.signature() {
            debug!(path = %fetch.request.path, "discarding stale list response");
            return FetchOutcome::Discarded;
        }

        let parsed = outcome
            .map_err(ApiError::from)
            .and_then(|response| self.client.parse_list_todos(response));
        match parsed {
            Ok(page) => {
                debug!(
                    items = page.content.len(),
                    total = page.total_elements,
                    "list refresh applied"
                );
                self.query.record_total_pages(page.total_pages);
                self.page = Some(page);
                self.error = None;
                FetchOutcome::Applied
            }
            Err(err) => {
                self.fail(LOAD_TODOS_FAILED, &err);
                FetchOutcome::Failed
            }
        }
    }

    // --- metrics ---

    pub fn begin_refresh_metrics(&mut self) -> MetricsFetch {
        self.in_flight.metrics += 1;
        MetricsFetch {
            request: self.client.build_get_metrics(),
        }
    }

    /// Returns whether the snapshot was replaced.
    pub fn complete_refresh_metrics(&mut self, _fetch: MetricsFetch, outcome: Outcome) -> bool {
        self.in_flight.metrics = self.in_flight.metrics.saturating_sub(1);
        let parsed = outcome
            .map_err(ApiError::from)
            .and_then(|response| self.client.parse_get_metrics(response));
        match parsed {
            Ok(metrics) => {
                self.metrics = Some(metrics);
                // Only a metrics failure is resolved by a metrics success.
                if self.error.as_deref() == Some(LOAD_METRICS_FAILED) {
                    self.error = None;
                }
                true
            }
            Err(err) => {
                self.fail(LOAD_METRICS_FAILED, &err);
                false
            }
        }
    }

    // --- mutations ---

    fn issue(&mut self, kind: MutationKind, request: HttpRequest) -> MutationTicket {
        debug!(method = %request.method, path = %request.path, "issuing mutation");
        self.in_flight.mutations += 1;
        MutationTicket { kind, request }
    }

    /// Validates locally; an invalid draft never produces a request.
    pub fn begin_create_todo(&mut self, draft: &CreateTodo) -> Result<MutationTicket, SyncError> {
        draft.validate()?;
        let request = self
            .client
            .build_create_todo(draft)
            .map_err(|e| SyncError::Request(e.to_string()))?;
        Ok(self.issue(MutationKind::Create, request))
    }

    pub fn begin_update_todo(
        &mut self,
        id: &TodoId,
        patch: &UpdateTodo,
    ) -> Result<MutationTicket, SyncError> {
        patch.validate()?;
        let request = self
            .client
            .build_update_todo(id, patch)
            .map_err(|e| SyncError::Request(e.to_string()))?;
        Ok(self.issue(MutationKind::Update(id.clone()), request))
    }

    pub fn begin_delete_todo(&mut self, id: &TodoId) -> MutationTicket {
        let request = self.client.build_delete_todo(id);
        self.issue(MutationKind::Delete(id.clone()), request)
    }

    /// Marks done when `current_done` is false, undone otherwise.
    pub fn begin_toggle_done(&mut self, id: &TodoId, current_done: bool) -> MutationTicket {
        if current_done {
            let request = self.client.build_mark_undone(id);
            self.issue(MutationKind::MarkUndone(id.clone()), request)
        } else {
            let request = self.client.build_mark_done(id);
            self.issue(MutationKind::MarkDone(id.clone()), request)
        }
    }

    /// Applies a mutation response. On success returns the fetches to run
    /// next: list and metrics after a create, metrics after anything else.
    /// On failure the error slot is set and the held page is untouched.
    pub fn complete_mutation(
        &mut self,
        ticket: MutationTicket,
        outcome: Outcome,
    ) -> Result<FollowUps, ApiError> {
        self.in_flight.mutations = self.in_flight.mutations.saturating_sub(1);
        let MutationTicket { kind, .. } = ticket;
        match self.apply_mutation(&kind, outcome) {
            Ok(follow_ups) => Ok(follow_ups),
            Err(err) => {
                self.fail(kind.failure_message(), &err);
                Err(err)
            }
        }
    }

    fn apply_mutation(&mut self, kind: &MutationKind, outcome: Outcome) -> Result<FollowUps, ApiError> {
        let response = outcome?;
        match kind {
            MutationKind::Create => {
                let created = self.client.parse_create_todo(response)?;
                debug!(id = %created.id, "todo created");
                let todos = match self.begin_refresh_todos() {
                    Ok(fetch) => Some(fetch),
                    Err(err) => {
                        debug!(error = %err, "skipping list follow-up");
                        None
                    }
                };
                Ok(FollowUps {
                    todos,
                    metrics: Some(self.begin_refresh_metrics()),
                })
            }
            MutationKind::Update(_) => {
                let updated = self.client.parse_update_todo(response)?;
                self.splice(updated);
                Ok(self.metrics_follow_up())
            }
            MutationKind::MarkDone(_) | MutationKind::MarkUndone(_) => {
                let updated = self.client.parse_toggle_done(response)?;
                self.splice(updated);
                Ok(self.metrics_follow_up())
            }
            MutationKind::Delete(id) => {
                self.client.parse_delete_todo(response)?;
                self.remove(id);
                Ok(self.metrics_follow_up())
            }
        }
    }

    fn metrics_follow_up(&mut self) -> FollowUps {
        FollowUps {
            todos: None,
            metrics: Some(self.begin_refresh_metrics()),
        }
    }

    /// Replace the held entry with the same id, keeping its position.
    fn splice(&mut self, todo: Todo) {
        let Some(page) = self.page.as_mut() else {
            return;
        };
        let position = page.content.iter().position(|t| t.id == todo.id);
        match position {
            Some(index) => page.content[index] = todo,
            None => debug!(id = %todo.id, "updated todo is not on the held page"),
        }
    }

    /// Drop the entry and count one element fewer. The page is not refetched,
    /// so it may hold fewer than a full page until the next query change.
    fn remove(&mut self, id: &TodoId) {
        if let Some(page) = self.page.as_mut() {
            page.content.retain(|t| &t.id != id);
            page.total_elements = page.total_elements.saturating_sub(1);
        }
    }
}
