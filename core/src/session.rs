//! Blocking driver that runs each user intent end to end.
//!
//! `TodoSession` pairs a `SyncController` with a host-supplied `Transport`
//! and executes every ticket immediately, follow-ups included, in the order
//! the controller hands them out. Hosts that need overlapping requests drive
//! the controller's `begin_*` / `complete_*` pairs directly instead.

use crate::client::TodoClient;
use crate::config::ClientConfig;
use crate::error::SyncError;
use crate::http::{HttpRequest, HttpResponse, TransportError};
use crate::sync::{FetchOutcome, FollowUps, MutationTicket, SyncController};
use crate::types::{CreateTodo, Filter, Sort, TodoId, UpdateTodo};

/// Executes one HTTP round-trip on behalf of the core.
///
/// Non-2xx statuses are responses, not errors; only failures to obtain a
/// response at all map to `TransportError`.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

pub struct TodoSession<T> {
    transport: T,
    controller: SyncController,
}

impl<T: Transport> TodoSession<T> {
    pub fn new(client: TodoClient, transport: T) -> Self {
        Self {
            transport,
            controller: SyncController::new(client),
        }
    }

    pub fn from_config(config: &ClientConfig, transport: T) -> Self {
        Self::new(TodoClient::from_config(config), transport)
    }

    pub fn controller(&self) -> &SyncController {
        &self.controller
    }

    /// Session start: first page and metrics.
    pub fn load(&mut self) -> Result<FetchOutcome, SyncError> {
        let outcome = self.refresh_todos()?;
        self.refresh_metrics();
        Ok(outcome)
    }

    pub fn refresh_todos(&mut self) -> Result<FetchOutcome, SyncError> {
        let fetch = self.controller.begin_refresh_todos()?;
        let outcome = self.transport.execute(fetch.request());
        Ok(self.controller.complete_refresh_todos(fetch, outcome))
    }

    /// Returns whether the metrics snapshot was replaced.
    pub fn refresh_metrics(&mut self) -> bool {
        let fetch = self.controller.begin_refresh_metrics();
        let outcome = self.transport.execute(fetch.request());
        self.controller.complete_refresh_metrics(fetch, outcome)
    }

    pub fn set_filter(&mut self, filter: Filter) -> Result<FetchOutcome, SyncError> {
        self.controller.set_filter(filter);
        self.refresh_todos()
    }

    pub fn set_sort(&mut self, sort: Sort) -> Result<FetchOutcome, SyncError> {
        self.controller.set_sort(sort);
        self.refresh_todos()
    }

    pub fn set_page(&mut self, page: u32) -> Result<FetchOutcome, SyncError> {
        self.controller.set_page(page)?;
        self.refresh_todos()
    }

    /// `Err` only for local rejections. A remote failure returns `Ok(false)`
    /// and is reported through the controller's error slot.
    pub fn create_todo(&mut self, draft: &CreateTodo) -> Result<bool, SyncError> {
        let ticket = self.controller.begin_create_todo(draft)?;
        Ok(self.run_mutation(ticket))
    }

    pub fn update_todo(&mut self, id: &TodoId, patch: &UpdateTodo) -> Result<bool, SyncError> {
        let ticket = self.controller.begin_update_todo(id, patch)?;
        Ok(self.run_mutation(ticket))
    }

    pub fn delete_todo(&mut self, id: &TodoId) -> bool {
        let ticket = self.controller.begin_delete_todo(id);
        self.run_mutation(ticket)
    }

    pub fn toggle_done(&mut self, id: &TodoId, current_done: bool) -> bool {
        let ticket = self.controller.begin_toggle_done(id, current_done);
        self.run_mutation(ticket)
    }

    pub fn clear_error(&mut self) {
        self.controller.clear_error();
    }

    fn run_mutation(&mut self, ticket: MutationTicket) -> bool {
        let outcome = self.transport.execute(ticket.request());
        match self.controller.complete_mutation(ticket, outcome) {
            Ok(follow_ups) => {
                self.run_follow_ups(follow_ups);
                true
            }
            Err(_) => false,
        }
    }

    fn run_follow_ups(&mut self, follow_ups: FollowUps) {
        if let Some(fetch) = follow_ups.todos {
            let outcome = self.transport.execute(fetch.request());
            self.controller.complete_refresh_todos(fetch, outcome);
        }
        if let Some(fetch) = follow_ups.metrics {
            let outcome = self.transport.execute(fetch.request());
            self.controller.complete_refresh_metrics(fetch, outcome);
        }
    }
}
