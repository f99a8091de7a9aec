//! End-to-end session tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives a `TodoSession`
//! over real HTTP using a ureq-backed `Transport`. Validates that query
//! derivation, reconciliation and response parsing agree with the server.

use todo_core::{
    ClientConfig, CreateTodo, FetchOutcome, Filter, HttpMethod, HttpRequest, HttpResponse,
    Priority, Sort, SortDirection, SortKey, SyncError, TodoSession, Transport, TransportError,
    UpdateTodo,
};

/// Executes requests with ureq.
///
/// Disables ureq's automatic status-code-as-error behavior so 4xx/5xx
/// responses are returned as data rather than `Err`, letting the core
/// interpret statuses.
struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, req: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let result = match (req.method, req.body.as_deref()) {
            (HttpMethod::Get, _) => self.agent.get(&req.path).call(),
            (HttpMethod::Delete, _) => self.agent.delete(&req.path).call(),
            (HttpMethod::Post, Some(body)) => self
                .agent
                .post(&req.path)
                .content_type("application/json")
                .send(body.as_bytes()),
            (HttpMethod::Post, None) => self.agent.post(&req.path).send_empty(),
            (HttpMethod::Put, Some(body)) => self
                .agent
                .put(&req.path)
                .content_type("application/json")
                .send(body.as_bytes()),
            (HttpMethod::Put, None) => self.agent.put(&req.path).send_empty(),
        };
        let mut response = result.map_err(|e| TransportError::new(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.body_mut().read_to_string().unwrap_or_default();
        Ok(HttpResponse::new(status, body))
    }
}

/// Start a fresh mock server on a random port and return its base URL.
fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn session(base_url: &str) -> TodoSession<UreqTransport> {
    TodoSession::from_config(&ClientConfig::new(base_url), UreqTransport::new())
}

#[test]
fn session_lifecycle() {
    let mut s = session(&start_server());

    // Step 1: initial load, empty collection and zeroed metrics.
    assert_eq!(s.load().unwrap(), FetchOutcome::Applied);
    assert!(s.controller().todos().is_empty());
    assert_eq!(s.controller().metrics().unwrap().average_completion_time, 0.0);

    // Step 2: invalid draft never reaches the server.
    let err = s.create_todo(&CreateTodo::new("", Priority::Low)).unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));

    // Step 3: create twelve todos; each create refreshes page and metrics.
    for i in 0..12 {
        let priority = if i % 3 == 0 { Priority::High } else { Priority::Low };
        assert!(s.create_todo(&CreateTodo::new(format!("task {i:02}"), priority)).unwrap());
    }
    assert_eq!(s.controller().todos().len(), 10);
    assert_eq!(s.controller().total_elements(), 12);
    assert_eq!(s.controller().query().total_pages(), 2);
    assert!(s.controller().error().is_none());
    assert!(!s.controller().is_loading());

    // Step 4: second page.
    assert_eq!(s.set_page(1).unwrap(), FetchOutcome::Applied);
    assert_eq!(s.controller().todos().len(), 2);
    assert!(matches!(s.set_page(2), Err(SyncError::Query(_))));

    // Step 5: filter resets to page 0 and narrows the result.
    s.set_filter(Filter::default().with_priority(Priority::High)).unwrap();
    assert_eq!(s.controller().query().page(), 0);
    assert_eq!(s.controller().total_elements(), 4);
    assert!(s
        .controller()
        .todos()
        .iter()
        .all(|t| t.priority == Priority::High));

    // Step 6: sort by priority descending across all todos.
    s.set_filter(Filter::default()).unwrap();
    s.set_sort(Sort::by(SortKey::Priority, SortDirection::Desc)).unwrap();
    let first = s.controller().todos()[0].clone();
    assert_eq!(first.priority, Priority::High);

    // Step 7: toggle done, then undone, spliced in place.
    assert!(s.toggle_done(&first.id, first.done));
    let toggled = &s.controller().todos()[0];
    assert_eq!(toggled.id, first.id);
    assert!(toggled.done);
    assert!(toggled.is_consistent());
    let high = s.controller().metrics().unwrap().for_priority(Priority::High).unwrap();
    assert_eq!(high.count, 1);

    assert!(s.toggle_done(&first.id, true));
    assert!(!s.controller().todos()[0].done);
    assert!(s.controller().todos()[0].done_date.is_none());

    // Step 8: update text.
    let patch = UpdateTodo {
        text: Some("renamed".to_string()),
        ..UpdateTodo::default()
    };
    assert!(s.update_todo(&first.id, &patch).unwrap());
    assert_eq!(s.controller().todos()[0].text, "renamed");

    // Step 9: delete removes locally without refetching the page.
    assert!(s.delete_todo(&first.id));
    assert_eq!(s.controller().todos().len(), 9);
    assert_eq!(s.controller().total_elements(), 11);

    // Step 10: deleting again fails and sets the error slot.
    assert!(!s.delete_todo(&first.id));
    assert_eq!(s.controller().error(), Some("Failed to delete todo"));
    assert_eq!(s.controller().todos().len(), 9);
    s.clear_error();

    // Step 11: a fresh fetch backfills the page.
    assert_eq!(s.refresh_todos().unwrap(), FetchOutcome::Applied);
    assert_eq!(s.controller().todos().len(), 10);
}

#[test]
fn unreachable_server_reports_load_failure() {
    // Bind and drop to obtain a port nothing listens on.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let mut s = session(&format!("http://{addr}"));

    assert_eq!(s.refresh_todos().unwrap(), FetchOutcome::Failed);
    assert_eq!(s.controller().error(), Some("Failed to load todos"));
    assert!(s.controller().page().is_none());
    assert!(!s.controller().is_loading());
}
