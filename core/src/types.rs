//! Domain DTOs for the todo API.
//!
//! # Design
//! These types mirror the remote service's JSON schema (camelCase keys,
//! upper-case priorities) but are defined independently from the mock-server
//! crate. Integration tests catch any schema drift between the two crates.
//!
//! Dates are lenient on input: `dueDate` accepts either `YYYY-MM-DD` or a full
//! ISO date-time (the time part is dropped), and `creationDate` / `doneDate`
//! accept a bare date as midnight. Output always uses the canonical forms.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Number of todos the service returns per page.
pub const PAGE_SIZE: u32 = 10;

/// Opaque, server-assigned todo identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(String);

impl TodoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TodoId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TodoId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Task importance. Declaration order gives `High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// All priorities, highest first.
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single todo item returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: TodoId,
    pub text: String,
    #[serde(default, with = "due_date", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub done: bool,
    #[serde(
        default,
        deserialize_with = "date_time::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub done_date: Option<NaiveDateTime>,
    pub priority: Priority,
    #[serde(deserialize_with = "date_time::deserialize")]
    pub creation_date: NaiveDateTime,
}

impl Todo {
    /// `done` and `done_date` agree, and completion never precedes creation.
    pub fn is_consistent(&self) -> bool {
        match (self.done, self.done_date) {
            (false, None) => true,
            (true, Some(done_at)) => done_at >= self.creation_date,
            _ => false,
        }
    }

    /// Urgency bucket of the due date relative to `today`.
    pub fn due_urgency(&self, today: NaiveDate) -> Option<DueUrgency> {
        self.due_date.map(|due| DueUrgency::classify(due, today))
    }
}

/// How close a due date is, in whole days from a reference day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueUrgency {
    /// The due date has passed.
    Overdue,
    /// Due within the next 7 days, today included.
    ThisWeek,
    /// Due in 8 to 14 days.
    NextWeek,
    /// Due more than two weeks out.
    Later,
}

impl DueUrgency {
    pub fn classify(due: NaiveDate, today: NaiveDate) -> Self {
        let days = (due - today).num_days();
        match days {
            d if d < 0 => DueUrgency::Overdue,
            0..=7 => DueUrgency::ThisWeek,
            8..=14 => DueUrgency::NextWeek,
            _ => DueUrgency::Later,
        }
    }
}

/// Request payload for creating a new todo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodo {
    pub text: String,
    pub priority: Priority,
    #[serde(default, with = "due_date", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

impl CreateTodo {
    pub fn new(text: impl Into<String>, priority: Priority) -> Self {
        Self {
            text: text.into(),
            priority,
            due_date: None,
        }
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }
}

/// Request payload for updating an existing todo. Only the fields present in
/// the JSON are applied; omitted fields remain unchanged on the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, with = "due_date", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

/// Server-side ordering key for the list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    Priority,
    DueDate,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Priority => "priority",
            SortKey::DueDate => "dueDate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Conjunctive list filter. Absent fields impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Filter {
    pub text: Option<String>,
    pub priority: Option<Priority>,
    pub done: Option<bool>,
}

impl Filter {
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_done(mut self, done: bool) -> Self {
        self.done = Some(done);
        self
    }
}

/// Server-applied ordering. No key means the server's default order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Sort {
    pub sort_by: Option<SortKey>,
    pub direction: Option<SortDirection>,
}

impl Sort {
    pub fn by(key: SortKey, direction: SortDirection) -> Self {
        Self {
            sort_by: Some(key),
            direction: Some(direction),
        }
    }
}

/// One page of the server's filtered and sorted collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoPage {
    pub content: Vec<Todo>,
    pub total_elements: u64,
    pub total_pages: u32,
    pub current_page: u32,
    pub size: u32,
}

/// Completion-time aggregate for a single priority bucket, in hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityMetric {
    pub priority: Priority,
    pub average_completion_time: f64,
    pub count: u64,
}

/// Server-computed completion metrics, in hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub average_completion_time: f64,
    #[serde(default)]
    pub priority_metrics: Vec<PriorityMetric>,
}

impl Metrics {
    pub fn for_priority(&self, priority: Priority) -> Option<&PriorityMetric> {
        self.priority_metrics.iter().find(|m| m.priority == priority)
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| raw.parse::<NaiveDateTime>().map(|dt| dt.date()))
}

pub(crate) fn parse_date_time(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    raw.parse::<NaiveDateTime>().or_else(|err| {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(|d| d.and_time(chrono::NaiveTime::MIN))
            .map_err(|_| err)
    })
}

mod due_date {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => s.serialize_str(&date.format("%Y-%m-%d").to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|s| super::parse_date(&s).map_err(de::Error::custom))
            .transpose()
    }
}

mod date_time {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_date_time(&raw).map_err(de::Error::custom)
    }

    pub fn deserialize_opt<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|s| super::parse_date_time(&s).map_err(de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn priority_orders_high_over_low() {
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
        assert_eq!(Priority::ALL[0], Priority::High);
    }

    #[test]
    fn todo_parses_service_json() {
        let todo: Todo = serde_json::from_str(
            r#"{"id":"a1","text":"Buy milk","dueDate":"2024-03-10","done":true,
                "doneDate":"2024-03-02T12:30:00","priority":"HIGH",
                "creationDate":"2024-03-01T08:00:00.123"}"#,
        )
        .unwrap();
        assert_eq!(todo.id.as_str(), "a1");
        assert_eq!(todo.due_date, Some(date(2024, 3, 10)));
        assert_eq!(todo.priority, Priority::High);
        assert!(todo.is_consistent());
    }

    #[test]
    fn due_date_accepts_date_time_form() {
        let todo: Todo = serde_json::from_str(
            r#"{"id":"a1","text":"x","dueDate":"2024-03-10T00:00:00","done":false,
                "priority":"LOW","creationDate":"2024-03-01"}"#,
        )
        .unwrap();
        assert_eq!(todo.due_date, Some(date(2024, 3, 10)));
        assert_eq!(todo.creation_date, date(2024, 3, 1).and_hms_opt(0, 0, 0).unwrap());
        assert!(todo.done_date.is_none());
    }

    #[test]
    fn null_optional_dates_are_absent() {
        let todo: Todo = serde_json::from_str(
            r#"{"id":"a1","text":"x","dueDate":null,"done":false,"doneDate":null,
                "priority":"MEDIUM","creationDate":"2024-03-01T00:00:00"}"#,
        )
        .unwrap();
        assert!(todo.due_date.is_none());
        assert!(todo.done_date.is_none());
    }

    #[test]
    fn done_without_done_date_is_inconsistent() {
        let todo: Todo = serde_json::from_str(
            r#"{"id":"a1","text":"x","done":true,"priority":"LOW",
                "creationDate":"2024-03-01T00:00:00"}"#,
        )
        .unwrap();
        assert!(!todo.is_consistent());
    }

    #[test]
    fn create_todo_omits_absent_due_date() {
        let body = serde_json::to_value(CreateTodo::new("Buy milk", Priority::Low)).unwrap();
        assert_eq!(body, serde_json::json!({"text": "Buy milk", "priority": "LOW"}));

        let body = serde_json::to_value(
            CreateTodo::new("Pay rent", Priority::High).with_due_date(date(2024, 4, 1)),
        )
        .unwrap();
        assert_eq!(body["dueDate"], "2024-04-01");
    }

    #[test]
    fn update_todo_serializes_only_present_fields() {
        let patch = UpdateTodo {
            priority: Some(Priority::Medium),
            ..UpdateTodo::default()
        };
        let body = serde_json::to_value(&patch).unwrap();
        assert_eq!(body, serde_json::json!({"priority": "MEDIUM"}));
    }

    #[test]
    fn due_urgency_buckets() {
        let today = date(2024, 5, 1);
        assert_eq!(DueUrgency::classify(date(2024, 4, 30), today), DueUrgency::Overdue);
        assert_eq!(DueUrgency::classify(today, today), DueUrgency::ThisWeek);
        assert_eq!(DueUrgency::classify(date(2024, 5, 8), today), DueUrgency::ThisWeek);
        assert_eq!(DueUrgency::classify(date(2024, 5, 9), today), DueUrgency::NextWeek);
        assert_eq!(DueUrgency::classify(date(2024, 5, 15), today), DueUrgency::NextWeek);
        assert_eq!(DueUrgency::classify(date(2024, 5, 16), today), DueUrgency::Later);
    }

    #[test]
    fn todo_urgency_follows_due_date() {
        let mut todo: Todo = serde_json::from_str(
            r#"{"id":"a1","text":"Pay rent","dueDate":"2024-05-10","done":false,
                "priority":"MEDIUM","creationDate":"2024-05-01T08:00:00"}"#,
        )
        .unwrap();
        let today = date(2024, 5, 1);
        assert_eq!(todo.due_urgency(today), Some(DueUrgency::NextWeek));
        assert_eq!(todo.due_urgency(date(2024, 5, 11)), Some(DueUrgency::Overdue));
        todo.due_date = None;
        assert_eq!(todo.due_urgency(today), None);
    }

    #[test]
    fn metrics_lookup_by_priority() {
        let metrics: Metrics = serde_json::from_str(
            r#"{"averageCompletionTime":12.5,"priorityMetrics":[
                {"priority":"HIGH","averageCompletionTime":2.0,"count":3},
                {"priority":"LOW","averageCompletionTime":30.0,"count":1}]}"#,
        )
        .unwrap();
        assert_eq!(metrics.for_priority(Priority::High).unwrap().count, 3);
        assert!(metrics.for_priority(Priority::Medium).is_none());
    }
}
