//! Error types for the todo client core.
//!
//! # Design
//! `NotFound` gets a dedicated variant because callers frequently distinguish
//! "the resource does not exist" from "the server returned an unexpected
//! status." All other non-2xx responses land in `HttpError` with the raw
//! status code and body for debugging.
//!
//! Local validation failures (`ValidationError`) never reach the network and
//! never touch the controller's error slot; they are reported per field.

use std::fmt;

use thiserror::Error;

use crate::http::TransportError;

/// Errors returned by `TodoClient` parse methods.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned 404, the requested todo does not exist.
    #[error("resource not found")]
    NotFound,

    /// The server returned a status other than the expected one and 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// The host could not complete the round-trip.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Draft field a validation message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Text,
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftField::Text => f.write_str("text"),
        }
    }
}

/// A draft rejected before any request was built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: DraftField,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: DraftField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Contract violations on the query state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("page {requested} is outside 0..{total_pages}")]
    PageOutOfRange { requested: u32, total_pages: u32 },
}

/// Errors raised when starting a controller operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// A list fetch for the identical filter, sort and page is in flight.
    #[error("a refresh for the current query is already pending")]
    RefreshPending,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Query(#[from] QueryError),

    /// The request could not be built (payload serialization).
    #[error("{0}")]
    Request(String),
}
