//! Local draft validation, applied before any request is built.

use crate::error::{DraftField, ValidationError};
use crate::types::{CreateTodo, UpdateTodo};

/// Longest accepted todo text, in characters.
pub const MAX_TEXT_LEN: usize = 120;

fn validate_text(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::new(DraftField::Text, "Text is required"));
    }
    if text.chars().count() > MAX_TEXT_LEN {
        return Err(ValidationError::new(
            DraftField::Text,
            format!("Text must not exceed {MAX_TEXT_LEN} characters"),
        ));
    }
    Ok(())
}

impl CreateTodo {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_text(&self.text)
    }
}

impl UpdateTodo {
    /// Only a present `text` is checked; omitted fields are left to the server.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.text {
            Some(text) => validate_text(text),
            None => Ok(()),
        }
    }
}
