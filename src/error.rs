//! Client-observable error taxonomy.
//!
//! Every error carries two faces: [`CareError::user_message`] is the short,
//! generic text a person sees, while the `Display` impl (and the `detail`
//! field of [`CareError::NetworkOrServerFailure`]) is for logs and the
//! telemetry journal only.

use serde::Serialize;
use thiserror::Error;

use crate::model::CareActionKind;

/// Shown when a care action fails for any remote reason.
pub const ACTION_FAILED_MESSAGE: &str = "Action failed. Please try again.";

/// Shown when an explicit refresh fails.
pub const REFRESH_FAILED_MESSAGE: &str = "Could not load your pet. Please try again.";

/// A field-level validation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CareError {
    #[error("no pet selected")]
    NoPetSelected,

    #[error("{0} is already in flight")]
    AlreadyInFlight(CareActionKind),

    #[error("remote call failed: {detail}")]
    NetworkOrServerFailure { detail: String },

    #[error("validation failed: {}", join_fields(.0))]
    ValidationFailure(Vec<FieldError>),
}

impl CareError {
    /// Wrap a remote failure, keeping the full error chain as detail.
    pub fn remote(error: anyhow::Error) -> Self {
        CareError::NetworkOrServerFailure {
            detail: format!("{error:#}"),
        }
    }

    /// Single-field validation failure.
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        CareError::ValidationFailure(vec![FieldError::new(field, message)])
    }

    /// Short text safe to show to a user.
    pub fn user_message(&self) -> String {
        match self {
            CareError::NoPetSelected => "Select a pet first.".to_string(),
            CareError::AlreadyInFlight(kind) => {
                format!("Already trying to {kind}. Hang on a moment.")
            }
            CareError::NetworkOrServerFailure { .. } => ACTION_FAILED_MESSAGE.to_string(),
            CareError::ValidationFailure(fields) => fields
                .iter()
                .map(|f| f.message.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_detail_is_not_user_visible() {
        let err = CareError::remote(anyhow::anyhow!(
            "HTTP status server error (500 Internal Server Error)"
        ));

        assert_eq!(err.user_message(), ACTION_FAILED_MESSAGE);
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_validation_messages() {
        let err = CareError::ValidationFailure(vec![
            FieldError::new("name", "Name is too long."),
            FieldError::new("message", "Message is empty."),
        ]);

        assert_eq!(err.user_message(), "Name is too long. Message is empty.");
        assert_eq!(
            err.to_string(),
            "validation failed: name: Name is too long., message: Message is empty."
        );
    }
}
