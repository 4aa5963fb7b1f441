use casefile_attachments::AttachmentError;
use casefile_store::StoreError;
use thiserror::Error;

use crate::report::LinkPropagationError;

/// Errors surfaced by [`crate::CrossLinkCoordinator`].
///
/// Only failures of the primary record write land here. Secondary effects
/// (audit writes, per-suspect propagation, cleanup deletions) are reported in
/// outcome values instead.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("attachment upload failed")]
    Upload(#[source] AttachmentError),

    #[error("attachment deletion failed")]
    Deletion(#[source] AttachmentError),

    #[error("link propagation failed")]
    LinkPropagation(#[from] LinkPropagationError),

    #[error("record store error")]
    Store(#[from] StoreError),
}

impl CoordinatorError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Message fit to show the person who made the request.
    ///
    /// Backend causes stay out of it; log the error itself for those.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { field, reason } => format!("{field}: {reason}"),
            Self::NotFound { entity, .. } => format!("The {entity} no longer exists."),
            Self::Upload(_) => "The attachment could not be uploaded. Please try again.".into(),
            Self::Deletion(_) => {
                "A removed attachment could not be deleted, so no changes were saved.".into()
            }
            Self::LinkPropagation(_) | Self::Store(_) => {
                "The operation failed. Please try again.".into()
            }
        }
    }
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn validation_message_names_field() {
        let err = CoordinatorError::validation("year", "must be between 1900 and 2100");
        assert_eq!(err.user_message(), "year: must be between 1900 and 2100");
    }

    #[test]
    fn store_cause_is_kept_for_logs_but_not_shown() {
        let err = CoordinatorError::from(StoreError::Backend("disk on fire".into()));
        assert!(!err.user_message().contains("disk"));
        assert!(err.source().unwrap().to_string().contains("disk on fire"));
    }
}
