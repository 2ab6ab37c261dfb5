use catalog_http::error::AppError;
use thiserror::Error;

use super::store::StoreError;

/// Failures of book operations, each terminal for the request.
#[derive(Debug, Error)]
pub enum BookError {
    #[error("{message}")]
    BadRequest {
        message: String,
        details: Vec<serde_json::Value>,
    },

    #[error("Book not found")]
    NotFound { id: String },

    #[error("Books Not Available")]
    NotAvailable { id: String },

    #[error("Maximum present limit exceeded")]
    LimitExceeded { id: String },

    #[error("{context}")]
    Store {
        context: &'static str,
        #[source]
        source: StoreError,
    },
}

impl BookError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Adapter for `map_err` that tags a store failure with a client-facing context.
    pub fn store(context: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Store { context, source }
    }
}

impl From<BookError> for AppError {
    fn from(err: BookError) -> Self {
        let message = err.to_string();
        match err {
            BookError::BadRequest { details, .. } => {
                AppError::bad_request_with_details(details, message)
            }
            BookError::NotFound { .. } => AppError::not_found(message),
            BookError::NotAvailable { .. } | BookError::LimitExceeded { .. } => {
                AppError::invalid_state(message)
            }
            BookError::Store { context, source } => {
                AppError::Internal(anyhow::Error::new(source).context(context))
            }
        }
    }
}
