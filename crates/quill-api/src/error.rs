use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use quill_db::StoreError;

use crate::credentials::CredentialError;
use crate::guard::Unauthorized;
use crate::session::SessionError;
use crate::views::{self, Frame};

/// Attached to every error response so [`crate::middleware::session_error_pages`]
/// can re-render it with the caller's navigation.
#[derive(Debug, Clone)]
pub struct ErrorPage {
    pub status: StatusCode,
    pub message: String,
}

/// Failures that end a request. Form-level problems never get here; they
/// are re-rendered by the handler.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Unauthorized(#[from] Unauthorized),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) | AppError::Store(StoreError::UnknownUser(_)) => StatusCode::NOT_FOUND,
            AppError::Credentials(CredentialError::DuplicateUsername(_))
            | AppError::Store(StoreError::DuplicateUsername(_)) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Unauthorized(_) => "You are not allowed to do that.".to_string(),
            AppError::NotFound(what) => format!("{what} not found."),
            AppError::Store(StoreError::UnknownUser(_)) => "User not found.".to_string(),
            _ if status == StatusCode::CONFLICT => "That username is already taken.".to_string(),
            _ => {
                error!("Request failed: {}", self);
                "Something went wrong.".to_string()
            }
        };
        let page = views::error_page(&Frame::default(), status, &message);
        let mut response = (status, page).into_response();
        response.extensions_mut().insert(ErrorPage { status, message });
        response
    }
}
