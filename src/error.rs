use axum::response::{Html, IntoResponse, Response};
use http::StatusCode;
use thiserror::Error;

use crate::poll::{VoteError, NO_CHOICE_MESSAGE};
use crate::store::StoreError;

const NOT_FOUND_PAGE: &str = include_str!("../templates/404.html");

pub type AppResult<T> = core::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Store(StoreError),

    #[error("template error: {0}")]
    Template(#[from] tera::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound,
            other => AppError::Store(other),
        }
    }
}

impl From<VoteError> for AppError {
    fn from(err: VoteError) -> Self {
        match err {
            VoteError::NotFound => AppError::NotFound,
            VoteError::Store(inner) => AppError::from(inner),
            // the vote handler re-renders the form, so reaching this is a bug
            VoteError::InvalidSelection => {
                AppError::Store(StoreError::Invalid(NO_CHOICE_MESSAGE.to_string()))
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE)).into_response(),
            other => {
                tracing::error!(error = ?other, "error occurred inside route handler");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
