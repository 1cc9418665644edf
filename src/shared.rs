use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::Settings;
use crate::stats::{StatsError, StatsService};

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub stats_service: Arc<StatsService>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(stats_service: Arc<StatsService>, settings: Arc<Settings>) -> Self {
        Self {
            stats_service,
            settings,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Statistics are temporarily unavailable")]
    Unavailable,
}

impl From<StatsError> for AppError {
    fn from(err: StatsError) -> Self {
        match err {
            StatsError::NotFound(what) => AppError::NotFound(what),
            StatsError::InvalidParameter(msg) => AppError::BadRequest(msg),
            other => {
                error!(error = %other, retryable = other.is_retryable(), "Statistics request failed");
                AppError::Unavailable
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

/// `Path` whose rejection is an [`AppError`] without parser detail.
#[derive(Debug)]
pub struct IdPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for IdPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(IdPath(value)),
            Err(rejection) => {
                debug!(%rejection, "Rejected path parameters");
                Err(AppError::BadRequest("ids must be whole numbers".to_string()))
            }
        }
    }
}

/// `Query` that falls back to the default parameters when the query string
/// cannot be read at all.
#[derive(Debug)]
pub struct LenientQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for LenientQuery<T>
where
    T: DeserializeOwned + Default + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(LenientQuery(value)),
            Err(rejection) => {
                warn!(%rejection, "Unreadable query string, using defaults");
                Ok(LenientQuery(T::default()))
            }
        }
    }
}
