use hoopsync_db::StoreError;
use hoopsync_ingest::sync::SyncError;
use log::error;
use miette::Diagnostic;
use providers::BuildAdapterError;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::serde_json;
use rocket::{Request, Response};
use thiserror::Error;

use hoopsync_db::analytics::{AnalyticsError, FilterError};

#[derive(Debug, Error, Diagnostic)]
pub enum ApiError {
    #[error("unknown source {0:?}")]
    UnknownSource(String),

    #[error("source {0:?} is not enabled")]
    SourceNotEnabled(String),

    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    DbError(#[from] diesel::result::Error),

    #[error(transparent)]
    Pool(#[from] hoopsync_db::PoolError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<BuildAdapterError> for ApiError {
    fn from(err: BuildAdapterError) -> Self {
        match err {
            BuildAdapterError::UnknownSource(name) => ApiError::UnknownSource(name),
            BuildAdapterError::NotEnabled(name) => ApiError::SourceNotEnabled(name),
            other => ApiError::Validation(other.to_string()),
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<AnalyticsError> for ApiError {
    fn from(err: AnalyticsError) -> Self {
        match err {
            AnalyticsError::Filter(filter) => ApiError::Validation(filter.to_string()),
            AnalyticsError::BadLineupSize(_) | AnalyticsError::MissingStarters { .. } => {
                ApiError::Validation(err.to_string())
            }
            // Bad clocks / unknown teams mean the stored data is broken.
            other => ApiError::Validation(other.to_string()),
        }
    }
}

impl ApiError {
    fn status(&self) -> Status {
        match self {
            ApiError::UnknownSource(_) | ApiError::SourceNotEnabled(_) => Status::BadRequest,
            ApiError::NotFound => Status::NotFound,
            ApiError::Validation(_) => Status::UnprocessableEntity,
            ApiError::DbError(diesel::result::Error::NotFound) => Status::NotFound,
            _ => Status::InternalServerError,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status == Status::InternalServerError {
            error!("{:#?}", self);
        }

        let body = serde_json::json!({
            "status_code": status.code,
            "detail": self.to_string(),
        })
        .to_string();

        Response::build()
            .status(status)
            .header(rocket::http::ContentType::JSON)
            .sized_body(body.len(), std::io::Cursor::new(body))
            .ok()
    }
}
