use jsonwebtoken::errors::Error as JwtError;
use log::{debug, error};
use mongodb::{bson::de::Error as BsonError, error::Error as DbError};
use rocket::{
    http::Status,
    response::{status::Custom, Responder},
    serde::json::Json,
    Request,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::mongodb::Id;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Bson(#[from] BsonError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("{0}")]
    InvalidInput(String),
    #[error("You must be signed in to do that")]
    Unauthenticated,
    #[error("Only administrators can do that")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(String),
    #[error("Poll {0} is not open for voting")]
    PollClosed(Id),
    #[error("'{0}' is not an option in this poll")]
    InvalidOption(String),
    #[error("You have already voted in this poll")]
    Conflict,
}

impl Error {
    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Convenience constructor for [`Error::InvalidInput`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::Bson(_) => Status::InternalServerError,
            Self::Jwt(_) | Self::Unauthenticated => Status::Unauthorized,
            Self::InvalidInput(_) => Status::BadRequest,
            Self::Forbidden => Status::Forbidden,
            Self::NotFound(_) => Status::NotFound,
            Self::PollClosed(_) | Self::Conflict => Status::Conflict,
            Self::InvalidOption(_) => Status::UnprocessableEntity,
        }
    }

    /// Stable machine-readable code, distinct for every failure a caller can act on.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Db(_) | Self::Bson(_) => "server_error",
            Self::Jwt(_) | Self::Unauthenticated => "unauthenticated",
            Self::InvalidInput(_) => "invalid_input",
            Self::Forbidden => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::PollClosed(_) => "poll_closed",
            Self::InvalidOption(_) => "invalid_option",
            Self::Conflict => "already_voted",
        }
    }
}

/// JSON body of every failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        let message = match err {
            // Don't leak storage internals to the caller.
            Error::Db(_) | Error::Bson(_) => "Internal server error".to_string(),
            Error::Jwt(_) => Error::Unauthenticated.to_string(),
            other => other.to_string(),
        };
        Self::new(err.code(), message)
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status.code >= 500 {
            error!("{} {}: {self}", req.method(), req.uri());
        } else {
            debug!("{} {}: {self}", req.method(), req.uri());
        }
        Custom(status, Json(ErrorBody::from(&self))).respond_to(req)
    }
}
