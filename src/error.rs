use std::fmt::{Display, Formatter};

use argon2::Error as Argon2Error;
use jsonwebtoken::errors::Error as JwtError;
use mongodb::error::Error as DbError;
use rocket::{http::Status, response::Responder, serde::json::Json, Request};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The kinds of thing a lookup can fail to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Election,
    Candidate,
    Voter,
    Admin,
}

impl Display for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Election => "Election",
            Self::Candidate => "Candidate",
            Self::Voter => "Voter",
            Self::Admin => "Admin",
        })
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(Entity),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error("{0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::NotFound(_) => Status::NotFound,
            Self::InvalidState(_) | Self::Validation(_) => Status::BadRequest,
            Self::Conflict(_) => Status::Conflict,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::Db(_) | Self::Jwt(_) | Self::Argon2(_) | Self::Internal(_) => {
                Status::InternalServerError
            }
        }
    }

    /// A stable, machine-readable name for this kind of error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidState(_) => "invalid_state",
            Self::Conflict(_) => "conflict",
            Self::Validation(_) => "validation",
            Self::Unauthorized(_) => "unauthorized",
            Self::Db(_) | Self::Jwt(_) | Self::Argon2(_) | Self::Internal(_) => "internal",
        }
    }
}

/// The JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl ErrorBody {
    pub fn new(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        let message = if status == Status::InternalServerError {
            // Details of internal failures stay in the log.
            error!("{self}");
            "Internal server error".to_string()
        } else {
            debug!("{self}");
            self.to_string()
        };
        (status, Json(ErrorBody::new(self.kind(), message))).respond_to(req)
    }
}
