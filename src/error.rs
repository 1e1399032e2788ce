//! Centralized error type for the crate.
//!
//! Follows the teacher's manual `Display`/`std::error::Error` style rather
//! than a derive macro crate: there are few variants and each one maps
//! directly to a response status, so the hand-written impl stays short.

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Json(serde_json::Error),
    BadRequest(String),
    NotFound(String),
    Internal(String),
    /// Raised by plugin bootstrap. Per the spec this is the one error kind
    /// that escapes to the embedding program instead of becoming a response.
    Plugin(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Json(e) => write!(f, "JSON error: {e}"),
            Error::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            Error::NotFound(msg) => write!(f, "Not Found: {msg}"),
            Error::Internal(msg) => write!(f, "Internal Server Error: {msg}"),
            Error::Plugin(msg) => write!(f, "Plugin error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl Error {
    /// Message text used to populate `Response.error` when a listener's
    /// `Err` is caught by the dispatcher.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Status code this error implies when it becomes a response, absent
    /// any more specific code the handler already set.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::BadRequest(_) | Error::Json(_) => 400,
            Error::NotFound(_) => 404,
            Error::Io(_) | Error::Internal(_) | Error::Plugin(_) => 500,
        }
    }
}
