use mongodb::error::{ErrorKind, WriteFailure};
use thiserror::Error;

use crate::models::tour_validator::ValidationErrors;

/// Server error code MongoDB reports when a unique index rejects a write.
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Application-wide error types.
///
/// Only [`AppError::Operational`] is meant to reach clients verbatim. The
/// database-shaped variants are turned into operational errors by
/// [`AppError::classify`] when the server runs in production mode.
#[derive(Debug, Clone, Error)]
pub enum AppError {
    /// Expected, user-facing failure carrying its own HTTP status code.
    #[error("{message}")]
    Operational { message: String, code: u16 },

    /// A value could not be cast to the type its field expects.
    #[error("Cast to {expected} failed for value \"{value}\" at path \"{path}\"")]
    Cast {
        path: String,
        value: String,
        expected: &'static str,
    },

    /// A unique index rejected a write.
    #[error("E11000 duplicate key error: name \"{name}\"")]
    DuplicateKey { name: String },

    /// One or more field validators rejected a tour.
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn operational(message: impl Into<String>, code: u16) -> Self {
        AppError::Operational {
            message: message.into(),
            code,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::operational(message, 404)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::operational(message, 400)
    }

    /// HTTP status code of the error. Anything that is not operational is a 500.
    pub fn code(&self) -> u16 {
        match self {
            AppError::Operational { code, .. } => *code,
            _ => 500,
        }
    }

    /// Envelope status: `fail` for 4xx codes, `error` for everything else.
    pub fn status(&self) -> &'static str {
        status_for(self.code())
    }

    pub fn is_operational(&self) -> bool {
        matches!(self, AppError::Operational { .. })
    }

    /// Short name of the variant, used by the verbose error renderer.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Operational { .. } => "OperationalError",
            AppError::Cast { .. } => "CastError",
            AppError::DuplicateKey { .. } => "DuplicateKeyError",
            AppError::Validation(_) => "ValidationError",
            AppError::Database(_) => "DatabaseError",
            AppError::Internal(_) => "InternalError",
        }
    }

    /// Re-express known database error shapes as operational 400 errors.
    ///
    /// Errors that are already operational, and errors with no known shape,
    /// are returned unchanged.
    pub fn classify(self) -> Self {
        match self {
            AppError::Cast { path, value, .. } => {
                Self::bad_request(format!("Invalid {path}: {value}"))
            }
            AppError::DuplicateKey { name } => {
                Self::bad_request(format!("The tour name '{name}' already exists"))
            }
            AppError::Validation(errors) => Self::bad_request(errors.messages().join(". ")),
            other => other,
        }
    }
}

/// `fail` when the code is a 4xx, `error` otherwise.
pub fn status_for(code: u16) -> &'static str {
    if code.to_string().starts_with('4') {
        "fail"
    } else {
        "error"
    }
}

/// Helper conversion from anyhow::Error
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        if let Some(message) = duplicate_key_message(&err) {
            return AppError::DuplicateKey {
                name: duplicate_key_value(message).unwrap_or_default(),
            };
        }
        AppError::Database(err.to_string())
    }
}

/// Server message of a unique-index violation, whichever write path raised it.
fn duplicate_key_message(err: &mongodb::error::Error) -> Option<&str> {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY_CODE => {
            Some(e.message.as_str())
        }
        ErrorKind::InsertMany(e) => e
            .write_errors
            .as_ref()?
            .iter()
            .find(|w| w.code == DUPLICATE_KEY_CODE)
            .map(|w| w.message.as_str()),
        ErrorKind::Command(e) if e.code == DUPLICATE_KEY_CODE => Some(e.message.as_str()),
        _ => None,
    }
}

impl From<bson::ser::Error> for AppError {
    fn from(err: bson::ser::Error) -> Self {
        AppError::Internal(format!("Failed to encode document: {err}"))
    }
}

impl From<bson::de::Error> for AppError {
    fn from(err: bson::de::Error) -> Self {
        AppError::Database(format!("Failed to decode document: {err}"))
    }
}

/// Extract the first string value from the `dup key: { ... }` part of a
/// duplicate key message.
fn duplicate_key_value(message: &str) -> Option<String> {
    let (_, rest) = message.split_once("dup key: {")?;
    let (_, rest) = rest.split_once('"')?;
    let (value, _) = rest.split_once('"')?;
    Some(value.to_string())
}
