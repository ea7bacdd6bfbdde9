//! The module contains the errors the engine can throw.
//!
//! Domain errors:
//!
//! - [`KeyNotFound`] thrown when a reconciliation (or its parent) is missing.
//! - [`AlreadyApproved`] thrown when the requested approval stage is already
//!   satisfied.
//! - [`NotApproved`] thrown when an operation needs a prior approval stage.
//! - [`InvalidAmount`] thrown when an allocation is out of range.
//! - [`UploadRejected`] thrown when a statement has no novel rows.
//! - [`InvalidCredentials`] thrown when a password cannot be stored.
//! - [`Conflict`] thrown when a reference number collides.
//!
//! [`Database`] wraps every other store failure and is kept distinct from the
//! domain errors above.
//!
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`AlreadyApproved`]: EngineError::AlreadyApproved
//!  [`NotApproved`]: EngineError::NotApproved
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`UploadRejected`]: EngineError::UploadRejected
//!  [`InvalidCredentials`]: EngineError::InvalidCredentials
//!  [`Conflict`]: EngineError::Conflict
//!  [`Database`]: EngineError::Database
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Already approved: {0}")]
    AlreadyApproved(String),
    #[error("Not approved: {0}")]
    NotApproved(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Invalid statement: {0}")]
    InvalidStatement(String),
    #[error("Upload rejected: {0}")]
    UploadRejected(String),
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error(transparent)]
    Database(DbErr),
}

impl From<DbErr> for EngineError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg)) => Self::Conflict(msg),
            _ => Self::Database(err),
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::AlreadyApproved(a), Self::AlreadyApproved(b)) => a == b,
            (Self::NotApproved(a), Self::NotApproved(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidDate(a), Self::InvalidDate(b)) => a == b,
            (Self::InvalidStatement(a), Self::InvalidStatement(b)) => a == b,
            (Self::UploadRejected(a), Self::UploadRejected(b)) => a == b,
            (Self::InvalidCredentials(a), Self::InvalidCredentials(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_db_errors_stay_infrastructure() {
        let err = EngineError::from(DbErr::Custom("connection lost".to_string()));
        assert!(matches!(err, EngineError::Database(_)));
    }

    #[test]
    fn equality_compares_payloads() {
        assert_eq!(
            EngineError::InvalidAmount("x".to_string()),
            EngineError::InvalidAmount("x".to_string())
        );
        assert_ne!(
            EngineError::InvalidAmount("x".to_string()),
            EngineError::Conflict("x".to_string())
        );
    }
}
