//! Error types for the economy core

use crate::types::{EntityRef, TaskId, TaskStatus, UserId};
use chrono::NaiveDate;
use thiserror::Error;

/// Result type for economy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`], used by callers to pick a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Request rejected before any transaction began
    Validation,
    /// Caller lacks the privilege for the operation
    Forbidden,
    /// A referenced row does not exist
    NotFound,
    /// Request conflicts with current state; transaction rolled back
    Precondition,
    /// The store failed; transaction rolled back
    Persistence,
}

/// Economy errors
#[derive(Error, Debug)]
pub enum Error {
    /// Tip amount outside the configured range, or a negative exp award
    #[error("Invalid amount {amount}: must be between {min} and {max}")]
    InvalidAmount {
        /// Requested amount
        amount: i64,
        /// Smallest accepted amount
        min: i64,
        /// Largest accepted amount
        max: i64,
    },

    /// Category pair not present in the taxonomy
    #[error("Unknown category: {main} / {sub}")]
    InvalidCategory {
        /// Main category
        main: String,
        /// Sub category
        sub: String,
    },

    /// Submission metadata failed a field check
    #[error("Invalid submission: {0}")]
    InvalidSubmission(String),

    /// Reject decision without a reason
    #[error("A reject reason is required")]
    MissingReason,

    /// Reviewer level below the configured threshold
    #[error("Reviewer level {level} is below the required {required}")]
    Forbidden {
        /// Reviewer's role level
        level: i32,
        /// Threshold from configuration
        required: i32,
    },

    /// Payer balance below the tip amount
    #[error("Insufficient coins: required {required}, available {available}")]
    InsufficientFunds {
        /// Tip amount
        required: i64,
        /// Payer balance read under lock
        available: i64,
    },

    /// Tip target does not exist
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityRef),

    /// User row does not exist
    #[error("Account not found: {0}")]
    AccountNotFound(UserId),

    /// Daily reward already claimed for this date
    #[error("User {user} already checked in on {date}")]
    AlreadyClaimed {
        /// Claiming user
        user: UserId,
        /// Calendar date of the claim
        date: NaiveDate,
    },

    /// Submission task does not exist
    #[error("Upload task not found: {0}")]
    TaskNotFound(TaskId),

    /// Submission task already left `pending`
    #[error("Upload task {task} was already reviewed ({status})")]
    AlreadyReviewed {
        /// Task id
        task: TaskId,
        /// Terminal status it holds
        status: TaskStatus,
    },

    /// Store failure (connectivity, constraint violation, injected fault)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap any store failure
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Error::Storage(err.to_string())
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidAmount { .. }
            | Error::InvalidCategory { .. }
            | Error::InvalidSubmission(_)
            | Error::MissingReason => ErrorKind::Validation,
            Error::Forbidden { .. } => ErrorKind::Forbidden,
            Error::EntityNotFound(_) | Error::AccountNotFound(_) | Error::TaskNotFound(_) => {
                ErrorKind::NotFound
            }
            Error::InsufficientFunds { .. }
            | Error::AlreadyClaimed { .. }
            | Error::AlreadyReviewed { .. } => ErrorKind::Precondition,
            Error::Storage(_) | Error::Config(_) => ErrorKind::Persistence,
        }
    }

    /// Short machine-readable tag, stable across releases
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidAmount { .. } => "invalid_amount",
            Error::InvalidCategory { .. } => "invalid_category",
            Error::InvalidSubmission(_) => "invalid_submission",
            Error::MissingReason => "missing_reason",
            Error::Forbidden { .. } => "forbidden",
            Error::InsufficientFunds { .. } => "insufficient_funds",
            Error::EntityNotFound(_) => "entity_not_found",
            Error::AccountNotFound(_) => "account_not_found",
            Error::AlreadyClaimed { .. } => "already_claimed",
            Error::TaskNotFound(_) => "task_not_found",
            Error::AlreadyReviewed { .. } => "already_reviewed",
            Error::Storage(_) => "storage_error",
            Error::Config(_) => "config_error",
        }
    }
}
