use thiserror::Error;
use uuid::Uuid;

use crate::auth::Role;
use crate::models::RecordStatus;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CategoryError {
    #[error("category weight must be non-negative, got {0}")]
    NegativeWeight(i64),

    #[error("category weight {0} is larger than the supported maximum")]
    WeightTooLarge(i64),

    #[error("category name must not be blank")]
    EmptyName,

    #[error("category group must not be blank")]
    EmptyGroup,
}

/// Failures of the submit/review lifecycle of an activity record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("no category named '{0}'")]
    UnknownCategory(String),

    #[error("category '{0}' is retired and no longer accepts submissions")]
    InactiveCategory(String),

    #[error("no student with NIM '{0}'")]
    UnknownStudent(String),

    #[error("activity record {0} not found")]
    RecordNotFound(Uuid),

    #[error("activity record {record_id} was already reviewed ({status})")]
    AlreadyReviewed { record_id: Uuid, status: RecordStatus },

    #[error("activity record {0} is still pending review")]
    NotReviewed(Uuid),

    #[error("'{0}' is not a review decision")]
    InvalidDecision(RecordStatus),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no user registered as '{0}'")]
    UnknownUser(String),

    #[error("role '{role}' may not {action}")]
    Forbidden { role: Role, action: &'static str },

    #[error("user {0} has the student role but no linked student profile")]
    MissingStudentProfile(Uuid),
}

/// Category groups that cannot be rendered as distinct summary fields.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("groups '{first}' and '{second}' both render as '{key}'")]
    GroupKeyCollision {
        first: String,
        second: String,
        key: String,
    },

    #[error("group '{group}' renders as '{key}', which is a fixed summary field")]
    ReservedGroupKey { group: String, key: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("graduation target must be greater than zero")]
    ZeroTarget,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
