//! Engine errors.
//!
//! Two failure classes exist. Structural and malformed-input errors abort the
//! rewrite of the schedule they occur in. Transformation refusals are
//! recoverable: the tree is untouched and the caller may try something else.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// A tree edit would break the one-parent or position invariant.
    #[error("structural violation: {message}")]
    StructuralViolation { message: String },

    /// The front-end event stream does not describe a well-formed schedule.
    #[error("malformed input: {message}")]
    MalformedInput { message: String },

    #[error(transparent)]
    Transformation(#[from] TransformationError),

    /// The candidate explorer could not start its worker pool.
    #[error("explorer failed: {message}")]
    Explorer { message: String },
}

impl Error {
    pub fn structural(message: impl Into<String>) -> Self {
        Error::StructuralViolation {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedInput {
            message: message.into(),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Transformation(_))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RefusalKind {
    InvalidTarget,
    NotAdjacent,
    Incompatible,
    Conflict,
    Unanalyzable,
    Redundant,
    ConflictingDirective,
    InvalidOptions,
    UnknownTransformation,
}

impl RefusalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefusalKind::InvalidTarget => "invalid_target",
            RefusalKind::NotAdjacent => "not_adjacent",
            RefusalKind::Incompatible => "incompatible",
            RefusalKind::Conflict => "conflict",
            RefusalKind::Unanalyzable => "unanalyzable",
            RefusalKind::Redundant => "redundant",
            RefusalKind::ConflictingDirective => "conflicting_directive",
            RefusalKind::InvalidOptions => "invalid_options",
            RefusalKind::UnknownTransformation => "unknown_transformation",
        }
    }
}

impl Display for RefusalKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transformation precondition that does not hold for the given targets.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{transformation}: {message}")]
pub struct TransformationError {
    pub transformation: String,
    pub kind: RefusalKind,
    pub message: String,
}

impl TransformationError {
    pub fn new(transformation: &str, kind: RefusalKind, message: impl Into<String>) -> Self {
        Self {
            transformation: transformation.to_string(),
            kind,
            message: message.into(),
        }
    }
}
