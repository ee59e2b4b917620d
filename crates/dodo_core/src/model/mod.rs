//! Domain models for the tracker core.
//!
//! # Responsibility
//! - Define the canonical action/habit/template records.
//! - Enforce field-level validation shared by store and repository writes.
//!
//! # Invariants
//! - Every entity is identified by a stable, never-reused `Uuid`.
//! - Names must be non-empty after trimming whitespace.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod action;
pub mod habit;
pub mod template;

/// Caller-supplied input violated a model precondition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `name` was empty (or whitespace-only) for the named entity kind.
    EmptyName(&'static str),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName(kind) => write!(f, "{kind} name must not be empty"),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn validate_name(kind: &'static str, name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName(kind));
    }
    Ok(())
}
