//! Action domain model.
//!
//! # Responsibility
//! - Define the to-do record including completion and focus state.
//! - Provide lifecycle predicates used by ordering and grouping callers.
//!
//! # Invariants
//! - `id` is stable and never reused for another action.
//! - `focused_at` must be `None` whenever `completed_at` is `Some`.
//! - `time_spent` is written once at completion time and never recomputed.

use crate::model::{validate_name, ValidationError};
use crate::ordering::Orderable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for an action.
pub type ActionId = Uuid;

/// A to-do item with an optional one-shot focus timer.
///
/// `order` is dense and zero-based within the active subset only; it is
/// meaningless for completed actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: ActionId,
    pub name: String,
    pub notes: Option<String>,
    /// `None` means the action is active.
    pub completed_at: Option<DateTime<Utc>>,
    pub order: i64,
    /// `Some` means a focus timer is running.
    pub focused_at: Option<DateTime<Utc>>,
    /// Seconds spent focused, set only at the moment of completion.
    pub time_spent: Option<i64>,
}

impl Action {
    /// Creates a new active action with a generated stable ID.
    pub fn new(name: impl Into<String>, notes: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            notes,
            completed_at: None,
            order: 0,
            focused_at: None,
            time_spent: None,
        }
    }

    /// Returns whether this action participates in the active ordering.
    pub fn is_active(&self) -> bool {
        self.completed_at.is_none()
    }

    /// Returns whether a focus timer is running for this action.
    pub fn is_focused(&self) -> bool {
        self.focused_at.is_some() && self.completed_at.is_none()
    }

    /// Validates model-level preconditions before a write.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name("action", &self.name)
    }
}

impl Orderable for Action {
    fn order(&self) -> i64 {
        self.order
    }

    fn set_order(&mut self, order: i64) {
        self.order = order;
    }
}
