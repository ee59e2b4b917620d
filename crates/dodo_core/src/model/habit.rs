//! Habit domain model.
//!
//! # Invariants
//! - `entries` holds distinct calendar days, not instants; membership and
//!   toggling are day-granular.
//! - `created_at` is immutable after creation.

use crate::model::{validate_name, ValidationError};
use crate::ordering::Orderable;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Stable identifier for a habit.
pub type HabitId = Uuid;

/// A recurring item tracked by per-calendar-day completion marks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: HabitId,
    pub name: String,
    /// Days on which the habit was performed.
    pub entries: BTreeSet<NaiveDate>,
    pub created_at: DateTime<Utc>,
    /// Dense zero-based position across all habits.
    pub order: i64,
}

impl Habit {
    /// Creates a new habit with a generated stable ID and no entries.
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            entries: BTreeSet::new(),
            created_at,
            order: 0,
        }
    }

    /// Returns whether the habit was performed on the given day.
    pub fn has_entry(&self, day: NaiveDate) -> bool {
        self.entries.contains(&day)
    }

    /// Validates model-level preconditions before a write.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name("habit", &self.name)
    }
}

impl Orderable for Habit {
    fn order(&self) -> i64 {
        self.order
    }

    fn set_order(&mut self, order: i64) {
        self.order = order;
    }
}
