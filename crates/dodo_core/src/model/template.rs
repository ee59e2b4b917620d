//! Task template domain model.
//!
//! Templates are saved name/notes pairs used to prefill new actions. They
//! share the ordering and persistence pattern of the other entity kinds but
//! carry no completion or focus state.

use crate::model::{validate_name, ValidationError};
use crate::ordering::Orderable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a template.
pub type TemplateId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub notes: Option<String>,
    /// Dense zero-based position across all templates.
    pub order: i64,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every mutation.
    pub updated_at: DateTime<Utc>,
}

impl Template {
    /// Creates a new template with a generated stable ID.
    pub fn new(name: impl Into<String>, notes: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            notes,
            order: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validates model-level preconditions before a write.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name("template", &self.name)
    }
}

impl Orderable for Template {
    fn order(&self) -> i64 {
        self.order
    }

    fn set_order(&mut self, order: i64) {
        self.order = order;
    }
}
