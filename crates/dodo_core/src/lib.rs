//! Persistence and state-reconciliation core for the dodo task tracker.
//! This crate is the single source of truth for ordering, grouping and
//! storage invariants; UI layers consume the stores and never mutate state
//! directly.

pub mod db;
pub mod grouping;
pub mod logging;
pub mod model;
pub mod ordering;
pub mod repo;
pub mod store;

pub use grouping::{group_by_day, DayGroup, DayKey};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::action::{Action, ActionId};
pub use model::habit::{Habit, HabitId};
pub use model::template::{Template, TemplateId};
pub use model::ValidationError;
pub use ordering::{insert_at, move_item, next_order, renumber, Orderable, OrderingError};
pub use repo::action_repo::{ActionPatch, ActionRepository, SqliteActionRepository};
pub use repo::habit_repo::{HabitPatch, HabitRepository, SqliteHabitRepository};
pub use repo::template_repo::{SqliteTemplateRepository, TemplatePatch, TemplateRepository};
pub use repo::{RepoError, RepoResult};
pub use store::action_store::{
    ActionStore, ActionUpdate, FocusPresenter, NoopFocusPresenter,
};
pub use store::habit_store::{HabitStore, HabitUpdate};
pub use store::template_store::{TemplateStore, TemplateUpdate};
pub use store::{Clock, StoreError, StoreResult, StoreState, SubscriptionId, SystemClock};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
