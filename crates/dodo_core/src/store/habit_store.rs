//! Habit entity store.
//!
//! Habits have no active/completed split: `order` is dense across the whole
//! collection, and entry toggling is calendar-day-granular in the local time
//! zone regardless of the instant supplied by the caller.

use crate::model::habit::{Habit, HabitId};
use crate::model::validate_name;
use crate::ordering::{move_item, next_order};
use crate::repo::habit_repo::{HabitPatch, HabitRepository};
use crate::store::{
    persistence_error, Clock, StoreError, StoreResult, StoreState, Subscribers, SubscriptionId,
    SystemClock,
};
use chrono::{DateTime, Local, Utc};
use log::info;

/// Fields that plain `update` may touch.
#[derive(Debug, Clone, Default)]
pub struct HabitUpdate {
    pub name: Option<String>,
}

/// Stateful store for the habit collection.
pub struct HabitStore<R: HabitRepository> {
    repo: R,
    clock: Box<dyn Clock>,
    state: StoreState,
    habits: Vec<Habit>,
    subscribers: Subscribers<Habit>,
}

impl<R: HabitRepository> HabitStore<R> {
    pub fn new(repo: R) -> Self {
        Self::with_clock(repo, Box::new(SystemClock))
    }

    pub fn with_clock(repo: R, clock: Box<dyn Clock>) -> Self {
        Self {
            repo,
            clock,
            state: StoreState::Uninitialized,
            habits: Vec::new(),
            subscribers: Subscribers::new(),
        }
    }

    /// Bulk-loads the collection from durable storage and becomes `Ready`.
    pub fn init(&mut self) -> StoreResult<()> {
        if self.state == StoreState::Ready {
            return Ok(());
        }

        self.state = StoreState::Loading;
        let loaded = match self.repo.load_all() {
            Ok(loaded) => loaded,
            Err(err) => {
                self.state = StoreState::Uninitialized;
                return Err(persistence_error("habit_load")(err));
            }
        };

        info!(
            "event=habit_load module=store status=ok count={}",
            loaded.len()
        );
        self.state = StoreState::Ready;
        self.commit(loaded);
        Ok(())
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state != StoreState::Ready
    }

    /// Read-only snapshot sorted by `order` ascending.
    pub fn habits(&self) -> &[Habit] {
        &self.habits
    }

    pub fn subscribe(&mut self, callback: Box<dyn Fn(&[Habit])>) -> SubscriptionId {
        self.subscribers.add(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }

    /// Creates a new habit appended at the end of the list.
    pub fn create(&mut self, name: &str) -> StoreResult<HabitId> {
        self.ensure_ready()?;
        validate_name("habit", name)?;

        let mut habit = Habit::new(name.trim(), self.clock.now());
        habit.order = next_order(&self.habits);
        let id = habit.id;

        self.repo
            .upsert(&habit)
            .map_err(persistence_error("habit_create"))?;

        info!("event=habit_create module=store status=ok id={id}");
        let mut next = self.habits.clone();
        next.push(habit);
        self.commit(next);
        Ok(id)
    }

    /// Merges name changes into an existing habit.
    pub fn update(&mut self, id: HabitId, update: HabitUpdate) -> StoreResult<()> {
        self.ensure_ready()?;
        let mut habit = self.require(id)?.clone();

        let mut patch = HabitPatch::default();
        if let Some(name) = update.name {
            validate_name("habit", &name)?;
            let trimmed = name.trim().to_string();
            habit.name = trimmed.clone();
            patch.name = Some(trimmed);
        }

        self.repo
            .patch(id, &patch)
            .map_err(persistence_error("habit_update"))?;
        let next = self.merged_with(&habit);
        self.commit(next);
        Ok(())
    }

    /// Toggles the completion mark for the local calendar day of `at`.
    ///
    /// Toggling twice with any two instants of the same local day returns
    /// the habit to its previous entry set.
    pub fn toggle_entry(&mut self, id: HabitId, at: DateTime<Utc>) -> StoreResult<()> {
        self.ensure_ready()?;
        let mut habit = self.require(id)?.clone();

        let day = at.with_timezone(&Local).date_naive();
        if !habit.entries.insert(day) {
            habit.entries.remove(&day);
        }

        let patch = HabitPatch {
            entries: Some(habit.entries.clone()),
            ..HabitPatch::default()
        };
        self.repo
            .patch(id, &patch)
            .map_err(persistence_error("habit_toggle_entry"))?;

        info!("event=habit_toggle_entry module=store status=ok id={id} day={day}");
        let next = self.merged_with(&habit);
        self.commit(next);
        Ok(())
    }

    /// Moves a habit from one position to another and renumbers the whole
    /// collection, persisting it as one batch.
    pub fn reorder(&mut self, from_index: usize, to_index: usize) -> StoreResult<()> {
        self.ensure_ready()?;
        let mut sorted = self.habits.clone();
        sorted.sort_by_key(|habit| habit.order);
        let renumbered = move_item(sorted, from_index, to_index)?;

        self.repo
            .upsert_many(&renumbered)
            .map_err(persistence_error("habit_reorder"))?;

        info!("event=habit_reorder module=store status=ok from={from_index} to={to_index}");
        self.commit(renumbered);
        Ok(())
    }

    /// Removes a habit from memory and durable storage.
    pub fn delete(&mut self, id: HabitId) -> StoreResult<()> {
        self.ensure_ready()?;
        self.require(id)?;

        self.repo
            .remove(id)
            .map_err(persistence_error("habit_delete"))?;

        info!("event=habit_delete module=store status=ok id={id}");
        let next: Vec<Habit> = self
            .habits
            .iter()
            .filter(|habit| habit.id != id)
            .cloned()
            .collect();
        self.commit(next);
        Ok(())
    }

    fn ensure_ready(&self) -> StoreResult<()> {
        if self.state != StoreState::Ready {
            return Err(StoreError::NotReady);
        }
        Ok(())
    }

    fn require(&self, id: HabitId) -> StoreResult<&Habit> {
        self.habits
            .iter()
            .find(|habit| habit.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    fn merged_with(&self, updated: &Habit) -> Vec<Habit> {
        let mut next = self.habits.clone();
        if let Some(slot) = next.iter_mut().find(|existing| existing.id == updated.id) {
            *slot = updated.clone();
        }
        next
    }

    fn commit(&mut self, next: Vec<Habit>) {
        self.habits = next;
        self.subscribers.notify(&self.habits);
    }
}
