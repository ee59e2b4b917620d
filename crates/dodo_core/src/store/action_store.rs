//! Action entity store with focus/timer lifecycle.
//!
//! # Responsibility
//! - Own the authoritative action collection and its mutation operations.
//! - Keep the dense active-subset ordering consistent across mutations.
//! - Drive the external focus presentation through injected lifecycle hooks.
//!
//! # Invariants
//! - `focused_at` and `completed_at` are never simultaneously set once an
//!   operation completes.
//! - `time_spent` is computed once at completion time and never recomputed.
//! - Presentation end-hooks fire exactly once per focus session; repeated
//!   teardown for the same id is a safe no-op.
//! - After `delete`, remaining active `order` values may carry gaps until
//!   the next create-with-index/reorder/restore repairs them.

use crate::grouping::{group_by_day, DayGroup};
use crate::model::action::{Action, ActionId};
use crate::model::validate_name;
use crate::ordering::{insert_at, move_item, next_order};
use crate::repo::action_repo::{ActionPatch, ActionRepository};
use crate::store::{
    persistence_error, Clock, StoreError, StoreResult, StoreState, Subscribers, SubscriptionId,
    SystemClock,
};
use chrono::{DateTime, Utc};
use log::info;
use std::collections::HashSet;

/// External presentation attach point for focus sessions.
///
/// Implementations are best-effort: they must log their own failures and
/// never block or fail the owning store operation.
pub trait FocusPresenter {
    /// A focus session started for `action` at `started_at`.
    fn focus_started(&mut self, action: &Action, started_at: DateTime<Utc>);
    /// The focus session for `id` ended (completion, cancel, or delete).
    fn focus_ended(&mut self, id: ActionId);
}

/// Presenter used when no external surface is attached.
pub struct NoopFocusPresenter;

impl FocusPresenter for NoopFocusPresenter {
    fn focus_started(&mut self, _action: &Action, _started_at: DateTime<Utc>) {}
    fn focus_ended(&mut self, _id: ActionId) {}
}

/// Fields that plain `update` may touch. Completion, focus, ordering and
/// `time_spent` are reserved for the specialized operations so their
/// invariants stay centralized.
#[derive(Debug, Clone, Default)]
pub struct ActionUpdate {
    pub name: Option<String>,
    /// `Some(None)` clears the notes.
    pub notes: Option<Option<String>>,
}

/// Stateful store for the action collection.
pub struct ActionStore<R: ActionRepository> {
    repo: R,
    presenter: Box<dyn FocusPresenter>,
    clock: Box<dyn Clock>,
    state: StoreState,
    actions: Vec<Action>,
    /// Focus sessions with a live external presentation.
    presented: HashSet<ActionId>,
    subscribers: Subscribers<Action>,
}

impl<R: ActionRepository> ActionStore<R> {
    /// Creates a store with no external presentation surface.
    pub fn new(repo: R) -> Self {
        Self::with_parts(repo, Box::new(NoopFocusPresenter), Box::new(SystemClock))
    }

    /// Creates a store mirroring focus sessions to the given presenter.
    pub fn with_presenter(repo: R, presenter: Box<dyn FocusPresenter>) -> Self {
        Self::with_parts(repo, presenter, Box::new(SystemClock))
    }

    /// Full constructor; the clock injection point exists for tests and
    /// simulated-time callers.
    pub fn with_parts(
        repo: R,
        presenter: Box<dyn FocusPresenter>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            presenter,
            clock,
            state: StoreState::Uninitialized,
            actions: Vec::new(),
            presented: HashSet::new(),
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
                return Err(persistence_error("action_load")(err));
            }
        };

        // Focus sessions that survived a restart still owe a teardown hook
        // when they end this session.
        self.presented = loaded
            .iter()
            .filter(|action| action.is_focused())
            .map(|action| action.id)
            .collect();

        info!(
            "event=action_load module=store status=ok count={}",
            loaded.len()
        );
        self.state = StoreState::Ready;
        self.commit(loaded);
        Ok(())
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    /// Readiness flag for consumers; `true` until the initial load finishes.
    pub fn is_loading(&self) -> bool {
        self.state != StoreState::Ready
    }

    /// Read-only snapshot of the full collection.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Active subset sorted by `order` ascending.
    pub fn active_actions(&self) -> Vec<Action> {
        let mut active: Vec<Action> = self
            .actions
            .iter()
            .filter(|action| action.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|action| action.order);
        active
    }

    /// Completed subset, most recently completed first.
    pub fn completed_actions(&self) -> Vec<Action> {
        let mut completed: Vec<Action> = self
            .actions
            .iter()
            .filter(|action| !action.is_active())
            .cloned()
            .collect();
        completed.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        completed
    }

    /// Completed actions bucketed by local calendar day for history display.
    pub fn completed_by_day(&self) -> Vec<DayGroup<Action>> {
        group_by_day(self.completed_actions(), |action| action.completed_at)
    }

    /// Seconds elapsed for a running focus session, if any.
    pub fn elapsed_focus_seconds(&self, id: ActionId) -> Option<i64> {
        self.actions
            .iter()
            .find(|action| action.id == id && action.is_focused())
            .and_then(|action| action.focused_at)
            .map(|started_at| (self.clock.now() - started_at).num_seconds())
    }

    /// Registers a change subscriber; it is invoked synchronously after each
    /// successful mutation with the full collection.
    pub fn subscribe(&mut self, callback: Box<dyn Fn(&[Action])>) -> SubscriptionId {
        self.subscribers.add(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }

    /// Creates a new active action.
    ///
    /// Without `insert_index` the action appends at the end of the active
    /// list; an in-range index inserts mid-list and persists the whole
    /// renumbered active subset as one batch.
    pub fn create(
        &mut self,
        name: &str,
        notes: Option<String>,
        insert_index: Option<usize>,
    ) -> StoreResult<ActionId> {
        self.ensure_ready()?;
        validate_name("action", name)?;

        let mut action = Action::new(name.trim(), notes);
        let id = action.id;
        let active = self.active_actions();

        let next = match insert_index {
            Some(index) if index < active.len() => {
                let renumbered = insert_at(active, action, index);
                self.repo
                    .upsert_many(&renumbered)
                    .map_err(persistence_error("action_create"))?;
                self.merged_with(&renumbered)
            }
            _ => {
                action.order = next_order(&active);
                self.repo
                    .upsert(&action)
                    .map_err(persistence_error("action_create"))?;
                let mut next = self.actions.clone();
                next.push(action);
                next
            }
        };

        info!("event=action_create module=store status=ok id={id}");
        self.commit(next);
        Ok(id)
    }

    /// Merges name/notes changes into an existing action.
    pub fn update(&mut self, id: ActionId, update: ActionUpdate) -> StoreResult<()> {
        self.ensure_ready()?;
        let mut action = self.require(id)?.clone();

        let mut patch = ActionPatch::default();
        if let Some(name) = update.name {
            validate_name("action", &name)?;
            let trimmed = name.trim().to_string();
            action.name = trimmed.clone();
            patch.name = Some(trimmed);
        }
        if let Some(notes) = update.notes {
            action.notes = notes.clone();
            patch.notes = Some(notes);
        }

        self.repo
            .patch(id, &patch)
            .map_err(persistence_error("action_update"))?;
        let next = self.merged_with(&[action]);
        self.commit(next);
        Ok(())
    }

    /// Marks an action completed, settling any running focus session into
    /// `time_spent`. Completing an already-completed action is a no-op.
    pub fn complete(&mut self, id: ActionId) -> StoreResult<()> {
        self.ensure_ready()?;
        let mut action = self.require(id)?.clone();
        if !action.is_active() {
            return Ok(());
        }

        let now = self.clock.now();
        let mut patch = ActionPatch {
            completed_at: Some(Some(now)),
            ..ActionPatch::default()
        };
        action.completed_at = Some(now);

        if let Some(focused_at) = action.focused_at.take() {
            let spent = (now - focused_at).num_seconds().max(0);
            action.time_spent = Some(spent);
            patch.focused_at = Some(None);
            patch.time_spent = Some(Some(spent));
        }

        self.repo
            .patch(id, &patch)
            .map_err(persistence_error("action_complete"))?;
        self.end_presentation(id);

        info!(
            "event=action_complete module=store status=ok id={id} time_spent={:?}",
            action.time_spent
        );
        let next = self.merged_with(&[action]);
        self.commit(next);
        Ok(())
    }

    /// Returns a completed action to the end of the active list.
    pub fn restore(&mut self, id: ActionId) -> StoreResult<()> {
        self.ensure_ready()?;
        let mut action = self.require(id)?.clone();
        if action.is_active() {
            return Ok(());
        }

        action.completed_at = None;
        action.focused_at = None;
        action.time_spent = None;
        action.order = next_order(&self.active_actions());

        let patch = ActionPatch {
            completed_at: Some(None),
            focused_at: Some(None),
            time_spent: Some(None),
            order: Some(action.order),
            ..ActionPatch::default()
        };
        self.repo
            .patch(id, &patch)
            .map_err(persistence_error("action_restore"))?;

        let next = self.merged_with(&[action]);
        self.commit(next);
        Ok(())
    }

    /// Moves an active action from one position to another, renumbering and
    /// persisting the whole active subset. Completed actions are untouched.
    pub fn reorder(&mut self, from_index: usize, to_index: usize) -> StoreResult<()> {
        self.ensure_ready()?;
        let renumbered = move_item(self.active_actions(), from_index, to_index)?;
        self.repo
            .upsert_many(&renumbered)
            .map_err(persistence_error("action_reorder"))?;

        info!("event=action_reorder module=store status=ok from={from_index} to={to_index}");
        let next = self.merged_with(&renumbered);
        self.commit(next);
        Ok(())
    }

    /// Removes an action from memory and durable storage.
    ///
    /// Remaining active `order` gaps are tolerated until the next
    /// renumbering operation.
    pub fn delete(&mut self, id: ActionId) -> StoreResult<()> {
        self.ensure_ready()?;
        self.require(id)?;

        // Presentation teardown comes first; the hook is best-effort and
        // must not survive the entity.
        self.end_presentation(id);
        self.repo
            .remove(id)
            .map_err(persistence_error("action_delete"))?;

        info!("event=action_delete module=store status=ok id={id}");
        let next: Vec<Action> = self
            .actions
            .iter()
            .filter(|action| action.id != id)
            .cloned()
            .collect();
        self.commit(next);
        Ok(())
    }

    /// Starts a focus session. Silent no-op on completed or already-focused
    /// actions.
    pub fn focus(&mut self, id: ActionId) -> StoreResult<()> {
        self.ensure_ready()?;
        let mut action = self.require(id)?.clone();
        if !action.is_active() || action.focused_at.is_some() {
            return Ok(());
        }

        let now = self.clock.now();
        action.focused_at = Some(now);

        let patch = ActionPatch {
            focused_at: Some(Some(now)),
            ..ActionPatch::default()
        };
        self.repo
            .patch(id, &patch)
            .map_err(persistence_error("action_focus"))?;

        self.presenter.focus_started(&action, now);
        self.presented.insert(id);

        info!("event=action_focus module=store status=ok id={id}");
        let next = self.merged_with(&[action]);
        self.commit(next);
        Ok(())
    }

    /// Cancels a focus session, discarding elapsed time. `time_spent` is
    /// deliberately not computed here; only completion settles it.
    pub fn unfocus(&mut self, id: ActionId) -> StoreResult<()> {
        self.ensure_ready()?;
        let mut action = self.require(id)?.clone();
        if action.focused_at.is_none() {
            return Ok(());
        }

        action.focused_at = None;
        let patch = ActionPatch {
            focused_at: Some(None),
            ..ActionPatch::default()
        };
        self.repo
            .patch(id, &patch)
            .map_err(persistence_error("action_unfocus"))?;
        self.end_presentation(id);

        info!("event=action_unfocus module=store status=ok id={id}");
        let next = self.merged_with(&[action]);
        self.commit(next);
        Ok(())
    }

    fn ensure_ready(&self) -> StoreResult<()> {
        if self.state != StoreState::Ready {
            return Err(StoreError::NotReady);
        }
        Ok(())
    }

    fn require(&self, id: ActionId) -> StoreResult<&Action> {
        self.actions
            .iter()
            .find(|action| action.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    /// Applies updated entities over a clone of the published collection.
    fn merged_with(&self, updated: &[Action]) -> Vec<Action> {
        let mut next = self.actions.clone();
        for entity in updated {
            match next.iter_mut().find(|existing| existing.id == entity.id) {
                Some(slot) => *slot = entity.clone(),
                None => next.push(entity.clone()),
            }
        }
        next
    }

    fn commit(&mut self, next: Vec<Action>) {
        self.actions = next;
        self.subscribers.notify(&self.actions);
    }

    fn end_presentation(&mut self, id: ActionId) {
        if self.presented.remove(&id) {
            self.presenter.focus_ended(id);
        }
    }
}
