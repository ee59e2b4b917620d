//! Entity stores: the stateful core over the repository layer.
//!
//! # Responsibility
//! - Own the authoritative in-memory collection per entity kind.
//! - Enforce write-then-publish: compute the next collection, persist it,
//!   and only then swap the published state and notify subscribers.
//!
//! # Invariants
//! - Mutations are valid only in `Ready`; earlier calls fail with `NotReady`.
//! - A failed durable write leaves the published collection untouched.
//! - Repository errors surface as `Persistence`, never as silent success.

use crate::model::ValidationError;
use crate::ordering::OrderingError;
use crate::repo::RepoError;
use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod action_store;
pub mod habit_store;
pub mod template_store;

pub type StoreResult<T> = Result<T, StoreError>;

/// Lifecycle of a store between construction and first successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Uninitialized,
    Loading,
    Ready,
}

/// Errors surfaced by store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Operation invoked before the initial load completed.
    NotReady,
    /// Caller-supplied input violated a precondition; no state change.
    Validation(ValidationError),
    /// Referenced id does not exist in the target collection.
    NotFound(Uuid),
    /// Reorder source index outside the valid bounds.
    IndexOutOfRange { index: usize, len: usize },
    /// Durable-layer failure; the published collection was left unchanged.
    Persistence {
        operation: &'static str,
        source: RepoError,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotReady => write!(f, "store is not ready"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "entity not found: {id}"),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for length {len}")
            }
            Self::Persistence { operation, source } => {
                write!(f, "persistence failure during {operation}: {source}")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Persistence { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<OrderingError> for StoreError {
    fn from(value: OrderingError) -> Self {
        match value {
            OrderingError::IndexOutOfRange { index, len } => {
                Self::IndexOutOfRange { index, len }
            }
        }
    }
}

/// Time source injected into stores so focus/elapsed semantics are testable.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Handle for removing a registered subscriber.
pub type SubscriptionId = u64;

/// Subscriber registry shared by the three stores.
///
/// Callbacks receive a read-only view of the full collection synchronously
/// after every successful mutation.
pub(crate) struct Subscribers<T> {
    next_id: SubscriptionId,
    entries: Vec<(SubscriptionId, Box<dyn Fn(&[T])>)>,
}

impl<T> Subscribers<T> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, callback: Box<dyn Fn(&[T])>) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, callback));
        id
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub(crate) fn notify(&self, items: &[T]) {
        for (_, callback) in &self.entries {
            callback(items);
        }
    }
}

pub(crate) fn persistence_error(operation: &'static str) -> impl FnOnce(RepoError) -> StoreError {
    move |source| {
        log::error!("event=store_persist module=store status=error operation={operation} error={source}");
        StoreError::Persistence { operation, source }
    }
}
