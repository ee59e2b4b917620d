//! Action repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Map `Action` records to and from `actions` rows.
//! - Provide upsert, partial patch, idempotent delete and transactional
//!   batch upsert used by reorder-style operations.
//!
//! # Invariants
//! - `load_all` returns rows ordered by `"order"` ascending.
//! - An empty patch is a successful no-op; patching a missing id is
//!   `NotFound`, never a silent no-op.

use crate::model::action::{Action, ActionId};
use crate::repo::{
    ensure_connection_ready, format_instant, parse_id, parse_instant, RepoError, RepoResult,
};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};

const ACTION_COLUMNS: &[&str] = &[
    "id",
    "name",
    "notes",
    "completed_at",
    "order",
    "focused_at",
    "time_spent",
];

const ACTION_SELECT_SQL: &str = r#"SELECT
    id,
    name,
    notes,
    completed_at,
    "order",
    focused_at,
    time_spent
FROM actions"#;

/// Partial-field update for one action row. `None` leaves the field as is.
#[derive(Debug, Clone, Default)]
pub struct ActionPatch {
    pub name: Option<String>,
    pub notes: Option<Option<String>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub order: Option<i64>,
    pub focused_at: Option<Option<DateTime<Utc>>>,
    pub time_spent: Option<Option<i64>>,
}

impl ActionPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.notes.is_none()
            && self.completed_at.is_none()
            && self.order.is_none()
            && self.focused_at.is_none()
            && self.time_spent.is_none()
    }
}

/// Durable record mapper contract for actions.
pub trait ActionRepository {
    /// Loads every row sorted by `"order"` ascending. Empty store is `Ok`.
    fn load_all(&self) -> RepoResult<Vec<Action>>;
    /// Inserts or fully overwrites the row matching `action.id`.
    fn upsert(&self, action: &Action) -> RepoResult<()>;
    /// Updates only the supplied fields of one row.
    fn patch(&self, id: ActionId, patch: &ActionPatch) -> RepoResult<()>;
    /// Deletes the row. Removing a missing id is success.
    fn remove(&self, id: ActionId) -> RepoResult<()>;
    /// Applies the batch as one transaction; partial failure commits nothing.
    fn upsert_many(&self, actions: &[Action]) -> RepoResult<()>;
}

/// SQLite-backed action repository.
pub struct SqliteActionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteActionRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "actions", ACTION_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl ActionRepository for SqliteActionRepository<'_> {
    fn load_all(&self) -> RepoResult<Vec<Action>> {
        let mut stmt = self
            .conn
            .prepare(&format!(r#"{ACTION_SELECT_SQL} ORDER BY "order" ASC;"#))?;
        let mut rows = stmt.query([])?;

        let mut actions = Vec::new();
        while let Some(row) = rows.next()? {
            actions.push(parse_action_row(row)?);
        }
        Ok(actions)
    }

    fn upsert(&self, action: &Action) -> RepoResult<()> {
        upsert_action(self.conn, action)
    }

    fn patch(&self, id: ActionId, patch: &ActionPatch) -> RepoResult<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut assignments: Vec<&'static str> = Vec::new();
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(name) = &patch.name {
            assignments.push("name = ?");
            bind_values.push(Value::Text(name.clone()));
        }
        if let Some(notes) = &patch.notes {
            assignments.push("notes = ?");
            bind_values.push(optional_text(notes.as_deref()));
        }
        if let Some(completed_at) = &patch.completed_at {
            assignments.push("completed_at = ?");
            bind_values.push(optional_instant(*completed_at));
        }
        if let Some(order) = patch.order {
            assignments.push(r#""order" = ?"#);
            bind_values.push(Value::Integer(order));
        }
        if let Some(focused_at) = &patch.focused_at {
            assignments.push("focused_at = ?");
            bind_values.push(optional_instant(*focused_at));
        }
        if let Some(time_spent) = &patch.time_spent {
            assignments.push("time_spent = ?");
            bind_values.push(time_spent.map_or(Value::Null, Value::Integer));
        }

        let sql = format!(
            "UPDATE actions
             SET {}, updated_at = datetime('now')
             WHERE id = ?;",
            assignments.join(", ")
        );
        bind_values.push(Value::Text(id.to_string()));

        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn remove(&self, id: ActionId) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM actions WHERE id = ?1;", [id.to_string()])?;
        Ok(())
    }

    fn upsert_many(&self, actions: &[Action]) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for action in actions {
            upsert_action(&tx, action)?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn upsert_action(conn: &Connection, action: &Action) -> RepoResult<()> {
    action.validate()?;

    conn.execute(
        r#"INSERT INTO actions (id, name, notes, completed_at, "order", focused_at, time_spent)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT(id) DO UPDATE SET
               name = excluded.name,
               notes = excluded.notes,
               completed_at = excluded.completed_at,
               "order" = excluded."order",
               focused_at = excluded.focused_at,
               time_spent = excluded.time_spent,
               updated_at = datetime('now');"#,
        params![
            action.id.to_string(),
            action.name.as_str(),
            action.notes.as_deref(),
            action.completed_at.map(format_instant),
            action.order,
            action.focused_at.map(format_instant),
            action.time_spent,
        ],
    )?;
    Ok(())
}

fn parse_action_row(row: &Row<'_>) -> RepoResult<Action> {
    let id_text: String = row.get("id")?;
    let completed_at = row
        .get::<_, Option<String>>("completed_at")?
        .map(|value| parse_instant("actions.completed_at", &value))
        .transpose()?;
    let focused_at = row
        .get::<_, Option<String>>("focused_at")?
        .map(|value| parse_instant("actions.focused_at", &value))
        .transpose()?;

    Ok(Action {
        id: parse_id("actions.id", &id_text)?,
        name: row.get("name")?,
        notes: row.get("notes")?,
        completed_at,
        order: row.get("order")?,
        focused_at,
        time_spent: row.get("time_spent")?,
    })
}

fn optional_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

fn optional_instant(value: Option<DateTime<Utc>>) -> Value {
    value.map_or(Value::Null, |at| Value::Text(format_instant(at)))
}
