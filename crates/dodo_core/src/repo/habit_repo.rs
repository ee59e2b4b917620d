//! Habit repository contract and SQLite implementation.
//!
//! Entries are persisted as a JSON array of `YYYY-MM-DD` day strings in the
//! `entries` column, matching the calendar-day granularity of the model.

use crate::model::habit::{Habit, HabitId};
use crate::repo::{
    ensure_connection_ready, format_instant, parse_id, parse_instant, RepoError, RepoResult,
};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::collections::BTreeSet;

const HABIT_COLUMNS: &[&str] = &["id", "name", "entries", "created_at", "order"];

const HABIT_SELECT_SQL: &str = r#"SELECT
    id,
    name,
    entries,
    created_at,
    "order"
FROM habits"#;

/// Partial-field update for one habit row. `None` leaves the field as is.
#[derive(Debug, Clone, Default)]
pub struct HabitPatch {
    pub name: Option<String>,
    pub entries: Option<BTreeSet<NaiveDate>>,
    pub order: Option<i64>,
}

impl HabitPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.entries.is_none() && self.order.is_none()
    }
}

/// Durable record mapper contract for habits.
pub trait HabitRepository {
    fn load_all(&self) -> RepoResult<Vec<Habit>>;
    fn upsert(&self, habit: &Habit) -> RepoResult<()>;
    fn patch(&self, id: HabitId, patch: &HabitPatch) -> RepoResult<()>;
    fn remove(&self, id: HabitId) -> RepoResult<()>;
    fn upsert_many(&self, habits: &[Habit]) -> RepoResult<()>;
}

/// SQLite-backed habit repository.
pub struct SqliteHabitRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteHabitRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "habits", HABIT_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl HabitRepository for SqliteHabitRepository<'_> {
    fn load_all(&self) -> RepoResult<Vec<Habit>> {
        let mut stmt = self
            .conn
            .prepare(&format!(r#"{HABIT_SELECT_SQL} ORDER BY "order" ASC;"#))?;
        let mut rows = stmt.query([])?;

        let mut habits = Vec::new();
        while let Some(row) = rows.next()? {
            habits.push(parse_habit_row(row)?);
        }
        Ok(habits)
    }

    fn upsert(&self, habit: &Habit) -> RepoResult<()> {
        upsert_habit(self.conn, habit)
    }

    fn patch(&self, id: HabitId, patch: &HabitPatch) -> RepoResult<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut assignments: Vec<&'static str> = Vec::new();
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(name) = &patch.name {
            assignments.push("name = ?");
            bind_values.push(Value::Text(name.clone()));
        }
        if let Some(entries) = &patch.entries {
            assignments.push("entries = ?");
            bind_values.push(Value::Text(encode_entries(entries)?));
        }
        if let Some(order) = patch.order {
            assignments.push(r#""order" = ?"#);
            bind_values.push(Value::Integer(order));
        }

        let sql = format!(
            "UPDATE habits
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

    fn remove(&self, id: HabitId) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM habits WHERE id = ?1;", [id.to_string()])?;
        Ok(())
    }

    fn upsert_many(&self, habits: &[Habit]) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for habit in habits {
            upsert_habit(&tx, habit)?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn upsert_habit(conn: &Connection, habit: &Habit) -> RepoResult<()> {
    habit.validate()?;

    conn.execute(
        r#"INSERT INTO habits (id, name, entries, created_at, "order")
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT(id) DO UPDATE SET
               name = excluded.name,
               entries = excluded.entries,
               "order" = excluded."order",
               updated_at = datetime('now');"#,
        params![
            habit.id.to_string(),
            habit.name.as_str(),
            encode_entries(&habit.entries)?,
            format_instant(habit.created_at),
            habit.order,
        ],
    )?;
    Ok(())
}

fn parse_habit_row(row: &Row<'_>) -> RepoResult<Habit> {
    let id_text: String = row.get("id")?;
    let entries_text: String = row.get("entries")?;
    let created_at_text: String = row.get("created_at")?;

    Ok(Habit {
        id: parse_id("habits.id", &id_text)?,
        name: row.get("name")?,
        entries: decode_entries(&entries_text)?,
        created_at: parse_instant("habits.created_at", &created_at_text)?,
        order: row.get("order")?,
    })
}

fn encode_entries(entries: &BTreeSet<NaiveDate>) -> RepoResult<String> {
    serde_json::to_string(entries)
        .map_err(|err| RepoError::InvalidData(format!("unencodable habit entries: {err}")))
}

fn decode_entries(value: &str) -> RepoResult<BTreeSet<NaiveDate>> {
    serde_json::from_str(value).map_err(|_| {
        RepoError::InvalidData(format!("invalid entries payload `{value}` in habits.entries"))
    })
}
