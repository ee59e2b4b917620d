//! Task template repository contract and SQLite implementation.
//!
//! Unlike action rows, `updated_at` here is part of the read model (the UI
//! surfaces it), so the store stamps it and the repository persists it
//! verbatim instead of relying on `datetime('now')`.

use crate::model::template::{Template, TemplateId};
use crate::repo::{
    ensure_connection_ready, format_instant, parse_id, parse_instant, RepoError, RepoResult,
};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};

const TEMPLATE_COLUMNS: &[&str] = &["id", "name", "notes", "order", "created_at", "updated_at"];

const TEMPLATE_SELECT_SQL: &str = r#"SELECT
    id,
    name,
    notes,
    "order",
    created_at,
    updated_at
FROM task_templates"#;

/// Partial-field update for one template row. `None` leaves the field as is.
#[derive(Debug, Clone, Default)]
pub struct TemplatePatch {
    pub name: Option<String>,
    pub notes: Option<Option<String>>,
    pub order: Option<i64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TemplatePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.notes.is_none()
            && self.order.is_none()
            && self.updated_at.is_none()
    }
}

/// Durable record mapper contract for templates.
pub trait TemplateRepository {
    fn load_all(&self) -> RepoResult<Vec<Template>>;
    fn upsert(&self, template: &Template) -> RepoResult<()>;
    fn patch(&self, id: TemplateId, patch: &TemplatePatch) -> RepoResult<()>;
    fn remove(&self, id: TemplateId) -> RepoResult<()>;
    fn upsert_many(&self, templates: &[Template]) -> RepoResult<()>;
}

/// SQLite-backed template repository.
pub struct SqliteTemplateRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTemplateRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "task_templates", TEMPLATE_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl TemplateRepository for SqliteTemplateRepository<'_> {
    fn load_all(&self) -> RepoResult<Vec<Template>> {
        let mut stmt = self
            .conn
            .prepare(&format!(r#"{TEMPLATE_SELECT_SQL} ORDER BY "order" ASC;"#))?;
        let mut rows = stmt.query([])?;

        let mut templates = Vec::new();
        while let Some(row) = rows.next()? {
            templates.push(parse_template_row(row)?);
        }
        Ok(templates)
    }

    fn upsert(&self, template: &Template) -> RepoResult<()> {
        upsert_template(self.conn, template)
    }

    fn patch(&self, id: TemplateId, patch: &TemplatePatch) -> RepoResult<()> {
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
            bind_values.push(
                notes
                    .as_deref()
                    .map_or(Value::Null, |text| Value::Text(text.to_string())),
            );
        }
        if let Some(order) = patch.order {
            assignments.push(r#""order" = ?"#);
            bind_values.push(Value::Integer(order));
        }
        if let Some(updated_at) = patch.updated_at {
            assignments.push("updated_at = ?");
            bind_values.push(Value::Text(format_instant(updated_at)));
        }

        let sql = format!(
            "UPDATE task_templates SET {} WHERE id = ?;",
            assignments.join(", ")
        );
        bind_values.push(Value::Text(id.to_string()));

        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn remove(&self, id: TemplateId) -> RepoResult<()> {
        self.conn.execute(
            "DELETE FROM task_templates WHERE id = ?1;",
            [id.to_string()],
        )?;
        Ok(())
    }

    fn upsert_many(&self, templates: &[Template]) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for template in templates {
            upsert_template(&tx, template)?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn upsert_template(conn: &Connection, template: &Template) -> RepoResult<()> {
    template.validate()?;

    conn.execute(
        r#"INSERT INTO task_templates (id, name, notes, "order", created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT(id) DO UPDATE SET
               name = excluded.name,
               notes = excluded.notes,
               "order" = excluded."order",
               updated_at = excluded.updated_at;"#,
        params![
            template.id.to_string(),
            template.name.as_str(),
            template.notes.as_deref(),
            template.order,
            format_instant(template.created_at),
            format_instant(template.updated_at),
        ],
    )?;
    Ok(())
}

fn parse_template_row(row: &Row<'_>) -> RepoResult<Template> {
    let id_text: String = row.get("id")?;
    let created_at_text: String = row.get("created_at")?;
    let updated_at_text: String = row.get("updated_at")?;

    Ok(Template {
        id: parse_id("task_templates.id", &id_text)?,
        name: row.get("name")?,
        notes: row.get("notes")?,
        order: row.get("order")?,
        created_at: parse_instant("task_templates.created_at", &created_at_text)?,
        updated_at: parse_instant("task_templates.updated_at", &updated_at_text)?,
    })
}
