//! Builds the owner-scoped INSERT, SELECT, UPDATE and DELETE templates for a resource.
//!
//! Identifiers come only from the validated resource definition; values are always
//! positional parameters. Each template records the slot feeding every placeholder,
//! and the SQL text and slot list are produced by the same push, so statement text
//! and parameter order cannot drift apart.

use crate::config::{FieldKind, FieldRole, FieldSpec};
use crate::error::ConfigError;
use crate::executor::Record;
use crate::model::{is_safe_identifier, is_safe_table_name, Model, ObjectSchema};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from config).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Quote `table` or `schema.table`.
pub fn qualified_table(name: &str) -> String {
    name.split('.').map(quoted).collect::<Vec<_>>().join(".")
}

/// What feeds one placeholder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Slot {
    Owner,
    Key,
    Field(String),
}

#[derive(Clone, Debug)]
pub struct QueryTemplate {
    pub sql: String,
    slots: Vec<Slot>,
}

impl QueryTemplate {
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Positional parameters in placeholder order. Fields missing from `data` bind as null.
    pub fn bind(&self, owner: &str, key: Option<&str>, data: Option<&Record>) -> Vec<Value> {
        self.slots
            .iter()
            .map(|slot| match slot {
                Slot::Owner => Value::String(owner.to_string()),
                Slot::Key => key.map(|k| Value::String(k.to_string())).unwrap_or(Value::Null),
                Slot::Field(name) => data.and_then(|d| d.get(name)).cloned().unwrap_or(Value::Null),
            })
            .collect()
    }
}

struct TemplateBuf {
    slots: Vec<Slot>,
}

impl TemplateBuf {
    fn new() -> Self {
        TemplateBuf { slots: Vec::new() }
    }

    fn push(&mut self, slot: Slot, cast: &str) -> String {
        self.slots.push(slot);
        format!("${}::{}", self.slots.len(), cast)
    }

    fn finish(self, sql: String) -> QueryTemplate {
        QueryTemplate { sql, slots: self.slots }
    }
}

/// The five statements of one resource, built once at startup.
#[derive(Clone, Debug)]
pub struct Statements {
    pub insert: QueryTemplate,
    pub select_by_id: QueryTemplate,
    pub select_by_owner: QueryTemplate,
    pub update: QueryTemplate,
    pub delete: QueryTemplate,
}

struct Columns {
    table: String,
    key: String,
    key_cast: String,
    owner: String,
    owner_cast: String,
    /// Output list shared by SELECT and RETURNING.
    select: String,
}

impl Statements {
    pub fn build(table: &str, key_column: &str, model: &Model) -> Result<Self, ConfigError> {
        if !is_safe_table_name(table) {
            return Err(ConfigError::InvalidIdentifier {
                kind: "table",
                name: table.to_string(),
            });
        }
        if !is_safe_identifier(key_column) {
            return Err(ConfigError::InvalidIdentifier {
                kind: "key column",
                name: key_column.to_string(),
            });
        }
        let owner = model.owner_column();
        if let Some(f) = model.create.get(key_column) {
            return Err(ConfigError::field(&f.name, "collides with the key column"));
        }
        let cast_of = |name: &str| {
            model
                .full
                .get(name)
                .map(|f| f.column_type())
                .unwrap_or_else(|| "uuid".to_string())
        };
        let cols = Columns {
            table: qualified_table(table),
            key: quoted(key_column),
            key_cast: cast_of(key_column),
            owner: quoted(owner),
            owner_cast: cast_of(owner),
            select: select_list(key_column, owner, model),
        };

        Ok(Statements {
            insert: insert(&cols, &model.create),
            select_by_id: select_by_id(&cols),
            select_by_owner: select_by_owner(&cols),
            update: update(&cols, &model.update),
            delete: delete(&cols),
        })
    }
}

/// Key, owner, then every other schema column. Columns with a custom `sql_type` are
/// cast back to the kind's own type so the row decodes like any other.
fn select_list(key: &str, owner: &str, model: &Model) -> String {
    let mut cols = vec![quoted(key)];
    if owner != key {
        cols.push(quoted(owner));
    }
    for f in model.full.fields().filter(|f| f.name != key && f.name != owner) {
        cols.push(select_expr(f));
    }
    cols.join(", ")
}

fn select_expr(f: &FieldSpec) -> String {
    let col = quoted(&f.name);
    if f.sql_type.is_none() {
        return col;
    }
    match f.stored_kind() {
        FieldKind::Array { .. } => format!("to_jsonb({}) AS {}", col, col),
        kind => format!("{}::{} AS {}", col, kind.column_type(), col),
    }
}

/// INSERT: owner first, then every create-schema field in schema order.
fn insert(cols: &Columns, schema: &ObjectSchema) -> QueryTemplate {
    let mut q = TemplateBuf::new();
    let mut names = vec![cols.owner.clone()];
    let mut placeholders = vec![q.push(Slot::Owner, &cols.owner_cast)];
    for f in schema.fields().filter(|f| f.role == FieldRole::Normal) {
        names.push(quoted(&f.name));
        placeholders.push(q.push(Slot::Field(f.name.clone()), &f.column_type()));
    }
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        cols.table,
        names.join(", "),
        placeholders.join(", "),
        cols.select
    );
    q.finish(sql)
}

fn select_by_id(cols: &Columns) -> QueryTemplate {
    let mut q = TemplateBuf::new();
    let key = q.push(Slot::Key, &cols.key_cast);
    let owner = q.push(Slot::Owner, &cols.owner_cast);
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = {} AND {} = {}",
        cols.select, cols.table, cols.key, key, cols.owner, owner
    );
    q.finish(sql)
}

fn select_by_owner(cols: &Columns) -> QueryTemplate {
    let mut q = TemplateBuf::new();
    let owner = q.push(Slot::Owner, &cols.owner_cast);
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        cols.select, cols.table, cols.owner, owner
    );
    q.finish(sql)
}

/// UPDATE: one COALESCE per update-schema field so omitted fields keep their value.
/// With nothing to set this degrades to the owner-scoped select.
fn update(cols: &Columns, schema: &ObjectSchema) -> QueryTemplate {
    if schema.is_empty() {
        return select_by_id(cols);
    }
    let mut q = TemplateBuf::new();
    let sets: Vec<String> = schema
        .fields()
        .map(|f| {
            let col = quoted(&f.name);
            let ph = q.push(Slot::Field(f.name.clone()), &f.column_type());
            format!("{} = COALESCE({}, {})", col, ph, col)
        })
        .collect();
    let key = q.push(Slot::Key, &cols.key_cast);
    let owner = q.push(Slot::Owner, &cols.owner_cast);
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = {} AND {} = {} RETURNING {}",
        cols.table,
        sets.join(", "),
        cols.key,
        key,
        cols.owner,
        owner,
        cols.select
    );
    q.finish(sql)
}

/// DELETE by key and owner. Returns the key so callers can tell whether a row went away.
fn delete(cols: &Columns) -> QueryTemplate {
    let mut q = TemplateBuf::new();
    let key = q.push(Slot::Key, &cols.key_cast);
    let owner = q.push(Slot::Owner, &cols.owner_cast);
    let sql = format!(
        "DELETE FROM {} WHERE {} = {} AND {} = {} RETURNING {}",
        cols.table, cols.key, key, cols.owner, owner, cols.key
    );
    q.finish(sql)
}
