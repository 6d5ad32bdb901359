//! In-memory `QueryExecutor` for tests and local runs without a database.
//!
//! It understands exactly the statement shapes the SQL builder emits (plus `SELECT 1`
//! and DDL, which are accepted as no-ops) and records every statement it sees, so
//! tests can assert on both behavior and the SQL/parameter pairs that produced it.
//! Output lists are honored: rows come back with exactly the selected columns, and
//! casts in the list are ignored.

use crate::error::StorageError;
use crate::executor::{QueryExecutor, Record};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, OnceLock};
use uuid::Uuid;

const PH: &str = r"\$(\d+)(?:::[A-Za-z0-9_.\[\]]+)?";

struct Patterns {
    insert: Regex,
    select_by_key: Regex,
    select_by_owner: Regex,
    update: Regex,
    set_clause: Regex,
    delete: Regex,
    placeholder: Regex,
    output_column: Regex,
}

fn patterns() -> &'static Patterns {
    static P: OnceLock<Patterns> = OnceLock::new();
    P.get_or_init(|| {
        let re = |s: String| Regex::new(&s).expect("static regex");
        Patterns {
            insert: re(r"^INSERT INTO (\S+) \((.*?)\) VALUES \((.*?)\) RETURNING (.+)$".to_string()),
            select_by_key: re(format!(r"^SELECT (.+?) FROM (\S+) WHERE (\S+) = {PH} AND (\S+) = {PH}$")),
            select_by_owner: re(format!(r"^SELECT (.+?) FROM (\S+) WHERE (\S+) = {PH}$")),
            update: re(format!(
                r"^UPDATE (\S+) SET (.*) WHERE (\S+) = {PH} AND (\S+) = {PH} RETURNING (.+)$"
            )),
            set_clause: re(format!(r#"("[^"]+") = COALESCE\({PH}, "[^"]+"\)"#)),
            delete: re(format!(
                r"^DELETE FROM (\S+) WHERE (\S+) = {PH} AND (\S+) = {PH} RETURNING (\S+)$"
            )),
            placeholder: re(format!("^{PH}$")),
            output_column: re(
                r#"^(?:to_jsonb\()?"([^"]+)"\)?(?:::[A-Za-z0-9_.\[\]]+)?(?: AS "([^"]+)")?$"#.to_string(),
            ),
        }
    })
}

/// A statement seen by the executor, with the parameters it was bound with.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Default)]
struct Inner {
    tables: HashMap<String, Vec<Record>>,
    log: Vec<ExecutedStatement>,
    failure: Option<String>,
}

/// Tables are created on first insert. Missing `id` and `created_at` columns are
/// filled the way the generated DDL defaults would fill them.
#[derive(Default)]
pub struct MemoryExecutor {
    inner: Mutex<Inner>,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every later statement fails with a backend error until cleared.
    pub fn fail_with(&self, message: impl Into<String>) {
        self.lock().failure = Some(message.into());
    }

    pub fn clear_failure(&self) {
        self.lock().failure = None;
    }

    pub fn statements(&self) -> Vec<ExecutedStatement> {
        self.lock().log.clone()
    }

    /// Rows currently stored for `table` (unquoted, e.g. `f0_habits`).
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// Seed a row directly, bypassing the statement layer.
    pub fn insert_row(&self, table: &str, row: Record) {
        self.lock().tables.entry(table.to_string()).or_default().push(row);
    }
}

#[async_trait]
impl QueryExecutor for MemoryExecutor {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>, StorageError> {
        let mut inner = self.lock();
        inner.log.push(ExecutedStatement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        if let Some(message) = &inner.failure {
            return Err(StorageError::Backend(message.clone()));
        }
        execute(&mut inner.tables, sql.trim(), params)
    }
}

fn execute(
    tables: &mut HashMap<String, Vec<Record>>,
    sql: &str,
    params: &[Value],
) -> Result<Vec<Record>, StorageError> {
    let p = patterns();
    let arg = |index: &str| -> Result<Value, StorageError> {
        index
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|n| params.get(n))
            .cloned()
            .ok_or_else(|| StorageError::Backend(format!("missing parameter ${}", index)))
    };

    if sql == "SELECT 1" {
        let mut row = Record::new();
        row.insert("?column?".into(), Value::from(1));
        return Ok(vec![row]);
    }
    if sql.starts_with("CREATE ") || sql.starts_with("ALTER ") {
        return Ok(vec![]);
    }

    if let Some(c) = p.insert.captures(sql) {
        let columns: Vec<String> = c[2].split(", ").map(unquote).collect();
        let values: Vec<&str> = c[3].split(", ").collect();
        if columns.len() != values.len() {
            return Err(StorageError::Backend("column/value count mismatch".into()));
        }
        let mut row = Record::new();
        for (column, value) in columns.into_iter().zip(values) {
            let index = p
                .placeholder
                .captures(value)
                .ok_or_else(|| StorageError::Unsupported(sql.to_string()))?;
            row.insert(column, arg(&index[1])?);
        }
        row.entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        row.entry("created_at").or_insert_with(|| {
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
        });
        let out = project(&row, &c[4])?;
        tables.entry(unquote(&c[1])).or_default().push(row);
        return Ok(vec![out]);
    }

    if let Some(c) = p.select_by_key.captures(sql) {
        let (key, key_value) = (unquote(&c[3]), arg(&c[4])?);
        let (owner, owner_value) = (unquote(&c[5]), arg(&c[6])?);
        let rows = tables.get(&unquote(&c[2])).map(Vec::as_slice).unwrap_or_default();
        return rows
            .iter()
            .filter(|r| matches(r, &key, &key_value) && matches(r, &owner, &owner_value))
            .map(|r| project(r, &c[1]))
            .collect();
    }

    if let Some(c) = p.select_by_owner.captures(sql) {
        let (owner, owner_value) = (unquote(&c[3]), arg(&c[4])?);
        let rows = tables.get(&unquote(&c[2])).map(Vec::as_slice).unwrap_or_default();
        return rows
            .iter()
            .filter(|r| matches(r, &owner, &owner_value))
            .map(|r| project(r, &c[1]))
            .collect();
    }

    if let Some(c) = p.update.captures(sql) {
        let mut sets = Vec::new();
        for s in p.set_clause.captures_iter(&c[2]) {
            sets.push((unquote(&s[1]), arg(&s[2])?));
        }
        let (key, key_value) = (unquote(&c[3]), arg(&c[4])?);
        let (owner, owner_value) = (unquote(&c[5]), arg(&c[6])?);
        let mut updated = Vec::new();
        if let Some(rows) = tables.get_mut(&unquote(&c[1])) {
            for row in rows
                .iter_mut()
                .filter(|r| matches(r, &key, &key_value) && matches(r, &owner, &owner_value))
            {
                for (column, value) in &sets {
                    if !value.is_null() {
                        row.insert(column.clone(), value.clone());
                    }
                }
                updated.push(project(row, &c[7])?);
            }
        }
        return Ok(updated);
    }

    if let Some(c) = p.delete.captures(sql) {
        let (key, key_value) = (unquote(&c[2]), arg(&c[3])?);
        let (owner, owner_value) = (unquote(&c[4]), arg(&c[5])?);
        let returning = unquote(&c[6]);
        let mut removed = Vec::new();
        if let Some(rows) = tables.get_mut(&unquote(&c[1])) {
            rows.retain(|r| {
                let hit = matches(r, &key, &key_value) && matches(r, &owner, &owner_value);
                if hit {
                    let mut out = Record::new();
                    out.insert(returning.clone(), r.get(&returning).cloned().unwrap_or(Value::Null));
                    removed.push(out);
                }
                !hit
            });
        }
        return Ok(removed);
    }

    Err(StorageError::Unsupported(sql.to_string()))
}

/// Shape `row` by an output list. Columns the row lacks come back as null.
fn project(row: &Record, list: &str) -> Result<Record, StorageError> {
    if list.trim() == "*" {
        return Ok(row.clone());
    }
    let p = patterns();
    let mut out = Record::new();
    for item in list.split(", ") {
        let c = p
            .output_column
            .captures(item.trim())
            .ok_or_else(|| StorageError::Unsupported(item.to_string()))?;
        let column = c.get(1).map_or("", |m| m.as_str());
        let alias = c.get(2).map_or(column, |m| m.as_str());
        out.insert(alias.to_string(), row.get(column).cloned().unwrap_or(Value::Null));
    }
    Ok(out)
}

fn unquote(s: &str) -> String {
    s.replace('"', "")
}

fn matches(row: &Record, column: &str, value: &Value) -> bool {
    !value.is_null() && row.get(column) == Some(value)
}
