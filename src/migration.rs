//! Table DDL for registered resources. Idempotent (`IF NOT EXISTS`), applied at startup
//! when `AUTO_MIGRATE` is set.

use crate::config::{FieldKind, FieldRole, FieldSpec, ResourceRegistration};
use crate::error::{AppError, ConfigError};
use crate::executor::QueryExecutor;
use crate::model::{derive, is_safe_table_name};
use crate::sql::{qualified_table, quoted};

/// Outcome of a migration pass.
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub applied: Vec<String>,
    pub skipped: Vec<(String, AppError)>,
}

/// DDL statements for one registration: the schema (when qualified), then the table.
pub fn create_table_sql(reg: &ResourceRegistration) -> Result<Vec<String>, ConfigError> {
    if !is_safe_table_name(&reg.table) {
        return Err(ConfigError::InvalidIdentifier {
            kind: "table",
            name: reg.table.clone(),
        });
    }
    let model = derive(&reg.schema)?;
    let owner = model.owner_column();

    let mut defs = vec![key_column_def(&reg.key_column, reg.schema.get(&reg.key_column))];
    if owner != reg.key_column {
        let typ = reg
            .schema
            .get(owner)
            .map(FieldSpec::column_type)
            .unwrap_or_else(|| "uuid".to_string());
        defs.push(format!("{} {} NOT NULL", quoted(owner), typ));
    }
    for f in reg.schema.fields() {
        if f.name == reg.key_column || f.name == owner {
            continue;
        }
        defs.push(column_def(f));
    }

    let mut out = Vec::with_capacity(2);
    if let Some((schema, _)) = reg.table.split_once('.') {
        out.push(format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(schema)));
    }
    out.push(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        qualified_table(&reg.table),
        defs.join(",\n  ")
    ));
    Ok(out)
}

fn key_column_def(name: &str, spec: Option<&FieldSpec>) -> String {
    let kind = spec.map(FieldSpec::stored_kind).unwrap_or(FieldKind::Identifier);
    let tail = match kind {
        FieldKind::Identifier => "uuid PRIMARY KEY DEFAULT gen_random_uuid()".to_string(),
        FieldKind::Integer => "int8 GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY".to_string(),
        _ => format!("{} PRIMARY KEY", spec.map(FieldSpec::column_type).unwrap_or_default()),
    };
    format!("{} {}", quoted(name), tail)
}

fn column_def(f: &FieldSpec) -> String {
    let mut def = format!("{} {}", quoted(&f.name), f.column_type());
    match f.role {
        FieldRole::ServerAssigned => match f.stored_kind() {
            FieldKind::Timestamp => def.push_str(" NOT NULL DEFAULT now()"),
            FieldKind::Identifier => def.push_str(" DEFAULT gen_random_uuid()"),
            _ => {}
        },
        _ if !f.optional && f.default.is_none() => def.push_str(" NOT NULL"),
        _ => {}
    }
    def
}

/// Create missing tables. A registration that fails is logged and skipped.
pub async fn apply_migrations(
    executor: &dyn QueryExecutor,
    registrations: &[ResourceRegistration],
) -> MigrationReport {
    let mut report = MigrationReport::default();
    for reg in registrations {
        match migrate_one(executor, reg).await {
            Ok(()) => {
                tracing::info!(table = %reg.table, "table ready");
                report.applied.push(reg.table.clone());
            }
            Err(e) => {
                tracing::error!(table = %reg.table, error = %e, "migration skipped");
                report.skipped.push((reg.table.clone(), e));
            }
        }
    }
    report
}

async fn migrate_one(executor: &dyn QueryExecutor, reg: &ResourceRegistration) -> Result<(), AppError> {
    for sql in create_table_sql(reg)? {
        executor.query(&sql, &[]).await?;
    }
    Ok(())
}
