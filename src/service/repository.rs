//! Owner-scoped repository over one table.

use crate::config::FieldKind;
use crate::error::{ConfigError, StorageError};
use crate::executor::{QueryExecutor, Record};
use crate::model::Model;
use crate::sql::{QueryTemplate, Statements};
use std::sync::Arc;
use uuid::Uuid;

/// How path ids are checked before they reach the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyKind {
    Uuid,
    Integer,
    Text,
}

pub struct Repository {
    table: String,
    statements: Statements,
    key_kind: KeyKind,
    executor: Arc<dyn QueryExecutor>,
}

impl Repository {
    /// Prepare the five statements for `table`. Fails on unsafe table or key names.
    pub fn build(
        table: &str,
        key_column: &str,
        model: &Model,
        executor: Arc<dyn QueryExecutor>,
    ) -> Result<Self, ConfigError> {
        let statements = Statements::build(table, key_column, model)?;
        let key_kind = match model.full.get(key_column).map(|f| f.stored_kind()) {
            None | Some(FieldKind::Identifier) => KeyKind::Uuid,
            Some(FieldKind::Integer) => KeyKind::Integer,
            Some(_) => KeyKind::Text,
        };
        Ok(Repository {
            table: table.to_string(),
            statements,
            key_kind,
            executor,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn statements(&self) -> &Statements {
        &self.statements
    }

    /// Canonical form of a path id, or None when it can never match a row.
    pub fn normalize_key(&self, raw: &str) -> Option<String> {
        match self.key_kind {
            KeyKind::Uuid => Uuid::parse_str(raw).ok().map(|u| u.hyphenated().to_string()),
            KeyKind::Integer => raw.parse::<i64>().ok().map(|n| n.to_string()),
            KeyKind::Text => Some(raw.to_string()),
        }
    }

    async fn run(
        &self,
        template: &QueryTemplate,
        owner: &str,
        key: Option<&str>,
        data: Option<&Record>,
    ) -> Result<Vec<Record>, StorageError> {
        let params = template.bind(owner, key, data);
        self.executor.query(&template.sql, &params).await
    }

    pub async fn create(&self, owner: &str, data: &Record) -> Result<Record, StorageError> {
        let mut rows = self.run(&self.statements.insert, owner, None, Some(data)).await?;
        if rows.is_empty() {
            return Err(StorageError::NoRow("insert"));
        }
        Ok(rows.swap_remove(0))
    }

    pub async fn get_by_id(&self, owner: &str, id: &str) -> Result<Option<Record>, StorageError> {
        let Some(key) = self.normalize_key(id) else {
            return Ok(None);
        };
        let rows = self.run(&self.statements.select_by_id, owner, Some(&key), None).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn get_by_user_id(&self, owner: &str) -> Result<Vec<Record>, StorageError> {
        self.run(&self.statements.select_by_owner, owner, None, None).await
    }

    /// Coalescing update: fields absent from `data` keep their stored value.
    pub async fn update(
        &self,
        owner: &str,
        id: &str,
        data: &Record,
    ) -> Result<Option<Record>, StorageError> {
        let Some(key) = self.normalize_key(id) else {
            return Ok(None);
        };
        let rows = self.run(&self.statements.update, owner, Some(&key), Some(data)).await?;
        Ok(rows.into_iter().next())
    }

    /// Returns whether a row was deleted.
    pub async fn remove(&self, owner: &str, id: &str) -> Result<bool, StorageError> {
        let Some(key) = self.normalize_key(id) else {
            return Ok(false);
        };
        let rows = self.run(&self.statements.delete, owner, Some(&key), None).await?;
        Ok(!rows.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldRole, FieldSchema, FieldSpec};
    use crate::model::derive;
    use crate::testing::MemoryExecutor;
    use serde_json::json;

    fn setup() -> (Arc<MemoryExecutor>, Repository) {
        let model = derive(&FieldSchema::new(vec![
            FieldSpec::new("id", FieldKind::Identifier).role(FieldRole::ServerAssigned),
            FieldSpec::new("user_id", FieldKind::Identifier).role(FieldRole::OwnerRef),
            FieldSpec::new("name", FieldKind::String),
            FieldSpec::new("note", FieldKind::String).optional(),
        ]))
        .unwrap();
        let db = Arc::new(MemoryExecutor::new());
        let repo = Repository::build("f0_notes", "id", &model, db.clone()).unwrap();
        (db, repo)
    }

    fn record(v: serde_json::Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn create_binds_missing_optionals_as_null() {
        let (db, repo) = setup();
        let row = repo.create("u1", &record(json!({ "name": "a" }))).await.unwrap();
        assert_eq!(row["user_id"], json!("u1"));
        assert_eq!(row["note"], json!(null));
        assert_eq!(db.statements()[0].params, vec![json!("u1"), json!("a"), json!(null)]);
    }

    #[tokio::test]
    async fn invalid_ids_never_reach_the_store() {
        let (db, repo) = setup();
        assert!(repo.get_by_id("u1", "not-a-uuid").await.unwrap().is_none());
        assert!(repo.update("u1", "42", &Record::new()).await.unwrap().is_none());
        assert!(!repo.remove("u1", "").await.unwrap());
        assert!(db.statements().is_empty());
    }

    #[tokio::test]
    async fn ids_are_canonicalized_before_lookup() {
        let (_db, repo) = setup();
        let row = repo.create("u1", &record(json!({ "name": "a" }))).await.unwrap();
        let id = row["id"].as_str().unwrap().to_uppercase();
        let found = repo.get_by_id("u1", &id).await.unwrap().unwrap();
        assert_eq!(found["name"], json!("a"));
    }

    #[tokio::test]
    async fn storage_errors_propagate() {
        let (db, repo) = setup();
        db.fail_with("constraint violation");
        let err = repo.get_by_user_id("u1").await.unwrap_err();
        assert!(matches!(err, StorageError::Backend(m) if m == "constraint violation"));
    }
}
