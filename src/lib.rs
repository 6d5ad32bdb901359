//! Schema-driven CRUD engine: one declarative field schema per resource becomes a
//! validated, owner-scoped REST resource backed by PostgreSQL.

pub mod config;
pub mod crud;
pub mod error;
pub mod executor;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod migration;
pub mod model;
pub mod response;
pub mod routes;
pub mod server;
pub mod service;
pub mod sql;
pub mod state;
pub mod testing;

pub use config::{FieldKind, FieldRole, FieldSchema, FieldSpec, ItemSpec, ResourceRegistration, Settings};
pub use crud::Crud;
pub use error::{AppError, ConfigError, StorageError};
pub use executor::{PgExecutor, QueryExecutor, Record};
pub use migration::apply_migrations;
pub use model::{derive, Model, ObjectSchema};
pub use routes::{deploy, shared_layer, Deployment, SharedLayer};
pub use server::{create_app, standard_layers};
pub use state::AppState;
