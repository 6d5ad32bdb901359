//! Route table for one resource: five bindings, body validation on the writes.

use crate::handlers::resource::{create, get_by_id, get_by_user_id, remove, update, ResourceController};
use crate::middleware::validate_body;
use crate::model::Model;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    GetByUserId,
    Create,
    GetById,
    Update,
    Remove,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteBinding {
    pub method: &'static str,
    pub path: &'static str,
    pub operation: Operation,
}

pub struct RouteTable {
    pub router: Router,
    pub bindings: Vec<RouteBinding>,
}

const BINDINGS: [RouteBinding; 5] = [
    RouteBinding { method: "GET", path: "/", operation: Operation::GetByUserId },
    RouteBinding { method: "POST", path: "/", operation: Operation::Create },
    RouteBinding { method: "GET", path: "/:id", operation: Operation::GetById },
    RouteBinding { method: "PUT", path: "/:id", operation: Operation::Update },
    RouteBinding { method: "DELETE", path: "/:id", operation: Operation::Remove },
];

/// POST validates against the create schema and PUT against the update schema
/// before the controller runs.
pub fn build(controller: Arc<ResourceController>, model: &Model) -> RouteTable {
    let create_schema = Arc::new(model.create.clone());
    let update_schema = Arc::new(model.update.clone());

    let collection = get(get_by_user_id)
        .merge(post(create).layer(from_fn_with_state(create_schema, validate_body)));
    let item = get(get_by_id)
        .delete(remove)
        .merge(put(update).layer(from_fn_with_state(update_schema, validate_body)));

    let router = Router::new()
        .route("/", collection)
        .route("/:id", item)
        .with_state(controller);

    RouteTable {
        router,
        bindings: BINDINGS.to_vec(),
    }
}
