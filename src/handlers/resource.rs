//! Controller: one handler per operation, identity first, errors to the central mapper.

use crate::error::AppError;
use crate::executor::Record;
use crate::extractors::Identity;
use crate::response::{created, no_content, ok};
use crate::service::CrudService;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

pub struct ResourceController {
    service: CrudService,
}

impl ResourceController {
    pub fn new(service: CrudService) -> Arc<Self> {
        Arc::new(ResourceController { service })
    }

    pub fn service(&self) -> &CrudService {
        &self.service
    }
}

type Controller = State<Arc<ResourceController>>;

pub async fn create(
    State(ctl): Controller,
    Identity(user): Identity,
    Json(body): Json<Record>,
) -> Result<(StatusCode, Json<Record>), AppError> {
    let row = ctl.service.create(&user.id, &body).await?;
    Ok(created(row))
}

pub async fn get_by_id(
    State(ctl): Controller,
    Identity(user): Identity,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Record>), AppError> {
    let row = ctl.service.get_by_id(&user.id, &id).await?;
    Ok(ok(row))
}

pub async fn get_by_user_id(
    State(ctl): Controller,
    Identity(user): Identity,
) -> Result<(StatusCode, Json<Vec<Record>>), AppError> {
    let rows = ctl.service.get_by_user_id(&user.id).await?;
    Ok(ok(rows))
}

pub async fn update(
    State(ctl): Controller,
    Identity(user): Identity,
    Path(id): Path<String>,
    Json(body): Json<Record>,
) -> Result<(StatusCode, Json<Record>), AppError> {
    let row = ctl.service.update(&user.id, &id, &body).await?;
    Ok(ok(row))
}

pub async fn remove(
    State(ctl): Controller,
    Identity(user): Identity,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    ctl.service.remove(&user.id, &id).await?;
    Ok(no_content())
}
