//! Service layer: repository pass-through plus not-found translation.

use super::Repository;
use crate::error::AppError;
use crate::executor::Record;

const NOT_FOUND: &str = "Not found";

pub struct CrudService {
    repository: Repository,
}

impl CrudService {
    pub fn new(repository: Repository) -> Self {
        CrudService { repository }
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub async fn create(&self, owner: &str, data: &Record) -> Result<Record, AppError> {
        Ok(self.repository.create(owner, data).await?)
    }

    pub async fn get_by_id(&self, owner: &str, id: &str) -> Result<Record, AppError> {
        self.repository
            .get_by_id(owner, id)
            .await?
            .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
    }

    pub async fn get_by_user_id(&self, owner: &str) -> Result<Vec<Record>, AppError> {
        Ok(self.repository.get_by_user_id(owner).await?)
    }

    pub async fn update(&self, owner: &str, id: &str, data: &Record) -> Result<Record, AppError> {
        self.repository
            .update(owner, id, data)
            .await?
            .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
    }

    pub async fn remove(&self, owner: &str, id: &str) -> Result<(), AppError> {
        if self.repository.remove(owner, id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(NOT_FOUND.into()))
        }
    }
}
