//! Generated repository and service layers for one resource.

mod crud;
mod repository;

pub use crud::CrudService;
pub use repository::Repository;
