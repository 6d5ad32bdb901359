//! HTTP handlers for generated resources.

pub mod resource;
pub use resource::ResourceController;
