//! Route generation, deployment, and the common operational routes.

pub mod common;
pub mod deploy;
pub mod resource;

pub use common::common_routes;
pub use deploy::{deploy, shared_layer, Deployment, SharedLayer};
pub use resource::{build, Operation, RouteBinding, RouteTable};
