//! Registry/deployer: one stack per registration, mounted at its endpoint.

use crate::config::ResourceRegistration;
use crate::crud::Crud;
use crate::error::ConfigError;
use crate::executor::QueryExecutor;
use axum::{
    extract::Request,
    response::IntoResponse,
    routing::Route,
    Router,
};
use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;
use tower::{Layer, Service};

/// Middleware applied ahead of every route of each deployed resource.
pub type SharedLayer = Arc<dyn Fn(Router) -> Router + Send + Sync>;

/// Wrap any tower layer usable with `Router::layer`.
pub fn shared_layer<L>(layer: L) -> SharedLayer
where
    L: Layer<Route> + Clone + Send + Sync + 'static,
    L::Service: Service<Request> + Clone + Send + Sync + 'static,
    <L::Service as Service<Request>>::Response: IntoResponse + 'static,
    <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
    <L::Service as Service<Request>>::Future: Send + 'static,
{
    Arc::new(move |router: Router| router.layer(layer.clone()))
}

pub struct Deployment {
    pub router: Router,
    pub mounted: Vec<String>,
    /// Endpoint (or table when the endpoint itself is the problem) and the reason it was skipped.
    pub failed: Vec<(String, ConfigError)>,
}

/// Build and mount every registration in order. A registration that fails to build
/// is logged and skipped; the others still mount.
pub fn deploy(
    registrations: &[ResourceRegistration],
    executor: Arc<dyn QueryExecutor>,
    layers: &[SharedLayer],
) -> Deployment {
    let mut router = Router::new();
    let mut mounted = Vec::new();
    let mut failed = Vec::new();
    let mut seen = HashSet::new();

    for reg in registrations {
        let built = if seen.contains(reg.endpoint.as_str()) {
            Err(ConfigError::DuplicateEndpoint(reg.endpoint.clone()))
        } else {
            Crud::build(reg, executor.clone())
        };
        let crud = match built {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(endpoint = %reg.endpoint, table = %reg.table, error = %e, "skipping resource");
                failed.push((reg.endpoint.clone(), e));
                continue;
            }
        };

        let mut table = crud.routes.router;
        // first layer in the list runs first, so it has to be applied last
        for layer in layers.iter().rev() {
            table = layer(table);
        }
        router = router.nest(&reg.endpoint, table);
        seen.insert(reg.endpoint.as_str());
        tracing::info!(
            endpoint = %reg.endpoint,
            table = %reg.table,
            routes = crud.routes.bindings.len(),
            "resource mounted"
        );
        mounted.push(reg.endpoint.clone());
    }

    Deployment { router, mounted, failed }
}
