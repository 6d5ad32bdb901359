//! Server assembly: shared layers, deployment, common routes, and the serve loop.

use crate::config::{default_registrations, load_registrations, ResourceRegistration, Settings};
use crate::error;
use crate::executor::{PgExecutor, QueryExecutor};
use crate::middleware::{authenticate, AuthKeys};
use crate::migration::apply_migrations;
use crate::routes::{common_routes, deploy, shared_layer, Deployment, SharedLayer};
use crate::state::AppState;
use axum::middleware::from_fn_with_state;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Body limit first, then bearer authentication.
pub fn standard_layers(keys: Arc<AuthKeys>, body_limit: usize) -> Vec<SharedLayer> {
    vec![
        shared_layer(RequestBodyLimitLayer::new(body_limit)),
        shared_layer(from_fn_with_state(keys, authenticate)),
    ]
}

/// Deploy every registration and add the common routes and request tracing.
pub fn create_app(
    registrations: &[ResourceRegistration],
    executor: Arc<dyn QueryExecutor>,
    layers: &[SharedLayer],
) -> Deployment {
    let deployment = deploy(registrations, executor.clone(), layers);
    let router = deployment
        .router
        .merge(common_routes(AppState::new(executor)))
        .layer(TraceLayer::new_for_http());
    Deployment { router, ..deployment }
}

/// Connect, optionally migrate, deploy, and serve until Ctrl-C or SIGTERM.
pub async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    error::set_environment(settings.environment);

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;
    let executor: Arc<dyn QueryExecutor> = Arc::new(PgExecutor::new(pool));

    let registrations = match &settings.resources_path {
        Some(path) => load_registrations(path).await?,
        None => default_registrations()?,
    };
    tracing::info!(count = registrations.len(), "resource registrations loaded");

    if settings.auto_migrate {
        let report = apply_migrations(executor.as_ref(), &registrations).await;
        tracing::info!(
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            "migrations finished"
        );
    }

    let layers = standard_layers(AuthKeys::from_secret(&settings.jwt_secret), settings.body_limit);
    let deployment = create_app(&registrations, executor, &layers);
    if !deployment.failed.is_empty() {
        tracing::warn!(
            failed = deployment.failed.len(),
            mounted = deployment.mounted.len(),
            "some resources were not deployed"
        );
    }

    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, deployment.router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
