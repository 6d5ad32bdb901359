#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use crud_engine::config::default_registrations;
use crud_engine::middleware::{AuthKeys, Claims};
use crud_engine::testing::MemoryExecutor;
use crud_engine::{create_app, standard_layers, ResourceRegistration};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const SECRET: &str = "integration-secret-0123456789abcdef";

pub fn token(user: &str) -> String {
    let claims = Claims {
        id: user.to_string(),
        admin: false,
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

pub fn app_with(registrations: &[ResourceRegistration], db: Arc<MemoryExecutor>) -> Router {
    let layers = standard_layers(AuthKeys::from_secret(SECRET), 1024 * 1024);
    create_app(registrations, db, &layers).router
}

/// The built-in catalog behind the standard layers.
pub fn app() -> (Arc<MemoryExecutor>, Router) {
    let db = Arc::new(MemoryExecutor::new());
    let router = app_with(&default_registrations().unwrap(), db.clone());
    (db, router)
}

pub fn user() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(u) = user {
        req = req.header(header::AUTHORIZATION, format!("Bearer {}", token(u)));
    }
    let body = match body {
        Some(v) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
