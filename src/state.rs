//! State shared by the common routes.

use crate::executor::QueryExecutor;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<dyn QueryExecutor>,
}

impl AppState {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        AppState { executor }
    }
}
