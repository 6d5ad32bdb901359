//! Assembles the full stack for one registration.

use crate::config::ResourceRegistration;
use crate::error::ConfigError;
use crate::executor::QueryExecutor;
use crate::handlers::ResourceController;
use crate::model::{derive, Model};
use crate::routes::{self, RouteTable};
use crate::service::{CrudService, Repository};
use regex::Regex;
use std::sync::{Arc, OnceLock};

fn endpoint_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(/[A-Za-z0-9_-]+)+$").expect("static regex"))
}

pub struct Crud {
    pub model: Model,
    pub controller: Arc<ResourceController>,
    pub routes: RouteTable,
}

impl Crud {
    /// Model, repository, service, controller and routes, in that order.
    pub fn build(
        reg: &ResourceRegistration,
        executor: Arc<dyn QueryExecutor>,
    ) -> Result<Self, ConfigError> {
        if !endpoint_re().is_match(&reg.endpoint) {
            return Err(ConfigError::InvalidEndpoint(reg.endpoint.clone()));
        }
        let model = derive(&reg.schema)?;
        let repository = Repository::build(&reg.table, &reg.key_column, &model, executor)?;
        let controller = ResourceController::new(CrudService::new(repository));
        let routes = routes::build(controller.clone(), &model);
        Ok(Crud {
            model,
            controller,
            routes,
        })
    }
}
