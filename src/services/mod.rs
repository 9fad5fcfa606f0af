//! Business logic services

pub mod auth;
pub mod catalog;
pub mod lending;
pub mod readers;

use crate::{config::AuthConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub readers: readers::ReadersService,
    pub lending: lending::LendingService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, auth_config: AuthConfig) -> Self {
        Self {
            auth: auth::AuthService::new(repository.clone(), auth_config),
            catalog: catalog::CatalogService::new(repository.clone()),
            readers: readers::ReadersService::new(repository.clone()),
            lending: lending::LendingService::new(repository),
        }
    }
}
