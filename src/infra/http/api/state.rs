use std::sync::Arc;

use crate::application::manager::SponsorshipManager;
use crate::infra::db::PostgresRepositories;

#[derive(Clone)]
pub struct ApiState {
    pub manager: Arc<SponsorshipManager>,
    /// Absent when running against in-memory repositories.
    pub db: Option<Arc<PostgresRepositories>>,
}

impl ApiState {
    pub fn new(manager: Arc<SponsorshipManager>, db: Option<Arc<PostgresRepositories>>) -> Self {
        Self { manager, db }
    }
}
