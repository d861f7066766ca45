//! Application state management

use std::sync::Arc;
use uuid::Uuid;

use crate::inference::InferencePool;
use crate::model::InferenceArtifact;

use super::lifecycle::ServingState;
use super::ServerConfig;

/// Application state shared across handlers
#[derive(Debug)]
pub struct AppState {
    pub config: ServerConfig,
    pub pool: InferencePool,
    pub serving: Arc<ServingState>,
}

impl AppState {
    pub fn new(config: ServerConfig, pool: InferencePool) -> Self {
        Self {
            config,
            pool,
            serving: Arc::new(ServingState::new()),
        }
    }

    /// State around an already loaded artifact, with the pool sized from
    /// `config`
    pub fn with_artifact(config: ServerConfig, artifact: Arc<InferenceArtifact>) -> Self {
        let pool = InferencePool::for_artifact(artifact, &config.inference_config());
        Self::new(config, pool)
    }

    pub fn artifact(&self) -> &Arc<InferenceArtifact> {
        self.pool.service().artifact()
    }

    pub fn generate_id() -> String {
        Uuid::new_v4().to_string()[..8].to_string()
    }
}
