use std::sync::Arc;

use caseforge_agent::AgentDeps;
use caseforge_core::config::GatewayConfig;

/// Shared state for HTTP handlers.
pub struct AppState {
    pub config: GatewayConfig,
    pub deps: Arc<AgentDeps>,
}
