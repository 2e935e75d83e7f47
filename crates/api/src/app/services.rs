use std::sync::Arc;

use cifixer_ai::{AnalysisAgent, RuleBasedAgent};
use cifixer_infra::agent::ProcessAgentBridge;
use cifixer_infra::jobs::{BackendKind, FallbackJobStore, JobOrchestrator};
use cifixer_infra::CiFixerConfig;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppServices {
    pub orchestrator: JobOrchestrator,
    store: Arc<FallbackJobStore>,
}

impl AppServices {
    pub fn new(orchestrator: JobOrchestrator, store: Arc<FallbackJobStore>) -> Self {
        Self { orchestrator, store }
    }

    /// The backend serving jobs (probes on first call).
    pub async fn backend(&self) -> BackendKind {
        self.store.backend_kind().await
    }
}

/// Wire the job store, agent and orchestrator.
///
/// The durable backend is probed here so the degradation warning (if any)
/// is logged at startup rather than on the first request.
pub async fn build_services(config: &CiFixerConfig) -> AppServices {
    let store = Arc::new(FallbackJobStore::new(config.store.clone()));
    let backend = store.backend_kind().await;

    let agent: Arc<dyn AnalysisAgent> = match &config.agent {
        Some(agent) => Arc::new(ProcessAgentBridge::new(agent.clone())),
        None => Arc::new(RuleBasedAgent),
    };

    tracing::info!(
        backend = ?backend,
        agent = agent.name(),
        max_concurrent_agents = ?config.orchestrator.max_concurrent_agents,
        "services wired"
    );

    let orchestrator = JobOrchestrator::new(store.clone(), agent, config.orchestrator.clone());
    AppServices::new(orchestrator, store)
}
