//! Wiring of engines, planner and executor from a [`Config`].

use std::sync::Arc;
use std::time::Duration;

use action_flow::{
    Executor, ExecutorConfig, HeuristicVerifier, Orchestrator, RetryPolicy,
};
use action_primitives::{EngineAdapter, FetchEngine, ScriptedEngine};
use agent_core::{Planner, PlannerConfig, StaticReasoningProvider};
use anyhow::{Context, Result};
use tracing::{info, warn};
use webpilot_core_types::EngineKind;
use webpilot_registry::{Dispatcher, EngineRegistry, SessionManager};

use crate::config::Config;

/// Page served by every engine in dry-run mode.
const DRY_RUN_MARKUP: &str = "<html><head><title>WebPilot dry run</title></head>\
<body><h1>Dry run</h1><a href=\"/next\">Next</a><button id=\"go\">Go</button>\
<form><input name=\"q\"></form></body></html>";

#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Register scripted engines instead of real backends.
    pub dry_run: bool,
    /// Reasoning answer to plan from, typically read from a plan file.
    pub reasoning_response: Option<String>,
}

pub struct AppContext {
    config: Config,
    registry: Arc<EngineRegistry>,
    orchestrator: Orchestrator,
}

impl AppContext {
    pub async fn build(config: Config, options: AppOptions) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let registry = Arc::new(EngineRegistry::with_priority(
            config.engines.priority.clone(),
        ));
        for adapter in engines_for(&config, options.dry_run) {
            registry
                .register(adapter)
                .context("Failed to register engine")?;
        }
        let health = registry.initialize(None).await;
        for (engine, healthy) in &health {
            if !healthy {
                warn!(engine = %engine, "engine failed to initialize");
            }
        }
        info!(
            engines = ?registry.registered(),
            dry_run = options.dry_run,
            "engine registry ready"
        );

        let sessions = Arc::new(SessionManager::new(
            registry.clone(),
            config.session_options(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(registry.clone(), sessions));
        let verifier = HeuristicVerifier::with_threshold(config.verifier.success_threshold)
            .context("Invalid verifier threshold")?;
        let executor = Executor::new(
            dispatcher,
            ExecutorConfig {
                retry: RetryPolicy::new(config.executor.retry_backoff_ms),
            },
        )
        .with_verifier(Arc::new(verifier));

        let mut planner = Planner::new(PlannerConfig {
            max_steps: config.planner.max_steps,
            default_timeout_ms: config.executor.default_timeout_ms,
            default_max_retries: config.executor.default_max_retries,
            settle_ms: config.planner.settle_ms,
        });
        if let Some(response) = options.reasoning_response {
            planner = planner.with_reasoning(Arc::new(StaticReasoningProvider::text(response)));
        }

        Ok(Self {
            config,
            registry,
            orchestrator: Orchestrator::new(planner, executor),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<EngineRegistry> {
        &self.registry
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }
}

fn engines_for(config: &Config, dry_run: bool) -> Vec<Arc<dyn EngineAdapter>> {
    if dry_run {
        return config
            .engines
            .priority
            .iter()
            .map(|kind| {
                Arc::new(ScriptedEngine::new(*kind).with_markup(DRY_RUN_MARKUP))
                    as Arc<dyn EngineAdapter>
            })
            .collect();
    }
    let mut engines: Vec<Arc<dyn EngineAdapter>> = Vec::new();
    for kind in &config.engines.priority {
        match kind {
            EngineKind::Fetch => engines.push(Arc::new(FetchEngine::new(Duration::from_millis(
                config.engines.fetch_timeout_ms,
            )))),
            other => warn!(engine = %other, "no built-in backend for engine; skipping"),
        }
    }
    engines
}
