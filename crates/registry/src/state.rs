use std::collections::HashMap;
use std::sync::Arc;

use action_primitives::{EngineAdapter, EngineError};
use parking_lot::RwLock;
use tracing::{debug, info, warn};
use webpilot_core_types::EngineKind;

use crate::{errors::RegistryError, health::EngineHealth, metrics, model::CleanupReport};

/// Owner of every engine adapter and its health flag.
///
/// The registry is the only writer of the health map; everybody else reads
/// snapshots. It is constructed once at start-up and shared behind an `Arc`.
pub struct EngineRegistry {
    adapters: RwLock<HashMap<EngineKind, Arc<dyn EngineAdapter>>>,
    health: RwLock<HashMap<EngineKind, EngineHealth>>,
    priority: Vec<EngineKind>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::with_priority(EngineKind::CONCRETE.to_vec())
    }

    /// Registry whose automatic selection walks `priority` first. Engines
    /// registered outside that list are tried afterwards in enum order.
    pub fn with_priority(priority: Vec<EngineKind>) -> Self {
        let mut ordered = Vec::with_capacity(priority.len());
        for kind in priority {
            if !kind.is_auto() && !ordered.contains(&kind) {
                ordered.push(kind);
            }
        }
        Self {
            adapters: RwLock::new(HashMap::new()),
            health: RwLock::new(HashMap::new()),
            priority: ordered,
        }
    }

    pub fn register(&self, adapter: Arc<dyn EngineAdapter>) -> Result<(), RegistryError> {
        let kind = adapter.kind();
        if kind.is_auto() {
            return Err(RegistryError::AutoNotRegistrable);
        }
        if self.adapters.write().insert(kind, adapter).is_some() {
            warn!(engine = %kind, "replacing previously registered engine");
        }
        self.health.write().insert(kind, EngineHealth::Unknown);
        metrics::set_engine_health(kind, false);
        debug!(engine = %kind, "engine registered");
        Ok(())
    }

    /// Run each adapter's setup. A failing engine is marked unhealthy and
    /// logged; it never prevents the others from coming up.
    pub async fn initialize(&self, kinds: Option<&[EngineKind]>) -> HashMap<EngineKind, bool> {
        let targets: Vec<(EngineKind, Arc<dyn EngineAdapter>)> = {
            let adapters = self.adapters.read();
            match kinds {
                Some(kinds) => kinds
                    .iter()
                    .filter_map(|kind| match adapters.get(kind) {
                        Some(adapter) => Some((*kind, Arc::clone(adapter))),
                        None => {
                            warn!(engine = %kind, "cannot initialize unregistered engine");
                            None
                        }
                    })
                    .collect(),
                None => adapters
                    .iter()
                    .map(|(kind, adapter)| (*kind, Arc::clone(adapter)))
                    .collect(),
            }
        };

        let mut outcome = HashMap::new();
        for (kind, adapter) in targets {
            let healthy = match adapter.initialize().await {
                Ok(()) => {
                    info!(engine = %kind, "engine initialized");
                    true
                }
                Err(err) => {
                    warn!(engine = %kind, error = %err, "engine initialization failed");
                    false
                }
            };
            self.set_health(
                kind,
                if healthy {
                    EngineHealth::Healthy
                } else {
                    EngineHealth::Unhealthy
                },
            );
            outcome.insert(kind, healthy);
        }
        outcome
    }

    /// Preferred engine when it is healthy, otherwise the first healthy engine
    /// in priority order.
    pub fn select(
        &self,
        preference: EngineKind,
    ) -> Result<(EngineKind, Arc<dyn EngineAdapter>), RegistryError> {
        self.select_excluding(preference, None)
    }

    /// Same as [`select`](Self::select) but never returns `exclude`.
    pub fn select_excluding(
        &self,
        preference: EngineKind,
        exclude: Option<EngineKind>,
    ) -> Result<(EngineKind, Arc<dyn EngineAdapter>), RegistryError> {
        let health = self.health.read();
        let adapters = self.adapters.read();
        let usable = |kind: &EngineKind| {
            Some(*kind) != exclude
                && health.get(kind).copied().unwrap_or_default().is_healthy()
                && adapters.contains_key(kind)
        };

        if !preference.is_auto() && usable(&preference) {
            if let Some(adapter) = adapters.get(&preference) {
                return Ok((preference, Arc::clone(adapter)));
            }
        }

        let mut remaining: Vec<EngineKind> = adapters
            .keys()
            .filter(|kind| !self.priority.contains(kind))
            .copied()
            .collect();
        remaining.sort();

        self.priority
            .iter()
            .chain(remaining.iter())
            .find(|kind| usable(kind))
            .and_then(|kind| adapters.get(kind).map(|adapter| (*kind, Arc::clone(adapter))))
            .ok_or(RegistryError::NoEngineAvailable { preference })
    }

    /// Adapter for `kind` regardless of its health (teardown paths).
    pub fn adapter(&self, kind: EngineKind) -> Result<Arc<dyn EngineAdapter>, RegistryError> {
        self.adapters
            .read()
            .get(&kind)
            .cloned()
            .ok_or(RegistryError::NotRegistered(kind))
    }

    /// Record an adapter failure; only unrecoverable errors change health.
    pub fn report_failure(&self, kind: EngineKind, error: &EngineError) {
        if error.is_unrecoverable() && self.health(kind).is_healthy() {
            warn!(engine = %kind, error = %error, "engine marked unhealthy");
            self.set_health(kind, EngineHealth::Unhealthy);
        }
    }

    pub fn health(&self, kind: EngineKind) -> EngineHealth {
        self.health.read().get(&kind).copied().unwrap_or_default()
    }

    pub fn health_snapshot(&self) -> HashMap<EngineKind, EngineHealth> {
        self.health.read().clone()
    }

    pub fn registered(&self) -> Vec<EngineKind> {
        let mut kinds: Vec<EngineKind> = self.adapters.read().keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn priority(&self) -> &[EngineKind] {
        &self.priority
    }

    /// Release every adapter. Errors are collected, never raised.
    pub async fn shutdown(&self) -> CleanupReport {
        let adapters: Vec<(EngineKind, Arc<dyn EngineAdapter>)> = self
            .adapters
            .read()
            .iter()
            .map(|(kind, adapter)| (*kind, Arc::clone(adapter)))
            .collect();

        let mut report = CleanupReport::default();
        for (kind, adapter) in adapters {
            match adapter.shutdown().await {
                Ok(()) => debug!(engine = %kind, "engine shut down"),
                Err(err) => {
                    warn!(engine = %kind, error = %err, "engine shutdown failed");
                    report.errors.push(format!("{kind}: {err}"));
                }
            }
            self.set_health(kind, EngineHealth::Unhealthy);
        }
        report
    }

    fn set_health(&self, kind: EngineKind, health: EngineHealth) {
        self.health.write().insert(kind, health);
        metrics::set_engine_health(kind, health.is_healthy());
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_primitives::ScriptedEngine;

    async fn registry_with(engines: Vec<ScriptedEngine>) -> EngineRegistry {
        let registry = EngineRegistry::new();
        for engine in engines {
            registry.register(Arc::new(engine)).unwrap();
        }
        registry.initialize(None).await;
        registry
    }

    #[tokio::test]
    async fn registered_engines_start_unknown() {
        let registry = EngineRegistry::new();
        registry
            .register(Arc::new(ScriptedEngine::new(EngineKind::Cdp)))
            .unwrap();
        assert_eq!(registry.health(EngineKind::Cdp), EngineHealth::Unknown);
        assert!(matches!(
            registry.select(EngineKind::Auto),
            Err(RegistryError::NoEngineAvailable { .. })
        ));
    }

    #[tokio::test]
    async fn failed_initialization_does_not_block_others() {
        let registry = registry_with(vec![
            ScriptedEngine::new(EngineKind::Cdp)
                .fail_initialize(EngineError::Initialization("no chrome".into())),
            ScriptedEngine::new(EngineKind::WebDriver),
        ])
        .await;

        assert_eq!(registry.health(EngineKind::Cdp), EngineHealth::Unhealthy);
        assert_eq!(registry.health(EngineKind::WebDriver), EngineHealth::Healthy);
        let (kind, _) = registry.select(EngineKind::Cdp).unwrap();
        assert_eq!(kind, EngineKind::WebDriver);
    }

    #[tokio::test]
    async fn auto_follows_priority_order() {
        let registry = registry_with(vec![
            ScriptedEngine::new(EngineKind::Fetch),
            ScriptedEngine::new(EngineKind::WebDriver),
        ])
        .await;
        let (kind, _) = registry.select(EngineKind::Auto).unwrap();
        assert_eq!(kind, EngineKind::WebDriver);

        let (kind, _) = registry.select(EngineKind::Fetch).unwrap();
        assert_eq!(kind, EngineKind::Fetch);
    }

    #[tokio::test]
    async fn custom_priority_is_respected() {
        let registry = EngineRegistry::with_priority(vec![EngineKind::Fetch, EngineKind::Auto]);
        registry
            .register(Arc::new(ScriptedEngine::new(EngineKind::Cdp)))
            .unwrap();
        registry
            .register(Arc::new(ScriptedEngine::new(EngineKind::Fetch)))
            .unwrap();
        registry.initialize(None).await;

        assert_eq!(registry.priority(), &[EngineKind::Fetch]);
        let (kind, _) = registry.select(EngineKind::Auto).unwrap();
        assert_eq!(kind, EngineKind::Fetch);
        let (kind, _) = registry
            .select_excluding(EngineKind::Auto, Some(EngineKind::Fetch))
            .unwrap();
        assert_eq!(kind, EngineKind::Cdp);
    }

    #[tokio::test]
    async fn only_unrecoverable_failures_flip_health() {
        let registry = registry_with(vec![ScriptedEngine::new(EngineKind::Cdp)]).await;

        registry.report_failure(EngineKind::Cdp, &EngineError::Timeout("slow".into()));
        assert!(registry.health(EngineKind::Cdp).is_healthy());

        registry.report_failure(EngineKind::Cdp, &EngineError::Crashed("gone".into()));
        assert_eq!(registry.health(EngineKind::Cdp), EngineHealth::Unhealthy);

        registry.initialize(Some(&[EngineKind::Cdp])).await;
        assert!(registry.health(EngineKind::Cdp).is_healthy());
    }

    #[test]
    fn auto_cannot_be_registered() {
        let registry = EngineRegistry::new();
        let err = registry
            .register(Arc::new(ScriptedEngine::new(EngineKind::Auto)))
            .unwrap_err();
        assert_eq!(err, RegistryError::AutoNotRegistrable);
    }
}
