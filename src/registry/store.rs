//! Concurrent service registry.
//!
//! # Responsibilities
//! - Own the name -> descriptor map shared by the health monitor and forwarder
//! - Reject duplicate registrations
//! - Apply health updates as one atomic unit
//!
//! # Design Decisions
//! - Single map behind a reader/writer lock; reads share, writes exclude
//! - Callers get cloned snapshots, never references into the map
//! - No I/O ever happens while the lock is held

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use crate::config::ServiceConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::registry::descriptor::ServiceDescriptor;

/// Shared registry of backend services.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, ServiceDescriptor>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from static configuration.
    ///
    /// A duplicate name is a [`GatewayError::RegistryConflict`]; the gateway
    /// refuses to start on it.
    pub fn from_config(configs: &[ServiceConfig]) -> GatewayResult<Self> {
        let registry = Self::new();
        for config in configs {
            registry.register(
                &config.name,
                ServiceDescriptor::new(&config.name, &config.base_url, &config.health_path),
            )?;
        }
        Ok(registry)
    }

    /// Register a new service. Never overwrites an existing entry.
    pub fn register(&self, name: &str, descriptor: ServiceDescriptor) -> GatewayResult<()> {
        if descriptor.name() != name {
            return Err(GatewayError::Internal(format!(
                "descriptor name '{}' does not match key '{}'",
                descriptor.name(),
                name
            )));
        }

        let mut services = self.services.write();
        if services.contains_key(name) {
            return Err(GatewayError::RegistryConflict(name.to_string()));
        }
        tracing::info!(service = %name, url = %descriptor.base_url, "Service registered");
        services.insert(name.to_string(), descriptor);
        Ok(())
    }

    /// Snapshot of one service.
    pub fn get(&self, name: &str) -> GatewayResult<ServiceDescriptor> {
        self.services
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| GatewayError::ServiceUnknown(name.to_string()))
    }

    /// Record a liveness verdict. No-op for unknown names.
    pub fn update_health(&self, name: &str, healthy: bool, response_time: Duration) {
        let mut services = self.services.write();
        let Some(service) = services.get_mut(name) else {
            tracing::debug!(service = %name, "Health update for unregistered service ignored");
            return;
        };

        service.is_healthy = healthy;
        service.last_checked = Some(SystemTime::now());
        service.last_response_time = response_time;
        if healthy {
            service.success_count += 1;
        } else {
            service.error_count += 1;
        }
    }

    /// Record the outcome of a forwarded call.
    ///
    /// Touches the request counters only; liveness, probe latency and probe
    /// counters belong to [`update_health`](Self::update_health).
    pub fn record_call(&self, name: &str, success: bool) {
        let mut services = self.services.write();
        if let Some(service) = services.get_mut(name) {
            if success {
                service.requests_ok += 1;
            } else {
                service.requests_failed += 1;
            }
        }
    }

    /// Snapshot of every service, sorted by name.
    pub fn list_all(&self) -> Vec<ServiceDescriptor> {
        let mut all: Vec<_> = self.services.read().values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// Remove a service.
    pub fn deregister(&self, name: &str) -> GatewayResult<()> {
        match self.services.write().remove(name) {
            Some(_) => {
                tracing::info!(service = %name, "Service deregistered");
                Ok(())
            }
            None => Err(GatewayError::ServiceUnknown(name.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
