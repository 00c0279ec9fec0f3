//! Declarative capability table. Built once at start, read-only afterwards.

use super::bot::Bot;
use super::error::BotResult;
use super::types::Execution;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub type CapabilityFuture<'a> = Pin<Box<dyn Future<Output = BotResult<Execution>> + Send + 'a>>;
pub type CapabilityHandler = Arc<dyn for<'a> Fn(&'a Bot, bool) -> CapabilityFuture<'a> + Send + Sync>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("capability '{0}' is registered more than once")]
    Duplicate(String),

    #[error("capability '{capability}' recomputes through unknown capability '{calculate}'")]
    UnknownCalculation { capability: String, calculate: String },
}

/// A named unit of game behaviour plus the metadata the engine needs to
/// schedule it.
#[derive(Clone)]
pub struct Capability {
    pub name: String,
    pub queueable: bool,
    pub forceable: bool,
    pub calculate_ref: Option<String>,
    pub shortcut: Option<String>,
    pub interval: Option<Duration>,
    pub requires_transition_check: bool,
    pub update_status: bool,
    /// Background jobs are paused while this runs.
    pub exclusive: bool,
    pub tooltip: Option<String>,
    handler: CapabilityHandler,
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("queueable", &self.queueable)
            .field("forceable", &self.forceable)
            .field("calculate_ref", &self.calculate_ref)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl Capability {
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: for<'a> Fn(&'a Bot, bool) -> CapabilityFuture<'a> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            queueable: false,
            forceable: false,
            calculate_ref: None,
            shortcut: None,
            interval: None,
            requires_transition_check: false,
            update_status: true,
            exclusive: false,
            tooltip: None,
            handler: Arc::new(handler),
        }
    }

    /// The `calculate_next_<target>` capability that pushes `target`'s timer
    /// one configured interval into the future.
    pub fn recompute_for(target: &str) -> Self {
        let owned = target.to_string();
        Self::new(format!("calculate_next_{target}"), move |bot, _force| {
            let target = owned.clone();
            Box::pin(async move {
                bot.schedule_next(&target).await;
                Ok(Execution::Performed)
            })
        })
        .queueable()
        .silent()
        .tooltip(format!("Recalculate when {target} runs next."))
    }

    pub fn queueable(mut self) -> Self {
        self.queueable = true;
        self
    }

    /// Forceable, recomputing its timer through `calculate_next_<name>`.
    pub fn timed(mut self) -> Self {
        self.forceable = true;
        self.calculate_ref = Some(format!("calculate_next_{}", self.name));
        self
    }

    pub fn forceable(mut self) -> Self {
        self.forceable = true;
        self
    }

    pub fn shortcut(mut self, combo: &str) -> Self {
        self.shortcut = Some(combo.to_string());
        self
    }

    pub fn every(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn transition(mut self) -> Self {
        self.requires_transition_check = true;
        self
    }

    /// Do not publish this capability as the current activity.
    pub fn silent(mut self) -> Self {
        self.update_status = false;
        self
    }

    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    pub fn tooltip(mut self, text: impl Into<String>) -> Self {
        self.tooltip = Some(text.into());
        self
    }

    pub(crate) fn handler(&self) -> &CapabilityHandler {
        &self.handler
    }

    pub fn info(&self) -> CapabilityInfo {
        CapabilityInfo {
            name: self.name.clone(),
            queueable: self.queueable,
            forceable: self.forceable,
            calculate_ref: self.calculate_ref.clone(),
            shortcut: self.shortcut.clone(),
            interval_seconds: self.interval.map(|d| d.as_secs()),
            requires_transition_check: self.requires_transition_check,
            update_status: self.update_status,
            exclusive: self.exclusive,
            tooltip: self.tooltip.clone(),
        }
    }
}

/// Metadata view of a capability, without the callable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityInfo {
    pub name: String,
    pub queueable: bool,
    pub forceable: bool,
    pub calculate_ref: Option<String>,
    pub shortcut: Option<String>,
    pub interval_seconds: Option<u64>,
    pub requires_transition_check: bool,
    pub update_status: bool,
    pub exclusive: bool,
    pub tooltip: Option<String>,
}

#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Capability>,
    order: Vec<String>,
}

impl CapabilityRegistry {
    /// Build from a table, rejecting duplicate names and dangling
    /// `calculate_ref`s.
    pub fn build(capabilities: impl IntoIterator<Item = Capability>) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for capability in capabilities {
            if registry.capabilities.contains_key(&capability.name) {
                return Err(RegistryError::Duplicate(capability.name));
            }
            registry.order.push(capability.name.clone());
            registry
                .capabilities
                .insert(capability.name.clone(), capability);
        }
        for capability in registry.capabilities.values() {
            if let Some(calculate) = &capability.calculate_ref
                && !registry.capabilities.contains_key(calculate)
            {
                return Err(RegistryError::UnknownCalculation {
                    capability: capability.name.clone(),
                    calculate: calculate.clone(),
                });
            }
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.capabilities.get(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn select(&self, keep: impl Fn(&Capability) -> bool) -> Vec<CapabilityInfo> {
        self.order
            .iter()
            .filter_map(|name| self.capabilities.get(name))
            .filter(|c| keep(c))
            .map(Capability::info)
            .collect()
    }

    pub fn all(&self) -> Vec<CapabilityInfo> {
        self.select(|_| true)
    }

    pub fn shortcuts(&self) -> Vec<CapabilityInfo> {
        self.select(|c| c.shortcut.is_some())
    }

    pub fn queueables(&self, include_forceables: bool) -> Vec<CapabilityInfo> {
        self.select(|c| c.queueable || (include_forceables && c.forceable))
    }

    pub fn forceables(&self) -> Vec<CapabilityInfo> {
        self.select(|c| c.forceable)
    }

    pub fn intervals(&self) -> Vec<CapabilityInfo> {
        self.select(|c| c.interval.is_some())
    }

    /// Timer-gated capabilities: those that recompute their next run.
    pub fn timed(&self) -> Vec<CapabilityInfo> {
        self.select(|c| c.forceable && c.calculate_ref.is_some())
    }

    /// Whether a queued command may target this capability.
    pub fn is_dispatchable(&self, name: &str) -> bool {
        self.get(name).is_some_and(|c| c.queueable || c.forceable)
    }
}
