//! Per-mapping bootstrap policy.

use recordsync_types::Instance;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// Decides whether the bootstrap pass runs and which remote records it may
/// copy into the local store.
pub trait Strategy: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// A passive mapping never creates counterparts; it only reconciles pairs
    /// that are already linked.
    fn is_passive(&self) -> bool {
        false
    }

    /// Called for remote-origin instances about to be created locally.
    fn should_build(&self, _instance: &Instance) -> bool {
        true
    }
}

/// Bootstrap every unlinked record in both directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysStrategy;

impl Strategy for AlwaysStrategy {
    fn name(&self) -> &'static str {
        "always"
    }
}

/// Never bootstrap.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassiveStrategy;

impl Strategy for PassiveStrategy {
    fn name(&self) -> &'static str {
        "passive"
    }

    fn is_passive(&self) -> bool {
        true
    }

    fn should_build(&self, _instance: &Instance) -> bool {
        false
    }
}

/// Skip remote records whose `field` (a remote field name) holds one of
/// `values`, e.g. soft-deleted or draft rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcludeStrategy {
    field: String,
    values: Vec<serde_json::Value>,
}

impl ExcludeStrategy {
    pub fn new(field: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        Self { field: field.into(), values }
    }
}

impl Strategy for ExcludeStrategy {
    fn name(&self) -> &'static str {
        "exclude"
    }

    fn should_build(&self, instance: &Instance) -> bool {
        instance.attribute(&self.field).map_or(true, |value| !self.values.contains(value))
    }
}

/// Serialized form of a strategy in the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    #[default]
    Always,
    Passive,
    Exclude {
        field: String,
        #[serde(default)]
        values: Vec<serde_json::Value>,
    },
}

impl StrategyConfig {
    pub fn build(&self) -> Arc<dyn Strategy> {
        match self {
            Self::Always => Arc::new(AlwaysStrategy),
            Self::Passive => Arc::new(PassiveStrategy),
            Self::Exclude { field, values } => {
                Arc::new(ExcludeStrategy::new(field.clone(), values.clone()))
            },
        }
    }
}
