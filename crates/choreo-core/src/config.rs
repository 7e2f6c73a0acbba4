//! Configuration - runtime options and deployment environment
//!
//! - `RuntimeConfig`: how the runtime behaves (automatic responses, shutdown, retries)
//! - `EnvConfig`: where the worker runs (subscriptions, Kubernetes metadata)
//!
//! Both read from the process environment; `*_lookup` variants take any
//! lookup function so tests don't touch the real environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::event::DEFAULT_KEPTN_SPEC_VERSION;
use crate::impls::retry::RetryPolicy;
use crate::ports::{EventSubscription, IntegrationMetadata, KubernetesMetadata, RegistrationData};

pub const ENV_AUTOMATIC_RESPONSE: &str = "CHOREO_AUTOMATIC_RESPONSE";
pub const ENV_GRACEFUL_SHUTDOWN: &str = "CHOREO_GRACEFUL_SHUTDOWN";
pub const ENV_SYNC_PROCESSING: &str = "CHOREO_SYNC_PROCESSING";
pub const ENV_SHUTDOWN_GRACE_SECS: &str = "CHOREO_SHUTDOWN_GRACE_SECS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: expected {expected}")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Send `.started` / `.finished` on behalf of handlers.
    pub automatic_event_response: bool,
    /// Track in-flight events and wait for them on shutdown.
    pub graceful_shutdown: bool,
    /// Run each event to completion before taking the next one.
    pub sync_processing: bool,
    /// Wait after cancellation before draining.
    pub shutdown_grace_period: Duration,
    /// `shkeptnspecversion` for events whose parent carries none.
    pub spec_version: String,
    pub retry: RetryPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            automatic_event_response: true,
            graceful_shutdown: true,
            sync_processing: false,
            shutdown_grace_period: Duration::from_secs(5),
            spec_version: DEFAULT_KEPTN_SPEC_VERSION.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `CHOREO_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_lookup(|key| std::env::var(key).ok())
    }

    pub fn apply_lookup<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_AUTOMATIC_RESPONSE) {
            self.automatic_event_response = parse_bool(ENV_AUTOMATIC_RESPONSE, &value)?;
        }
        if let Some(value) = lookup(ENV_GRACEFUL_SHUTDOWN) {
            self.graceful_shutdown = parse_bool(ENV_GRACEFUL_SHUTDOWN, &value)?;
        }
        if let Some(value) = lookup(ENV_SYNC_PROCESSING) {
            self.sync_processing = parse_bool(ENV_SYNC_PROCESSING, &value)?;
        }
        if let Some(value) = lookup(ENV_SHUTDOWN_GRACE_SECS) {
            let secs = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: ENV_SHUTDOWN_GRACE_SECS,
                    value: value.clone(),
                    expected: "a whole number of seconds",
                })?;
            self.shutdown_grace_period = Duration::from_secs(secs);
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks the values no environment variable covers, such as a retry
    /// policy deserialized from a file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            expected: "true or false",
        }),
    }
}

/// Deployment environment of the worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Comma separated event types to subscribe to.
    pub pubsub_topic: String,
    pub k8s_deployment_name: String,
    pub k8s_deployment_version: String,
    pub k8s_namespace: String,
    pub k8s_node_name: String,
    pub k8s_pod_name: String,
    pub location: String,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).unwrap_or_default();
        Self {
            pubsub_topic: get("PUBSUB_TOPIC"),
            k8s_deployment_name: get("K8S_DEPLOYMENT_NAME"),
            k8s_deployment_version: get("K8S_DEPLOYMENT_VERSION"),
            k8s_namespace: get("K8S_NAMESPACE"),
            k8s_node_name: get("K8S_NODE_NAME"),
            k8s_pod_name: get("K8S_POD_NAME"),
            location: get("LOCATION"),
        }
    }

    /// Event types from `pubsub_topic`; empty when unset.
    pub fn subscriptions(&self) -> Vec<String> {
        if self.pubsub_topic.is_empty() {
            return Vec::new();
        }
        self.pubsub_topic.split(',').map(str::to_string).collect()
    }

    pub fn registration_data(&self, name: &str) -> RegistrationData {
        RegistrationData {
            name: name.to_string(),
            metadata: IntegrationMetadata {
                hostname: self.k8s_node_name.clone(),
                integration_version: self.k8s_deployment_version.clone(),
                location: self.location.clone(),
                kubernetes: KubernetesMetadata {
                    namespace: self.k8s_namespace.clone(),
                    pod_name: self.k8s_pod_name.clone(),
                    deployment_name: self.k8s_deployment_name.clone(),
                },
            },
            subscriptions: self
                .subscriptions()
                .into_iter()
                .map(|event| EventSubscription { event })
                .collect(),
        }
    }
}
