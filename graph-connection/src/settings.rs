/********************************************************************************
 * Copyright (c) 2025 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Connection settings and graph-name resolution.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

const DEFAULT_MASTER_URI: &str = "http://localhost:11311/";
const DEFAULT_MY_URI: &str = "localhost";
const DEFAULT_NODE_ID_PREFIX: &str = "/graph_connection_";
const DEFAULT_PROBE_NODE: &str = "/rosout";

/// Invalid settings values.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    EmptyMasterUri,
    EmptyMyUri,
    InvalidNodeId(String),
    ZeroDuration(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyMasterUri => write!(f, "master_uri must not be empty"),
            ConfigError::EmptyMyUri => write!(f, "my_uri must not be empty"),
            ConfigError::InvalidNodeId(node_id) => {
                write!(f, "node_id must be an absolute graph name: {node_id}")
            }
            ConfigError::ZeroDuration(field) => write!(f, "{field} must be greater than zero"),
        }
    }
}

impl Error for ConfigError {}

/// Timing knobs of the worker loop and re-establishment steps.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct TimingSettings {
    pub retry_interval_ms: u64,
    pub wake_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub reestablish_timeout_ms: u64,
    pub service_timeout_ms: u64,
    /// Bound on single advertise, subscribe, publish and teardown calls.
    pub operation_timeout_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            retry_interval_ms: 2000,
            wake_timeout_ms: 2000,
            connect_timeout_ms: 5000,
            reestablish_timeout_ms: 5000,
            service_timeout_ms: 5000,
            operation_timeout_ms: 5000,
        }
    }
}

impl TimingSettings {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn wake_timeout(&self) -> Duration {
        Duration::from_millis(self.wake_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reestablish_timeout(&self) -> Duration {
        Duration::from_millis(self.reestablish_timeout_ms)
    }

    pub fn service_timeout(&self) -> Duration {
        Duration::from_millis(self.service_timeout_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

/// Master liveness probing.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct WatchdogSettings {
    pub enabled: bool,
    pub probe_node: String,
    pub probe_interval_ms: u64,
    pub probe_timeout_ms: u64,
    /// Zero means twice the probe interval.
    pub stale_threshold_ms: u64,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            probe_node: DEFAULT_PROBE_NODE.to_string(),
            probe_interval_ms: 5000,
            probe_timeout_ms: 2000,
            stale_threshold_ms: 0,
        }
    }
}

impl WatchdogSettings {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn stale_threshold(&self) -> Duration {
        if self.stale_threshold_ms == 0 {
            self.probe_interval() * 2
        } else {
            Duration::from_millis(self.stale_threshold_ms)
        }
    }
}

/// Everything needed to (re)establish the node's registration with a master.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConnectionSettings {
    pub master_uri: String,
    /// Address other nodes use to reach this node.
    pub my_uri: String,
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub timing: TimingSettings,
    #[serde(default)]
    pub watchdog: WatchdogSettings,
}

fn default_node_id() -> String {
    format!(
        "{DEFAULT_NODE_ID_PREFIX}{}",
        uuid::Uuid::new_v4().simple()
    )
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            master_uri: DEFAULT_MASTER_URI.to_string(),
            my_uri: DEFAULT_MY_URI.to_string(),
            node_id: default_node_id(),
            namespace: String::new(),
            timing: TimingSettings::default(),
            watchdog: WatchdogSettings::default(),
        }
    }
}

impl ConnectionSettings {
    pub fn new(master_uri: &str, my_uri: &str, node_id: &str) -> Self {
        Self {
            master_uri: master_uri.to_string(),
            my_uri: my_uri.to_string(),
            node_id: node_id.to_string(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.master_uri.trim().is_empty() {
            return Err(ConfigError::EmptyMasterUri);
        }
        if self.my_uri.trim().is_empty() {
            return Err(ConfigError::EmptyMyUri);
        }
        if !self.node_id.starts_with('/') || self.node_id.len() < 2 {
            return Err(ConfigError::InvalidNodeId(self.node_id.clone()));
        }
        let durations = [
            ("timing.retry_interval_ms", self.timing.retry_interval_ms),
            ("timing.wake_timeout_ms", self.timing.wake_timeout_ms),
            ("timing.connect_timeout_ms", self.timing.connect_timeout_ms),
            (
                "timing.reestablish_timeout_ms",
                self.timing.reestablish_timeout_ms,
            ),
            ("timing.service_timeout_ms", self.timing.service_timeout_ms),
            ("timing.operation_timeout_ms", self.timing.operation_timeout_ms),
            ("watchdog.probe_interval_ms", self.watchdog.probe_interval_ms),
            ("watchdog.probe_timeout_ms", self.watchdog.probe_timeout_ms),
        ];
        if let Some((field, _)) = durations.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::ZeroDuration(field));
        }
        Ok(())
    }

    /// Resolves a topic or service name against the node namespace.
    ///
    /// Absolute names are kept, `~name` becomes private to the node and any
    /// other name is placed under the namespace.
    pub fn resolve_name(&self, name: &str) -> String {
        if name.starts_with('/') {
            return name.to_string();
        }
        if let Some(private) = name.strip_prefix('~') {
            let private = private.trim_start_matches('/');
            return format!("{}/{}", self.node_id.trim_end_matches('/'), private);
        }
        let namespace = self.namespace.trim_matches('/');
        if namespace.is_empty() {
            format!("/{name}")
        } else {
            format!("/{namespace}/{name}")
        }
    }
}
