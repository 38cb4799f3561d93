/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
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

use graph_connection::ConnectionSettings;
use serde::{Deserialize, Serialize};

const DEFAULT_LINGER_MS: u64 = 1000;

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub(crate) connection: ConnectionSettings,
    #[serde(default)]
    pub(crate) publish: Vec<PublishConfig>,
    #[serde(default)]
    pub(crate) subscribe: Vec<String>,
    #[serde(default = "default_linger_ms")]
    pub(crate) linger_ms: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct PublishConfig {
    pub(crate) topic: String,
    pub(crate) messages: Vec<String>,
}

fn default_linger_ms() -> u64 {
    DEFAULT_LINGER_MS
}
