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

//! In-process master and node clients for exercising `graph-connection`
//! without a network. Tests drive failure modes (unreachable master, refused
//! registrations, master restarts, hanging advertises) through
//! [`LoopbackGraph`].

mod client;
mod graph;
pub mod messages;

pub use client::LoopbackClient;
pub use graph::{LoopbackGraph, ROSOUT_NODE};
