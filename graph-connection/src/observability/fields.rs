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

//! Canonical structured field keys and value-format helpers.

use std::any::Any;
use std::time::Duration;

pub const EVENT: &str = "event";
pub const COMPONENT: &str = "component";
pub const WORKER_THREAD: &str = "worker_thread";
pub const TOPIC: &str = "topic";
pub const SERVICE: &str = "service";
pub const MSG_TYPE: &str = "msg_type";
pub const PUBLISHER_ID: &str = "publisher_id";
pub const REF_COUNT: &str = "ref_count";
pub const STATE: &str = "state";
pub const REASON: &str = "reason";
pub const ERR: &str = "err";
pub const MASTER_URI: &str = "master_uri";

pub const NONE: &str = "none";
pub const REASON_STOP_REQUESTED: &str = "stop_requested";
pub const REASON_NOT_CONNECTED: &str = "not_connected";
pub const REASON_CALLER_GONE: &str = "caller_gone";
pub const DEFAULT_WORKER_THREAD: &str = "unknown-thread";

pub fn thread_name_or_default(thread_name: Option<&str>) -> String {
    thread_name.unwrap_or(DEFAULT_WORKER_THREAD).to_string()
}

pub fn current_thread_name_or_default() -> String {
    thread_name_or_default(std::thread::current().name())
}

pub fn format_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Renders a caught panic payload for logging.
pub fn format_panic_payload(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
