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

//! Canonical structured event names used across `graph-connection`.

// Worker loop and task queue events.
pub const WORKER_SPAWN_OK: &str = "worker_spawn_ok";
pub const WORKER_SPAWN_FAILED: &str = "worker_spawn_failed";
pub const WORKER_STOP_REQUESTED: &str = "worker_stop_requested";
pub const WORKER_STOPPED: &str = "worker_stopped";
pub const WORKER_FATAL: &str = "worker_fatal";
pub const WORKER_ALREADY_STOPPED: &str = "worker_already_stopped";
pub const JOB_FAILED: &str = "job_failed";
pub const JOB_PANICKED: &str = "job_panicked";
pub const JOB_REJECTED_STOPPED: &str = "job_rejected_stopped";

// Connection state machine events.
pub const CONNECT_ATTEMPT: &str = "connect_attempt";
pub const CONNECT_OK: &str = "connect_ok";
pub const CONNECT_FAILED: &str = "connect_failed";
pub const CONNECT_PANICKED: &str = "connect_panicked";
pub const DISCONNECT_START: &str = "disconnect_start";
pub const DISCONNECT_OK: &str = "disconnect_ok";
pub const STATE_CHANGED: &str = "state_changed";
pub const SETTINGS_CHANGED: &str = "settings_changed";
pub const CLIENT_CLOSE_FAILED: &str = "client_close_failed";
pub const CONNECTION_INSTALLED: &str = "connection_installed";

// Topic multiplexing events.
pub const ADVERTISE_SHARED: &str = "advertise_shared";
pub const ADVERTISE_CREATED: &str = "advertise_created";
pub const ADVERTISE_FAILED: &str = "advertise_failed";
pub const ADVERTISE_TYPE_MISMATCH: &str = "advertise_type_mismatch";
pub const UNADVERTISE_RELEASED: &str = "unadvertise_released";
pub const UNADVERTISE_REMOVED: &str = "unadvertise_removed";
pub const UNADVERTISE_UNKNOWN: &str = "unadvertise_unknown";
pub const UNADVERTISE_FAILED: &str = "unadvertise_failed";
pub const PUBLISH_SKIPPED_UNLIVE: &str = "publish_skipped_unlive";
pub const PUBLISH_FAILED: &str = "publish_failed";
pub const SUBSCRIBE_SHARED: &str = "subscribe_shared";
pub const SUBSCRIBE_CREATED: &str = "subscribe_created";
pub const SUBSCRIBE_FAILED: &str = "subscribe_failed";
pub const SUBSCRIBE_TYPE_MISMATCH: &str = "subscribe_type_mismatch";
pub const UNSUBSCRIBE_RELEASED: &str = "unsubscribe_released";
pub const UNSUBSCRIBE_REMOVED: &str = "unsubscribe_removed";
pub const UNSUBSCRIBE_UNKNOWN: &str = "unsubscribe_unknown";
pub const UNSUBSCRIBE_FAILED: &str = "unsubscribe_failed";
pub const FAN_OUT_TYPE_MISMATCH: &str = "fan_out_type_mismatch";

// Reconnect re-establishment events.
pub const REESTABLISH_START: &str = "reestablish_start";
pub const REESTABLISH_OK: &str = "reestablish_ok";
pub const REESTABLISH_FAILED: &str = "reestablish_failed";
pub const REESTABLISH_TIMED_OUT: &str = "reestablish_timed_out";

// Service events.
pub const SERVICE_ADVERTISE_OK: &str = "service_advertise_ok";
pub const SERVICE_ADVERTISE_DUPLICATE: &str = "service_advertise_duplicate";
pub const SERVICE_ADVERTISE_FAILED: &str = "service_advertise_failed";
pub const SERVICE_CALL_NOT_CONNECTED: &str = "service_call_not_connected";
pub const SERVICE_CALL_FAILED: &str = "service_call_failed";
pub const SERVICE_CALL_RESULT_DISCARDED: &str = "service_call_result_discarded";

// Watchdog events.
pub const WATCHDOG_START: &str = "watchdog_start";
pub const WATCHDOG_PROBE_FAILED: &str = "watchdog_probe_failed";
pub const WATCHDOG_MASTER_CHANGED: &str = "watchdog_master_changed";
pub const WATCHDOG_STALE: &str = "watchdog_stale";
pub const WATCHDOG_RECOVERED: &str = "watchdog_recovered";
pub const WATCHDOG_CANCELLED: &str = "watchdog_cancelled";
