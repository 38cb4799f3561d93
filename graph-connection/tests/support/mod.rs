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

use graph_connection::{ConnectionEvent, ConnectionSettings, ConnectionState, GraphConnection};
use loopback_graph::LoopbackGraph;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tokio::time::{sleep, timeout, Instant};
use tracing_subscriber::EnvFilter;

const WAIT_LIMIT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub(crate) fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Millisecond-scale timing so reconnect cycles finish quickly.
pub(crate) fn fast_settings(node_id: &str) -> ConnectionSettings {
    let mut settings = ConnectionSettings::new("loopback://master", "loopback://node", node_id);
    settings.timing.retry_interval_ms = 20;
    settings.timing.wake_timeout_ms = 10;
    settings.timing.connect_timeout_ms = 500;
    settings.timing.reestablish_timeout_ms = 200;
    settings.timing.service_timeout_ms = 500;
    settings.timing.operation_timeout_ms = 200;
    settings.watchdog.probe_interval_ms = 50;
    settings.watchdog.probe_timeout_ms = 40;
    settings.watchdog.stale_threshold_ms = 1000;
    settings
}

pub(crate) fn make_connection(
    graph: &Arc<LoopbackGraph>,
    settings: ConnectionSettings,
) -> Arc<GraphConnection> {
    Arc::new(
        GraphConnection::new(settings, graph.builder()).expect("connection should start"),
    )
}

pub(crate) async fn wait_until<F>(what: &str, condition: F)
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + WAIT_LIMIT;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        sleep(POLL_INTERVAL).await;
    }
}

pub(crate) async fn wait_connected(connection: &GraphConnection) {
    wait_until("connected state", || {
        connection.state() == ConnectionState::Connected
    })
    .await;
}

/// Waits until every job queued so far has run.
pub(crate) async fn settle(connection: &GraphConnection) {
    connection.report().await.expect("worker should be running");
}

/// State changes received until `last` arrives.
#[allow(dead_code)]
pub(crate) async fn states_until(
    events: &mut Receiver<ConnectionEvent>,
    last: ConnectionState,
) -> Vec<ConnectionState> {
    let mut states = Vec::new();
    loop {
        let event = match timeout(WAIT_LIMIT, events.recv()).await {
            Ok(Ok(event)) => event,
            Ok(Err(RecvError::Lagged(_))) => continue,
            Ok(Err(RecvError::Closed)) => panic!("event channel closed after {states:?}"),
            Err(_) => panic!("no {last} state after {states:?}"),
        };
        if let ConnectionEvent::StateChanged(state) = event {
            states.push(state);
            if state == last {
                return states;
            }
        }
    }
}

/// Every event already delivered, without waiting.
#[allow(dead_code)]
pub(crate) fn drain_events(events: &mut Receiver<ConnectionEvent>) -> Vec<ConnectionEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
