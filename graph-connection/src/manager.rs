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

use crate::connection::GraphConnection;
use crate::observability::events;
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tracing::{info, warn};

const COMPONENT: &str = "connection_manager";

/// Holder of the one active [`GraphConnection`].
///
/// Owned by the application and passed to whoever needs the connection;
/// there is no process-wide instance.
#[derive(Default)]
pub struct ConnectionManager {
    current: ArcSwapOption<GraphConnection>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `connection` the active one and stops the one it replaces.
    ///
    /// Installing the connection that is already active changes nothing.
    pub fn install(&self, connection: Arc<GraphConnection>) -> Option<Arc<GraphConnection>> {
        let previous = self.current.swap(Some(connection.clone()));
        if let Some(previous) = &previous {
            if Arc::ptr_eq(previous, &connection) {
                return None;
            }
            stop_connection(previous);
        }
        info!(
            event = events::CONNECTION_INSTALLED,
            component = COMPONENT,
            master_uri = connection.settings().master_uri.as_str(),
            "active connection replaced"
        );
        previous
    }

    pub fn current(&self) -> Option<Arc<GraphConnection>> {
        self.current.load_full()
    }

    /// Removes and stops the active connection.
    pub fn clear(&self) -> Option<Arc<GraphConnection>> {
        let previous = self.current.swap(None);
        if let Some(previous) = &previous {
            stop_connection(previous);
        }
        previous
    }
}

fn stop_connection(connection: &GraphConnection) {
    if let Err(err) = connection.stop() {
        warn!(
            event = events::WORKER_STOPPED,
            component = COMPONENT,
            err = %err,
            "replaced connection did not stop cleanly"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionManager;
    use crate::connection::GraphConnection;
    use crate::settings::ConnectionSettings;
    use crate::transport::{NodeClient, NodeClientBuilder, TransportError};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct NoMaster;

    #[async_trait]
    impl NodeClientBuilder for NoMaster {
        async fn connect(
            &self,
            settings: &ConnectionSettings,
        ) -> Result<Arc<dyn NodeClient>, TransportError> {
            Err(TransportError::Unreachable(settings.master_uri.clone()))
        }
    }

    fn connection(master_uri: &str) -> Arc<GraphConnection> {
        let settings = ConnectionSettings::new(master_uri, "localhost", "/viz");
        Arc::new(GraphConnection::new(settings, Arc::new(NoMaster)).expect("connection starts"))
    }

    #[test]
    fn install_stops_the_replaced_connection() {
        let manager = ConnectionManager::new();
        assert!(manager.current().is_none());

        let first = connection("http://first:11311/");
        assert!(manager.install(first.clone()).is_none());
        let replaced = manager
            .install(connection("http://second:11311/"))
            .expect("first was active");

        assert!(Arc::ptr_eq(&replaced, &first));
        assert!(!first.is_running());
        assert_eq!(
            manager.current().map(|current| current.settings().master_uri.clone()),
            Some("http://second:11311/".to_string())
        );
    }

    #[test]
    fn reinstalling_the_active_connection_keeps_it_running() {
        let manager = ConnectionManager::new();
        let active = connection("http://first:11311/");
        manager.install(active.clone());

        assert!(manager.install(active.clone()).is_none());

        let current = manager.current().expect("still active");
        assert!(Arc::ptr_eq(&current, &active));
        assert!(current.is_running());
        manager.clear();
    }

    #[test]
    fn clear_leaves_no_active_connection() {
        let manager = ConnectionManager::new();
        let active = connection("http://first:11311/");
        manager.install(active.clone());

        let cleared = manager.clear().expect("one was active");

        assert!(Arc::ptr_eq(&cleared, &active));
        assert!(manager.current().is_none());
        assert!(!active.is_running());
    }
}
