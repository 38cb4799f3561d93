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

//! Application-facing connection: typed handles in, worker jobs out.

use crate::actor::connection_actor::{ActorError, ActorOptions, ConnectionActor};
use crate::actor::connection_state::{ConnectionEvent, ConnectionState};
use crate::diagnostics::ConnectionReport;
use crate::handles::{Listener, Sender};
use crate::message::{downcast_message, Message, TypedMessage};
use crate::multiplexer::graph_multiplexer::GraphMultiplexer;
use crate::multiplexer::service_table::{AdvertisedService, ServiceCallError};
use crate::observability::{events, fields};
use crate::runtime::task_queue::JobResult;
use crate::settings::ConnectionSettings;
use crate::transport::{NodeClientBuilder, ServiceHandler, TopicInfo};
use arc_swap::ArcSwap;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const COMPONENT: &str = "graph_connection";

/// One logical connection to a master, shared by any number of threads.
///
/// Every method that touches the network queues a job for the connection
/// worker and returns without waiting for it. Jobs run in the order they were
/// queued, so publishing right after advertising on the same thread is safe.
pub struct GraphConnection {
    actor: ConnectionActor<GraphMultiplexer>,
    settings: Arc<ArcSwap<ConnectionSettings>>,
}

impl GraphConnection {
    /// Starts the connection worker. Reconnecting is off until
    /// [`GraphConnection::set_keep_reconnecting`] turns it on.
    pub fn new(
        settings: ConnectionSettings,
        builder: Arc<dyn NodeClientBuilder>,
    ) -> Result<Self, ActorError> {
        settings.validate().map_err(ActorError::InvalidSettings)?;
        let options = ActorOptions {
            retry_interval: settings.timing.retry_interval(),
            wake_timeout: settings.timing.wake_timeout(),
            ..ActorOptions::default()
        };
        let settings = Arc::new(ArcSwap::from_pointee(settings));
        let multiplexer = GraphMultiplexer::new(settings.clone(), builder);
        let actor = ConnectionActor::spawn(multiplexer, options)?;
        Ok(Self { actor, settings })
    }

    pub fn settings(&self) -> Arc<ConnectionSettings> {
        self.settings.load_full()
    }

    pub fn set_master_uri(&self, master_uri: &str) {
        self.update_settings("master_uri", |settings| {
            settings.master_uri = master_uri.to_string();
        });
    }

    pub fn set_my_uri(&self, my_uri: &str) {
        self.update_settings("my_uri", |settings| {
            settings.my_uri = my_uri.to_string();
        });
    }

    pub fn set_node_id(&self, node_id: &str) {
        self.update_settings("node_id", |settings| {
            settings.node_id = node_id.to_string();
        });
    }

    pub fn set_namespace(&self, namespace: &str) {
        self.update_settings("namespace", |settings| {
            settings.namespace = namespace.to_string();
        });
    }

    /// Applies `update` and forces a reconnect when anything changed.
    fn update_settings<F>(&self, field: &'static str, update: F)
    where
        F: Fn(&mut ConnectionSettings),
    {
        let previous = self.settings.rcu(|current| {
            let mut next = ConnectionSettings::clone(current);
            update(&mut next);
            next
        });
        let current = self.settings.load_full();
        if *previous == *current {
            return;
        }
        info!(
            event = events::SETTINGS_CHANGED,
            component = COMPONENT,
            field,
            master_uri = current.master_uri.as_str(),
            node_id = current.node_id.as_str(),
            "connection settings changed; reconnecting"
        );
        self.actor.disconnect();
    }

    pub fn set_keep_reconnecting(&self, keep_reconnecting: bool) {
        self.actor.set_keep_reconnecting(keep_reconnecting);
    }

    pub fn keep_reconnecting(&self) -> bool {
        self.actor.keep_reconnecting()
    }

    pub fn state(&self) -> ConnectionState {
        self.actor.state()
    }

    /// `true` while the master stops answering liveness probes.
    pub fn master_warning(&self) -> bool {
        self.actor.master_warning()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.actor.subscribe_events()
    }

    pub fn is_running(&self) -> bool {
        self.actor.is_running()
    }

    pub fn disconnect(&self) {
        self.actor.disconnect();
    }

    pub fn stop(&self) -> Result<(), ActorError> {
        self.actor.stop()
    }

    /// Queues an arbitrary job against the multiplexer.
    pub fn add_task<F>(&self, job: F)
    where
        F: for<'a> FnOnce(&'a mut GraphMultiplexer) -> BoxFuture<'a, JobResult> + Send + 'static,
    {
        self.actor.add_task(job);
    }

    pub fn advertise<T: TypedMessage>(&self, sender: &Sender<T>) {
        let slot = sender.slot().clone();
        self.actor
            .add_task(move |multiplexer| multiplexer.advertise(slot).boxed());
    }

    pub fn unadvertise<T: TypedMessage>(&self, sender: &Sender<T>) {
        let slot = sender.slot().clone();
        self.actor
            .add_task(move |multiplexer| multiplexer.unadvertise(slot).boxed());
    }

    /// Queues `message` on the sender's shared publisher.
    ///
    /// Dropped without error while the sender has no live publisher.
    pub fn publish<T: TypedMessage>(&self, sender: &Sender<T>, message: T) {
        let slot = sender.slot().clone();
        let message: Arc<dyn Message> = Arc::new(message);
        self.actor
            .add_task(move |multiplexer| multiplexer.publish(slot, message).boxed());
    }

    pub fn subscribe<T: TypedMessage>(&self, listener: &Listener<T>) {
        let slot = listener.slot().clone();
        self.actor
            .add_task(move |multiplexer| multiplexer.subscribe(slot).boxed());
    }

    pub fn unsubscribe<T: TypedMessage>(&self, listener: &Listener<T>) {
        let slot = listener.slot().clone();
        self.actor
            .add_task(move |multiplexer| multiplexer.unsubscribe(slot).boxed());
    }

    /// Registers `handler` for requests on `service`.
    ///
    /// A second advertise of the same name keeps the first handler. The
    /// service is advertised again after every reconnect.
    pub fn advertise_service<Req, Resp, F>(&self, service: &str, handler: F)
    where
        Req: TypedMessage,
        Resp: TypedMessage,
        F: Fn(Arc<Req>) -> Result<Resp, String> + Send + Sync + 'static,
    {
        let erased: ServiceHandler = Arc::new(move |request: Arc<dyn Message>| {
            let request = downcast_message::<Req>(request)
                .ok_or_else(|| format!("request is not a {}", Req::MESSAGE_TYPE.name))?;
            let response: Arc<dyn Message> = Arc::new(handler(request)?);
            Ok(response)
        });
        let service = AdvertisedService::new(
            service.to_string(),
            Req::MESSAGE_TYPE,
            Resp::MESSAGE_TYPE,
            erased,
        );
        self.actor
            .add_task(move |multiplexer| multiplexer.advertise_service(service).boxed());
    }

    /// Calls `service` through the worker and waits for the response.
    ///
    /// Cancelling `cancel` stops the wait only; the queued call still runs and
    /// its result is discarded.
    pub async fn call_service<Req, Resp>(
        &self,
        service: &str,
        request: Req,
        cancel: &CancellationToken,
    ) -> Result<Arc<Resp>, ServiceCallError>
    where
        Req: TypedMessage,
        Resp: TypedMessage,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let service = service.to_string();
        let request: Arc<dyn Message> = Arc::new(request);
        self.actor.add_task(move |multiplexer| {
            async move {
                let result = multiplexer.call_service(&service, request).await;
                if reply_tx.send(result).is_err() {
                    debug!(
                        event = events::SERVICE_CALL_RESULT_DISCARDED,
                        component = COMPONENT,
                        service = service.as_str(),
                        reason = fields::REASON_CALLER_GONE,
                        "service call finished after the caller stopped waiting"
                    );
                }
                JobResult::Ok(())
            }
            .boxed()
        });

        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ServiceCallError::Cancelled),
            reply = reply_rx => reply,
        };
        let response = reply.map_err(|_| ServiceCallError::WorkerStopped)??;
        downcast_message::<Resp>(response).ok_or(ServiceCallError::UnexpectedResponseType {
            expected: Resp::MESSAGE_TYPE.name,
        })
    }

    /// Topics currently known to the master.
    pub async fn published_topics(&self) -> Result<Vec<TopicInfo>, ServiceCallError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.actor.add_task(move |multiplexer| {
            async move {
                let _ = reply_tx.send(multiplexer.published_topics().await);
                JobResult::Ok(())
            }
            .boxed()
        });
        reply_rx
            .await
            .map_err(|_| ServiceCallError::WorkerStopped)?
    }

    /// Snapshot of every endpoint, taken on the worker between two jobs.
    pub async fn report(&self) -> Result<ConnectionReport, ActorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.actor.add_task(move |multiplexer| {
            async move {
                let _ = reply_tx.send(multiplexer.report());
                JobResult::Ok(())
            }
            .boxed()
        });
        reply_rx.await.map_err(|_| ActorError::WorkerStopped)
    }
}

#[cfg(test)]
mod tests {
    use super::GraphConnection;
    use crate::actor::connection_state::ConnectionState;
    use crate::message::test_messages::Text;
    use crate::multiplexer::service_table::ServiceCallError;
    use crate::settings::{ConfigError, ConnectionSettings};
    use crate::transport::{NodeClient, NodeClientBuilder, TransportError};
    use crate::ActorError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    /// Every connect attempt fails; counts the attempts.
    #[derive(Default)]
    struct UnreachableMaster {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl NodeClientBuilder for UnreachableMaster {
        async fn connect(
            &self,
            settings: &ConnectionSettings,
        ) -> Result<Arc<dyn NodeClient>, TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Unreachable(settings.master_uri.clone()))
        }
    }

    fn settings() -> ConnectionSettings {
        let mut settings = ConnectionSettings::new("http://master:11311/", "localhost", "/viz");
        settings.timing.retry_interval_ms = 20;
        settings.timing.wake_timeout_ms = 10;
        settings
    }

    #[test]
    fn invalid_settings_are_rejected_before_spawning() {
        let mut settings = settings();
        settings.node_id = "viz".to_string();

        let result = GraphConnection::new(settings, Arc::new(UnreachableMaster::default()));

        assert!(matches!(
            result,
            Err(ActorError::InvalidSettings(ConfigError::InvalidNodeId(_)))
        ));
    }

    #[tokio::test]
    async fn service_call_while_disconnected_reports_not_connected() {
        let connection =
            GraphConnection::new(settings(), Arc::new(UnreachableMaster::default()))
                .expect("connection starts");

        let result = connection
            .call_service::<Text, Text>("add", Text("1 2".to_string()), &CancellationToken::new())
            .await;

        assert_eq!(result.err(), Some(ServiceCallError::NotConnected));
        connection.stop().expect("worker stops");
    }

    #[tokio::test]
    async fn cancelled_wait_returns_cancelled() {
        let connection =
            GraphConnection::new(settings(), Arc::new(UnreachableMaster::default()))
                .expect("connection starts");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = connection
            .call_service::<Text, Text>("add", Text("1 2".to_string()), &cancel)
            .await;

        assert_eq!(result.err(), Some(ServiceCallError::Cancelled));
        connection.stop().expect("worker stops");
    }

    #[tokio::test]
    async fn calls_after_stop_report_worker_stopped() {
        let connection =
            GraphConnection::new(settings(), Arc::new(UnreachableMaster::default()))
                .expect("connection starts");
        connection.stop().expect("worker stops");

        let result = connection
            .call_service::<Text, Text>("add", Text("1 2".to_string()), &CancellationToken::new())
            .await;

        assert_eq!(result.err(), Some(ServiceCallError::WorkerStopped));
        assert!(matches!(connection.report().await, Err(ActorError::WorkerStopped)));
    }

    #[tokio::test]
    async fn unchanged_settings_do_not_touch_the_connection() {
        let connection =
            GraphConnection::new(settings(), Arc::new(UnreachableMaster::default()))
                .expect("connection starts");

        connection.set_master_uri("http://master:11311/");
        connection.set_namespace("robot");

        let settings = connection.settings();
        assert_eq!(settings.master_uri, "http://master:11311/");
        assert_eq!(settings.namespace, "robot");
        let report = connection.report().await.expect("worker running");
        assert!(!report.connected);
        assert_eq!(report.node_id, "/viz");
        connection.stop().expect("worker stops");
    }

    #[tokio::test]
    async fn failed_connects_keep_state_disconnected_and_retry() {
        let master = Arc::new(UnreachableMaster::default());
        let connection =
            GraphConnection::new(settings(), master.clone()).expect("connection starts");

        connection.set_keep_reconnecting(true);
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        assert!(master.attempts.load(Ordering::SeqCst) >= 2);
        assert_ne!(connection.state(), ConnectionState::Connected);
        connection.stop().expect("worker stops");
    }
}
