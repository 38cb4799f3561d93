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

//! Worker-owned multiplexer of local handles onto shared network endpoints.

use crate::actor::connection_actor::{ConnectError, ConnectionSupervisor, Connector};
use crate::diagnostics::ConnectionReport;
use crate::handles::{ListenerSlot, SenderSlot, UNLIVE_ID};
use crate::message::Message;
use crate::multiplexer::service_table::{AdvertisedService, ServiceCallError, ServiceTable};
use crate::multiplexer::topic_table::{Join, Leave, TopicTable};
use crate::observability::{events, fields};
use crate::runtime::task_queue::JobResult;
use crate::settings::ConnectionSettings;
use crate::transport::{NodeClient, NodeClientBuilder, TopicInfo};
use crate::watchdog::WatchdogHandle;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

const COMPONENT: &str = "graph_multiplexer";

/// Topic and service tables plus the live node client, owned by the worker.
///
/// Jobs queued on a [`GraphConnection`](crate::GraphConnection) receive
/// `&mut GraphMultiplexer`; nothing else ever touches it.
pub struct GraphMultiplexer {
    settings: Arc<ArcSwap<ConnectionSettings>>,
    builder: Arc<dyn NodeClientBuilder>,
    client: Option<Arc<dyn NodeClient>>,
    topics: TopicTable,
    services: ServiceTable,
    watchdog: Option<WatchdogHandle>,
}

impl GraphMultiplexer {
    pub(crate) fn new(
        settings: Arc<ArcSwap<ConnectionSettings>>,
        builder: Arc<dyn NodeClientBuilder>,
    ) -> Self {
        Self {
            settings,
            builder,
            client: None,
            topics: TopicTable::default(),
            services: ServiceTable::default(),
            watchdog: None,
        }
    }

    /// Whether a live node client exists.
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    pub fn settings(&self) -> Arc<ConnectionSettings> {
        self.settings.load_full()
    }

    /// Number of senders sharing the publisher of `topic`, if advertised.
    pub fn sender_count(&self, topic: &str) -> Option<usize> {
        self.topics
            .advertised_topic(topic)
            .map(|entry| entry.sender_count())
    }

    /// Number of listeners sharing the subscriber of `topic`, if subscribed.
    pub fn listener_count(&self, topic: &str) -> Option<usize> {
        self.topics
            .subscribed_topic(topic)
            .map(|entry| entry.fan_out.len())
    }

    /// Topic served by the live publisher at `id`, as registered with the master.
    pub fn publisher_topic(&self, id: i32) -> Option<String> {
        self.topics
            .publisher(id)
            .map(|publisher| publisher.topic().to_string())
    }

    pub fn report(&self) -> ConnectionReport {
        ConnectionReport::collect(
            &self.settings.load_full(),
            self.is_connected(),
            self.watchdog
                .as_ref()
                .map_or(false, WatchdogHandle::is_running),
            &self.topics,
            &self.services,
        )
    }

    pub(crate) async fn advertise(&mut self, sender: Arc<SenderSlot>) -> JobResult {
        let topic = sender.topic().to_string();
        match self.topics.add_sender(&sender) {
            Join::Created => {}
            Join::Shared { members } => {
                debug!(
                    event = events::ADVERTISE_SHARED,
                    component = COMPONENT,
                    topic = topic.as_str(),
                    publisher_id = sender.id(),
                    ref_count = members,
                    "sender joined existing publisher"
                );
                return Ok(());
            }
            Join::AlreadyMember => {
                debug!(
                    event = events::ADVERTISE_SHARED,
                    component = COMPONENT,
                    topic = topic.as_str(),
                    publisher_id = sender.id(),
                    "sender already advertised"
                );
                return Ok(());
            }
            Join::TypeMismatch { existing } => {
                warn!(
                    event = events::ADVERTISE_TYPE_MISMATCH,
                    component = COMPONENT,
                    topic = topic.as_str(),
                    msg_type = sender.message_type().name,
                    existing_type = existing.name,
                    "topic already advertised with another message type"
                );
                return Ok(());
            }
        }

        let Some(client) = self.client.clone() else {
            info!(
                event = events::ADVERTISE_CREATED,
                component = COMPONENT,
                topic = topic.as_str(),
                publisher_id = UNLIVE_ID,
                "advertised while disconnected; publisher created on connect"
            );
            return Ok(());
        };

        let settings = self.settings.load_full();
        let resolved = settings.resolve_name(&topic);
        let step_timeout = settings.timing.operation_timeout();
        match timeout(step_timeout, client.advertise(&resolved, sender.message_type())).await {
            Ok(Ok(publisher)) => {
                let id = self
                    .topics
                    .install_publisher(&topic, publisher)
                    .unwrap_or(UNLIVE_ID);
                info!(
                    event = events::ADVERTISE_CREATED,
                    component = COMPONENT,
                    topic = topic.as_str(),
                    resolved = resolved.as_str(),
                    publisher_id = id,
                    "publisher created"
                );
            }
            Ok(Err(err)) => {
                warn!(
                    event = events::ADVERTISE_FAILED,
                    component = COMPONENT,
                    topic = topic.as_str(),
                    resolved = resolved.as_str(),
                    err = %err,
                    "advertise failed; retried on next connect"
                );
            }
            Err(_) => {
                warn!(
                    event = events::ADVERTISE_FAILED,
                    component = COMPONENT,
                    topic = topic.as_str(),
                    resolved = resolved.as_str(),
                    timeout_ms = fields::format_millis(step_timeout),
                    "advertise timed out; retried on next connect"
                );
            }
        }
        Ok(())
    }

    pub(crate) async fn unadvertise(&mut self, sender: Arc<SenderSlot>) -> JobResult {
        let topic = sender.topic().to_string();
        let entry = match self.topics.remove_sender(&sender) {
            Leave::Unknown => {
                debug!(
                    event = events::UNADVERTISE_UNKNOWN,
                    component = COMPONENT,
                    topic = topic.as_str(),
                    "sender was not advertised"
                );
                return Ok(());
            }
            Leave::Released { remaining } => {
                debug!(
                    event = events::UNADVERTISE_RELEASED,
                    component = COMPONENT,
                    topic = topic.as_str(),
                    ref_count = remaining,
                    "sender released"
                );
                return Ok(());
            }
            Leave::Removed(entry) => entry,
        };

        info!(
            event = events::UNADVERTISE_REMOVED,
            component = COMPONENT,
            topic = topic.as_str(),
            publisher_id = entry.id,
            "last sender released; removing publisher"
        );
        let Some(publisher) = entry.publisher else {
            return Ok(());
        };

        let step_timeout = self.settings.load().timing.operation_timeout();
        match timeout(step_timeout, publisher.unadvertise()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(
                    event = events::UNADVERTISE_FAILED,
                    component = COMPONENT,
                    topic = topic.as_str(),
                    err = %err,
                    "publisher teardown failed"
                );
            }
            Err(_) => {
                warn!(
                    event = events::UNADVERTISE_FAILED,
                    component = COMPONENT,
                    topic = topic.as_str(),
                    timeout_ms = fields::format_millis(step_timeout),
                    "publisher teardown timed out"
                );
            }
        }
        Ok(())
    }

    pub(crate) async fn publish(
        &mut self,
        sender: Arc<SenderSlot>,
        message: Arc<dyn Message>,
    ) -> JobResult {
        let id = sender.id();
        let Some(publisher) = self.topics.publisher(id).cloned() else {
            debug!(
                event = events::PUBLISH_SKIPPED_UNLIVE,
                component = COMPONENT,
                topic = sender.topic(),
                publisher_id = id,
                "no live publisher; message dropped"
            );
            return Ok(());
        };

        let step_timeout = self.settings.load().timing.operation_timeout();
        match timeout(step_timeout, publisher.publish(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(
                    event = events::PUBLISH_FAILED,
                    component = COMPONENT,
                    topic = sender.topic(),
                    publisher_id = id,
                    err = %err,
                    "publish failed"
                );
            }
            Err(_) => {
                warn!(
                    event = events::PUBLISH_FAILED,
                    component = COMPONENT,
                    topic = sender.topic(),
                    publisher_id = id,
                    timeout_ms = fields::format_millis(step_timeout),
                    "publish timed out"
                );
            }
        }
        Ok(())
    }

    pub(crate) async fn subscribe(&mut self, listener: Arc<ListenerSlot>) -> JobResult {
        let topic = listener.topic().to_string();
        match self.topics.add_listener(&listener) {
            Join::Created => {}
            Join::Shared { members } => {
                debug!(
                    event = events::SUBSCRIBE_SHARED,
                    component = COMPONENT,
                    topic = topic.as_str(),
                    ref_count = members,
                    "listener joined existing subscriber"
                );
                return Ok(());
            }
            Join::AlreadyMember => {
                debug!(
                    event = events::SUBSCRIBE_SHARED,
                    component = COMPONENT,
                    topic = topic.as_str(),
                    "listener already subscribed"
                );
                return Ok(());
            }
            Join::TypeMismatch { existing } => {
                warn!(
                    event = events::SUBSCRIBE_TYPE_MISMATCH,
                    component = COMPONENT,
                    topic = topic.as_str(),
                    msg_type = listener.message_type().name,
                    existing_type = existing.name,
                    "topic already subscribed with another message type"
                );
                return Ok(());
            }
        }

        let Some(client) = self.client.clone() else {
            info!(
                event = events::SUBSCRIBE_CREATED,
                component = COMPONENT,
                topic = topic.as_str(),
                "subscribed while disconnected; subscriber created on connect"
            );
            return Ok(());
        };
        let Some(callback) = self
            .topics
            .subscribed_topic(&topic)
            .map(|entry| entry.fan_out.callback())
        else {
            return Ok(());
        };

        let settings = self.settings.load_full();
        let resolved = settings.resolve_name(&topic);
        let step_timeout = settings.timing.operation_timeout();
        match timeout(
            step_timeout,
            client.subscribe(&resolved, listener.message_type(), callback),
        )
        .await
        {
            Ok(Ok(subscriber)) => {
                self.topics.install_subscriber(&topic, subscriber);
                info!(
                    event = events::SUBSCRIBE_CREATED,
                    component = COMPONENT,
                    topic = topic.as_str(),
                    resolved = resolved.as_str(),
                    "subscriber created"
                );
            }
            Ok(Err(err)) => {
                warn!(
                    event = events::SUBSCRIBE_FAILED,
                    component = COMPONENT,
                    topic = topic.as_str(),
                    resolved = resolved.as_str(),
                    err = %err,
                    "subscribe failed; retried on next connect"
                );
            }
            Err(_) => {
                warn!(
                    event = events::SUBSCRIBE_FAILED,
                    component = COMPONENT,
                    topic = topic.as_str(),
                    resolved = resolved.as_str(),
                    timeout_ms = fields::format_millis(step_timeout),
                    "subscribe timed out; retried on next connect"
                );
            }
        }
        Ok(())
    }

    pub(crate) async fn unsubscribe(&mut self, listener: Arc<ListenerSlot>) -> JobResult {
        let topic = listener.topic().to_string();
        let entry = match self.topics.remove_listener(&listener) {
            Leave::Unknown => {
                debug!(
                    event = events::UNSUBSCRIBE_UNKNOWN,
                    component = COMPONENT,
                    topic = topic.as_str(),
                    "listener was not subscribed"
                );
                return Ok(());
            }
            Leave::Released { remaining } => {
                debug!(
                    event = events::UNSUBSCRIBE_RELEASED,
                    component = COMPONENT,
                    topic = topic.as_str(),
                    ref_count = remaining,
                    "listener released"
                );
                return Ok(());
            }
            Leave::Removed(entry) => entry,
        };

        info!(
            event = events::UNSUBSCRIBE_REMOVED,
            component = COMPONENT,
            topic = topic.as_str(),
            "last listener released; removing subscriber"
        );
        let Some(subscriber) = entry.subscriber else {
            return Ok(());
        };

        let step_timeout = self.settings.load().timing.operation_timeout();
        match timeout(step_timeout, subscriber.unsubscribe()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(
                    event = events::UNSUBSCRIBE_FAILED,
                    component = COMPONENT,
                    topic = topic.as_str(),
                    err = %err,
                    "subscriber teardown failed"
                );
            }
            Err(_) => {
                warn!(
                    event = events::UNSUBSCRIBE_FAILED,
                    component = COMPONENT,
                    topic = topic.as_str(),
                    timeout_ms = fields::format_millis(step_timeout),
                    "subscriber teardown timed out"
                );
            }
        }
        Ok(())
    }

    pub(crate) async fn advertise_service(&mut self, service: AdvertisedService) -> JobResult {
        let name = service.name.clone();
        let handler = service.handler.clone();
        if !self.services.insert(service) {
            debug!(
                event = events::SERVICE_ADVERTISE_DUPLICATE,
                component = COMPONENT,
                service = name.as_str(),
                "service already advertised"
            );
            return Ok(());
        }

        let Some(client) = self.client.clone() else {
            debug!(
                event = events::SERVICE_ADVERTISE_OK,
                component = COMPONENT,
                service = name.as_str(),
                "service registered; advertised on connect"
            );
            return Ok(());
        };

        let settings = self.settings.load_full();
        let resolved = settings.resolve_name(&name);
        let step_timeout = settings.timing.operation_timeout();
        match timeout(step_timeout, client.advertise_service(&resolved, handler)).await {
            Ok(Ok(())) => {
                self.services.set_live(&name, true);
                info!(
                    event = events::SERVICE_ADVERTISE_OK,
                    component = COMPONENT,
                    service = name.as_str(),
                    resolved = resolved.as_str(),
                    "service advertised"
                );
            }
            Ok(Err(err)) => {
                warn!(
                    event = events::SERVICE_ADVERTISE_FAILED,
                    component = COMPONENT,
                    service = name.as_str(),
                    err = %err,
                    "service advertise failed; retried on next connect"
                );
            }
            Err(_) => {
                warn!(
                    event = events::SERVICE_ADVERTISE_FAILED,
                    component = COMPONENT,
                    service = name.as_str(),
                    timeout_ms = fields::format_millis(step_timeout),
                    "service advertise timed out; retried on next connect"
                );
            }
        }
        Ok(())
    }

    pub(crate) async fn call_service(
        &self,
        service: &str,
        request: Arc<dyn Message>,
    ) -> Result<Arc<dyn Message>, ServiceCallError> {
        let Some(client) = self.client.clone() else {
            debug!(
                event = events::SERVICE_CALL_NOT_CONNECTED,
                component = COMPONENT,
                service,
                reason = fields::REASON_NOT_CONNECTED,
                "service call rejected"
            );
            return Err(ServiceCallError::NotConnected);
        };

        let settings = self.settings.load_full();
        let resolved = settings.resolve_name(service);
        let call_timeout = settings.timing.service_timeout();
        match timeout(call_timeout, client.call_service(&resolved, request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => {
                debug!(
                    event = events::SERVICE_CALL_FAILED,
                    component = COMPONENT,
                    service = resolved.as_str(),
                    err = %err,
                    "service call failed"
                );
                Err(ServiceCallError::Transport(err))
            }
            Err(_) => {
                debug!(
                    event = events::SERVICE_CALL_FAILED,
                    component = COMPONENT,
                    service = resolved.as_str(),
                    timeout_ms = fields::format_millis(call_timeout),
                    "service call timed out"
                );
                Err(ServiceCallError::TimedOut(call_timeout))
            }
        }
    }

    pub(crate) async fn published_topics(&self) -> Result<Vec<TopicInfo>, ServiceCallError> {
        let Some(client) = self.client.clone() else {
            return Err(ServiceCallError::NotConnected);
        };
        let step_timeout = self.settings.load().timing.operation_timeout();
        match timeout(step_timeout, client.master().get_published_topics()).await {
            Ok(Ok(topics)) => Ok(topics),
            Ok(Err(err)) => Err(ServiceCallError::Transport(err)),
            Err(_) => Err(ServiceCallError::TimedOut(step_timeout)),
        }
    }

    /// Recreates every publisher, subscriber and service on a fresh client.
    ///
    /// All requests run concurrently, each under its own timeout. An entry
    /// whose request fails stays unlive until the next connect.
    async fn reestablish(&mut self, client: &Arc<dyn NodeClient>, settings: &ConnectionSettings) {
        let step_timeout = settings.timing.reestablish_timeout();
        let advertise_requests = self.topics.advertise_requests();
        let subscribe_requests = self.topics.subscribe_requests();
        let service_requests = self.services.requests();
        info!(
            event = events::REESTABLISH_START,
            component = COMPONENT,
            publishers = advertise_requests.len(),
            subscribers = subscribe_requests.len(),
            services = service_requests.len(),
            "re-establishing endpoints"
        );

        let advertise_steps = join_all(advertise_requests.into_iter().map(
            |(topic, message_type)| {
                let resolved = settings.resolve_name(&topic);
                let client = client.clone();
                async move {
                    let outcome =
                        timeout(step_timeout, client.advertise(&resolved, message_type)).await;
                    (topic, outcome)
                }
            },
        ));
        let subscribe_steps = join_all(subscribe_requests.into_iter().map(
            |(topic, message_type, callback)| {
                let resolved = settings.resolve_name(&topic);
                let client = client.clone();
                async move {
                    let outcome = timeout(
                        step_timeout,
                        client.subscribe(&resolved, message_type, callback),
                    )
                    .await;
                    (topic, outcome)
                }
            },
        ));
        let service_steps = join_all(service_requests.into_iter().map(|(name, handler)| {
            let resolved = settings.resolve_name(&name);
            let client = client.clone();
            async move {
                let outcome = timeout(step_timeout, client.advertise_service(&resolved, handler)).await;
                (name, outcome)
            }
        }));
        let (advertised, subscribed, advertised_services) =
            futures::join!(advertise_steps, subscribe_steps, service_steps);

        let mut failed = 0usize;
        for (topic, outcome) in advertised {
            match outcome {
                Ok(Ok(publisher)) => {
                    self.topics.install_publisher(&topic, publisher);
                }
                Ok(Err(err)) => {
                    failed += 1;
                    reestablish_failed("advertise", &topic, &err.to_string());
                }
                Err(_) => {
                    failed += 1;
                    reestablish_timed_out("advertise", &topic, step_timeout);
                }
            }
        }
        for (topic, outcome) in subscribed {
            match outcome {
                Ok(Ok(subscriber)) => {
                    self.topics.install_subscriber(&topic, subscriber);
                }
                Ok(Err(err)) => {
                    failed += 1;
                    reestablish_failed("subscribe", &topic, &err.to_string());
                }
                Err(_) => {
                    failed += 1;
                    reestablish_timed_out("subscribe", &topic, step_timeout);
                }
            }
        }
        for (name, outcome) in advertised_services {
            match outcome {
                Ok(Ok(())) => self.services.set_live(&name, true),
                Ok(Err(err)) => {
                    failed += 1;
                    reestablish_failed("advertise_service", &name, &err.to_string());
                }
                Err(_) => {
                    failed += 1;
                    reestablish_timed_out("advertise_service", &name, step_timeout);
                }
            }
        }

        info!(
            event = events::REESTABLISH_OK,
            component = COMPONENT,
            failed,
            "endpoints re-established"
        );
    }

    /// Stops the watchdog, marks every entry unlive and closes the client.
    async fn release_client(&mut self) {
        self.watchdog = None;
        self.topics.invalidate();
        self.services.invalidate();

        let Some(client) = self.client.take() else {
            return;
        };
        let close_timeout = self.settings.load().timing.operation_timeout();
        match timeout(close_timeout, client.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(
                    event = events::CLIENT_CLOSE_FAILED,
                    component = COMPONENT,
                    err = %err,
                    "node client close failed"
                );
            }
            Err(_) => {
                warn!(
                    event = events::CLIENT_CLOSE_FAILED,
                    component = COMPONENT,
                    timeout_ms = fields::format_millis(close_timeout),
                    "node client close timed out"
                );
            }
        }
    }
}

fn reestablish_failed(step: &'static str, name: &str, err: &str) {
    warn!(
        event = events::REESTABLISH_FAILED,
        component = COMPONENT,
        step,
        topic = name,
        err,
        "re-establish step failed; entry stays unlive"
    );
}

fn reestablish_timed_out(step: &'static str, name: &str, after: std::time::Duration) {
    warn!(
        event = events::REESTABLISH_TIMED_OUT,
        component = COMPONENT,
        step,
        topic = name,
        timeout_ms = fields::format_millis(after),
        "re-establish step timed out; entry stays unlive"
    );
}

#[async_trait]
impl Connector for GraphMultiplexer {
    async fn connect(
        &mut self,
        supervisor: Arc<dyn ConnectionSupervisor>,
    ) -> Result<(), ConnectError> {
        let settings = self.settings.load_full();
        settings.validate().map_err(ConnectError::InvalidSettings)?;
        self.release_client().await;

        let connect_timeout = settings.timing.connect_timeout();
        let client = match timeout(connect_timeout, self.builder.connect(&settings)).await {
            Ok(Ok(client)) => client,
            Ok(Err(err)) => return Err(ConnectError::Transport(err)),
            Err(_) => return Err(ConnectError::TimedOut(connect_timeout)),
        };
        info!(
            event = events::CONNECT_OK,
            component = COMPONENT,
            master_uri = settings.master_uri.as_str(),
            node_id = settings.node_id.as_str(),
            "node registered with master"
        );
        self.client = Some(client.clone());

        self.reestablish(&client, &settings).await;

        if settings.watchdog.enabled {
            self.watchdog = Some(WatchdogHandle::spawn(
                client.master(),
                settings.watchdog.clone(),
                supervisor,
            ));
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.release_client().await;
    }
}
