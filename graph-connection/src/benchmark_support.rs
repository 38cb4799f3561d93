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

//! Deterministic benchmark fixtures for the Criterion harness.

use crate::actor::connection_actor::{ConnectError, ConnectionSupervisor, Connector};
use crate::handles::{Listener, Sender};
use crate::message::{Message, MessageType, TypedMessage};
use crate::multiplexer::fan_out::FanOut;
use crate::multiplexer::graph_multiplexer::GraphMultiplexer;
use crate::settings::ConnectionSettings;
use crate::transport::{
    EndpointStats, MasterClient, MessageCallback, NodeClient, NodeClientBuilder, NodeInfo,
    Publisher, ServiceHandler, Subscriber, TopicInfo, TransportError,
};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Fixed-size payload used by every fixture.
#[derive(Clone, Debug)]
pub struct BenchPayload(pub Vec<u8>);

impl Message for BenchPayload {
    fn message_type(&self) -> MessageType {
        Self::MESSAGE_TYPE
    }

    fn byte_length(&self) -> usize {
        self.0.len()
    }

    fn serialize(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.0);
    }
}

impl TypedMessage for BenchPayload {
    const MESSAGE_TYPE: MessageType =
        MessageType::new("bench_msgs/Payload", "00000000000000000000000000000000");
}

/// Fixed fixture for the `fan_out/deliver` benchmark ID.
pub struct FanOutFixture {
    fan_out: Arc<FanOut>,
    received: Arc<AtomicU64>,
    payload: Arc<dyn Message>,
    _listeners: Vec<Listener<BenchPayload>>,
}

impl FanOutFixture {
    pub fn new(listeners: usize, payload_bytes: usize) -> Self {
        let fan_out = Arc::new(FanOut::new());
        let received = Arc::new(AtomicU64::new(0));
        let listeners: Vec<_> = (0..listeners)
            .map(|_| {
                let received = received.clone();
                Listener::new("/bench", move |payload: Arc<BenchPayload>| {
                    received.fetch_add(payload.0.len() as u64, Ordering::Relaxed);
                })
            })
            .collect();
        for listener in &listeners {
            fan_out.insert(listener.slot().clone());
        }
        fan_out.set_live(true);

        Self {
            fan_out,
            received,
            payload: Arc::new(BenchPayload(vec![0x5A; payload_bytes])),
            _listeners: listeners,
        }
    }

    /// Pushes one message through the transport callback. Returns the total
    /// bytes delivered so far.
    pub fn deliver_once(&self) -> u64 {
        let callback = self.fan_out.callback();
        callback(self.payload.clone());
        self.received.load(Ordering::Relaxed)
    }
}

struct NoopEndpoint(String);

#[async_trait]
impl Publisher for NoopEndpoint {
    fn topic(&self) -> &str {
        &self.0
    }

    async fn publish(&self, _message: Arc<dyn Message>) -> Result<(), TransportError> {
        Ok(())
    }

    async fn unadvertise(&self) -> Result<(), TransportError> {
        Ok(())
    }

    fn stats(&self) -> EndpointStats {
        EndpointStats::default()
    }
}

#[async_trait]
impl Subscriber for NoopEndpoint {
    fn topic(&self) -> &str {
        &self.0
    }

    async fn unsubscribe(&self) -> Result<(), TransportError> {
        Ok(())
    }

    fn stats(&self) -> EndpointStats {
        EndpointStats::default()
    }
}

struct NoopMaster;

#[async_trait]
impl MasterClient for NoopMaster {
    async fn lookup_node(&self, name: &str) -> Result<NodeInfo, TransportError> {
        Ok(NodeInfo {
            name: name.to_string(),
            uri: String::new(),
        })
    }

    async fn get_published_topics(&self) -> Result<Vec<TopicInfo>, TransportError> {
        Ok(Vec::new())
    }
}

struct NoopClient;

#[async_trait]
impl NodeClient for NoopClient {
    fn master(&self) -> Arc<dyn MasterClient> {
        Arc::new(NoopMaster)
    }

    async fn advertise(
        &self,
        topic: &str,
        _message_type: MessageType,
    ) -> Result<Arc<dyn Publisher>, TransportError> {
        Ok(Arc::new(NoopEndpoint(topic.to_string())))
    }

    async fn subscribe(
        &self,
        topic: &str,
        _message_type: MessageType,
        _callback: MessageCallback,
    ) -> Result<Arc<dyn Subscriber>, TransportError> {
        Ok(Arc::new(NoopEndpoint(topic.to_string())))
    }

    async fn advertise_service(
        &self,
        _service: &str,
        _handler: ServiceHandler,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn call_service(
        &self,
        _service: &str,
        request: Arc<dyn Message>,
    ) -> Result<Arc<dyn Message>, TransportError> {
        Ok(request)
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

struct NoopBuilder;

#[async_trait]
impl NodeClientBuilder for NoopBuilder {
    async fn connect(
        &self,
        _settings: &ConnectionSettings,
    ) -> Result<Arc<dyn NodeClient>, TransportError> {
        Ok(Arc::new(NoopClient))
    }
}

struct NoopSupervisor;

impl ConnectionSupervisor for NoopSupervisor {
    fn request_disconnect(&self) {}

    fn set_master_warning(&self, _warning: bool) {}
}

/// Fixed fixture for the `reestablish/reconnect` benchmark ID.
pub struct ReestablishFixture {
    multiplexer: GraphMultiplexer,
    _senders: Vec<Sender<BenchPayload>>,
    _listeners: Vec<Listener<BenchPayload>>,
}

impl ReestablishFixture {
    /// Multiplexer holding `topics` advertised and `topics` subscribed entries.
    pub async fn new(topics: usize) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let mut settings = ConnectionSettings::new("loopback://bench", "loopback://node", "/bench");
        settings.watchdog.enabled = false;
        let mut multiplexer = GraphMultiplexer::new(
            Arc::new(ArcSwap::from_pointee(settings)),
            Arc::new(NoopBuilder),
        );

        let mut senders = Vec::with_capacity(topics);
        let mut listeners = Vec::with_capacity(topics);
        for index in 0..topics {
            let sender = Sender::<BenchPayload>::new(format!("/bench/out_{index}"));
            let listener = Listener::new(format!("/bench/in_{index}"), |_: Arc<BenchPayload>| {});
            multiplexer.advertise(sender.slot().clone()).await?;
            multiplexer.subscribe(listener.slot().clone()).await?;
            senders.push(sender);
            listeners.push(listener);
        }
        multiplexer.connect(Arc::new(NoopSupervisor)).await?;

        Ok(Self {
            multiplexer,
            _senders: senders,
            _listeners: listeners,
        })
    }

    /// Tears every endpoint down and re-establishes it. Returns the number of
    /// publisher slots afterwards.
    pub async fn reconnect_once(&mut self) -> Result<usize, ConnectError> {
        self.multiplexer.disconnect().await;
        self.multiplexer.connect(Arc::new(NoopSupervisor)).await?;
        Ok(self.multiplexer.report().publishers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::{FanOutFixture, ReestablishFixture};

    #[test]
    fn fan_out_fixture_reaches_every_listener() {
        let fixture = FanOutFixture::new(8, 16);

        assert_eq!(fixture.deliver_once(), 8 * 16);
        assert_eq!(fixture.deliver_once(), 2 * 8 * 16);
    }

    #[tokio::test]
    async fn reestablish_fixture_restores_every_endpoint() {
        let mut fixture = ReestablishFixture::new(4)
            .await
            .expect("fixture builds");

        assert_eq!(fixture.reconnect_once().await.expect("reconnects"), 4);
        let report = fixture.multiplexer.report();
        assert_eq!(report.subscribers.len(), 4);
        assert!(report.publishers.iter().all(|publisher| publisher.live));
        assert!(report.subscribers.iter().all(|subscriber| subscriber.live));
    }
}
