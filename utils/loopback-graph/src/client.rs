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

use crate::graph::{LoopbackGraph, LoopbackMaster, PublisherRecord, SubscriptionRecord};
use async_trait::async_trait;
use graph_connection::{
    EndpointStats, MasterClient, Message, MessageCallback, MessageType, NodeClient, PeerStats,
    Publisher, ServiceHandler, Subscriber, TransportError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// One node registration against a [`LoopbackGraph`].
pub struct LoopbackClient {
    graph: Arc<LoopbackGraph>,
    key: u64,
    node_id: String,
    epoch: u64,
    closed: AtomicBool,
}

impl LoopbackClient {
    pub(crate) fn new(graph: Arc<LoopbackGraph>, node_id: String, epoch: u64) -> Self {
        let key = graph.next_key();
        Self {
            graph,
            key,
            node_id,
            epoch,
            closed: AtomicBool::new(false),
        }
    }

    fn check(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.graph.check(self.epoch)
    }
}

#[async_trait]
impl NodeClient for LoopbackClient {
    fn master(&self) -> Arc<dyn MasterClient> {
        Arc::new(LoopbackMaster {
            graph: self.graph.clone(),
        })
    }

    async fn advertise(
        &self,
        topic: &str,
        message_type: MessageType,
    ) -> Result<Arc<dyn Publisher>, TransportError> {
        self.check()?;
        if self.graph.advertise_hangs(topic) {
            debug!("{}: advertise of {topic} hangs", self.node_id);
            std::future::pending::<()>().await;
        }
        let record = Arc::new(PublisherRecord {
            id: self.graph.next_key(),
            owner: self.key,
            node_id: self.node_id.clone(),
            message_type,
            messages: Default::default(),
            bytes: Default::default(),
        });
        self.graph.add_publisher(topic, record.clone());
        debug!("{}: advertised {topic}", self.node_id);
        Ok(Arc::new(LoopbackPublisher {
            graph: self.graph.clone(),
            topic: topic.to_string(),
            epoch: self.epoch,
            record,
        }))
    }

    async fn subscribe(
        &self,
        topic: &str,
        _message_type: MessageType,
        callback: MessageCallback,
    ) -> Result<Arc<dyn Subscriber>, TransportError> {
        self.check()?;
        let record = Arc::new(SubscriptionRecord {
            id: self.graph.next_key(),
            owner: self.key,
            node_id: self.node_id.clone(),
            callback,
        });
        self.graph.add_subscription(topic, record.clone());
        debug!("{}: subscribed {topic}", self.node_id);
        Ok(Arc::new(LoopbackSubscriber {
            graph: self.graph.clone(),
            topic: topic.to_string(),
            record,
        }))
    }

    async fn advertise_service(
        &self,
        service: &str,
        handler: ServiceHandler,
    ) -> Result<(), TransportError> {
        self.check()?;
        self.graph.add_service(service, self.key, handler);
        Ok(())
    }

    async fn call_service(
        &self,
        service: &str,
        request: Arc<dyn Message>,
    ) -> Result<Arc<dyn Message>, TransportError> {
        self.check()?;
        let handler = self
            .graph
            .service_handler(service)
            .ok_or_else(|| TransportError::NotFound(service.to_string()))?;
        handler(request).map_err(TransportError::Rejected)
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.graph.remove_owner(self.key, &self.node_id);
        debug!("{}: closed", self.node_id);
        Ok(())
    }
}

struct LoopbackPublisher {
    graph: Arc<LoopbackGraph>,
    topic: String,
    epoch: u64,
    record: Arc<PublisherRecord>,
}

#[async_trait]
impl Publisher for LoopbackPublisher {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn publish(&self, message: Arc<dyn Message>) -> Result<(), TransportError> {
        self.graph.check(self.epoch)?;
        self.record.messages.fetch_add(1, Ordering::Relaxed);
        self.record
            .bytes
            .fetch_add(message.byte_length() as u64, Ordering::Relaxed);
        self.graph.record_published(&self.topic, message.clone());
        for callback in self.graph.callbacks(&self.topic) {
            callback(message.clone());
        }
        Ok(())
    }

    async fn unadvertise(&self) -> Result<(), TransportError> {
        self.graph.remove_publisher(&self.topic, self.record.id);
        Ok(())
    }

    fn stats(&self) -> EndpointStats {
        let state = self.graph.lock();
        let peers = state
            .subscriptions
            .get(&self.topic)
            .map(|records| {
                records
                    .iter()
                    .map(|subscription| PeerStats {
                        remote_id: subscription.node_id.clone(),
                        bytes: self.record.bytes.load(Ordering::Relaxed),
                        messages: self.record.messages.load(Ordering::Relaxed),
                        alive: true,
                    })
                    .collect()
            })
            .unwrap_or_default();
        EndpointStats {
            topic: self.topic.clone(),
            message_type: self.record.message_type.name.to_string(),
            peers,
        }
    }
}

struct LoopbackSubscriber {
    graph: Arc<LoopbackGraph>,
    topic: String,
    record: Arc<SubscriptionRecord>,
}

#[async_trait]
impl Subscriber for LoopbackSubscriber {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn unsubscribe(&self) -> Result<(), TransportError> {
        self.graph.remove_subscription(&self.topic, self.record.id);
        Ok(())
    }

    fn stats(&self) -> EndpointStats {
        let state = self.graph.lock();
        let publishers = state.publishers.get(&self.topic);
        let message_type = publishers
            .and_then(|records| records.first())
            .map(|record| record.message_type.name.to_string())
            .unwrap_or_default();
        let peers = publishers
            .map(|records| {
                records
                    .iter()
                    .map(|publisher| PeerStats {
                        remote_id: publisher.node_id.clone(),
                        bytes: publisher.bytes.load(Ordering::Relaxed),
                        messages: publisher.messages.load(Ordering::Relaxed),
                        alive: true,
                    })
                    .collect()
            })
            .unwrap_or_default();
        EndpointStats {
            topic: self.topic.clone(),
            message_type,
            peers,
        }
    }
}
