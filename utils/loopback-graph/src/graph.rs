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

use crate::client::LoopbackClient;
use async_trait::async_trait;
use graph_connection::{
    ConnectionSettings, MasterClient, Message, MessageCallback, MessageType, NodeClient,
    NodeClientBuilder, NodeInfo, ServiceHandler, TopicInfo, TransportError,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Node every master always knows about.
pub const ROSOUT_NODE: &str = "/rosout";

pub(crate) struct PublisherRecord {
    pub(crate) id: u64,
    pub(crate) owner: u64,
    pub(crate) node_id: String,
    pub(crate) message_type: MessageType,
    pub(crate) messages: AtomicU64,
    pub(crate) bytes: AtomicU64,
}

pub(crate) struct SubscriptionRecord {
    pub(crate) id: u64,
    pub(crate) owner: u64,
    pub(crate) node_id: String,
    pub(crate) callback: MessageCallback,
}

struct ServiceRecord {
    owner: u64,
    handler: ServiceHandler,
}

#[derive(Default)]
pub(crate) struct GraphState {
    pub(crate) publishers: HashMap<String, Vec<Arc<PublisherRecord>>>,
    pub(crate) subscriptions: HashMap<String, Vec<Arc<SubscriptionRecord>>>,
    services: HashMap<String, ServiceRecord>,
    nodes: HashMap<String, String>,
    published: HashMap<String, Vec<Arc<dyn Message>>>,
    advertise_calls: HashMap<String, usize>,
    subscribe_calls: HashMap<String, usize>,
    hanging_advertises: HashSet<String>,
}

/// In-process master plus message bus.
///
/// Every node client built from [`LoopbackGraph::builder`] registers here.
/// Publishing on a topic delivers straight to every subscription of that
/// topic, across clients.
pub struct LoopbackGraph {
    state: Mutex<GraphState>,
    epoch: AtomicU64,
    reachable: AtomicBool,
    failing_connects: AtomicUsize,
    connects: AtomicUsize,
    service_calls: AtomicUsize,
    next_key: AtomicU64,
}

impl LoopbackGraph {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(GraphState::default()),
            epoch: AtomicU64::new(1),
            reachable: AtomicBool::new(true),
            failing_connects: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
            service_calls: AtomicUsize::new(0),
            next_key: AtomicU64::new(1),
        })
    }

    pub fn builder(self: &Arc<Self>) -> Arc<dyn NodeClientBuilder> {
        Arc::new(LoopbackBuilder {
            graph: self.clone(),
        })
    }

    pub fn master(self: &Arc<Self>) -> Arc<dyn MasterClient> {
        Arc::new(LoopbackMaster {
            graph: self.clone(),
        })
    }

    /// While unreachable every master and client call fails.
    pub fn set_reachable(&self, reachable: bool) {
        debug!("loopback master reachable: {reachable}");
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// The next `count` connect attempts fail even while reachable.
    pub fn fail_next_connects(&self, count: usize) {
        self.failing_connects.store(count, Ordering::SeqCst);
    }

    /// Simulates a master restart: all registrations are forgotten, existing
    /// clients report `Closed` and `/rosout` moves to a new address.
    pub fn restart_master(&self) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("loopback master restarted, epoch {epoch}");
        let mut state = self.lock();
        state.publishers.clear();
        state.subscriptions.clear();
        state.services.clear();
        state.nodes.clear();
    }

    /// Advertise calls for `topic` never complete until cleared.
    pub fn hang_advertise(&self, topic: &str, hang: bool) {
        let mut state = self.lock();
        if hang {
            state.hanging_advertises.insert(topic.to_string());
        } else {
            state.hanging_advertises.remove(topic);
        }
    }

    /// Delivers `message` to every subscription of `topic`, as if a remote
    /// node had published it. Returns the number of subscriptions reached.
    pub fn inject(&self, topic: &str, message: Arc<dyn Message>) -> usize {
        let callbacks = self.callbacks(topic);
        for callback in &callbacks {
            callback(message.clone());
        }
        callbacks.len()
    }

    pub fn published(&self, topic: &str) -> Vec<Arc<dyn Message>> {
        self.lock().published.get(topic).cloned().unwrap_or_default()
    }

    pub fn publisher_count(&self, topic: &str) -> usize {
        self.lock().publishers.get(topic).map_or(0, Vec::len)
    }

    pub fn subscription_count(&self, topic: &str) -> usize {
        self.lock().subscriptions.get(topic).map_or(0, Vec::len)
    }

    pub fn advertise_calls(&self, topic: &str) -> usize {
        self.lock().advertise_calls.get(topic).copied().unwrap_or(0)
    }

    pub fn subscribe_calls(&self, topic: &str) -> usize {
        self.lock().subscribe_calls.get(topic).copied().unwrap_or(0)
    }

    pub fn has_service(&self, service: &str) -> bool {
        self.lock().services.contains_key(service)
    }

    pub fn service_calls(&self) -> usize {
        self.service_calls.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn rosout_uri(&self) -> String {
        format!("loopback://rosout/{}", self.epoch.load(Ordering::SeqCst))
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, GraphState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn next_key(&self) -> u64 {
        self.next_key.fetch_add(1, Ordering::Relaxed)
    }

    /// Fails unless the master is reachable and `epoch` is still current.
    pub(crate) fn check(&self, epoch: u64) -> Result<(), TransportError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable(self.rosout_uri()));
        }
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    pub(crate) fn callbacks(&self, topic: &str) -> Vec<MessageCallback> {
        self.lock()
            .subscriptions
            .get(topic)
            .map(|records| records.iter().map(|record| record.callback.clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn advertise_hangs(&self, topic: &str) -> bool {
        let mut state = self.lock();
        *state.advertise_calls.entry(topic.to_string()).or_default() += 1;
        state.hanging_advertises.contains(topic)
    }

    pub(crate) fn add_publisher(&self, topic: &str, record: Arc<PublisherRecord>) {
        self.lock()
            .publishers
            .entry(topic.to_string())
            .or_default()
            .push(record);
    }

    pub(crate) fn remove_publisher(&self, topic: &str, id: u64) {
        let mut state = self.lock();
        if let Some(records) = state.publishers.get_mut(topic) {
            records.retain(|record| record.id != id);
            if records.is_empty() {
                state.publishers.remove(topic);
            }
        }
    }

    pub(crate) fn add_subscription(&self, topic: &str, record: Arc<SubscriptionRecord>) {
        let mut state = self.lock();
        *state.subscribe_calls.entry(topic.to_string()).or_default() += 1;
        state
            .subscriptions
            .entry(topic.to_string())
            .or_default()
            .push(record);
    }

    pub(crate) fn remove_subscription(&self, topic: &str, id: u64) {
        let mut state = self.lock();
        if let Some(records) = state.subscriptions.get_mut(topic) {
            records.retain(|record| record.id != id);
            if records.is_empty() {
                state.subscriptions.remove(topic);
            }
        }
    }

    pub(crate) fn record_published(&self, topic: &str, message: Arc<dyn Message>) {
        self.lock()
            .published
            .entry(topic.to_string())
            .or_default()
            .push(message);
    }

    pub(crate) fn add_service(&self, service: &str, owner: u64, handler: ServiceHandler) {
        self.lock()
            .services
            .insert(service.to_string(), ServiceRecord { owner, handler });
    }

    pub(crate) fn service_handler(&self, service: &str) -> Option<ServiceHandler> {
        self.service_calls.fetch_add(1, Ordering::SeqCst);
        self.lock()
            .services
            .get(service)
            .map(|record| record.handler.clone())
    }

    /// Drops every registration made by client `owner`.
    pub(crate) fn remove_owner(&self, owner: u64, node_id: &str) {
        let mut state = self.lock();
        for records in state.publishers.values_mut() {
            records.retain(|record| record.owner != owner);
        }
        state.publishers.retain(|_, records| !records.is_empty());
        for records in state.subscriptions.values_mut() {
            records.retain(|record| record.owner != owner);
        }
        state.subscriptions.retain(|_, records| !records.is_empty());
        state.services.retain(|_, record| record.owner != owner);
        state.nodes.remove(node_id);
    }

    fn register_node(&self, node_id: &str, uri: &str) {
        self.lock()
            .nodes
            .insert(node_id.to_string(), uri.to_string());
    }
}

struct LoopbackBuilder {
    graph: Arc<LoopbackGraph>,
}

#[async_trait]
impl NodeClientBuilder for LoopbackBuilder {
    async fn connect(
        &self,
        settings: &ConnectionSettings,
    ) -> Result<Arc<dyn NodeClient>, TransportError> {
        self.graph.connects.fetch_add(1, Ordering::SeqCst);
        if !self.graph.reachable.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable(settings.master_uri.clone()));
        }
        let failing = self.graph.failing_connects.load(Ordering::SeqCst);
        if failing > 0 {
            self.graph
                .failing_connects
                .store(failing - 1, Ordering::SeqCst);
            return Err(TransportError::Rejected(format!(
                "registration of {} refused",
                settings.node_id
            )));
        }

        self.graph.register_node(&settings.node_id, &settings.my_uri);
        let epoch = self.graph.epoch.load(Ordering::SeqCst);
        debug!(
            "loopback node {} registered at epoch {epoch}",
            settings.node_id
        );
        Ok(Arc::new(LoopbackClient::new(
            self.graph.clone(),
            settings.node_id.clone(),
            epoch,
        )))
    }
}

pub(crate) struct LoopbackMaster {
    pub(crate) graph: Arc<LoopbackGraph>,
}

#[async_trait]
impl MasterClient for LoopbackMaster {
    async fn lookup_node(&self, name: &str) -> Result<NodeInfo, TransportError> {
        if !self.graph.reachable.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable(self.graph.rosout_uri()));
        }
        if name == ROSOUT_NODE {
            return Ok(NodeInfo {
                name: name.to_string(),
                uri: self.graph.rosout_uri(),
            });
        }
        self.graph
            .lock()
            .nodes
            .get(name)
            .map(|uri| NodeInfo {
                name: name.to_string(),
                uri: uri.clone(),
            })
            .ok_or_else(|| TransportError::NotFound(name.to_string()))
    }

    async fn get_published_topics(&self) -> Result<Vec<TopicInfo>, TransportError> {
        if !self.graph.reachable.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable(self.graph.rosout_uri()));
        }
        let state = self.graph.lock();
        let mut topics: Vec<_> = state
            .publishers
            .iter()
            .filter_map(|(topic, records)| {
                records.first().map(|record| TopicInfo {
                    name: topic.clone(),
                    message_type: record.message_type.name.to_string(),
                })
            })
            .collect();
        topics.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(topics)
    }
}
