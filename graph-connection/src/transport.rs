/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
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

//! Interfaces of the external collaborators the connection runtime drives.
//!
//! The master RPC protocol and the publisher/subscriber sockets are implemented
//! elsewhere; this module only fixes the surface the worker needs from them.

use crate::message::{Message, MessageType};
use crate::settings::ConnectionSettings;
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Failures reported by the node client, master client or endpoint handles.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransportError {
    /// The master could not be reached.
    Unreachable(String),
    /// The master answered with an error status.
    Rejected(String),
    /// A URI or name was malformed.
    InvalidArgument(String),
    /// The named node, topic or service does not exist.
    NotFound(String),
    /// The client was closed underneath the caller.
    Closed,
    /// Any other transport-specific failure.
    Internal(String),
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Unreachable(detail) => write!(f, "master unreachable: {detail}"),
            TransportError::Rejected(detail) => write!(f, "request rejected: {detail}"),
            TransportError::InvalidArgument(detail) => write!(f, "invalid argument: {detail}"),
            TransportError::NotFound(detail) => write!(f, "not found: {detail}"),
            TransportError::Closed => write!(f, "client closed"),
            TransportError::Internal(detail) => write!(f, "transport failure: {detail}"),
        }
    }
}

impl Error for TransportError {}

/// Result of a master node lookup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeInfo {
    pub name: String,
    pub uri: String,
}

/// One entry of the master's published-topics list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TopicInfo {
    pub name: String,
    pub message_type: String,
}

/// Per-peer transfer counters of one endpoint.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PeerStats {
    pub remote_id: String,
    pub bytes: u64,
    pub messages: u64,
    pub alive: bool,
}

/// Snapshot of one publisher or subscriber endpoint.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EndpointStats {
    pub topic: String,
    pub message_type: String,
    pub peers: Vec<PeerStats>,
}

/// Callback the transport invokes for every message received on a subscription.
pub type MessageCallback = Arc<dyn Fn(Arc<dyn Message>) + Send + Sync>;

/// Handler the transport invokes for every incoming service request.
pub type ServiceHandler =
    Arc<dyn Fn(Arc<dyn Message>) -> Result<Arc<dyn Message>, String> + Send + Sync>;

/// Read-only master API used by the watchdog and topic queries.
#[async_trait]
pub trait MasterClient: Send + Sync {
    async fn lookup_node(&self, name: &str) -> Result<NodeInfo, TransportError>;

    async fn get_published_topics(&self) -> Result<Vec<TopicInfo>, TransportError>;
}

/// Live network publisher for one topic.
#[async_trait]
pub trait Publisher: Send + Sync {
    fn topic(&self) -> &str;

    async fn publish(&self, message: Arc<dyn Message>) -> Result<(), TransportError>;

    async fn unadvertise(&self) -> Result<(), TransportError>;

    fn stats(&self) -> EndpointStats;
}

/// Live network subscriber for one topic.
#[async_trait]
pub trait Subscriber: Send + Sync {
    fn topic(&self) -> &str;

    async fn unsubscribe(&self) -> Result<(), TransportError>;

    fn stats(&self) -> EndpointStats;
}

/// A node registered against one master instance.
///
/// A fresh client is built on every successful connect and dropped on
/// disconnect.
#[async_trait]
pub trait NodeClient: Send + Sync {
    fn master(&self) -> Arc<dyn MasterClient>;

    async fn advertise(
        &self,
        topic: &str,
        message_type: MessageType,
    ) -> Result<Arc<dyn Publisher>, TransportError>;

    async fn subscribe(
        &self,
        topic: &str,
        message_type: MessageType,
        callback: MessageCallback,
    ) -> Result<Arc<dyn Subscriber>, TransportError>;

    async fn advertise_service(
        &self,
        service: &str,
        handler: ServiceHandler,
    ) -> Result<(), TransportError>;

    async fn call_service(
        &self,
        service: &str,
        request: Arc<dyn Message>,
    ) -> Result<Arc<dyn Message>, TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}

/// [`NodeClientBuilder`] creates a [`NodeClient`] registered with the master
/// named in the settings. Called on the worker thread for every connect
/// attempt.
#[async_trait]
pub trait NodeClientBuilder: Send + Sync {
    async fn connect(
        &self,
        settings: &ConnectionSettings,
    ) -> Result<Arc<dyn NodeClient>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::TransportError;

    #[test]
    fn transport_error_display_is_stable() {
        assert_eq!(
            TransportError::Unreachable("http://master:11311".to_string()).to_string(),
            "master unreachable: http://master:11311"
        );
        assert_eq!(TransportError::Closed.to_string(), "client closed");
    }
}
