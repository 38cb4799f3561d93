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

//! # graph-connection
//!
//! `graph-connection` keeps one logical connection from a node to a graph
//! master alive and multiplexes any number of local publishers and
//! subscribers onto one shared network endpoint per topic.
//!
//! Typical usage is centered on [`GraphConnection`], [`Sender`] and
//! [`Listener`]. The master protocol and the endpoint sockets are supplied by
//! the application through [`NodeClientBuilder`].
//!
//! ```
//! use graph_connection::{ConnectionSettings, GraphConnection, Listener, Sender};
//! use loopback_graph::messages::TextMessage;
//! use loopback_graph::LoopbackGraph;
//! use std::sync::Arc;
//!
//! let graph = LoopbackGraph::new();
//! let settings = ConnectionSettings::new("loopback://master", "loopback://viz", "/viz");
//! let connection = GraphConnection::new(settings, graph.builder()).unwrap();
//!
//! let sender = Sender::<TextMessage>::new("chatter");
//! let listener = Listener::new("chatter", |message: Arc<TextMessage>| {
//!     println!("heard {}", message.0);
//! });
//! connection.advertise(&sender);
//! connection.subscribe(&listener);
//! connection.set_keep_reconnecting(true);
//!
//! // Dropped while the sender has no live publisher, delivered otherwise.
//! connection.publish(&sender, TextMessage::new("hello"));
//!
//! connection.stop().unwrap();
//! ```
//!
//! ## Internal architecture map
//!
//! - Actor: connection state machine and the worker loop that owns it
//! - Runtime: task queue and the dedicated worker thread
//! - Multiplexer: reference-counted topic and service tables, re-established
//!   after every reconnect
//! - Watchdog: master liveness probing per live connection
//! - Diagnostics: endpoint and peer report
//!
//! ## Observability model
//!
//! The workspace uses `tracing` for logs/events.
//! Library code emits events and does not initialize a global subscriber.
//! Binaries and tests are responsible for one-time `tracing_subscriber`
//! initialization at process boundaries.

mod actor;
pub use actor::connection_actor::{
    ActorError, ActorOptions, ConnectError, ConnectionActor, ConnectionSupervisor, Connector,
};
pub use actor::connection_state::{ConnectionEvent, ConnectionState};

mod connection;
pub use connection::GraphConnection;

mod diagnostics;
pub use diagnostics::{ConnectionReport, EndpointReport, ServiceReport};

mod handles;
pub use handles::{Listener, Sender, UNLIVE_ID};

mod manager;
pub use manager::ConnectionManager;

mod message;
pub use message::{downcast_message, Message, MessageType, TypedMessage};

mod multiplexer;
pub use multiplexer::graph_multiplexer::GraphMultiplexer;
pub use multiplexer::service_table::ServiceCallError;

#[doc(hidden)]
pub mod observability;
mod runtime;
pub use runtime::task_queue::{Job, JobResult};

mod settings;
pub use settings::{ConfigError, ConnectionSettings, TimingSettings, WatchdogSettings};

mod transport;
pub use transport::{
    EndpointStats, MasterClient, MessageCallback, NodeClient, NodeClientBuilder, NodeInfo,
    PeerStats, Publisher, ServiceHandler, Subscriber, TopicInfo, TransportError,
};

mod watchdog;

#[doc(hidden)]
pub mod benchmark_support;
