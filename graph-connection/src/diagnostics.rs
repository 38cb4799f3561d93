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

//! Human-readable snapshot of the multiplexed endpoints.

use crate::handles::UNLIVE_ID;
use crate::multiplexer::service_table::ServiceTable;
use crate::multiplexer::topic_table::TopicTable;
use crate::settings::ConnectionSettings;
use crate::transport::PeerStats;
use std::fmt::{self, Display, Formatter};

/// One shared publisher or subscriber.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EndpointReport {
    pub topic: String,
    pub message_type: String,
    /// Senders or listeners multiplexed onto the endpoint.
    pub local_handles: usize,
    pub live: bool,
    /// Publishers only.
    pub publisher_id: Option<i32>,
    pub peers: Vec<PeerStats>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ServiceReport {
    pub name: String,
    pub request_type: String,
    pub response_type: String,
    pub live: bool,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConnectionReport {
    pub node_id: String,
    pub master_uri: String,
    pub connected: bool,
    pub watchdog_running: bool,
    pub subscribers: Vec<EndpointReport>,
    pub publishers: Vec<EndpointReport>,
    pub services: Vec<ServiceReport>,
}

impl ConnectionReport {
    pub(crate) fn collect(
        settings: &ConnectionSettings,
        connected: bool,
        watchdog_running: bool,
        topics: &TopicTable,
        services: &ServiceTable,
    ) -> Self {
        let mut subscribers: Vec<_> = topics
            .subscribed()
            .map(|entry| EndpointReport {
                topic: entry.topic.clone(),
                message_type: entry.message_type.name.to_string(),
                local_handles: entry.fan_out.len(),
                live: entry.subscriber.is_some(),
                publisher_id: None,
                peers: entry
                    .subscriber
                    .as_ref()
                    .map(|subscriber| subscriber.stats().peers)
                    .unwrap_or_default(),
            })
            .collect();
        subscribers.sort_by(|a, b| a.topic.cmp(&b.topic));

        let mut publishers: Vec<_> = topics
            .advertised()
            .map(|entry| EndpointReport {
                topic: entry.topic.clone(),
                message_type: entry.message_type.name.to_string(),
                local_handles: entry.sender_count(),
                live: entry.publisher.is_some(),
                publisher_id: Some(entry.id),
                peers: entry
                    .publisher
                    .as_ref()
                    .map(|publisher| publisher.stats().peers)
                    .unwrap_or_default(),
            })
            .collect();
        publishers.sort_by(|a, b| a.topic.cmp(&b.topic));

        let mut services: Vec<_> = services
            .iter()
            .map(|service| ServiceReport {
                name: service.name.clone(),
                request_type: service.request_type.name.to_string(),
                response_type: service.response_type.name.to_string(),
                live: service.live,
            })
            .collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            node_id: settings.node_id.clone(),
            master_uri: settings.master_uri.clone(),
            connected,
            watchdog_running,
            subscribers,
            publishers,
            services,
        }
    }
}

fn liveness(live: bool) -> &'static str {
    if live {
        "live"
    } else {
        "not live"
    }
}

fn write_peers(f: &mut Formatter<'_>, peers: &[PeerStats]) -> fmt::Result {
    for peer in peers {
        writeln!(
            f,
            "    peer {}: {} messages, {} bytes, {}",
            peer.remote_id,
            peer.messages,
            peer.bytes,
            if peer.alive { "alive" } else { "dead" }
        )?;
    }
    Ok(())
}

impl Display for ConnectionReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "node {} @ {} ({}, watchdog {})",
            self.node_id,
            self.master_uri,
            if self.connected {
                "connected"
            } else {
                "disconnected"
            },
            if self.watchdog_running { "on" } else { "off" }
        )?;

        writeln!(f, "subscribers:")?;
        for subscriber in &self.subscribers {
            writeln!(
                f,
                "  {} [{}] listeners: {}, {}",
                subscriber.topic,
                subscriber.message_type,
                subscriber.local_handles,
                liveness(subscriber.live)
            )?;
            write_peers(f, &subscriber.peers)?;
        }

        writeln!(f, "publishers:")?;
        for publisher in &self.publishers {
            writeln!(
                f,
                "  {} [{}] senders: {}, id {}, {}",
                publisher.topic,
                publisher.message_type,
                publisher.local_handles,
                publisher.publisher_id.unwrap_or(UNLIVE_ID),
                liveness(publisher.live)
            )?;
            write_peers(f, &publisher.peers)?;
        }

        writeln!(f, "services:")?;
        for service in &self.services {
            writeln!(
                f,
                "  {} [{} -> {}] {}",
                service.name,
                service.request_type,
                service.response_type,
                liveness(service.live)
            )?;
        }
        Ok(())
    }
}
