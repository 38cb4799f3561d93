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

mod config;

use crate::config::Config;
use clap::Parser;
use graph_connection::{ConnectionManager, ConnectionState, GraphConnection, Listener, Sender};
use loopback_graph::messages::TextMessage;
use loopback_graph::LoopbackGraph;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

const CONNECTED_POLL: Duration = Duration::from_millis(20);

#[derive(Parser)]
#[command()]
struct NodeArgs {
    #[arg(short, long, value_name = "FILE")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = tracing_subscriber::fmt::try_init();

    info!("Started configurable-node");

    let args = NodeArgs::parse();
    let contents = std::fs::read_to_string(&args.config)
        .map_err(|e| format!("Unable to read config file {}: {e}", args.config))?;
    let config: Config =
        json5::from_str(&contents).map_err(|e| format!("Unable to parse config file: {e}"))?;
    config.connection.validate()?;

    let graph = LoopbackGraph::new();
    let manager = ConnectionManager::new();
    let connection = Arc::new(GraphConnection::new(
        config.connection.clone(),
        graph.builder(),
    )?);
    manager.install(connection.clone());

    let listeners: Vec<_> = config
        .subscribe
        .iter()
        .map(|topic| {
            let topic_name = topic.clone();
            Listener::new(topic.as_str(), move |message: Arc<TextMessage>| {
                info!("{topic_name}: heard {}", message.0);
            })
        })
        .collect();
    for listener in &listeners {
        connection.subscribe(listener);
    }

    let senders: Vec<_> = config
        .publish
        .iter()
        .map(|publish| (Sender::<TextMessage>::new(publish.topic.as_str()), publish))
        .collect();
    for (sender, _) in &senders {
        connection.advertise(sender);
    }

    connection.set_keep_reconnecting(true);
    let connect_wait = config.connection.timing.connect_timeout() * 2;
    let connected = timeout(connect_wait, async {
        while connection.state() != ConnectionState::Connected {
            sleep(CONNECTED_POLL).await;
        }
    })
    .await;
    if connected.is_err() {
        warn!("Not connected after {connect_wait:?}, publishing anyway");
    }

    // Registration runs on the worker; this report queues behind it.
    connection.report().await?;
    for (sender, publish) in &senders {
        for text in &publish.messages {
            connection.publish(sender, TextMessage::new(text.as_str()));
        }
    }

    sleep(Duration::from_millis(config.linger_ms)).await;
    let report = connection.report().await?;
    println!("{report}");

    manager.clear();
    info!("Stopped configurable-node");
    Ok(())
}
