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

//! Runtime helper for spawning the connection worker loop.

use crate::observability::{events, fields};
use std::future::Future;
use std::io;
use std::thread;
use tokio::runtime::Builder;
use tracing::error;

const COMPONENT: &str = "worker_runtime";

pub(crate) const WORKER_THREAD_NAME: &str = "graph-connection-worker";

/// Runs `run_loop` to completion on a dedicated thread with its own
/// current-thread runtime. The future is built on that thread so it need not
/// be `Send`.
pub(crate) fn spawn_worker_loop<F, Fut>(
    thread_name: String,
    run_loop: F,
) -> io::Result<thread::JoinHandle<()>>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + 'static,
{
    thread::Builder::new().name(thread_name).spawn(move || {
        let runtime = match Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(err) => {
                error!(
                    event = events::WORKER_FATAL,
                    component = COMPONENT,
                    worker_thread = %fields::current_thread_name_or_default(),
                    err = %err,
                    "failed to build worker runtime"
                );
                return;
            }
        };

        runtime.block_on(run_loop());
    })
}

#[cfg(test)]
mod tests {
    use super::spawn_worker_loop;
    use std::sync::mpsc;

    #[test]
    fn worker_loop_runs_on_named_thread() {
        let (tx, rx) = mpsc::channel();

        let handle = spawn_worker_loop("graph-connection-test".to_string(), move || async move {
            tokio::task::yield_now().await;
            let name = std::thread::current().name().map(str::to_string);
            let _ = tx.send(name);
        })
        .expect("spawn worker thread");

        handle.join().expect("worker thread joins");
        assert_eq!(
            rx.recv().expect("loop reported"),
            Some("graph-connection-test".to_string())
        );
    }
}
