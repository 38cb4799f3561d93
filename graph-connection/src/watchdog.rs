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

//! Master liveness watchdog.
//!
//! One watchdog task runs per successful connect. It periodically looks up a
//! node that is always registered with the master and reacts to what it sees:
//!
//! - the node answers from a different address than last time: the master was
//!   restarted, so the registration is gone and a reconnect is requested;
//! - the node answers after the last success is older than the stale
//!   threshold: probes were missed (for example while the process was
//!   suspended), so a reconnect is requested;
//! - the lookup fails or times out: the warning is raised once and probing
//!   continues.
//!
//! The watchdog never touches the topic tables. It only signals through the
//! [`ConnectionSupervisor`].

use crate::actor::connection_actor::ConnectionSupervisor;
use crate::observability::{events, fields};
use crate::settings::WatchdogSettings;
use crate::transport::MasterClient;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const COMPONENT: &str = "watchdog";

/// Why a watchdog task ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum WatchdogExit {
    Cancelled,
    MasterChanged,
    Stale,
}

/// Running watchdog task. Dropping the handle cancels the task.
pub(crate) struct WatchdogHandle {
    cancel: CancellationToken,
    task: JoinHandle<WatchdogExit>,
}

impl WatchdogHandle {
    /// Spawns the watchdog on the current runtime.
    pub(crate) fn spawn(
        master: Arc<dyn MasterClient>,
        settings: WatchdogSettings,
        supervisor: Arc<dyn ConnectionSupervisor>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_watchdog(master, settings, supervisor, cancel.clone()));
        Self { cancel, task }
    }

    pub(crate) fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for WatchdogHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub(crate) async fn run_watchdog(
    master: Arc<dyn MasterClient>,
    settings: WatchdogSettings,
    supervisor: Arc<dyn ConnectionSupervisor>,
    cancel: CancellationToken,
) -> WatchdogExit {
    let probe_interval = settings.probe_interval();
    let probe_timeout = settings.probe_timeout();
    let stale_threshold = settings.stale_threshold();
    info!(
        event = events::WATCHDOG_START,
        component = COMPONENT,
        probe_node = settings.probe_node.as_str(),
        probe_interval_ms = fields::format_millis(probe_interval),
        stale_threshold_ms = fields::format_millis(stale_threshold),
        "master watchdog started"
    );

    let mut ticker = interval(probe_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_uri: Option<String> = None;
    let mut last_success: Option<Instant> = None;
    let mut warning_raised = false;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return cancelled(),
            _ = ticker.tick() => {}
        }

        let probe = tokio::select! {
            biased;
            _ = cancel.cancelled() => return cancelled(),
            probe = timeout(probe_timeout, master.lookup_node(&settings.probe_node)) => probe,
        };

        let node = match probe {
            Ok(Ok(node)) => node,
            Ok(Err(err)) => {
                probe_failed(&supervisor, &mut warning_raised, &settings, &err.to_string());
                continue;
            }
            Err(_) => {
                let reason = format!(
                    "no answer within {} ms",
                    fields::format_millis(probe_timeout)
                );
                probe_failed(&supervisor, &mut warning_raised, &settings, &reason);
                continue;
            }
        };

        let now = Instant::now();
        if let Some(previous) = last_uri.as_deref() {
            if previous != node.uri {
                info!(
                    event = events::WATCHDOG_MASTER_CHANGED,
                    component = COMPONENT,
                    probe_node = settings.probe_node.as_str(),
                    previous_uri = previous,
                    uri = node.uri.as_str(),
                    "probe node moved; master was restarted, reconnecting"
                );
                supervisor.set_master_warning(false);
                supervisor.request_disconnect();
                return WatchdogExit::MasterChanged;
            }
        }

        if let Some(last) = last_success {
            let silence = now.duration_since(last);
            if silence > stale_threshold {
                warn!(
                    event = events::WATCHDOG_STALE,
                    component = COMPONENT,
                    silence_ms = fields::format_millis(silence),
                    stale_threshold_ms = fields::format_millis(stale_threshold),
                    "master registration may be stale, reconnecting"
                );
                supervisor.set_master_warning(false);
                supervisor.request_disconnect();
                return WatchdogExit::Stale;
            }
        }

        if warning_raised {
            info!(
                event = events::WATCHDOG_RECOVERED,
                component = COMPONENT,
                probe_node = settings.probe_node.as_str(),
                "master answers again"
            );
            supervisor.set_master_warning(false);
            warning_raised = false;
        }
        last_uri = Some(node.uri);
        last_success = Some(now);
    }
}

fn cancelled() -> WatchdogExit {
    debug!(
        event = events::WATCHDOG_CANCELLED,
        component = COMPONENT,
        "master watchdog cancelled"
    );
    WatchdogExit::Cancelled
}

fn probe_failed(
    supervisor: &Arc<dyn ConnectionSupervisor>,
    warning_raised: &mut bool,
    settings: &WatchdogSettings,
    reason: &str,
) {
    if *warning_raised {
        debug!(
            event = events::WATCHDOG_PROBE_FAILED,
            component = COMPONENT,
            probe_node = settings.probe_node.as_str(),
            reason,
            "master still not answering"
        );
        return;
    }

    warn!(
        event = events::WATCHDOG_PROBE_FAILED,
        component = COMPONENT,
        probe_node = settings.probe_node.as_str(),
        reason,
        "master not answering"
    );
    supervisor.set_master_warning(true);
    *warning_raised = true;
}

#[cfg(test)]
mod tests {
    use super::{run_watchdog, WatchdogExit};
    use crate::actor::connection_actor::ConnectionSupervisor;
    use crate::settings::WatchdogSettings;
    use crate::transport::{MasterClient, NodeInfo, TopicInfo, TransportError};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    const ROSOUT_URI: &str = "http://rosout-host:40001/";
    const RESTARTED_ROSOUT_URI: &str = "http://rosout-host:40777/";

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    enum Signal {
        Warning(bool),
        Disconnect,
    }

    #[derive(Default)]
    struct RecordingSupervisor {
        signals: Mutex<Vec<Signal>>,
    }

    impl RecordingSupervisor {
        fn signals(&self) -> Vec<Signal> {
            self.signals.lock().expect("signals lock").clone()
        }
    }

    impl ConnectionSupervisor for RecordingSupervisor {
        fn request_disconnect(&self) {
            self.signals
                .lock()
                .expect("signals lock")
                .push(Signal::Disconnect);
        }

        fn set_master_warning(&self, warning: bool) {
            self.signals
                .lock()
                .expect("signals lock")
                .push(Signal::Warning(warning));
        }
    }

    enum Reply {
        At(&'static str),
        Unreachable,
        Hang,
    }

    /// Answers with the scripted replies in order, then keeps answering from
    /// [`ROSOUT_URI`].
    struct ScriptedMaster {
        replies: Mutex<VecDeque<Reply>>,
    }

    impl ScriptedMaster {
        fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
            })
        }
    }

    #[async_trait]
    impl MasterClient for ScriptedMaster {
        async fn lookup_node(&self, name: &str) -> Result<NodeInfo, TransportError> {
            let reply = self
                .replies
                .lock()
                .expect("replies lock")
                .pop_front()
                .unwrap_or(Reply::At(ROSOUT_URI));
            match reply {
                Reply::At(uri) => Ok(NodeInfo {
                    name: name.to_string(),
                    uri: uri.to_string(),
                }),
                Reply::Unreachable => Err(TransportError::Unreachable("scripted".to_string())),
                Reply::Hang => std::future::pending().await,
            }
        }

        async fn get_published_topics(&self) -> Result<Vec<TopicInfo>, TransportError> {
            Ok(Vec::new())
        }
    }

    fn spawn_watchdog(
        master: Arc<ScriptedMaster>,
        supervisor: &Arc<RecordingSupervisor>,
    ) -> (CancellationToken, tokio::task::JoinHandle<WatchdogExit>) {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_watchdog(
            master,
            WatchdogSettings::default(),
            supervisor.clone(),
            cancel.clone(),
        ));
        (cancel, task)
    }

    #[tokio::test(start_paused = true)]
    async fn changed_master_address_requests_reconnect() {
        let supervisor = Arc::new(RecordingSupervisor::default());
        let master = ScriptedMaster::new(vec![
            Reply::At(ROSOUT_URI),
            Reply::At(RESTARTED_ROSOUT_URI),
        ]);

        let (_cancel, task) = spawn_watchdog(master, &supervisor);

        assert_eq!(task.await.expect("watchdog task"), WatchdogExit::MasterChanged);
        assert_eq!(
            supervisor.signals(),
            vec![Signal::Warning(false), Signal::Disconnect]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failure_raises_warning_once_and_recovery_clears_it() {
        let supervisor = Arc::new(RecordingSupervisor::default());
        let master = ScriptedMaster::new(vec![Reply::At(ROSOUT_URI), Reply::Unreachable]);

        let (cancel, task) = spawn_watchdog(master, &supervisor);
        tokio::time::sleep(Duration::from_secs(12)).await;
        cancel.cancel();

        assert_eq!(task.await.expect("watchdog task"), WatchdogExit::Cancelled);
        assert_eq!(
            supervisor.signals(),
            vec![Signal::Warning(true), Signal::Warning(false)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn success_after_long_silence_requests_reconnect() {
        let supervisor = Arc::new(RecordingSupervisor::default());
        let master = ScriptedMaster::new(vec![
            Reply::At(ROSOUT_URI),
            Reply::Unreachable,
            Reply::Unreachable,
        ]);

        let (_cancel, task) = spawn_watchdog(master, &supervisor);

        assert_eq!(task.await.expect("watchdog task"), WatchdogExit::Stale);
        assert_eq!(
            supervisor.signals(),
            vec![
                Signal::Warning(true),
                Signal::Warning(false),
                Signal::Disconnect
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_probe_counts_as_failure() {
        let supervisor = Arc::new(RecordingSupervisor::default());
        let master = ScriptedMaster::new(vec![Reply::Hang, Reply::Hang, Reply::Hang]);

        let (cancel, task) = spawn_watchdog(master, &supervisor);
        tokio::time::sleep(Duration::from_secs(11)).await;
        cancel.cancel();

        assert_eq!(task.await.expect("watchdog task"), WatchdogExit::Cancelled);
        assert_eq!(supervisor.signals(), vec![Signal::Warning(true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_exits_without_signals() {
        let supervisor = Arc::new(RecordingSupervisor::default());
        let master = ScriptedMaster::new(Vec::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let exit = run_watchdog(
            master,
            WatchdogSettings::default(),
            supervisor.clone(),
            cancel,
        )
        .await;

        assert_eq!(exit, WatchdogExit::Cancelled);
        assert!(supervisor.signals().is_empty());
    }
}
