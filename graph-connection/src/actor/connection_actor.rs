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

//! Single-worker connection actor.
//!
//! Every network-affecting operation is funnelled through one dedicated worker
//! thread. Callers only push jobs onto the [`TaskQueue`] or read atomics, so the
//! connection state machine is never driven from two places at once.

use crate::actor::connection_state::{AtomicConnectionState, ConnectionEvent, ConnectionState};
use crate::observability::{events, fields};
use crate::runtime::task_queue::{Job, JobResult, Task, TaskQueue};
use crate::runtime::worker_runtime::{spawn_worker_loop, WORKER_THREAD_NAME};
use crate::settings::ConfigError;
use crate::transport::TransportError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const COMPONENT: &str = "connection_actor";
const EVENT_CHANNEL_CAPACITY: usize = 64;
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(2000);
const DEFAULT_WAKE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Reasons a connect attempt failed. Always recoverable; the worker retries.
#[derive(Debug)]
pub enum ConnectError {
    InvalidSettings(ConfigError),
    Transport(TransportError),
    TimedOut(Duration),
}

impl Display for ConnectError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConnectError::InvalidSettings(err) => write!(f, "invalid connection settings: {err}"),
            ConnectError::Transport(err) => write!(f, "connect failed: {err}"),
            ConnectError::TimedOut(after) => {
                write!(f, "connect timed out after {} ms", fields::format_millis(*after))
            }
        }
    }
}

impl Error for ConnectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConnectError::InvalidSettings(err) => Some(err),
            ConnectError::Transport(err) => Some(err),
            ConnectError::TimedOut(_) => None,
        }
    }
}

/// Failures of the actor lifecycle itself.
#[derive(Debug)]
pub enum ActorError {
    SpawnFailed(io::Error),
    InvalidSettings(ConfigError),
    /// The worker has exited; the request was never executed.
    WorkerStopped,
    /// `stop` was called from a job running on the worker thread.
    StopFromWorker,
    WorkerPanicked,
}

impl Display for ActorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ActorError::SpawnFailed(err) => write!(f, "failed to spawn worker thread: {err}"),
            ActorError::InvalidSettings(err) => write!(f, "invalid connection settings: {err}"),
            ActorError::WorkerStopped => write!(f, "connection worker is stopped"),
            ActorError::StopFromWorker => {
                write!(f, "stop cannot join the worker from the worker thread")
            }
            ActorError::WorkerPanicked => write!(f, "connection worker panicked"),
        }
    }
}

impl Error for ActorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ActorError::SpawnFailed(err) => Some(err),
            ActorError::InvalidSettings(err) => Some(err),
            _ => None,
        }
    }
}

/// Signals a background task may raise against the actor without touching the
/// state owned by the worker.
pub trait ConnectionSupervisor: Send + Sync {
    /// Enqueues a teardown; the worker reconnects afterwards when asked to.
    fn request_disconnect(&self);

    /// Raises or clears the "master not responding" warning.
    fn set_master_warning(&self, warning: bool);
}

/// The connection-specific half of the actor: how to connect and tear down.
///
/// The worker owns the connector exclusively; jobs receive `&mut` access to it.
#[async_trait]
pub trait Connector: Send + 'static {
    async fn connect(
        &mut self,
        supervisor: Arc<dyn ConnectionSupervisor>,
    ) -> Result<(), ConnectError>;

    /// Releases every live network resource. Must be idempotent.
    async fn disconnect(&mut self);
}

/// Worker loop tuning.
#[derive(Clone, Debug)]
pub struct ActorOptions {
    /// Minimum spacing between two connect attempts.
    pub retry_interval: Duration,
    /// Upper bound on one idle wait of the worker.
    pub wake_timeout: Duration,
    pub thread_name: String,
}

impl Default for ActorOptions {
    fn default() -> Self {
        Self {
            retry_interval: DEFAULT_RETRY_INTERVAL,
            wake_timeout: DEFAULT_WAKE_TIMEOUT,
            thread_name: WORKER_THREAD_NAME.to_string(),
        }
    }
}

struct ActorShared<C> {
    state: AtomicConnectionState,
    keep_reconnecting: AtomicBool,
    running: AtomicBool,
    master_warning: AtomicBool,
    queue: TaskQueue<C>,
    events: broadcast::Sender<ConnectionEvent>,
    options: ActorOptions,
}

impl<C: Connector> ActorShared<C> {
    fn enqueue(&self, task: Task<C>) {
        if !self.running.load(Ordering::Acquire) {
            debug!(
                event = events::JOB_REJECTED_STOPPED,
                component = COMPONENT,
                reason = fields::REASON_STOP_REQUESTED,
                "worker stopped; dropping task"
            );
            return;
        }
        self.queue.push(task);

        // Lost a race with the worker shutting down: nothing will drain this.
        if !self.running.load(Ordering::Acquire) {
            self.queue.discard_pending();
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.swap(state);
        if previous == state {
            return;
        }

        info!(
            event = events::STATE_CHANGED,
            component = COMPONENT,
            from = previous.as_str(),
            state = state.as_str(),
            "connection state changed"
        );
        let _ = self.events.send(ConnectionEvent::StateChanged(state));
    }

    async fn run(self: Arc<Self>, mut connector: C) {
        let worker_thread = fields::current_thread_name_or_default();
        let supervisor: Arc<dyn ConnectionSupervisor> = self.clone();

        let outcome = AssertUnwindSafe(self.drive(&mut connector, supervisor))
            .catch_unwind()
            .await;
        if let Err(payload) = outcome {
            error!(
                event = events::WORKER_FATAL,
                component = COMPONENT,
                worker_thread = worker_thread.as_str(),
                panic = %fields::format_panic_payload(payload.as_ref()),
                "worker loop panicked; connection actor is permanently stopped"
            );
        }

        self.running.store(false, Ordering::Release);
        let discarded = self.queue.discard_pending();
        if let Err(payload) = AssertUnwindSafe(connector.disconnect())
            .catch_unwind()
            .await
        {
            error!(
                event = events::WORKER_FATAL,
                component = COMPONENT,
                worker_thread = worker_thread.as_str(),
                panic = %fields::format_panic_payload(payload.as_ref()),
                "final teardown panicked"
            );
        }
        self.set_state(ConnectionState::Disconnected);
        self.set_master_warning(false);

        info!(
            event = events::WORKER_STOPPED,
            component = COMPONENT,
            worker_thread = worker_thread.as_str(),
            discarded_tasks = discarded,
            "connection worker stopped"
        );
    }

    async fn drive(&self, connector: &mut C, supervisor: Arc<dyn ConnectionSupervisor>) {
        let mut last_attempt: Option<Instant> = None;

        while self.running.load(Ordering::Acquire) {
            let retry_due = last_attempt
                .map_or(true, |attempt| attempt.elapsed() >= self.options.retry_interval);
            if self.keep_reconnecting.load(Ordering::Acquire)
                && self.state.load() != ConnectionState::Connected
                && retry_due
            {
                last_attempt = Some(Instant::now());
                self.attempt_connect(connector, supervisor.clone()).await;
            }

            self.queue.wait(self.options.wake_timeout).await;
            self.drain(connector).await;
        }
    }

    async fn attempt_connect(&self, connector: &mut C, supervisor: Arc<dyn ConnectionSupervisor>) {
        self.set_state(ConnectionState::Connecting);
        debug!(
            event = events::CONNECT_ATTEMPT,
            component = COMPONENT,
            "attempting connect"
        );

        match AssertUnwindSafe(connector.connect(supervisor))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => {
                info!(event = events::CONNECT_OK, component = COMPONENT, "connected");
                self.set_state(ConnectionState::Connected);
            }
            Ok(Err(err)) => {
                warn!(
                    event = events::CONNECT_FAILED,
                    component = COMPONENT,
                    err = %err,
                    retry_in_ms = fields::format_millis(self.options.retry_interval),
                    "connect attempt failed"
                );
                self.set_state(ConnectionState::Disconnected);
            }
            Err(payload) => {
                error!(
                    event = events::CONNECT_PANICKED,
                    component = COMPONENT,
                    panic = %fields::format_panic_payload(payload.as_ref()),
                    "connect attempt panicked"
                );
                self.set_state(ConnectionState::Disconnected);
            }
        }
    }

    /// Runs queued tasks until the queue is empty, including tasks queued by
    /// the tasks themselves.
    async fn drain(&self, connector: &mut C) {
        while let Some(task) = self.queue.pop() {
            match task {
                Task::Job(job) => self.run_job(job, connector).await,
                Task::Disconnect => self.run_disconnect(connector).await,
            }
        }
    }

    async fn run_job(&self, job: Box<dyn Job<C>>, connector: &mut C) {
        match AssertUnwindSafe(job.run(connector)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(
                    event = events::JOB_FAILED,
                    component = COMPONENT,
                    err = %err,
                    "job failed"
                );
            }
            Err(payload) => {
                error!(
                    event = events::JOB_PANICKED,
                    component = COMPONENT,
                    panic = %fields::format_panic_payload(payload.as_ref()),
                    "job panicked"
                );
            }
        }
    }

    async fn run_disconnect(&self, connector: &mut C) {
        if self.state.load() == ConnectionState::Disconnected {
            debug!(
                event = events::DISCONNECT_START,
                component = COMPONENT,
                reason = fields::REASON_NOT_CONNECTED,
                "already disconnected"
            );
            return;
        }

        info!(
            event = events::DISCONNECT_START,
            component = COMPONENT,
            "disconnecting"
        );
        if let Err(payload) = AssertUnwindSafe(connector.disconnect())
            .catch_unwind()
            .await
        {
            error!(
                event = events::JOB_PANICKED,
                component = COMPONENT,
                panic = %fields::format_panic_payload(payload.as_ref()),
                "teardown panicked"
            );
        }
        self.set_state(ConnectionState::Disconnected);
        // The next watchdog starts without a raised warning.
        self.set_master_warning(false);
        info!(
            event = events::DISCONNECT_OK,
            component = COMPONENT,
            "disconnected"
        );
    }
}

impl<C: Connector> ConnectionSupervisor for ActorShared<C> {
    fn request_disconnect(&self) {
        self.enqueue(Task::Disconnect);
    }

    fn set_master_warning(&self, warning: bool) {
        if self.master_warning.swap(warning, Ordering::AcqRel) == warning {
            return;
        }
        let _ = self.events.send(ConnectionEvent::WarningStateChanged(warning));
    }
}

/// Owner of the worker thread and entry point for all connection operations.
///
/// Dropping the actor stops the worker if [`ConnectionActor::stop`] was not
/// called explicitly.
pub struct ConnectionActor<C: Connector> {
    shared: Arc<ActorShared<C>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl<C: Connector> ConnectionActor<C> {
    /// Moves `connector` onto a new worker thread and starts the worker loop.
    ///
    /// The actor starts with reconnecting disabled.
    pub fn spawn(connector: C, options: ActorOptions) -> Result<Self, ActorError> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let thread_name = options.thread_name.clone();
        let shared = Arc::new(ActorShared {
            state: AtomicConnectionState::new(ConnectionState::Disconnected),
            keep_reconnecting: AtomicBool::new(false),
            running: AtomicBool::new(true),
            master_warning: AtomicBool::new(false),
            queue: TaskQueue::new(),
            events,
            options,
        });

        let worker_shared = shared.clone();
        let handle = match spawn_worker_loop(thread_name.clone(), move || {
            worker_shared.run(connector)
        }) {
            Ok(handle) => handle,
            Err(err) => {
                shared.running.store(false, Ordering::Release);
                error!(
                    event = events::WORKER_SPAWN_FAILED,
                    component = COMPONENT,
                    worker_thread = thread_name.as_str(),
                    err = %err,
                    "failed to spawn connection worker"
                );
                return Err(ActorError::SpawnFailed(err));
            }
        };

        info!(
            event = events::WORKER_SPAWN_OK,
            component = COMPONENT,
            worker_thread = thread_name.as_str(),
            "connection worker started"
        );

        Ok(Self {
            shared,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Queues `job` for the worker and returns immediately.
    ///
    /// Errors returned and panics raised by the job are logged on the worker.
    pub fn add_task<F>(&self, job: F)
    where
        F: for<'a> FnOnce(&'a mut C) -> BoxFuture<'a, JobResult> + Send + 'static,
    {
        self.shared.enqueue(Task::Job(Box::new(job)));
    }

    /// Queues a teardown. Has no effect when already disconnected.
    pub fn disconnect(&self) {
        self.shared.enqueue(Task::Disconnect);
    }

    pub fn set_keep_reconnecting(&self, keep_reconnecting: bool) {
        self.shared
            .keep_reconnecting
            .store(keep_reconnecting, Ordering::Release);
        self.shared.queue.wake();
    }

    pub fn keep_reconnecting(&self) -> bool {
        self.shared.keep_reconnecting.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.load()
    }

    pub fn master_warning(&self) -> bool {
        self.shared.master_warning.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn pending_tasks(&self) -> usize {
        self.shared.queue.len()
    }

    /// Every state and warning change from now on, in the order they happened.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.shared.events.subscribe()
    }

    /// Stops the worker and blocks until it has exited.
    ///
    /// The job in progress finishes first; jobs still queued are dropped.
    /// Calling `stop` again is a no-op.
    pub fn stop(&self) -> Result<(), ActorError> {
        let Some(handle) = self.take_worker() else {
            warn!(
                event = events::WORKER_ALREADY_STOPPED,
                component = COMPONENT,
                "stop called on a stopped connection actor"
            );
            return Ok(());
        };
        self.join_worker(handle)
    }

    fn take_worker(&self) -> Option<thread::JoinHandle<()>> {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn join_worker(&self, handle: thread::JoinHandle<()>) -> Result<(), ActorError> {
        let worker_thread = fields::thread_name_or_default(handle.thread().name());
        info!(
            event = events::WORKER_STOP_REQUESTED,
            component = COMPONENT,
            worker_thread = worker_thread.as_str(),
            "stopping connection worker"
        );
        self.shared.running.store(false, Ordering::Release);
        self.shared.queue.wake();

        if handle.thread().id() == thread::current().id() {
            return Err(ActorError::StopFromWorker);
        }
        handle.join().map_err(|_| ActorError::WorkerPanicked)
    }
}

impl<C: Connector> Drop for ConnectionActor<C> {
    fn drop(&mut self) {
        if let Some(handle) = self.take_worker() {
            if let Err(err) = self.join_worker(handle) {
                warn!(
                    event = events::WORKER_STOPPED,
                    component = COMPONENT,
                    err = %err,
                    "connection worker did not stop cleanly"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ActorOptions, ConnectError, ConnectionActor, ConnectionSupervisor, Connector,
    };
    use crate::actor::connection_state::{ConnectionEvent, ConnectionState};
    use crate::runtime::task_queue::JobResult;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use futures::FutureExt;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::{broadcast, oneshot};

    const EVENT_WAIT: Duration = Duration::from_secs(2);

    enum Outcome {
        Succeed,
        Fail,
        Panic,
    }

    #[derive(Clone, Default)]
    struct Probe {
        log: Arc<Mutex<Vec<&'static str>>>,
        connects: Arc<AtomicUsize>,
        disconnects: Arc<AtomicUsize>,
        supervisor: Arc<Mutex<Option<Arc<dyn ConnectionSupervisor>>>>,
    }

    impl Probe {
        fn log(&self) -> Vec<&'static str> {
            self.log.lock().expect("log lock").clone()
        }

        fn supervisor(&self) -> Arc<dyn ConnectionSupervisor> {
            self.supervisor
                .lock()
                .expect("supervisor lock")
                .clone()
                .expect("connected at least once")
        }
    }

    struct ScriptedConnector {
        outcomes: VecDeque<Outcome>,
        probe: Probe,
    }

    impl ScriptedConnector {
        fn new(outcomes: Vec<Outcome>) -> (Self, Probe) {
            let probe = Probe::default();
            (
                Self {
                    outcomes: outcomes.into(),
                    probe: probe.clone(),
                },
                probe,
            )
        }

        fn record(&self, entry: &'static str) {
            self.probe.log.lock().expect("log lock").push(entry);
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(
            &mut self,
            supervisor: Arc<dyn ConnectionSupervisor>,
        ) -> Result<(), ConnectError> {
            self.probe.connects.fetch_add(1, Ordering::SeqCst);
            *self.probe.supervisor.lock().expect("supervisor lock") = Some(supervisor);
            match self.outcomes.pop_front().unwrap_or(Outcome::Succeed) {
                Outcome::Succeed => Ok(()),
                Outcome::Fail => Err(ConnectError::Transport(TransportError::Unreachable(
                    "scripted".to_string(),
                ))),
                Outcome::Panic => panic!("scripted connect panic"),
            }
        }

        async fn disconnect(&mut self) {
            self.probe.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn exploding_job() -> JobResult {
        panic!("scripted job panic")
    }

    fn fast_options() -> ActorOptions {
        ActorOptions {
            retry_interval: Duration::from_millis(20),
            wake_timeout: Duration::from_millis(10),
            thread_name: "graph-connection-test".to_string(),
        }
    }

    async fn next_event(events: &mut broadcast::Receiver<ConnectionEvent>) -> ConnectionEvent {
        tokio::time::timeout(EVENT_WAIT, events.recv())
            .await
            .expect("event within timeout")
            .expect("event channel open")
    }

    async fn wait_for_log(probe: &Probe, len: usize) -> Vec<&'static str> {
        tokio::time::timeout(EVENT_WAIT, async {
            loop {
                let log = probe.log();
                if log.len() >= len {
                    return log;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("log filled within timeout")
    }

    #[tokio::test]
    async fn jobs_queued_from_a_job_run_after_earlier_jobs() {
        let (connector, probe) = ScriptedConnector::new(Vec::new());
        let actor = Arc::new(
            ConnectionActor::spawn(connector, fast_options()).expect("actor spawns"),
        );
        let (release_tx, release_rx) = oneshot::channel::<()>();

        actor.add_task(move |_connector| {
            async move {
                let _ = release_rx.await;
                JobResult::Ok(())
            }
            .boxed()
        });

        let nested = actor.clone();
        actor.add_task(move |connector| {
            async move {
                connector.record("a");
                nested.add_task(|connector| {
                    async move {
                        connector.record("c");
                        JobResult::Ok(())
                    }
                    .boxed()
                });
                JobResult::Ok(())
            }
            .boxed()
        });
        actor.add_task(|connector| {
            async move {
                connector.record("b");
                JobResult::Ok(())
            }
            .boxed()
        });
        release_tx.send(()).expect("gate job is waiting");

        assert_eq!(wait_for_log(&probe, 3).await, vec!["a", "b", "c"]);
        actor.stop().expect("worker stops");
    }

    #[tokio::test]
    async fn failing_and_panicking_jobs_do_not_stop_the_worker() {
        let (connector, probe) = ScriptedConnector::new(Vec::new());
        let actor = ConnectionActor::spawn(connector, fast_options()).expect("actor spawns");

        actor.add_task(|_connector| {
            async move { JobResult::Err("scripted job failure".into()) }.boxed()
        });
        actor.add_task(|_connector| async move { exploding_job() }.boxed());
        actor.add_task(|connector| {
            async move {
                connector.record("survived");
                JobResult::Ok(())
            }
            .boxed()
        });

        assert_eq!(wait_for_log(&probe, 1).await, vec!["survived"]);
        assert!(actor.is_running());
        actor.stop().expect("worker stops");
    }

    #[tokio::test]
    async fn reconnect_retries_after_failure_and_panic() {
        let (connector, probe) =
            ScriptedConnector::new(vec![Outcome::Fail, Outcome::Panic, Outcome::Succeed]);
        let actor = ConnectionActor::spawn(connector, fast_options()).expect("actor spawns");
        let mut events = actor.subscribe_events();

        actor.set_keep_reconnecting(true);

        let mut observed = Vec::new();
        loop {
            let event = next_event(&mut events).await;
            observed.push(event);
            if event == ConnectionEvent::StateChanged(ConnectionState::Connected) {
                break;
            }
        }

        use ConnectionState::{Connected, Connecting, Disconnected};
        assert_eq!(
            observed,
            vec![
                ConnectionEvent::StateChanged(Connecting),
                ConnectionEvent::StateChanged(Disconnected),
                ConnectionEvent::StateChanged(Connecting),
                ConnectionEvent::StateChanged(Disconnected),
                ConnectionEvent::StateChanged(Connecting),
                ConnectionEvent::StateChanged(Connected),
            ]
        );
        assert_eq!(probe.connects.load(Ordering::SeqCst), 3);
        assert_eq!(actor.state(), Connected);
        actor.stop().expect("worker stops");
    }

    #[tokio::test]
    async fn repeated_disconnect_fires_one_transition() {
        let (connector, probe) = ScriptedConnector::new(Vec::new());
        let actor = ConnectionActor::spawn(connector, fast_options()).expect("actor spawns");
        let mut events = actor.subscribe_events();

        actor.set_keep_reconnecting(true);
        while next_event(&mut events).await
            != ConnectionEvent::StateChanged(ConnectionState::Connected)
        {}
        actor.set_keep_reconnecting(false);

        actor.disconnect();
        actor.disconnect();
        actor.add_task(|connector| {
            async move {
                connector.record("after");
                JobResult::Ok(())
            }
            .boxed()
        });
        wait_for_log(&probe, 1).await;

        assert_eq!(
            next_event(&mut events).await,
            ConnectionEvent::StateChanged(ConnectionState::Disconnected)
        );
        assert!(events.try_recv().is_err());
        assert_eq!(probe.disconnects.load(Ordering::SeqCst), 1);
        actor.stop().expect("worker stops");
    }

    #[tokio::test]
    async fn supervisor_warning_is_deduplicated_and_disconnect_is_queued() {
        let (connector, probe) = ScriptedConnector::new(Vec::new());
        let actor = ConnectionActor::spawn(connector, fast_options()).expect("actor spawns");
        let mut events = actor.subscribe_events();

        actor.set_keep_reconnecting(true);
        while next_event(&mut events).await
            != ConnectionEvent::StateChanged(ConnectionState::Connected)
        {}
        actor.set_keep_reconnecting(false);

        let supervisor = probe.supervisor();
        supervisor.set_master_warning(true);
        supervisor.set_master_warning(true);
        supervisor.set_master_warning(false);
        supervisor.request_disconnect();

        assert_eq!(
            next_event(&mut events).await,
            ConnectionEvent::WarningStateChanged(true)
        );
        assert_eq!(
            next_event(&mut events).await,
            ConnectionEvent::WarningStateChanged(false)
        );
        assert_eq!(
            next_event(&mut events).await,
            ConnectionEvent::StateChanged(ConnectionState::Disconnected)
        );
        assert!(!actor.master_warning());
        actor.stop().expect("worker stops");
    }

    #[tokio::test]
    async fn disconnect_clears_a_raised_warning() {
        let (connector, probe) = ScriptedConnector::new(Vec::new());
        let actor = ConnectionActor::spawn(connector, fast_options()).expect("actor spawns");
        let mut events = actor.subscribe_events();

        actor.set_keep_reconnecting(true);
        while next_event(&mut events).await
            != ConnectionEvent::StateChanged(ConnectionState::Connected)
        {}
        actor.set_keep_reconnecting(false);

        probe.supervisor().set_master_warning(true);
        assert_eq!(
            next_event(&mut events).await,
            ConnectionEvent::WarningStateChanged(true)
        );

        actor.disconnect();

        assert_eq!(
            next_event(&mut events).await,
            ConnectionEvent::StateChanged(ConnectionState::Disconnected)
        );
        assert_eq!(
            next_event(&mut events).await,
            ConnectionEvent::WarningStateChanged(false)
        );
        assert!(!actor.master_warning());
        actor.stop().expect("worker stops");
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_rejects_later_jobs() {
        let (connector, probe) = ScriptedConnector::new(Vec::new());
        let actor = ConnectionActor::spawn(connector, fast_options()).expect("actor spawns");

        actor.stop().expect("first stop joins");
        actor.stop().expect("second stop is a no-op");

        actor.add_task(|connector| {
            async move {
                connector.record("never");
                JobResult::Ok(())
            }
            .boxed()
        });

        assert!(!actor.is_running());
        assert_eq!(actor.state(), ConnectionState::Disconnected);
        assert_eq!(actor.pending_tasks(), 0);
        assert!(probe.log().is_empty());
    }
}
