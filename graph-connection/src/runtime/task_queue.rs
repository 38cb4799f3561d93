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

//! FIFO job queue shared between caller threads and the worker.

use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::error::Error;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// Outcome of one job. Errors are logged by the worker and never reach the caller.
pub type JobResult = Result<(), Box<dyn Error + Send + Sync>>;

/// A fire-and-forget unit of work executed on the worker against its target.
pub trait Job<C>: Send {
    fn run<'a>(self: Box<Self>, target: &'a mut C) -> BoxFuture<'a, JobResult>;
}

impl<C, F> Job<C> for F
where
    F: for<'a> FnOnce(&'a mut C) -> BoxFuture<'a, JobResult> + Send,
{
    fn run<'a>(self: Box<Self>, target: &'a mut C) -> BoxFuture<'a, JobResult> {
        (*self)(target)
    }
}

/// Queue entries. Teardown is a dedicated entry so it can drive the state machine.
pub(crate) enum Task<C> {
    Job(Box<dyn Job<C>>),
    Disconnect,
}

/// Thread-safe queue of pending tasks plus the worker wake signal.
pub(crate) struct TaskQueue<C> {
    pending: Mutex<VecDeque<Task<C>>>,
    wake: Notify,
}

impl<C> TaskQueue<C> {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            wake: Notify::new(),
        }
    }

    /// Appends a task and wakes the worker.
    pub(crate) fn push(&self, task: Task<C>) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(task);
        self.wake.notify_one();
    }

    /// Takes the oldest pending task.
    pub(crate) fn pop(&self) -> Option<Task<C>> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drops every pending task without running it. Returns how many were dropped.
    pub(crate) fn discard_pending(&self) -> usize {
        let discarded = std::mem::take(
            &mut *self
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        discarded.len()
    }

    /// Wakes the worker without queueing anything.
    pub(crate) fn wake(&self) {
        self.wake.notify_one();
    }

    /// Waits for a wake-up for at most `timeout`. Returns `true` when woken.
    ///
    /// A wake issued while nobody waits is stored, so a push racing with
    /// this call is never lost.
    pub(crate) async fn wait(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wake.notified())
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::{JobResult, Task, TaskQueue};
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::sync::Arc;
    use std::time::Duration;

    fn job<F>(run: F) -> Task<Vec<u32>>
    where
        F: for<'a> FnOnce(&'a mut Vec<u32>) -> BoxFuture<'a, JobResult> + Send + 'static,
    {
        Task::Job(Box::new(run))
    }

    fn record(value: u32) -> Task<Vec<u32>> {
        job(move |target| {
            async move {
                target.push(value);
                JobResult::Ok(())
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn pop_returns_tasks_in_push_order() {
        let queue = TaskQueue::new();
        queue.push(record(1));
        queue.push(Task::Disconnect);
        queue.push(record(2));

        let mut target = Vec::new();
        let mut disconnects = 0;
        while let Some(task) = queue.pop() {
            match task {
                Task::Job(job) => job.run(&mut target).await.expect("job succeeds"),
                Task::Disconnect => disconnects += 1,
            }
        }

        assert_eq!(target, vec![1, 2]);
        assert_eq!(disconnects, 1);
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn push_before_wait_is_not_lost() {
        let queue: TaskQueue<Vec<u32>> = TaskQueue::new();
        queue.push(record(1));

        assert!(queue.wait(Duration::from_millis(10)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_without_wake() {
        let queue: TaskQueue<Vec<u32>> = TaskQueue::new();

        assert!(!queue.wait(Duration::from_millis(2000)).await);
    }

    #[tokio::test]
    async fn wake_from_another_thread_releases_waiter() {
        let queue: Arc<TaskQueue<Vec<u32>>> = Arc::new(TaskQueue::new());
        let waker = queue.clone();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            waker.wake();
        });

        assert!(queue.wait(Duration::from_secs(5)).await);
        handle.join().expect("waker thread");
    }
}
