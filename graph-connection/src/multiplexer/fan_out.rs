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

//! Delivery of one received message to every listener of a topic.

use crate::handles::ListenerSlot;
use crate::message::Message;
use crate::transport::MessageCallback;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// Listener set of one subscribed topic.
///
/// Only the worker changes the set. The transport reads a snapshot on every
/// delivery, so a listener added or removed mid-delivery takes effect with the
/// next message.
pub(crate) struct FanOut {
    listeners: ArcSwap<Vec<Arc<ListenerSlot>>>,
}

impl FanOut {
    pub(crate) fn new() -> Self {
        Self {
            listeners: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Adds `listener`; returns `false` if it is already a member.
    pub(crate) fn insert(&self, listener: Arc<ListenerSlot>) -> bool {
        let current = self.listeners.load();
        if current.iter().any(|member| member.key() == listener.key()) {
            return false;
        }
        let mut next: Vec<_> = current.iter().cloned().collect();
        next.push(listener);
        self.listeners.store(Arc::new(next));
        true
    }

    pub(crate) fn remove(&self, key: u64) -> Option<Arc<ListenerSlot>> {
        let current = self.listeners.load_full();
        let position = current.iter().position(|member| member.key() == key)?;
        let mut next: Vec<_> = current.iter().cloned().collect();
        let removed = next.remove(position);
        self.listeners.store(Arc::new(next));
        Some(removed)
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.load().len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn set_live(&self, live: bool) {
        for listener in self.listeners.load().iter() {
            listener.set_live(live);
        }
    }

    /// Delivers `message` to each current listener once. Returns the number of
    /// listeners reached.
    pub(crate) fn deliver(&self, message: Arc<dyn Message>) -> usize {
        let listeners = self.listeners.load();
        for listener in listeners.iter() {
            listener.deliver(message.clone());
        }
        listeners.len()
    }

    /// Receive callback handed to the transport for this topic.
    pub(crate) fn callback(self: &Arc<Self>) -> MessageCallback {
        let fan_out = self.clone();
        Arc::new(move |message| {
            fan_out.deliver(message);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::FanOut;
    use crate::handles::Listener;
    use crate::message::test_messages::Text;
    use crate::message::Message;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_listener(counter: &Arc<AtomicUsize>) -> Listener<Text> {
        let counter = counter.clone();
        Listener::new("/b", move |_message: Arc<Text>| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn callback_reaches_each_listener_once() {
        let fan_out = Arc::new(FanOut::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let listeners: Vec<_> = (0..3).map(|_| counting_listener(&counter)).collect();
        for listener in &listeners {
            assert!(fan_out.insert(listener.slot().clone()));
        }

        let callback = fan_out.callback();
        callback(Arc::new(Text("ping".to_string())) as Arc<dyn Message>);

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(listeners.iter().all(|listener| listener.delivered() == 1));
    }

    #[test]
    fn insert_is_idempotent_and_remove_shrinks_set() {
        let fan_out = FanOut::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let listener = counting_listener(&counter);

        assert!(fan_out.insert(listener.slot().clone()));
        assert!(!fan_out.insert(listener.slot().clone()));
        assert_eq!(fan_out.len(), 1);

        assert!(fan_out.remove(listener.slot().key()).is_some());
        assert!(fan_out.remove(listener.slot().key()).is_none());
        assert!(fan_out.is_empty());
    }

    #[test]
    fn set_live_updates_every_member() {
        let fan_out = FanOut::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let first = counting_listener(&counter);
        let second = counting_listener(&counter);
        fan_out.insert(first.slot().clone());
        fan_out.insert(second.slot().clone());

        fan_out.set_live(true);
        assert!(first.is_live() && second.is_live());

        fan_out.set_live(false);
        assert!(!first.is_live() && !second.is_live());
    }
}
