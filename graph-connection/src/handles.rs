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

//! Application-owned publish and listen handles.
//!
//! A handle is a typed front for a slot shared with the topic table. The
//! worker writes the slot's publisher id or liveness whenever the network
//! endpoint behind it changes; the application only reads it.

use crate::message::{downcast_message, Message, MessageType, TypedMessage};
use crate::observability::events;
use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

const COMPONENT: &str = "handles";

/// Publisher id of a sender without a live network publisher.
pub const UNLIVE_ID: i32 = -1;

static NEXT_HANDLE_KEY: AtomicU64 = AtomicU64::new(1);

fn next_handle_key() -> u64 {
    NEXT_HANDLE_KEY.fetch_add(1, Ordering::Relaxed)
}

pub(crate) struct SenderSlot {
    key: u64,
    topic: String,
    message_type: MessageType,
    id: AtomicI32,
}

impl SenderSlot {
    pub(crate) fn key(&self) -> u64 {
        self.key
    }

    pub(crate) fn topic(&self) -> &str {
        &self.topic
    }

    pub(crate) fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub(crate) fn id(&self) -> i32 {
        self.id.load(Ordering::Acquire)
    }

    pub(crate) fn set_id(&self, id: i32) {
        self.id.store(id, Ordering::Release);
    }
}

/// Local publishing endpoint for one topic.
///
/// Many senders on the same topic share one network publisher. Advertise the
/// sender through the connection before publishing with it.
pub struct Sender<T> {
    slot: Arc<SenderSlot>,
    _message: PhantomData<fn(T)>,
}

impl<T: TypedMessage> Sender<T> {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(SenderSlot {
                key: next_handle_key(),
                topic: topic.into(),
                message_type: T::MESSAGE_TYPE,
                id: AtomicI32::new(UNLIVE_ID),
            }),
            _message: PhantomData,
        }
    }

    /// The topic name as given by the application, before namespace resolution.
    pub fn topic(&self) -> &str {
        self.slot.topic()
    }

    /// Index of the shared network publisher, or [`UNLIVE_ID`].
    pub fn id(&self) -> i32 {
        self.slot.id()
    }

    pub fn is_live(&self) -> bool {
        self.slot.id() != UNLIVE_ID
    }

    pub(crate) fn slot(&self) -> &Arc<SenderSlot> {
        &self.slot
    }
}

impl<T> Debug for Sender<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("topic", &self.slot.topic)
            .field("message_type", &self.slot.message_type.name)
            .field("id", &self.slot.id())
            .finish()
    }
}

type Delivery = Box<dyn Fn(Arc<dyn Message>) -> bool + Send + Sync>;

pub(crate) struct ListenerSlot {
    key: u64,
    topic: String,
    message_type: MessageType,
    live: AtomicBool,
    delivered: AtomicU64,
    deliver: Delivery,
}

impl ListenerSlot {
    pub(crate) fn key(&self) -> u64 {
        self.key
    }

    pub(crate) fn topic(&self) -> &str {
        &self.topic
    }

    pub(crate) fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub(crate) fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub(crate) fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::Release);
    }

    pub(crate) fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Hands `message` to the application callback if it has the listener's type.
    pub(crate) fn deliver(&self, message: Arc<dyn Message>) {
        let received = message.message_type();
        if (self.deliver)(message) {
            self.delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            warn!(
                event = events::FAN_OUT_TYPE_MISMATCH,
                component = COMPONENT,
                topic = self.topic.as_str(),
                msg_type = self.message_type.name,
                received_type = received.name,
                "dropping message of unexpected type"
            );
        }
    }
}

/// Local listening endpoint for one topic.
///
/// Many listeners on the same topic share one network subscriber; every
/// received message is delivered to each of them once.
pub struct Listener<T> {
    slot: Arc<ListenerSlot>,
    _message: PhantomData<fn(T)>,
}

impl<T: TypedMessage> Listener<T> {
    pub fn new<F>(topic: impl Into<String>, callback: F) -> Self
    where
        F: Fn(Arc<T>) + Send + Sync + 'static,
    {
        let deliver: Delivery = Box::new(move |message| match downcast_message::<T>(message) {
            Some(message) => {
                callback(message);
                true
            }
            None => false,
        });

        Self {
            slot: Arc::new(ListenerSlot {
                key: next_handle_key(),
                topic: topic.into(),
                message_type: T::MESSAGE_TYPE,
                live: AtomicBool::new(false),
                delivered: AtomicU64::new(0),
                deliver,
            }),
            _message: PhantomData,
        }
    }

    pub fn topic(&self) -> &str {
        self.slot.topic()
    }

    /// Whether a network subscriber currently feeds this listener.
    pub fn is_live(&self) -> bool {
        self.slot.is_live()
    }

    /// Number of messages handed to the callback so far.
    pub fn delivered(&self) -> u64 {
        self.slot.delivered()
    }

    pub(crate) fn slot(&self) -> &Arc<ListenerSlot> {
        &self.slot
    }
}

impl<T> Debug for Listener<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("topic", &self.slot.topic)
            .field("message_type", &self.slot.message_type.name)
            .field("live", &self.slot.is_live())
            .finish()
    }
}
