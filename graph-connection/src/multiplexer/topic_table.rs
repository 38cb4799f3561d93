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

//! Reference-counted advertise/subscribe bookkeeping.
//!
//! Pure table state: no network calls happen here. The multiplexer decides
//! when to create or tear down endpoints from the outcomes these methods
//! return.

use crate::handles::{ListenerSlot, SenderSlot, UNLIVE_ID};
use crate::message::MessageType;
use crate::multiplexer::fan_out::FanOut;
use crate::transport::{MessageCallback, Publisher, Subscriber};
use std::collections::HashMap;
use std::sync::Arc;

/// One shared network publish endpoint.
pub(crate) struct AdvertisedTopic {
    pub(crate) topic: String,
    pub(crate) message_type: MessageType,
    /// Index into the publishers array, or [`UNLIVE_ID`].
    pub(crate) id: i32,
    pub(crate) publisher: Option<Arc<dyn Publisher>>,
    senders: HashMap<u64, Arc<SenderSlot>>,
}

impl AdvertisedTopic {
    pub(crate) fn sender_count(&self) -> usize {
        self.senders.len()
    }

    fn set_id(&mut self, id: i32) {
        self.id = id;
        for sender in self.senders.values() {
            sender.set_id(id);
        }
    }
}

/// One shared network subscribe endpoint.
pub(crate) struct SubscribedTopic {
    pub(crate) topic: String,
    pub(crate) message_type: MessageType,
    pub(crate) fan_out: Arc<FanOut>,
    pub(crate) subscriber: Option<Arc<dyn Subscriber>>,
}

/// Outcome of adding a handle to its topic.
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum Join {
    /// First handle on the topic; the entry has no live endpoint yet.
    Created,
    /// Joined an existing entry which now has `members` handles.
    Shared { members: usize },
    AlreadyMember,
    /// The topic exists with a different message type; the handle was not added.
    TypeMismatch { existing: MessageType },
}

/// Outcome of removing a handle from its topic.
pub(crate) enum Leave<E> {
    Released { remaining: usize },
    /// Last handle left; the entry was taken out of the table.
    Removed(E),
    Unknown,
}

#[derive(Default)]
pub(crate) struct TopicTable {
    advertised: HashMap<String, AdvertisedTopic>,
    subscribed: HashMap<String, SubscribedTopic>,
    publishers: Vec<Option<Arc<dyn Publisher>>>,
}

impl TopicTable {
    pub(crate) fn add_sender(&mut self, sender: &Arc<SenderSlot>) -> Join {
        if let Some(entry) = self.advertised.get_mut(sender.topic()) {
            if entry.message_type != sender.message_type() {
                sender.set_id(UNLIVE_ID);
                return Join::TypeMismatch {
                    existing: entry.message_type,
                };
            }
            sender.set_id(entry.id);
            if entry
                .senders
                .insert(sender.key(), sender.clone())
                .is_some()
            {
                return Join::AlreadyMember;
            }
            return Join::Shared {
                members: entry.senders.len(),
            };
        }

        sender.set_id(UNLIVE_ID);
        let mut senders = HashMap::new();
        senders.insert(sender.key(), sender.clone());
        self.advertised.insert(
            sender.topic().to_string(),
            AdvertisedTopic {
                topic: sender.topic().to_string(),
                message_type: sender.message_type(),
                id: UNLIVE_ID,
                publisher: None,
                senders,
            },
        );
        Join::Created
    }

    pub(crate) fn remove_sender(&mut self, sender: &SenderSlot) -> Leave<AdvertisedTopic> {
        let Some(entry) = self.advertised.get_mut(sender.topic()) else {
            return Leave::Unknown;
        };
        if entry.senders.remove(&sender.key()).is_none() {
            return Leave::Unknown;
        }
        sender.set_id(UNLIVE_ID);

        let remaining = entry.senders.len();
        if remaining > 0 {
            return Leave::Released { remaining };
        }

        match self.advertised.remove(sender.topic()) {
            Some(entry) => {
                self.release_slot(entry.id);
                Leave::Removed(entry)
            }
            None => Leave::Unknown,
        }
    }

    /// Makes `publisher` the live endpoint of `topic` and hands its slot index
    /// to every sender of the topic.
    pub(crate) fn install_publisher(
        &mut self,
        topic: &str,
        publisher: Arc<dyn Publisher>,
    ) -> Option<i32> {
        let previous_id = self.advertised.get(topic)?.id;
        self.release_slot(previous_id);
        let id = self.allocate_slot(publisher.clone());

        let entry = self.advertised.get_mut(topic)?;
        entry.publisher = Some(publisher);
        entry.set_id(id);
        Some(id)
    }

    /// Live publisher at `id`, if any.
    pub(crate) fn publisher(&self, id: i32) -> Option<&Arc<dyn Publisher>> {
        let index = usize::try_from(id).ok()?;
        self.publishers.get(index)?.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn publisher_slots(&self) -> usize {
        self.publishers.len()
    }

    fn allocate_slot(&mut self, publisher: Arc<dyn Publisher>) -> i32 {
        let index = match self.publishers.iter().position(Option::is_none) {
            Some(index) => {
                self.publishers[index] = Some(publisher);
                index
            }
            None => {
                self.publishers.push(Some(publisher));
                self.publishers.len() - 1
            }
        };
        i32::try_from(index).unwrap_or(UNLIVE_ID)
    }

    fn release_slot(&mut self, id: i32) {
        if let Some(slot) = usize::try_from(id)
            .ok()
            .and_then(|index| self.publishers.get_mut(index))
        {
            *slot = None;
        }
    }

    pub(crate) fn add_listener(&mut self, listener: &Arc<ListenerSlot>) -> Join {
        if let Some(entry) = self.subscribed.get(listener.topic()) {
            if entry.message_type != listener.message_type() {
                listener.set_live(false);
                return Join::TypeMismatch {
                    existing: entry.message_type,
                };
            }
            if !entry.fan_out.insert(listener.clone()) {
                return Join::AlreadyMember;
            }
            listener.set_live(entry.subscriber.is_some());
            return Join::Shared {
                members: entry.fan_out.len(),
            };
        }

        listener.set_live(false);
        let fan_out = Arc::new(FanOut::new());
        fan_out.insert(listener.clone());
        self.subscribed.insert(
            listener.topic().to_string(),
            SubscribedTopic {
                topic: listener.topic().to_string(),
                message_type: listener.message_type(),
                fan_out,
                subscriber: None,
            },
        );
        Join::Created
    }

    pub(crate) fn remove_listener(&mut self, listener: &ListenerSlot) -> Leave<SubscribedTopic> {
        let Some(entry) = self.subscribed.get(listener.topic()) else {
            return Leave::Unknown;
        };
        if entry.fan_out.remove(listener.key()).is_none() {
            return Leave::Unknown;
        }
        listener.set_live(false);

        let remaining = entry.fan_out.len();
        if remaining > 0 {
            return Leave::Released { remaining };
        }

        match self.subscribed.remove(listener.topic()) {
            Some(entry) => Leave::Removed(entry),
            None => Leave::Unknown,
        }
    }

    pub(crate) fn install_subscriber(&mut self, topic: &str, subscriber: Arc<dyn Subscriber>) -> bool {
        let Some(entry) = self.subscribed.get_mut(topic) else {
            return false;
        };
        entry.subscriber = Some(subscriber);
        entry.fan_out.set_live(true);
        true
    }

    /// Drops every live endpoint while keeping all entries and their members.
    pub(crate) fn invalidate(&mut self) {
        for entry in self.advertised.values_mut() {
            entry.publisher = None;
            entry.set_id(UNLIVE_ID);
        }
        self.publishers.clear();

        for entry in self.subscribed.values_mut() {
            entry.subscriber = None;
            entry.fan_out.set_live(false);
        }
    }

    pub(crate) fn advertise_requests(&self) -> Vec<(String, MessageType)> {
        self.advertised
            .values()
            .map(|entry| (entry.topic.clone(), entry.message_type))
            .collect()
    }

    pub(crate) fn subscribe_requests(&self) -> Vec<(String, MessageType, MessageCallback)> {
        self.subscribed
            .values()
            .map(|entry| {
                (
                    entry.topic.clone(),
                    entry.message_type,
                    entry.fan_out.callback(),
                )
            })
            .collect()
    }

    pub(crate) fn advertised_topic(&self, topic: &str) -> Option<&AdvertisedTopic> {
        self.advertised.get(topic)
    }

    pub(crate) fn subscribed_topic(&self, topic: &str) -> Option<&SubscribedTopic> {
        self.subscribed.get(topic)
    }

    pub(crate) fn advertised(&self) -> impl Iterator<Item = &AdvertisedTopic> {
        self.advertised.values()
    }

    pub(crate) fn subscribed(&self) -> impl Iterator<Item = &SubscribedTopic> {
        self.subscribed.values()
    }
}
