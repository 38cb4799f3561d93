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

//! Opaque message payloads and their runtime type descriptors.
//!
//! Topics are typed by a [`MessageType`] descriptor rather than by a Rust type
//! parameter, so the topic tables stay non-generic. Typed handles erase their
//! payloads to `Arc<dyn Message>` at the table boundary and downcast again on
//! delivery with [`downcast_message`].

use std::any::Any;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

/// Runtime descriptor of a message type, e.g. `geometry_msgs/PoseStamped`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct MessageType {
    pub name: &'static str,
    pub md5sum: &'static str,
}

impl MessageType {
    pub const fn new(name: &'static str, md5sum: &'static str) -> Self {
        Self { name, md5sum }
    }
}

impl Display for MessageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[doc(hidden)]
pub trait AsAny: Any + Send + Sync {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A message payload the transport knows how to put on the wire.
pub trait Message: AsAny + Debug {
    /// Descriptor of the concrete message type.
    fn message_type(&self) -> MessageType;

    /// Number of bytes [`Message::serialize`] writes.
    fn byte_length(&self) -> usize;

    /// Appends the wire representation of this message to `buffer`.
    fn serialize(&self, buffer: &mut Vec<u8>);
}

/// A statically known message type.
pub trait TypedMessage: Message + Sized {
    const MESSAGE_TYPE: MessageType;
}

/// Recovers the concrete payload type from an erased message.
pub fn downcast_message<T: TypedMessage>(message: Arc<dyn Message>) -> Option<Arc<T>> {
    let any: Arc<dyn Any + Send + Sync> = AsAny::into_any(message);
    any.downcast::<T>().ok()
}
