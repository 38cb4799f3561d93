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

//! Small message types for tests and demos.

use graph_connection::{Message, MessageType, TypedMessage};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMessage(pub String);

impl TextMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

impl Message for TextMessage {
    fn message_type(&self) -> MessageType {
        Self::MESSAGE_TYPE
    }

    fn byte_length(&self) -> usize {
        4 + self.0.len()
    }

    fn serialize(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&(self.0.len() as u32).to_le_bytes());
        buffer.extend_from_slice(self.0.as_bytes());
    }
}

impl TypedMessage for TextMessage {
    const MESSAGE_TYPE: MessageType =
        MessageType::new("std_msgs/String", "992ce8a1687cec8c8bd883ec73ca41d1");
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CountMessage(pub i64);

impl Message for CountMessage {
    fn message_type(&self) -> MessageType {
        Self::MESSAGE_TYPE
    }

    fn byte_length(&self) -> usize {
        8
    }

    fn serialize(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.0.to_le_bytes());
    }
}

impl TypedMessage for CountMessage {
    const MESSAGE_TYPE: MessageType =
        MessageType::new("std_msgs/Int64", "34add168574510e6e17f5d23ecc077ef");
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddTwoIntsRequest {
    pub a: i64,
    pub b: i64,
}

impl Message for AddTwoIntsRequest {
    fn message_type(&self) -> MessageType {
        Self::MESSAGE_TYPE
    }

    fn byte_length(&self) -> usize {
        16
    }

    fn serialize(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.a.to_le_bytes());
        buffer.extend_from_slice(&self.b.to_le_bytes());
    }
}

impl TypedMessage for AddTwoIntsRequest {
    const MESSAGE_TYPE: MessageType = MessageType::new(
        "rospy_tutorials/AddTwoIntsRequest",
        "36d09b846be0b371c5f190354dd3153e",
    );
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddTwoIntsResponse {
    pub sum: i64,
}

impl Message for AddTwoIntsResponse {
    fn message_type(&self) -> MessageType {
        Self::MESSAGE_TYPE
    }

    fn byte_length(&self) -> usize {
        8
    }

    fn serialize(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.sum.to_le_bytes());
    }
}

impl TypedMessage for AddTwoIntsResponse {
    const MESSAGE_TYPE: MessageType = MessageType::new(
        "rospy_tutorials/AddTwoIntsResponse",
        "b88405221c77b1878a3cbbfff53428d7",
    );
}
