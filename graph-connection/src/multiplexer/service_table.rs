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

//! Advertised services and request/response failures.

use crate::message::MessageType;
use crate::observability::fields;
use crate::transport::{ServiceHandler, TransportError};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

/// Failures of request/response operations routed through the worker.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ServiceCallError {
    /// No live client; the transport was never contacted.
    NotConnected,
    /// The caller's cancellation token fired before the reply arrived.
    Cancelled,
    /// The worker stopped before running the request.
    WorkerStopped,
    TimedOut(Duration),
    Transport(TransportError),
    UnexpectedResponseType { expected: &'static str },
}

impl Display for ServiceCallError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ServiceCallError::NotConnected => write!(f, "not connected"),
            ServiceCallError::Cancelled => write!(f, "cancelled by caller"),
            ServiceCallError::WorkerStopped => write!(f, "connection worker is stopped"),
            ServiceCallError::TimedOut(after) => {
                write!(f, "timed out after {} ms", fields::format_millis(*after))
            }
            ServiceCallError::Transport(err) => write!(f, "{err}"),
            ServiceCallError::UnexpectedResponseType { expected } => {
                write!(f, "response is not a {expected}")
            }
        }
    }
}

impl Error for ServiceCallError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ServiceCallError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

pub(crate) struct AdvertisedService {
    pub(crate) name: String,
    pub(crate) request_type: MessageType,
    pub(crate) response_type: MessageType,
    pub(crate) handler: ServiceHandler,
    pub(crate) live: bool,
}

impl AdvertisedService {
    pub(crate) fn new(
        name: String,
        request_type: MessageType,
        response_type: MessageType,
        handler: ServiceHandler,
    ) -> Self {
        Self {
            name,
            request_type,
            response_type,
            handler,
            live: false,
        }
    }
}

/// One handler per service name. Not reference counted.
#[derive(Default)]
pub(crate) struct ServiceTable {
    services: HashMap<String, AdvertisedService>,
}

impl ServiceTable {
    /// Registers `service`; returns `false` and keeps the existing handler when
    /// the name is taken.
    pub(crate) fn insert(&mut self, service: AdvertisedService) -> bool {
        if self.services.contains_key(&service.name) {
            return false;
        }
        self.services.insert(service.name.clone(), service);
        true
    }

    pub(crate) fn set_live(&mut self, name: &str, live: bool) {
        if let Some(service) = self.services.get_mut(name) {
            service.live = live;
        }
    }

    pub(crate) fn invalidate(&mut self) {
        for service in self.services.values_mut() {
            service.live = false;
        }
    }

    pub(crate) fn requests(&self) -> Vec<(String, ServiceHandler)> {
        self.services
            .values()
            .map(|service| (service.name.clone(), service.handler.clone()))
            .collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &AdvertisedService> {
        self.services.values()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.services.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{AdvertisedService, ServiceCallError, ServiceTable};
    use crate::message::test_messages::{Count, Text};
    use crate::message::{Message, TypedMessage};
    use crate::transport::ServiceHandler;
    use std::sync::Arc;

    fn echo_service(name: &str) -> AdvertisedService {
        let handler: ServiceHandler =
            Arc::new(|request: Arc<dyn Message>| Ok::<_, String>(request));
        AdvertisedService::new(
            name.to_string(),
            Text::MESSAGE_TYPE,
            Count::MESSAGE_TYPE,
            handler,
        )
    }

    #[test]
    fn second_advertise_of_same_name_is_ignored() {
        let mut table = ServiceTable::default();

        assert!(table.insert(echo_service("/echo")));
        assert!(!table.insert(echo_service("/echo")));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn invalidate_marks_every_service_unlive() {
        let mut table = ServiceTable::default();
        table.insert(echo_service("/echo"));
        table.insert(echo_service("/reverse"));
        table.set_live("/echo", true);
        table.set_live("/reverse", true);

        table.invalidate();

        assert!(table.iter().all(|service| !service.live));
        assert_eq!(table.requests().len(), 2);
    }

    #[test]
    fn not_connected_display_is_stable() {
        assert_eq!(ServiceCallError::NotConnected.to_string(), "not connected");
    }
}
