//! Subscription router: inbound topic → [`Route`].
//!
//! A route is a plain tagged value naming *what* should happen (resync, or
//! a command for an entity arena slot); the engine performs it.  There are
//! no stored closures, so nothing here can outlive the entity it targets.
//!
//! At most one route per topic: a second `subscribe` for the same topic is
//! rejected and the first route stays active.

use std::collections::BTreeMap;

use log::{debug, warn};

use super::entity::EntityId;
use crate::app::ports::TransportPort;
use crate::error::{ProtocolError, RegistrationError};

/// Destination of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Hub availability announcements.
    HubStatus,
    /// `ON`/`OFF` command for an entity.
    EntityState(EntityId),
    /// Brightness command for a light.
    EntityBrightness(EntityId),
}

#[derive(Debug, Default)]
pub struct SubscriptionRouter {
    routes: BTreeMap<String, Route>,
}

impl SubscriptionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `topic → route` and, if the session is up, subscribe on the wire.
    ///
    /// While offline only the mapping is recorded; [`resubscribe_all`]
    /// issues it once the connection is (re-)established.
    ///
    /// [`resubscribe_all`]: Self::resubscribe_all
    pub fn subscribe(
        &mut self,
        topic: &str,
        route: Route,
        transport: &mut impl TransportPort,
    ) -> Result<(), RegistrationError> {
        if self.routes.contains_key(topic) {
            warn!("Subscription '{}' already exists", topic);
            return Err(RegistrationError::DuplicateSubscription(topic.into()));
        }
        self.routes.insert(topic.into(), route);

        if transport.is_connected() {
            if let Err(e) = transport.subscribe(topic) {
                warn!("Subscribe to '{}' failed ({}), will retry on reconnect", topic, e);
            }
        }
        Ok(())
    }

    /// Issue a wire subscribe for every recorded topic.  Returns the number
    /// of topics that failed.
    pub fn resubscribe_all(&self, transport: &mut impl TransportPort) -> usize {
        let mut failed = 0;
        for topic in self.routes.keys() {
            if let Err(e) = transport.subscribe(topic) {
                warn!("Subscribe to '{}' failed: {}", topic, e);
                failed += 1;
            }
        }
        debug!("Resubscribed {} topic(s), {} failed", self.routes.len(), failed);
        failed
    }

    /// Resolve an inbound message.  Unknown topics are logged and reported,
    /// never fatal: brokers deliver retained and foreign messages.
    pub fn dispatch(&self, topic: &str, payload: &str) -> Result<Route, ProtocolError> {
        match self.routes.get(topic) {
            Some(route) => {
                debug!("Received message from topic '{}': {}", topic, payload);
                Ok(*route)
            }
            None => {
                warn!("Received unexpected message from topic '{}': {}", topic, payload);
                Err(ProtocolError::UnknownTopic(topic.into()))
            }
        }
    }

    pub fn route(&self, topic: &str) -> Option<Route> {
        self.routes.get(topic).copied()
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
