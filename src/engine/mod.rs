//! Device-shadow synchronisation engine.
//!
//! ```text
//!   ┌───────────────────────── Engine::tick ─────────────────────────┐
//!   │ 1. ConnectionManager::poll   (reconnect, resubscribe on entry) │
//!   │ 2. Transport::poll → SubscriptionRouter::dispatch → handlers   │
//!   │ 3. DiscoveryPublisher::announce for every pending entity       │
//!   │ 4. StateStore::pending → publish → confirm                     │
//!   └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine owns the transport, the entity arena and the shadow.  Entity
//! handlers live in the arena and are reached through [`EntityId`]s carried
//! by routes, so a command can only ever target a live entity.  Everything
//! runs on the caller's thread; nothing here locks.

pub mod connection;
pub mod discovery;
pub mod entity;
pub mod router;
pub mod store;
pub mod topics;

use log::{debug, error, info, warn};

use crate::app::commands::Command;
use crate::app::ports::{InboundMessage, TransportError, TransportPort};
use crate::config::DeviceConfig;
use crate::error::{Error, ProtocolError, RegistrationError};

use connection::{ConnectionEvent, ConnectionManager, ConnectionState, Credentials};
use discovery::{DeviceIdentity, DiscoveryPublisher};
use entity::{Entity, EntityId, EntityKind, EntitySpec};
use router::{Route, SubscriptionRouter};
use store::{PropertyKey, ShadowValue, StateStore};
use topics::{ONLINE, PROP_STATE, TopicScheme};

// ───────────────────────────────────────────────────────────────
// Handler seam
// ───────────────────────────────────────────────────────────────

/// The slice of the shadow belonging to one entity, handed to its handler.
pub struct EntityShadow<'a> {
    entity_id: &'a str,
    store: &'a mut StateStore,
}

impl<'a> EntityShadow<'a> {
    pub fn new(entity_id: &'a str, store: &'a mut StateStore) -> Self {
        Self { entity_id, store }
    }

    pub fn entity_id(&self) -> &str {
        self.entity_id
    }

    /// Store a property value.  Returns `true` if it changed.
    pub fn set(&mut self, property: &str, value: impl Into<ShadowValue>) -> bool {
        self.store.set(PropertyKey::new(self.entity_id, property), value)
    }

    pub fn get(&self, property: &str) -> Option<&ShadowValue> {
        self.store.get(&PropertyKey::new(self.entity_id, property))
    }
}

/// Command sink for switches and lights.
///
/// Handlers apply the command to their actuator and record the resulting
/// state through `shadow`.  Errors are logged by the engine; they never
/// abort the tick.
pub trait EntityHandler {
    fn handle(&mut self, command: Command, shadow: &mut EntityShadow<'_>) -> Result<(), Error>;

    /// Called once right after registration to put the actuator into a
    /// known state.  Defaults to "off".
    fn bootstrap(&mut self, shadow: &mut EntityShadow<'_>) -> Result<(), Error> {
        self.handle(Command::SetState(false), shadow)
    }
}

struct EntitySlot {
    entity: Entity,
    handler: Option<Box<dyn EntityHandler>>,
    /// Discovery descriptor confirmed published since the last resync.
    announced: bool,
}

/// Summary of one [`Engine::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub connection: ConnectionEvent,
    /// Inbound messages that reached a handler.
    pub dispatched: usize,
    /// Discovery descriptors published.
    pub announced: usize,
    /// Shadow entries confirmed on the wire.
    pub published: usize,
}

impl TickReport {
    fn offline() -> Self {
        Self {
            connection: ConnectionEvent::Offline,
            dispatched: 0,
            announced: 0,
            published: 0,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Engine
// ───────────────────────────────────────────────────────────────

pub struct Engine<T: TransportPort> {
    transport: T,
    topics: TopicScheme,
    connection: ConnectionManager,
    router: SubscriptionRouter,
    discovery: DiscoveryPublisher,
    store: StateStore,
    entities: Vec<EntitySlot>,
    inbox: Vec<InboundMessage>,
    log_topic: String,
}

impl<T: TransportPort> Engine<T> {
    pub fn new(transport: T, config: &DeviceConfig, identity: DeviceIdentity) -> Self {
        let topics = TopicScheme::new(
            config.discovery_prefix.as_str(),
            config.topic_root.as_str(),
            identity.device_id.as_str(),
        );
        let connection = ConnectionManager::new(
            Credentials {
                client_id: identity.device_id.clone(),
                user: config.mqtt_user.clone(),
                password: config.mqtt_password.clone(),
            },
            config.reconnect_delay_ms,
        );

        let mut engine = Self {
            transport,
            topics,
            connection,
            router: SubscriptionRouter::new(),
            discovery: DiscoveryPublisher::new(identity),
            store: StateStore::new(),
            entities: Vec::new(),
            inbox: Vec::new(),
            log_topic: config.log_topic.clone(),
        };

        let hub_status = engine.topics.hub_status();
        if let Err(e) = engine
            .router
            .subscribe(&hub_status, Route::HubStatus, &mut engine.transport)
        {
            warn!("Hub status route not registered: {}", e);
        }
        engine
    }

    // ── Connection ────────────────────────────────────────────

    /// Block until the broker accepts the session, then subscribe every
    /// recorded topic.  See [`ConnectionManager::connect_blocking`].
    pub fn connect_blocking(&mut self, clock: impl FnMut() -> u64, delay: impl FnMut(u64)) {
        self.connection
            .connect_blocking(&mut self.transport, clock, delay);
        self.router.resubscribe_all(&mut self.transport);
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    // ── Registration ──────────────────────────────────────────

    pub fn add_sensor(&mut self, spec: EntitySpec) -> Result<EntityId, RegistrationError> {
        self.register(spec, EntityKind::Sensor, None)
    }

    /// Register a switch.  Its handler is bootstrapped (`SetState(false)`)
    /// before this returns.
    pub fn add_switch(
        &mut self,
        spec: EntitySpec,
        handler: impl EntityHandler + 'static,
    ) -> Result<EntityId, RegistrationError> {
        self.register(spec, EntityKind::Switch, Some(Box::new(handler)))
    }

    /// Register a light with state and brightness command topics.
    pub fn add_light(
        &mut self,
        spec: EntitySpec,
        handler: impl EntityHandler + 'static,
    ) -> Result<EntityId, RegistrationError> {
        self.register(spec, EntityKind::Light, Some(Box::new(handler)))
    }

    fn register(
        &mut self,
        spec: EntitySpec,
        kind: EntityKind,
        handler: Option<Box<dyn EntityHandler>>,
    ) -> Result<EntityId, RegistrationError> {
        let entity = Entity::new(spec, kind)?;
        if self.find(&entity.id).is_some() {
            warn!("Entity '{}' already exists", entity.id);
            return Err(RegistrationError::DuplicateEntity(entity.id));
        }

        let id = EntityId(self.entities.len());
        let mut routes = Vec::new();
        if kind.accepts_commands() {
            routes.push((self.topics.command(&entity.id), Route::EntityState(id)));
        }
        if kind == EntityKind::Light {
            routes.push((self.topics.brightness_command(&entity.id), Route::EntityBrightness(id)));
        }
        // Command topics embed the validated unique id, so they cannot
        // collide with each other or with the hub status topic.
        for (topic, route) in routes {
            self.router.subscribe(&topic, route, &mut self.transport)?;
        }

        info!("Registered {} '{}' ({})", kind, entity.id, entity.name);
        self.entities.push(EntitySlot {
            entity,
            handler,
            announced: false,
        });

        if self.transport.is_connected() {
            self.announce(id);
        }

        let slot = &mut self.entities[id.0];
        if let Some(handler) = slot.handler.as_mut() {
            let mut shadow = EntityShadow::new(&slot.entity.id, &mut self.store);
            if let Err(e) = handler.bootstrap(&mut shadow) {
                error!("Bootstrap of '{}' failed: {}", slot.entity.id, e);
            }
        }
        Ok(id)
    }

    // ── Shadow access ─────────────────────────────────────────

    /// Record a property value for `id`.  Returns `true` if it changed.
    pub fn set(&mut self, id: EntityId, property: &str, value: impl Into<ShadowValue>) -> bool {
        match self.entities.get(id.0) {
            Some(slot) => self
                .store
                .set(PropertyKey::new(slot.entity.id.as_str(), property), value),
            None => false,
        }
    }

    pub fn get(&self, id: EntityId, property: &str) -> Option<&ShadowValue> {
        let slot = self.entities.get(id.0)?;
        self.store
            .get(&PropertyKey::new(slot.entity.id.as_str(), property))
    }

    /// Run a command against an entity's handler, as if it had arrived
    /// from the hub.  Used for local inputs.
    pub fn execute(&mut self, id: EntityId, command: Command) -> Result<(), Error> {
        let Some(slot) = self.entities.get_mut(id.0) else {
            return Ok(());
        };
        let Some(handler) = slot.handler.as_mut() else {
            debug!("'{}' takes no commands, dropping {:?}", slot.entity.id, command);
            return Ok(());
        };
        let mut shadow = EntityShadow::new(&slot.entity.id, &mut self.store);
        handler.handle(command, &mut shadow)
    }

    // ── Tick ──────────────────────────────────────────────────

    /// One pass of the engine: connection, inbound, discovery, outbound.
    pub fn tick(&mut self, now_ms: u64) -> TickReport {
        let connection = self.connection.poll(now_ms, &mut self.transport);
        match connection {
            ConnectionEvent::Offline => return TickReport::offline(),
            ConnectionEvent::Established => {
                self.router.resubscribe_all(&mut self.transport);
            }
            ConnectionEvent::Online => {}
        }

        let dispatched = self.service_inbound();
        let announced = self.announce_pending();
        let published = self.flush_state();

        TickReport {
            connection,
            dispatched,
            announced,
            published,
        }
    }

    fn service_inbound(&mut self) -> usize {
        let mut inbox = core::mem::take(&mut self.inbox);
        self.transport.poll(&mut inbox);

        let mut dispatched = 0;
        for msg in inbox.drain(..) {
            match self.dispatch(&msg) {
                Ok(()) => dispatched += 1,
                Err(Error::Protocol(ProtocolError::UnknownTopic(_))) => {}
                Err(e) => warn!("{}", e),
            }
        }
        self.inbox = inbox;
        dispatched
    }

    fn dispatch(&mut self, msg: &InboundMessage) -> Result<(), Error> {
        let route = self.router.dispatch(&msg.topic, &msg.payload)?;
        let invalid = || ProtocolError::InvalidPayload {
            topic: msg.topic.clone(),
            payload: msg.payload.clone(),
        };

        match route {
            Route::HubStatus => {
                info!("Home Assistant went {}", msg.payload.trim());
                if msg.payload.trim().eq_ignore_ascii_case(ONLINE) {
                    self.resync();
                }
                Ok(())
            }
            Route::EntityState(id) => {
                let command = Command::parse_state(&msg.payload).ok_or_else(invalid)?;
                self.execute_logged(id, command);
                Ok(())
            }
            Route::EntityBrightness(id) => {
                let command = Command::parse_brightness(&msg.payload).ok_or_else(invalid)?;
                self.execute_logged(id, command);
                Ok(())
            }
        }
    }

    fn execute_logged(&mut self, id: EntityId, command: Command) {
        if let Err(e) = self.execute(id, command) {
            let name = self.entity(id).map_or("?", |ent| ent.id.as_str());
            error!("Command {:?} for '{}' failed: {}", command, name, e);
        }
    }

    /// Re-flag every shadow entry and every descriptor for publication.
    pub fn resync(&mut self) {
        info!("Resync: republishing {} value(s)", self.store.len());
        self.store.mark_all_dirty();
        for slot in &mut self.entities {
            slot.announced = false;
        }
    }

    fn announce(&mut self, id: EntityId) -> bool {
        let slot = &mut self.entities[id.0];
        let ok = self
            .discovery
            .announce(&slot.entity, &self.topics, &mut self.transport)
            .is_ok();
        slot.announced = ok;
        ok
    }

    fn announce_pending(&mut self) -> usize {
        let mut count = 0;
        for i in 0..self.entities.len() {
            if !self.entities[i].announced && self.announce(EntityId(i)) {
                count += 1;
            }
        }
        count
    }

    fn flush_state(&mut self) -> usize {
        let batch = self.store.pending();
        if batch.is_empty() {
            return 0;
        }

        let topic = self.topics.state();
        let payload = batch.to_json();
        match self.transport.publish(&topic, &payload) {
            Ok(()) => {
                debug!("Publish to topic '{}':\n{}\n", topic, batch.to_json_pretty());
                self.store.confirm(&batch);
                batch.len()
            }
            Err(e) => {
                error!("Publish to topic '{}' failed ({}):\n{}\n", topic, e, payload);
                0
            }
        }
    }

    /// Publish one mirrored log line.  Dropped while offline.
    pub fn publish_log(&mut self, line: &str) -> Result<(), TransportError> {
        if !self.connection.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.transport.publish(&self.log_topic, line)
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn find(&self, entity_id: &str) -> Option<EntityId> {
        self.entities
            .iter()
            .position(|s| s.entity.id == entity_id)
            .map(EntityId)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0).map(|s| &s.entity)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().map(|s| &s.entity)
    }

    pub fn is_on(&self, id: EntityId) -> Option<bool> {
        match self.get(id, PROP_STATE)? {
            ShadowValue::Bool(on) => Some(*on),
            _ => None,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn topics(&self) -> &TopicScheme {
        &self.topics
    }

    pub fn device(&self) -> &DeviceIdentity {
        self.discovery.device()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
