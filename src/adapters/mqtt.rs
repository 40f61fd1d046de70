//! MQTT session adapter.
//!
//! Implements [`TransportPort`] over a broker session whose network I/O
//! runs on a dedicated receiver thread:
//!
//! ```text
//!   receiver thread ──(connected flag)──▶ is_connected()
//!                   ──(session count)──▶ session()
//!                   ──(bounded inbox)──▶ poll()
//!   tick thread     ──publish/subscribe──▶ client
//! ```
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`.
//! - **all other targets**: `rumqttc` (v4, sync client), so the firmware
//!   can run against a desktop broker.
//!
//! Both clients reconnect on their own once created; `connect()` creates
//! the session on first use and afterwards only waits for the next
//! CONNACK.  Every CONNACK bumps the session counter, so a reconnect that
//! completes between two ticks is still seen by the connection manager.
//!
//! The inbox holds at most [`INBOX_CAPACITY`] messages; further messages
//! are dropped until the tick thread drains it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::app::ports::{InboundMessage, TransportError, TransportPort};
use crate::config::DeviceConfig;

/// How long one `connect()` waits for the broker to acknowledge.
const CONNACK_WAIT: Duration = Duration::from_millis(2_000);
const KEEP_ALIVE: Duration = Duration::from_secs(15);
/// Inbound messages buffered between two polls.
pub const INBOX_CAPACITY: usize = 32;
/// Bound on queued outbound requests.
#[cfg(not(target_os = "espidf"))]
const REQUEST_CAPACITY: usize = 64;

#[cfg(target_os = "espidf")]
type Client = esp_idf_svc::mqtt::client::EspMqttClient<'static>;

#[cfg(not(target_os = "espidf"))]
type Client = rumqttc::Client;

pub struct MqttTransport {
    host: String,
    port: u16,
    buffer_size: usize,
    client: Option<Client>,
    connected: Arc<AtomicBool>,
    session: Arc<AtomicU32>,
    inbox_tx: SyncSender<InboundMessage>,
    inbox_rx: Receiver<InboundMessage>,
}

impl MqttTransport {
    pub fn new(config: &DeviceConfig) -> Self {
        let (inbox_tx, inbox_rx) = sync_channel(INBOX_CAPACITY);
        Self {
            host: config.mqtt_host.clone(),
            port: config.mqtt_port,
            buffer_size: config.mqtt_buffer_size,
            client: None,
            connected: Arc::new(AtomicBool::new(false)),
            session: Arc::new(AtomicU32::new(0)),
            inbox_tx,
            inbox_rx,
        }
    }

    fn wait_connack(&self) -> Result<(), TransportError> {
        let deadline = Instant::now() + CONNACK_WAIT;
        while Instant::now() < deadline {
            if self.connected.load(Ordering::Acquire) {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        Err(TransportError::ConnectFailed)
    }

    // ── ESP-IDF backend ───────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn open(&mut self, client_id: &str, user: &str, password: &str) -> Result<Client, TransportError> {
        use esp_idf_svc::mqtt::client::{
            Details, EspMqttClient, EventPayload, MqttClientConfiguration,
        };
        let url = format!("mqtt://{}:{}", self.host, self.port);
        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            username: (!user.is_empty()).then_some(user),
            password: (!password.is_empty()).then_some(password),
            keep_alive_interval: Some(KEEP_ALIVE),
            reconnect_timeout: Some(Duration::from_millis(500)),
            buffer_size: self.buffer_size,
            out_buffer_size: self.buffer_size,
            ..Default::default()
        };

        let (client, mut conn) = EspMqttClient::new(&url, &conf).map_err(|e| {
            warn!("MQTT client init failed: {}", e);
            TransportError::ConnectFailed
        })?;

        let connected = self.connected.clone();
        let session = self.session.clone();
        let inbox = self.inbox_tx.clone();
        std::thread::Builder::new()
            .name("mqtt-rx".into())
            .stack_size(6 * 1024)
            .spawn(move || {
                while let Ok(event) = conn.next() {
                    match event.payload() {
                        EventPayload::Connected(_) => {
                            session.fetch_add(1, Ordering::AcqRel);
                            connected.store(true, Ordering::Release);
                        }
                        EventPayload::Disconnected => connected.store(false, Ordering::Release),
                        EventPayload::Received {
                            topic: Some(topic),
                            data,
                            details: Details::Complete,
                            ..
                        } => {
                            let msg = InboundMessage::new(topic, String::from_utf8_lossy(data));
                            if !deliver(&inbox, msg) {
                                break;
                            }
                        }
                        EventPayload::Error(e) => debug!("MQTT event error: {:?}", e),
                        _ => {}
                    }
                }
                connected.store(false, Ordering::Release);
                info!("mqtt-rx: connection closed");
            })
            .map_err(|_| TransportError::ConnectFailed)?;

        Ok(client)
    }

    // ── rumqttc backend ───────────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn open(&mut self, client_id: &str, user: &str, password: &str) -> Result<Client, TransportError> {
        use rumqttc::{ConnectionError, Event, MqttOptions, Packet};

        let mut options = MqttOptions::new(client_id, self.host.as_str(), self.port);
        options
            .set_keep_alive(KEEP_ALIVE)
            .set_max_packet_size(self.buffer_size, self.buffer_size);
        if !user.is_empty() {
            options.set_credentials(user, password);
        }

        let (client, mut connection) = rumqttc::Client::new(options, REQUEST_CAPACITY);

        let connected = self.connected.clone();
        let session = self.session.clone();
        let inbox = self.inbox_tx.clone();
        std::thread::Builder::new()
            .name("mqtt-rx".into())
            .spawn(move || {
                for notification in connection.iter() {
                    match notification {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            session.fetch_add(1, Ordering::AcqRel);
                            connected.store(true, Ordering::Release);
                        }
                        Ok(Event::Incoming(Packet::Publish(p))) => {
                            let payload = String::from_utf8_lossy(&p.payload).into_owned();
                            if !deliver(&inbox, InboundMessage::new(p.topic, payload)) {
                                break;
                            }
                        }
                        Ok(Event::Incoming(Packet::Disconnect)) => {
                            connected.store(false, Ordering::Release);
                        }
                        Ok(_) => {}
                        Err(ConnectionError::RequestsDone) => break,
                        Err(e) => {
                            connected.store(false, Ordering::Release);
                            debug!("mqtt-rx: {}", e);
                            std::thread::sleep(Duration::from_millis(500));
                        }
                    }
                }
                connected.store(false, Ordering::Release);
                info!("mqtt-rx: connection closed");
            })
            .map_err(|_| TransportError::ConnectFailed)?;

        Ok(client)
    }

    #[cfg(target_os = "espidf")]
    fn send(client: &mut Client, topic: &str, payload: &str) -> Result<(), TransportError> {
        use esp_idf_svc::mqtt::client::QoS;
        client
            .enqueue(topic, QoS::AtMostOnce, false, payload.as_bytes())
            .map(|_| ())
            .map_err(|_| TransportError::PublishFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn send(client: &mut Client, topic: &str, payload: &str) -> Result<(), TransportError> {
        client
            .try_publish(topic, rumqttc::QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .map_err(|_| TransportError::PublishFailed)
    }

    #[cfg(target_os = "espidf")]
    fn request_subscribe(client: &mut Client, topic: &str) -> Result<(), TransportError> {
        use esp_idf_svc::mqtt::client::QoS;
        client
            .subscribe(topic, QoS::AtMostOnce)
            .map(|_| ())
            .map_err(|_| TransportError::SubscribeFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn request_subscribe(client: &mut Client, topic: &str) -> Result<(), TransportError> {
        client
            .try_subscribe(topic, rumqttc::QoS::AtMostOnce)
            .map_err(|_| TransportError::SubscribeFailed)
    }
}

impl TransportPort for MqttTransport {
    fn connect(&mut self, client_id: &str, user: &str, password: &str) -> Result<(), TransportError> {
        if self.client.is_none() {
            info!("MQTT broker {}:{} as '{}'", self.host, self.port, client_id);
            let client = self.open(client_id, user, password)?;
            self.client = Some(client);
        }
        self.wait_connack()
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TransportError> {
        if payload.len() > self.buffer_size {
            return Err(TransportError::PayloadTooLarge {
                len: payload.len(),
                limit: self.buffer_size,
            });
        }
        match self.client.as_mut() {
            Some(client) if self.connected.load(Ordering::Acquire) => Self::send(client, topic, payload),
            _ => Err(TransportError::NotConnected),
        }
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        match self.client.as_mut() {
            Some(client) if self.connected.load(Ordering::Acquire) => {
                Self::request_subscribe(client, topic)
            }
            _ => Err(TransportError::NotConnected),
        }
    }

    fn is_connected(&self) -> bool {
        self.client.is_some() && self.connected.load(Ordering::Acquire)
    }

    fn poll(&mut self, inbox: &mut Vec<InboundMessage>) {
        inbox.extend(self.inbox_rx.try_iter());
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn session(&self) -> u32 {
        self.session.load(Ordering::Acquire)
    }
}

/// Hand a message to the tick thread.  A full inbox drops it; returns
/// `false` only once the transport itself is gone.
fn deliver(inbox: &SyncSender<InboundMessage>, msg: InboundMessage) -> bool {
    match inbox.try_send(msg) {
        Ok(()) => true,
        Err(TrySendError::Full(msg)) => {
            warn!("Inbox full, dropping message from topic '{}'", msg.topic);
            true
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}
