//! Connection manager: broker session lifecycle.
//!
//! ```text
//!   Disconnected ──due──▶ Connecting ──ok──▶ Connected
//!        ▲                    │                  │
//!        └──────fail──────────┘      liveness lost│
//!        └────────────────────────────────────────┘
//! ```
//!
//! Polled once per tick: liveness is sampled, never observed
//! asynchronously.  A session renewed by the client between two polls shows
//! up as a changed [`TransportPort::session`] count and is reported as
//! [`ConnectionEvent::Established`].  Retries are unbounded, spaced by a fixed delay.  The
//! manager never sleeps; [`ConnectionManager::connect_blocking`] wraps the
//! same machine in a loop for the boot path.

use log::{info, warn};

use crate::app::ports::TransportPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// What a [`ConnectionManager::poll`] call observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Session was up and still is.
    Online,
    /// Session (re-)entered `Connected` during this call.
    Established,
    /// Session is down; an attempt may have been made and failed.
    Offline,
}

/// Identity presented to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug)]
pub struct ConnectionManager {
    state: ConnectionState,
    credentials: Credentials,
    retry_delay_ms: u64,
    next_attempt_ms: u64,
    attempts: u32,
    session: u32,
}

impl ConnectionManager {
    pub fn new(credentials: Credentials, retry_delay_ms: u32) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            credentials,
            retry_delay_ms: retry_delay_ms.into(),
            next_attempt_ms: 0,
            attempts: 0,
            session: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Failed attempts since the last successful connect.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Advance the state machine.  At most one connect attempt per call.
    pub fn poll(&mut self, now_ms: u64, transport: &mut impl TransportPort) -> ConnectionEvent {
        if self.state == ConnectionState::Connected {
            if transport.is_connected() {
                let session = transport.session();
                if session == self.session {
                    return ConnectionEvent::Online;
                }
                info!("MQTT session renewed by the client");
                self.session = session;
                return ConnectionEvent::Established;
            }
            info!("Connection lost, reconnecting...");
            self.state = ConnectionState::Disconnected;
            self.next_attempt_ms = now_ms;
        }

        if now_ms < self.next_attempt_ms {
            return ConnectionEvent::Offline;
        }

        if self.attempts == 0 {
            info!("Connecting to MQTT...");
        }
        self.state = ConnectionState::Connecting;
        let Credentials {
            client_id,
            user,
            password,
        } = &self.credentials;

        match transport.connect(client_id, user, password) {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                self.attempts = 0;
                self.session = transport.session();
                info!("Connected to MQTT");
                ConnectionEvent::Established
            }
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                self.attempts = self.attempts.saturating_add(1);
                self.next_attempt_ms = now_ms + self.retry_delay_ms;
                if self.attempts % 20 == 0 {
                    warn!("Still no broker after {} attempts ({})", self.attempts, e);
                } else {
                    info!("Waiting MQTT...");
                }
                ConnectionEvent::Offline
            }
        }
    }

    /// Retry until connected.  `clock` supplies monotonic milliseconds;
    /// `delay` is called between attempts (sleep, feed the watchdog, ...).
    pub fn connect_blocking(
        &mut self,
        transport: &mut impl TransportPort,
        mut clock: impl FnMut() -> u64,
        mut delay: impl FnMut(u64),
    ) {
        loop {
            match self.poll(clock(), transport) {
                ConnectionEvent::Online | ConnectionEvent::Established => return,
                ConnectionEvent::Offline => {
                    let now = clock();
                    delay(self.next_attempt_ms.saturating_sub(now).max(1));
                }
            }
        }
    }
}
