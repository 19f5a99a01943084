//! Verbindungs-Lebenszyklus: WLAN + MQTT-Session
//!
//! Die Session kümmert sich um:
//! - WLAN-Assoziation und Broker-Verbindung beim Start (`begin`)
//! - Reconnect mit fester Wartezeit (`poll` / `reconnect`)
//! - Verfügbarkeits-Meldung (`online` / `offline`) inkl. Last Will
//! - Heartbeat im festen Intervall
//!
//! Verbindungsfehler sind nie fatal. Sie werden nur über
//! [`ConnectivitySession::initial_connection_failed`] und
//! [`ConnectivitySession::is_connected`] sichtbar; was daraus folgt entscheidet
//! der Aufrufer.

use core::fmt::Write;

use heapless::String;

use crate::protocol::{PAYLOAD_OFFLINE, PAYLOAD_ONLINE, Topic, TopicSet};
use crate::traits::{ConnectOptions, Delay, MqttTransport, NetworkLink, TransportError};

/// Zeitverhalten und Zugangsdaten der Session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Anzahl Prüfungen der WLAN-Verbindung in `begin()`
    pub network_poll_attempts: u32,
    pub network_poll_delay_ms: u32,
    /// Anzahl Broker-Verbindungsversuche in `begin()`
    pub broker_attempts: u32,
    pub broker_retry_delay_ms: u32,
    /// Mindestabstand zwischen zwei Reconnect-Versuchen
    pub reconnect_interval_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub keep_alive_secs: u16,
    pub username: Option<&'static str>,
    pub password: Option<&'static str>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            network_poll_attempts: 30,
            network_poll_delay_ms: 500,
            broker_attempts: 2,
            broker_retry_delay_ms: 2000,
            reconnect_interval_ms: 5000,
            heartbeat_interval_ms: 30_000,
            keep_alive_secs: 60,
            username: None,
            password: None,
        }
    }
}

/// Verbindungszustand, abgeleitet aus WLAN- und Broker-Status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    Disconnected,
    NetworkAssociating,
    /// WLAN steht, Broker nicht verbunden
    BrokerDown,
    SessionUp,
}

/// Fehler beim Aufbau der Session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionError {
    NetworkUnavailable,
    BrokerUnavailable(TransportError),
}

/// Ergebnis eines `poll()`-Aufrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollOutcome {
    /// Session aktiv, Verbindung bedient
    Serviced,
    /// Session unterbrochen, Backoff läuft noch
    Waiting,
    /// Reconnect versucht aber fehlgeschlagen
    RetryFailed,
    /// Session wurde gerade (wieder) aufgebaut
    Reconnected,
}

pub struct ConnectivitySession<T: MqttTransport> {
    transport: T,
    availability_topic: Topic,
    command_topic: Topic,
    client_prefix: &'static str,
    settings: SessionSettings,
    started: bool,
    client_nonce: u16,
    connection_attempts: u32,
    last_attempt_ms: Option<u64>,
    last_heartbeat_ms: u64,
    initial_connection_failed: bool,
}

impl<T: MqttTransport> ConnectivitySession<T> {
    /// Erstellt eine Session
    ///
    /// # Parameter
    /// - `topics`: Availability- und Command-Topic werden übernommen
    /// - `client_prefix`: Geräte-ID, Basis der MQTT Client ID
    /// - `client_nonce`: Startwert für den zufälligen Client-ID-Anhang
    pub fn new(
        transport: T,
        topics: &TopicSet,
        client_prefix: &'static str,
        client_nonce: u16,
        settings: SessionSettings,
    ) -> Self {
        Self {
            transport,
            availability_topic: topics.availability.clone(),
            command_topic: topics.command.clone(),
            client_prefix,
            settings,
            started: false,
            client_nonce,
            connection_attempts: 0,
            last_attempt_ms: None,
            last_heartbeat_ms: 0,
            initial_connection_failed: false,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Anzahl Broker-Verbindungsversuche seit dem letzten `begin()`
    pub fn connection_attempts(&self) -> u32 {
        self.connection_attempts
    }

    /// Sticky-Flag: WLAN oder Broker waren beim Start nicht erreichbar
    ///
    /// Wird nur durch das nächste `begin()` zurückgesetzt.
    pub fn initial_connection_failed(&self) -> bool {
        self.initial_connection_failed
    }

    pub fn is_connected(&self, link: &impl NetworkLink) -> bool {
        link.is_associated() && self.transport.is_connected()
    }

    pub fn state(&self, link: &impl NetworkLink) -> SessionState {
        match (link.is_associated(), self.transport.is_connected()) {
            (true, true) => SessionState::SessionUp,
            (true, false) => SessionState::BrokerDown,
            (false, _) if self.started => SessionState::NetworkAssociating,
            (false, _) => SessionState::Disconnected,
        }
    }

    /// Baut WLAN und Broker-Verbindung auf (blockierend, nur beim Moduswechsel)
    ///
    /// 1. WLAN-Assoziation starten, bis zu `network_poll_attempts` Prüfungen,
    ///    alle `reconnect_interval_ms` wird die Assoziation neu angefordert
    /// 2. Bis zu `broker_attempts` Verbindungsversuche zum Broker
    ///
    /// Schlägt einer der Schritte fehl, wird das Sticky-Flag gesetzt. Der
    /// nächste Reconnect über `poll()` folgt frühestens nach
    /// `reconnect_interval_ms`.
    pub async fn begin<L, D>(
        &mut self,
        link: &mut L,
        delay: &mut D,
        now_ms: u64,
    ) -> Result<(), SessionError>
    where
        L: NetworkLink,
        D: Delay,
    {
        info!("MQTT: Starting session...");
        self.connection_attempts = 0;
        self.initial_connection_failed = false;
        self.started = true;
        self.last_attempt_ms = Some(now_ms);

        link.start_association();
        let mut polls = 0;
        let mut since_request_ms: u64 = 0;
        while !link.is_associated() && polls < self.settings.network_poll_attempts {
            delay.delay_ms(self.settings.network_poll_delay_ms).await;
            polls += 1;
            since_request_ms += u64::from(self.settings.network_poll_delay_ms);

            // gescheiterte Assoziation innerhalb des Fensters erneut anfordern
            if !link.is_associated()
                && polls < self.settings.network_poll_attempts
                && since_request_ms >= self.settings.reconnect_interval_ms
            {
                debug!("WiFi: Still not associated, requesting reassociation");
                link.request_reassociation();
                since_request_ms = 0;
            }
        }

        if !link.is_associated() {
            warn!("WiFi: Association failed after {} polls", polls);
            self.initial_connection_failed = true;
            return Err(SessionError::NetworkUnavailable);
        }
        if let Some(ip) = link.local_ip() {
            info!("WiFi: Connected, IP {}", ip.octets());
        }

        info!(
            "MQTT: Command topic {}, availability topic {}",
            self.command_topic.as_str(),
            self.availability_topic.as_str()
        );

        let mut last_error = TransportError::NotConnected;
        for attempt in 0..self.settings.broker_attempts {
            match self.establish(now_ms).await {
                Ok(()) => return Ok(()),
                Err(e) => last_error = e,
            }
            if attempt + 1 < self.settings.broker_attempts {
                delay.delay_ms(self.settings.broker_retry_delay_ms).await;
            }
        }

        error!(
            "MQTT: Failed to connect after {} attempts",
            self.settings.broker_attempts
        );
        self.initial_connection_failed = true;
        Err(SessionError::BrokerUnavailable(last_error))
    }

    /// Ein Reconnect-Schritt, blockiert nicht über einen Versuch hinaus
    ///
    /// Ist das WLAN weg, wird nur eine neue Assoziation angefordert.
    /// `Ok(true)` bedeutet: Session wurde in diesem Aufruf aufgebaut.
    pub async fn reconnect(
        &mut self,
        link: &mut impl NetworkLink,
        now_ms: u64,
    ) -> Result<bool, SessionError> {
        if !link.is_associated() {
            warn!("WiFi: Disconnected, requesting reassociation...");
            link.request_reassociation();
            return Err(SessionError::NetworkUnavailable);
        }

        if self.transport.is_connected() {
            return Ok(false);
        }

        self.establish(now_ms)
            .await
            .map(|()| true)
            .map_err(SessionError::BrokerUnavailable)
    }

    /// Wird jeden Tick aufgerufen
    ///
    /// Bei aktiver Session: höchstens eine eingehende Nachricht an
    /// `on_message` und Heartbeat. Ohne Session: Reconnect, höchstens alle
    /// `reconnect_interval_ms`.
    pub async fn poll(
        &mut self,
        link: &mut impl NetworkLink,
        now_ms: u64,
        on_message: &mut dyn FnMut(&str, &[u8]),
    ) -> PollOutcome {
        if !self.is_connected(&*link) {
            let due = self.last_attempt_ms.is_none_or(|last| {
                now_ms.saturating_sub(last) >= self.settings.reconnect_interval_ms
            });
            if !due {
                return PollOutcome::Waiting;
            }

            self.last_attempt_ms = Some(now_ms);
            return match self.reconnect(link, now_ms).await {
                Ok(true) => PollOutcome::Reconnected,
                Ok(false) => PollOutcome::Serviced,
                Err(_) => {
                    info!(
                        "MQTT: Retrying in {} ms",
                        self.settings.reconnect_interval_ms
                    );
                    PollOutcome::RetryFailed
                }
            };
        }

        if let Err(e) = self.transport.poll(on_message).await {
            warn!("MQTT: Connection lost: {}", e);
            self.transport.disconnect().await;
            self.last_attempt_ms = Some(now_ms);
            return PollOutcome::Waiting;
        }

        if now_ms.saturating_sub(self.last_heartbeat_ms) >= self.settings.heartbeat_interval_ms {
            self.publish_availability(PAYLOAD_ONLINE).await;
            self.last_heartbeat_ms = now_ms;
        }

        PollOutcome::Serviced
    }

    /// Retained Publish über die Session
    pub async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        self.transport.publish(topic, payload, true).await
    }

    /// Meldet `offline` und trennt Broker und WLAN
    ///
    /// Darf in jedem Zustand aufgerufen werden.
    pub async fn stop(&mut self, link: &mut impl NetworkLink) {
        if self.transport.is_connected() {
            self.publish_availability(PAYLOAD_OFFLINE).await;
            self.transport.disconnect().await;
        }
        link.disconnect();
        self.started = false;
        self.last_attempt_ms = None;
        info!("MQTT: Session stopped");
    }

    /// Ein Verbindungsversuch zum Broker
    ///
    /// Bei Erfolg: `online` melden und Command-Topic abonnieren.
    async fn establish(&mut self, now_ms: u64) -> Result<(), TransportError> {
        self.connection_attempts += 1;
        let client_id = self.next_client_id();
        info!(
            "MQTT: Attempting connection {} as {}",
            self.connection_attempts,
            client_id.as_str()
        );

        let username = self.settings.username.filter(|user| !user.is_empty());
        let options = ConnectOptions {
            client_id: &client_id,
            username,
            password: username.and(self.settings.password),
            will_topic: &self.availability_topic,
            will_payload: PAYLOAD_OFFLINE.as_bytes(),
            will_retain: true,
            keep_alive_secs: self.settings.keep_alive_secs,
        };

        if let Err(e) = self.transport.connect(&options).await {
            warn!("MQTT: Connection failed: {}", e);
            return Err(e);
        }
        info!("MQTT: Connected to broker");

        self.publish_availability(PAYLOAD_ONLINE).await;
        self.last_heartbeat_ms = now_ms;

        if let Err(e) = self.transport.subscribe(&self.command_topic).await {
            warn!("MQTT: Subscribe to commands failed: {}", e);
        }

        Ok(())
    }

    async fn publish_availability(&mut self, payload: &str) {
        if let Err(e) = self
            .transport
            .publish(&self.availability_topic, payload.as_bytes(), true)
            .await
        {
            warn!("MQTT: Availability '{}' not published: {}", payload, e);
        }
    }

    fn next_client_id(&mut self) -> String<48> {
        self.client_nonce = self.client_nonce.wrapping_mul(25173).wrapping_add(13849);
        let mut id = String::new();
        if write!(id, "{}_{:x}", self.client_prefix, self.client_nonce).is_err() {
            id.clear();
            let _ = id.push_str("lamp");
        }
        id
    }
}
