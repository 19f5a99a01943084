//! Mocks für die Host-Tests
//!
//! In-Memory-Implementierungen aller esp-core Traits. Jeder Mock zeichnet auf
//! was mit ihm passiert, damit die Tests das Verhalten prüfen können.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::Ipv4Addr;

use esp_core::traits::ConnectOptions;
use esp_core::{Delay, Knob, LampInputs, MqttTransport, NetworkLink, PwmWriter, TransportError};
use rgb::RGB16;

// ============================================================================
// Mock PWM
// ============================================================================

#[derive(Default)]
pub struct MockPwm {
    pub writes: Vec<RGB16>,
}

impl MockPwm {
    pub fn last(&self) -> Option<RGB16> {
        self.writes.last().copied()
    }

    pub fn count(&self, color: RGB16) -> usize {
        self.writes.iter().filter(|&&c| c == color).count()
    }
}

impl PwmWriter for MockPwm {
    fn write(&mut self, duty: RGB16) {
        self.writes.push(duty);
    }
}

// ============================================================================
// Mock Eingänge
// ============================================================================

#[derive(Default)]
pub struct MockInputs {
    pub pressed: bool,
    /// Millivolt für Rot, Grün, Blau
    pub millivolts: [u16; 3],
    pub reads: usize,
}

impl LampInputs for MockInputs {
    fn mode_button_pressed(&mut self) -> bool {
        self.pressed
    }

    fn read_millivolts(&mut self, knob: Knob) -> u16 {
        self.reads += 1;
        match knob {
            Knob::Red => self.millivolts[0],
            Knob::Green => self.millivolts[1],
            Knob::Blue => self.millivolts[2],
        }
    }
}

// ============================================================================
// Mock Delay
// ============================================================================

#[derive(Default)]
pub struct MockDelay {
    pub calls: Vec<u32>,
}

impl MockDelay {
    pub fn total_ms(&self) -> u64 {
        self.calls.iter().map(|&ms| u64::from(ms)).sum()
    }
}

impl Delay for MockDelay {
    async fn delay_ms(&mut self, ms: u32) {
        self.calls.push(ms);
    }
}

// ============================================================================
// Mock WLAN
// ============================================================================

pub struct MockLink {
    pub associated: bool,
    /// Assoziation gelingt sofort bei Anforderung
    pub reachable: bool,
    /// So viele Anforderungen scheitern, bevor `reachable` greift
    pub failing_requests: usize,
    pub ip: Ipv4Addr,
    pub start_calls: usize,
    pub reassociation_calls: usize,
    pub disconnect_calls: usize,
}

impl MockLink {
    pub fn reachable() -> Self {
        Self {
            reachable: true,
            ..Self::unreachable()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            associated: false,
            reachable: false,
            failing_requests: 0,
            ip: Ipv4Addr::new(192, 168, 1, 50),
            start_calls: 0,
            reassociation_calls: 0,
            disconnect_calls: 0,
        }
    }

    fn associate(&mut self) {
        if self.failing_requests > 0 {
            self.failing_requests -= 1;
            self.associated = false;
        } else {
            self.associated = self.reachable;
        }
    }
}

impl NetworkLink for MockLink {
    fn start_association(&mut self) {
        self.start_calls += 1;
        self.associate();
    }

    fn request_reassociation(&mut self) {
        self.reassociation_calls += 1;
        self.associate();
    }

    fn disconnect(&mut self) {
        self.disconnect_calls += 1;
        self.associated = false;
    }

    fn is_associated(&self) -> bool {
        self.associated
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        self.associated.then_some(self.ip)
    }
}

// ============================================================================
// Mock MQTT Transport
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

impl Published {
    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.payload).unwrap()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedConnect {
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub will_topic: String,
    pub will_payload: Vec<u8>,
    pub will_retain: bool,
    pub keep_alive_secs: u16,
}

#[derive(Default)]
pub struct MockTransport {
    pub connected: bool,
    /// Ergebnisse der nächsten `connect()`-Aufrufe, danach gilt `refuse_all`
    pub connect_results: VecDeque<Result<(), TransportError>>,
    pub refuse_all: bool,
    pub connects: Vec<RecordedConnect>,
    pub published: Vec<Published>,
    pub subscriptions: Vec<String>,
    pub inbound: VecDeque<(String, Vec<u8>)>,
    /// Nächster `poll()` schlägt fehl
    pub fail_next_poll: bool,
    pub disconnect_calls: usize,
}

impl MockTransport {
    pub fn refusing() -> Self {
        Self {
            refuse_all: true,
            ..Self::default()
        }
    }

    pub fn on_topic(&self, topic: &str) -> Vec<&Published> {
        self.published.iter().filter(|p| p.topic == topic).collect()
    }

    pub fn count_on(&self, topic: &str) -> usize {
        self.on_topic(topic).len()
    }

    pub fn count_payload(&self, topic: &str, payload: &str) -> usize {
        self.on_topic(topic)
            .iter()
            .filter(|p| p.payload == payload.as_bytes())
            .count()
    }

    pub fn push_inbound(&mut self, topic: &str, payload: &[u8]) {
        self.inbound.push_back((topic.to_string(), payload.to_vec()));
    }
}

impl MqttTransport for MockTransport {
    async fn connect(&mut self, options: &ConnectOptions<'_>) -> Result<(), TransportError> {
        self.connects.push(RecordedConnect {
            client_id: options.client_id.to_string(),
            username: options.username.map(str::to_string),
            password: options.password.map(str::to_string),
            will_topic: options.will_topic.to_string(),
            will_payload: options.will_payload.to_vec(),
            will_retain: options.will_retain,
            keep_alive_secs: options.keep_alive_secs,
        });

        let default = if self.refuse_all {
            Err(TransportError::Refused)
        } else {
            Ok(())
        };
        let result = self.connect_results.pop_front().unwrap_or(default);
        self.connected = result.is_ok();
        result
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.published.push(Published {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            retain,
        });
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.subscriptions.push(topic.to_string());
        Ok(())
    }

    async fn poll(
        &mut self,
        on_message: &mut dyn FnMut(&str, &[u8]),
    ) -> Result<bool, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        if self.fail_next_poll {
            self.fail_next_poll = false;
            return Err(TransportError::Io);
        }
        match self.inbound.pop_front() {
            Some((topic, payload)) => {
                on_message(&topic, &payload);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn disconnect(&mut self) {
        self.disconnect_calls += 1;
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
