// Library-Root: Hardware-Anbindung und Tasks der RGB-Lampe
// Keine Standard-Bibliothek (Embedded System)
#![no_std]

// Module
pub mod config;
pub mod hal;
pub mod tasks;

// Re-exports von esp-core
pub use esp_core::protocol::Topic;
pub use esp_core::{Controller, ControllerSettings, LightSynchronizer, RemoteConfig};

// Embassy Sync-Typen
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use crate::config::MQTT_INBOUND_QUEUE;
use crate::hal::{BoardInputs, LedcPwmWriter};
use crate::tasks::mqtt::{InboundMessage, MqttRequest};
use crate::tasks::{ChannelTransport, EmbassyDelay, WifiLink};

/// Anforderung der Steuerschleife an den WiFi Task
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum WifiRequest {
    Connect,
    Disconnect,
}

// ============================================================================
// Type-Aliase für Channel-Typen
// ============================================================================
//
// Diese Type-Aliase vereinfachen die Lesbarkeit der Funktionssignaturen.
// Statt:  Channel<NoopRawMutex, MqttRequest, 1>
// Nutze:  MqttRequestChannel

/// Signal für WiFi-Anforderungen (Steuerschleife → WiFi Task)
/// Nur die letzte Anforderung zählt
pub type WifiSignal = Signal<NoopRawMutex, WifiRequest>;

/// Requests an den MQTT Task (Steuerschleife → MQTT Task)
/// - 1: Nachrichten-Kapazität (nur ein Request zur Zeit)
pub type MqttRequestChannel = Channel<NoopRawMutex, MqttRequest, 1>;

/// Antworten des MQTT Tasks, genau eine pro Request
pub type MqttResponseChannel = Channel<NoopRawMutex, Result<(), esp_core::TransportError>, 1>;

/// Eingehende Nachrichten (MQTT Task → Steuerschleife)
pub type MqttInboundChannel = Channel<NoopRawMutex, InboundMessage, MQTT_INBOUND_QUEUE>;

/// Alle Channels zwischen Steuerschleife und MQTT Task
pub struct MqttChannels {
    pub requests: MqttRequestChannel,
    pub responses: MqttResponseChannel,
    pub inbound: MqttInboundChannel,
}

impl MqttChannels {
    pub const fn new() -> Self {
        Self {
            requests: Channel::new(),
            responses: Channel::new(),
            inbound: Channel::new(),
        }
    }
}

impl Default for MqttChannels {
    fn default() -> Self {
        Self::new()
    }
}

/// Die Steuerschleife mit der echten Hardware
pub type LampController =
    Controller<BoardInputs, LedcPwmWriter, WifiLink, ChannelTransport, EmbassyDelay>;

/// Synchronizer über den MQTT Task
pub type LampSynchronizer = LightSynchronizer<ChannelTransport>;
