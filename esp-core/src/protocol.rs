//! MQTT-Protokoll für Home Assistant
//!
//! Topics, Discovery-Konfiguration, Status- und Kommando-Nachrichten im
//! JSON-Schema der Home-Assistant-MQTT-Light-Integration.

use core::fmt::Write;
use core::net::Ipv4Addr;

use heapless::String;
use serde::{Deserialize, Deserializer, Serialize};

use crate::logic::EXTERNAL_MAX;
use crate::types::DeviceInfo;

/// Standard-Präfix für Home-Assistant-Discovery
pub const DISCOVERY_PREFIX: &str = "homeassistant";

/// Maximale Länge eines Topics
pub const TOPIC_CAPACITY: usize = 64;

/// JSON-Buffer für die Discovery-Konfiguration
pub const DISCOVERY_BUFFER_SIZE: usize = 1024;

/// JSON-Buffer für Status-Updates
pub const STATE_BUFFER_SIZE: usize = 256;

pub const PAYLOAD_ONLINE: &str = "online";
pub const PAYLOAD_OFFLINE: &str = "offline";

pub type Topic = String<TOPIC_CAPACITY>;

/// Fehler beim Kodieren/Dekodieren von Protokoll-Nachrichten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// JSON passt nicht in den Buffer
    Encode,
    TopicTooLong,
    /// Ungültiges JSON
    Parse,
}

/// Die vier Topics eines Geräts
///
/// Werden einmalig aus der Geräte-ID abgeleitet:
/// `<prefix>/light/<device-id>/{set,state,availability,config}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSet {
    pub command: Topic,
    pub state: Topic,
    pub availability: Topic,
    pub config: Topic,
}

impl TopicSet {
    pub fn new(prefix: &str, device_id: &str) -> Result<Self, ProtocolError> {
        let topic = |suffix: &str| -> Result<Topic, ProtocolError> {
            let mut topic = Topic::new();
            write!(topic, "{prefix}/light/{device_id}/{suffix}")
                .map_err(|_| ProtocolError::TopicTooLong)?;
            Ok(topic)
        };

        Ok(Self {
            command: topic("set")?,
            state: topic("state")?,
            availability: topic("availability")?,
            config: topic("config")?,
        })
    }
}

/// Discovery-Konfiguration (Home Assistant MQTT Light, JSON-Schema)
#[derive(Debug, Serialize)]
pub struct DiscoveryConfig<'a> {
    pub name: &'a str,
    pub unique_id: &'a str,
    pub default_entity_id: &'a str,
    pub state_topic: &'a str,
    pub command_topic: &'a str,
    pub availability_topic: &'a str,
    pub schema: &'a str,
    pub brightness: bool,
    pub supported_color_modes: &'a [&'a str],
    pub optimistic: bool,
    pub retain: bool,
    pub brightness_scale: u16,
    pub device: DeviceBlock<'a>,
}

/// Geräte-Block für die Gruppierung in Home Assistant
#[derive(Debug, Serialize)]
pub struct DeviceBlock<'a> {
    pub identifiers: &'a [&'a str],
    pub name: &'a str,
    pub model: &'a str,
    pub manufacturer: &'a str,
    pub sw_version: &'a str,
    pub hw_version: &'a str,
    pub suggested_area: &'a str,
    pub configuration_url: &'a str,
}

/// RGB-Struct für JSON (Werte 0-255)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Status-Nachricht: `{state, color_mode, brightness, color{r,g,b}}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatePayload {
    pub state: &'static str,
    pub color_mode: &'static str,
    pub brightness: u8,
    pub color: RgbColor,
}

/// Farbe in einem Kommando, Werte auf `0..=EXTERNAL_MAX` begrenzt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct ColorCommand {
    #[serde(default, deserialize_with = "clamped_level")]
    pub r: Option<i32>,
    #[serde(default, deserialize_with = "clamped_level")]
    pub g: Option<i32>,
    #[serde(default, deserialize_with = "clamped_level")]
    pub b: Option<i32>,
}

impl ColorCommand {
    /// Alle drei Komponenten, falls vollständig
    pub fn components(&self) -> Option<(i32, i32, i32)> {
        Some((self.r?, self.g?, self.b?))
    }
}

/// Kommando von Home Assistant, alle Felder optional
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct CommandPayload<'a> {
    #[serde(default, borrow)]
    pub state: Option<&'a str>,
    #[serde(default, borrow)]
    pub color_mode: Option<&'a str>,
    #[serde(default)]
    pub color: Option<ColorCommand>,
    #[serde(default, deserialize_with = "clamped_level")]
    pub brightness: Option<i32>,
}

/// Beliebige JSON-Zahl (auch Dezimalzahl oder außerhalb von `i32`),
/// begrenzt auf `0..=EXTERNAL_MAX`, Nachkommastellen abgeschnitten
fn clamped_level<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f32>::deserialize(deserializer)?;
    Ok(value.map(|v| v.clamp(0.0, EXTERNAL_MAX as f32) as i32))
}

impl<'a> CommandPayload<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<Self, ProtocolError> {
        serde_json_core::from_slice::<CommandPayload<'a>>(payload)
            .map(|(command, _)| command)
            .map_err(|_| ProtocolError::Parse)
    }
}

/// Serialisiert `value` in `buffer`, gibt die Länge zurück
pub fn encode<T: Serialize>(value: &T, buffer: &mut [u8]) -> Result<usize, ProtocolError> {
    serde_json_core::to_slice(value, buffer).map_err(|_| ProtocolError::Encode)
}

/// Discovery-Konfiguration kodieren
///
/// Bei unveränderter Identität und IP ist das Ergebnis byte-identisch, das
/// Veröffentlichen nach jedem Reconnect ist daher unbedenklich.
pub fn encode_discovery(
    device: &DeviceInfo,
    topics: &TopicSet,
    local_ip: Option<Ipv4Addr>,
    buffer: &mut [u8],
) -> Result<usize, ProtocolError> {
    let mut entity_id: String<TOPIC_CAPACITY> = String::new();
    write!(entity_id, "light.{}", device.id).map_err(|_| ProtocolError::Encode)?;

    let mut url: String<32> = String::new();
    let ip = local_ip.unwrap_or(Ipv4Addr::UNSPECIFIED);
    write!(url, "http://{ip}").map_err(|_| ProtocolError::Encode)?;

    let identifiers = [device.id];
    let config = DiscoveryConfig {
        name: device.name,
        unique_id: device.id,
        default_entity_id: &entity_id,
        state_topic: &topics.state,
        command_topic: &topics.command,
        availability_topic: &topics.availability,
        schema: "json",
        brightness: true,
        supported_color_modes: &["rgb"],
        optimistic: false,
        retain: true,
        brightness_scale: 255,
        device: DeviceBlock {
            identifiers: &identifiers,
            name: device.name,
            model: device.model,
            manufacturer: device.manufacturer,
            sw_version: device.sw_version,
            hw_version: device.hw_version,
            suggested_area: device.suggested_area,
            configuration_url: &url,
        },
    };

    encode(&config, buffer)
}
