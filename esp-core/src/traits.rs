//! Hardware- und Transport-Abstraktionen
//!
//! Diese Traits definieren die Schnittstellen zu allem was außerhalb der
//! Lampen-Logik liegt: PWM, ADC, Taster, Wartezeiten, WLAN und MQTT.
//!
//! # Implementierungen
//! - **Production:** esp-firmware (LEDC, ADC1, esp-radio, rust-mqtt)
//! - **Testing:** Mocks in esp-tests (in-memory)

use core::net::Ipv4Addr;

use rgb::RGB16;

use crate::types::Knob;

/// Schreibt Tastverhältnisse auf die drei LED-Kanäle
///
/// Fire-and-forget: Fehler werden von der Implementierung selbst geloggt.
pub trait PwmWriter {
    fn write(&mut self, duty: RGB16);
}

/// Eingänge der Lampe: Modus-Taster und drei Potentiometer
pub trait LampInputs {
    /// `true` solange der Taster gedrückt ist (Pegel, keine Flanke)
    fn mode_button_pressed(&mut self) -> bool;

    /// Einzelne Messung eines Potentiometers in Millivolt
    fn read_millivolts(&mut self, knob: Knob) -> u16;
}

/// Blockierende (aus Sicht der Steuerschleife) Wartezeit
#[allow(async_fn_in_trait)]
pub trait Delay {
    async fn delay_ms(&mut self, ms: u32);
}

/// WLAN-Verbindung
pub trait NetworkLink {
    /// Startet die Assoziation mit dem Access Point (kehrt sofort zurück)
    fn start_association(&mut self);

    /// Fordert eine erneute Assoziation an (kehrt sofort zurück)
    fn request_reassociation(&mut self);

    /// Trennt die Verbindung. Muss in jedem Zustand aufrufbar sein.
    fn disconnect(&mut self);

    /// `true` sobald Link steht und eine IP-Adresse vorhanden ist
    fn is_associated(&self) -> bool;

    fn local_ip(&self) -> Option<Ipv4Addr>;
}

/// Fehler-Typ für MQTT-Transport-Operationen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    NotConnected,
    Timeout,
    Refused,
    BadCredentials,
    Protocol,
    PayloadTooLarge,
    Io,
}

/// Parameter für den Verbindungsaufbau zum Broker
#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions<'a> {
    pub client_id: &'a str,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub will_topic: &'a str,
    pub will_payload: &'a [u8],
    pub will_retain: bool,
    pub keep_alive_secs: u16,
}

/// Pub/Sub-Session zum MQTT Broker
///
/// Eingehende Nachrichten werden nicht über einen globalen Callback
/// zugestellt: der Aufrufer übergibt bei `poll()` einen Handler.
#[allow(async_fn_in_trait)]
pub trait MqttTransport {
    async fn connect(&mut self, options: &ConnectOptions<'_>) -> Result<(), TransportError>;

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), TransportError>;

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Bedient die Verbindung und stellt höchstens eine eingehende Nachricht zu
    ///
    /// Gibt `Ok(true)` zurück wenn der Handler aufgerufen wurde.
    async fn poll(
        &mut self,
        on_message: &mut dyn FnMut(&str, &[u8]),
    ) -> Result<bool, TransportError>;

    /// Trennt die Verbindung. Muss in jedem Zustand aufrufbar sein.
    async fn disconnect(&mut self);

    fn is_connected(&self) -> bool;
}
