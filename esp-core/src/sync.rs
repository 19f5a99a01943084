//! Abgleich zwischen Lampe und Home Assistant
//!
//! Der Synchronizer hält den Remote-Lichtzustand, wendet Kommandos vom
//! Command-Topic an und meldet Discovery und Status zurück. Die Verbindung
//! selbst verwaltet die eingebettete [`ConnectivitySession`].
//!
//! # Ablauf
//! - Nach jedem erfolgreichen Verbindungsaufbau: Discovery, dann Status
//! - Nach jedem Kommando: Status
//!
//! Veröffentlichungs-Fehler werden geloggt, aber nicht wiederholt. Der nächste
//! Reconnect meldet ohnehin alles erneut.

use rgb::RGB16;

use crate::logic::{apply_brightness, max_channel, scale_to_external, scale_to_pwm};
use crate::output::{ChannelOutput, REMOTE_CEILING};
use crate::protocol::{
    encode, encode_discovery, CommandPayload, ProtocolError, RgbColor, StatePayload, TopicSet,
    DISCOVERY_BUFFER_SIZE, DISCOVERY_PREFIX, STATE_BUFFER_SIZE,
};
use crate::session::{ConnectivitySession, PollOutcome, SessionError, SessionSettings};
use crate::traits::{Delay, MqttTransport, NetworkLink, PwmWriter, TransportError};
use crate::types::DeviceInfo;

/// Fehler beim Veröffentlichen von Discovery oder Status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PublishError {
    Encode(ProtocolError),
    Transport(TransportError),
}

impl From<ProtocolError> for PublishError {
    fn from(e: ProtocolError) -> Self {
        Self::Encode(e)
    }
}

impl From<TransportError> for PublishError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

/// Lichtzustand aus Sicht von Home Assistant
///
/// Getrennt von der Kanal-Ausgabe: ein OFF-Kommando behält die Farbe, ein
/// späteres ON stellt sie wieder her.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightState {
    /// Kanalwerte im Bereich `0..=range`
    pub color: RGB16,
    pub is_on: bool,
}

impl LightState {
    /// Weiß in voller Helligkeit, ausgeschaltet
    pub const fn white(range: u16) -> Self {
        Self {
            color: RGB16 {
                r: range,
                g: range,
                b: range,
            },
            is_on: false,
        }
    }
}

/// Konfiguration des Remote-Zugangs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteConfig {
    pub device: DeviceInfo,
    /// Discovery-Präfix, Basis aller Topics
    pub prefix: &'static str,
    pub session: SessionSettings,
    /// Wertebereich der Kanäle im Remote-Modus
    pub range: u16,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            device: DeviceInfo::default(),
            prefix: DISCOVERY_PREFIX,
            session: SessionSettings::default(),
            range: REMOTE_CEILING,
        }
    }
}

/// Neuen Lichtzustand aus einem Kommando berechnen
///
/// Reihenfolge: `state`, `color_mode` (nur geloggt), dann `color` oder,
/// falls kein `color`-Objekt vorhanden ist, `brightness`. Fehlt `state`,
/// schalten Farbe und Helligkeit die Lampe implizit ein.
///
/// # Fehlerbehandlung
/// Ungültiges JSON liefert [`ProtocolError::Parse`], der Zustand bleibt dann
/// unverändert.
pub fn apply_command(
    light: &LightState,
    payload: &[u8],
    range: u16,
) -> Result<LightState, ProtocolError> {
    let command = CommandPayload::parse(payload)?;
    let mut next = *light;

    if let Some(state) = command.state {
        next.is_on = state == "ON";
        info!("Lamp: state {}", state);
    }

    if let Some(mode) = command.color_mode {
        debug!("Lamp: color mode {}", mode);
    }

    if let Some(color) = command.color {
        match color.components() {
            Some((r, g, b)) => {
                next.color = RGB16 {
                    r: scale_to_pwm(r, range),
                    g: scale_to_pwm(g, range),
                    b: scale_to_pwm(b, range),
                };
                if command.state.is_none() {
                    next.is_on = true;
                }
                info!("Lamp: color {} {} {}", next.color.r, next.color.g, next.color.b);
            }
            None => warn!("Lamp: incomplete color ignored"),
        }
    } else if let Some(brightness) = command.brightness {
        next.color = apply_brightness(next.color, brightness, range);
        if command.state.is_none() {
            next.is_on = true;
        }
        info!("Lamp: brightness {}", brightness);
    }

    Ok(next)
}

pub struct LightSynchronizer<T: MqttTransport> {
    session: ConnectivitySession<T>,
    topics: TopicSet,
    device: DeviceInfo,
    light: LightState,
    range: u16,
}

impl<T: MqttTransport> LightSynchronizer<T> {
    /// Leitet die Topics aus der Geräte-ID ab und erstellt die Session
    ///
    /// # Parameter
    /// - `client_nonce`: Startwert für den Client-ID-Anhang (z.B. aus dem RNG)
    pub fn new(transport: T, config: RemoteConfig, client_nonce: u16) -> Result<Self, ProtocolError> {
        let topics = TopicSet::new(config.prefix, config.device.id)?;
        let session = ConnectivitySession::new(
            transport,
            &topics,
            config.device.id,
            client_nonce,
            config.session,
        );

        Ok(Self {
            session,
            topics,
            device: config.device,
            light: LightState::white(config.range),
            range: config.range,
        })
    }

    pub fn topics(&self) -> &TopicSet {
        &self.topics
    }

    pub fn light(&self) -> LightState {
        self.light
    }

    pub fn session(&self) -> &ConnectivitySession<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ConnectivitySession<T> {
        &mut self.session
    }

    pub fn initial_connection_failed(&self) -> bool {
        self.session.initial_connection_failed()
    }

    pub fn is_connected(&self, link: &impl NetworkLink) -> bool {
        self.session.is_connected(link)
    }

    /// Session aufbauen und bei Erfolg Discovery + Status melden
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
        self.session.begin(link, delay, now_ms).await?;
        self.announce(&*link).await;
        Ok(())
    }

    /// Ein Reconnect-Schritt, meldet nach erfolgreichem Aufbau alles erneut
    pub async fn reconnect(
        &mut self,
        link: &mut impl NetworkLink,
        now_ms: u64,
    ) -> Result<(), SessionError> {
        if self.session.reconnect(link, now_ms).await? {
            self.announce(&*link).await;
        }
        Ok(())
    }

    /// Wird jeden Tick im Remote-Modus aufgerufen
    ///
    /// Ein empfangenes Kommando wird sofort auf die Ausgabe geschrieben und
    /// danach der neue Status gemeldet.
    pub async fn poll<P: PwmWriter>(
        &mut self,
        link: &mut impl NetworkLink,
        output: &mut ChannelOutput<P>,
        now_ms: u64,
    ) -> PollOutcome {
        let command_topic = &self.topics.command;
        let light = &mut self.light;
        let range = self.range;
        let mut applied = false;

        let outcome = self
            .session
            .poll(link, now_ms, &mut |topic, payload| {
                if topic != command_topic.as_str() {
                    debug!("MQTT: Ignoring message on {}", topic);
                    return;
                }
                if let Ok(next) = decode_logged(light, payload, range) {
                    *light = next;
                    write_light(output, next);
                    applied = true;
                }
            })
            .await;

        if outcome == PollOutcome::Reconnected {
            self.announce(&*link).await;
        }
        if applied {
            let _ = self.publish_state().await;
        }

        outcome
    }

    /// Kommando anwenden, ausgeben und Status melden
    ///
    /// # Fehlerbehandlung
    /// Ungültige Kommandos werden geloggt und verworfen, nichts ändert sich.
    pub async fn handle_command<P: PwmWriter>(
        &mut self,
        payload: &[u8],
        output: &mut ChannelOutput<P>,
    ) -> Result<(), ProtocolError> {
        let next = decode_logged(&self.light, payload, self.range)?;
        self.light = next;
        write_light(output, next);
        let _ = self.publish_state().await;
        Ok(())
    }

    /// Aktueller Status im Home-Assistant-Format
    pub fn state_payload(&self) -> StatePayload {
        let color = self.light.color;
        let brightness = if self.light.is_on {
            scale_to_external(max_channel(color), self.range)
        } else {
            0
        };

        StatePayload {
            state: if self.light.is_on { "ON" } else { "OFF" },
            color_mode: "rgb",
            brightness,
            color: RgbColor {
                r: scale_to_external(color.r, self.range),
                g: scale_to_external(color.g, self.range),
                b: scale_to_external(color.b, self.range),
            },
        }
    }

    /// Status retained veröffentlichen
    pub async fn publish_state(&mut self) -> Result<(), PublishError> {
        let mut buffer = [0u8; STATE_BUFFER_SIZE];
        let result = match encode(&self.state_payload(), &mut buffer) {
            Ok(len) => self
                .session
                .publish(&self.topics.state, &buffer[..len])
                .await
                .map_err(PublishError::from),
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            warn!("MQTT: State not published: {}", e);
        }
        result
    }

    /// Discovery-Konfiguration retained veröffentlichen
    pub async fn publish_discovery(
        &mut self,
        link: &impl NetworkLink,
    ) -> Result<(), PublishError> {
        let mut buffer = [0u8; DISCOVERY_BUFFER_SIZE];
        let result = match encode_discovery(&self.device, &self.topics, link.local_ip(), &mut buffer)
        {
            Ok(len) => self
                .session
                .publish(&self.topics.config, &buffer[..len])
                .await
                .map_err(PublishError::from),
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(()) => info!("MQTT: Discovery published to {}", self.topics.config.as_str()),
            Err(e) => warn!("MQTT: Discovery not published: {}", e),
        }
        result
    }

    /// Gespeicherten Lichtzustand auf die Ausgabe schreiben
    ///
    /// Beim Eintritt in den Remote-Modus, damit Ausgabe und gemeldeter Status
    /// übereinstimmen.
    pub fn apply<P: PwmWriter>(&self, output: &mut ChannelOutput<P>) {
        write_light(output, self.light);
    }

    /// `offline` melden, Broker und WLAN trennen
    pub async fn stop(&mut self, link: &mut impl NetworkLink) {
        self.session.stop(link).await;
    }

    async fn announce(&mut self, link: &impl NetworkLink) {
        let _ = self.publish_discovery(link).await;
        let _ = self.publish_state().await;
    }
}

fn decode_logged(
    light: &LightState,
    payload: &[u8],
    range: u16,
) -> Result<LightState, ProtocolError> {
    apply_command(light, payload, range).inspect_err(|e| {
        warn!("MQTT: Dropping invalid command ({} bytes): {}", payload.len(), e);
    })
}

fn write_light<P: PwmWriter>(output: &mut ChannelOutput<P>, light: LightState) {
    if light.is_on {
        output.set(light.color);
    } else {
        output.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RANGE: u16 = REMOTE_CEILING;

    fn off_red() -> LightState {
        LightState {
            color: RGB16 { r: RANGE, g: 0, b: 0 },
            is_on: false,
        }
    }

    #[test]
    fn test_color_implies_on() {
        let next = apply_command(&off_red(), br#"{"color":{"r":0,"g":255,"b":0}}"#, RANGE).unwrap();
        assert!(next.is_on);
        assert_eq!(next.color, RGB16 { r: 0, g: RANGE, b: 0 });
    }

    #[test]
    fn test_explicit_off_wins_over_color() {
        let next = apply_command(
            &off_red(),
            br#"{"state":"OFF","color":{"r":0,"g":0,"b":255}}"#,
            RANGE,
        )
        .unwrap();
        assert!(!next.is_on);
        assert_eq!(next.color, RGB16 { r: 0, g: 0, b: RANGE });
    }

    #[test]
    fn test_color_takes_precedence_over_brightness() {
        let next = apply_command(
            &off_red(),
            br#"{"color":{"r":255,"g":255,"b":255},"brightness":1}"#,
            RANGE,
        )
        .unwrap();
        assert_eq!(next.color, RGB16 { r: RANGE, g: RANGE, b: RANGE });
    }

    #[test]
    fn test_incomplete_color_suppresses_brightness() {
        let next = apply_command(
            &off_red(),
            br#"{"color":{"r":10},"brightness":128}"#,
            RANGE,
        )
        .unwrap();
        assert_eq!(next, off_red());
    }

    #[test]
    fn test_brightness_keeps_ratio() {
        let light = LightState {
            color: RGB16 { r: 100, g: 50, b: 0 },
            is_on: true,
        };
        let next = apply_command(&light, br#"{"brightness":128}"#, RANGE).unwrap();
        assert_eq!(next.color, RGB16 { r: 822, g: 411, b: 0 });
    }

    #[test]
    fn test_components_are_clamped() {
        let next = apply_command(&off_red(), br#"{"color":{"r":-5,"g":999,"b":0}}"#, RANGE).unwrap();
        assert_eq!(next.color, RGB16 { r: 0, g: RANGE, b: 0 });
    }

    #[test]
    fn test_unknown_state_means_off() {
        let light = LightState::white(RANGE);
        let on = apply_command(&light, br#"{"state":"ON"}"#, RANGE).unwrap();
        let next = apply_command(&on, br#"{"state":"toggle"}"#, RANGE).unwrap();
        assert!(!next.is_on);
    }

    #[test]
    fn test_malformed_command_rejected() {
        assert_eq!(
            apply_command(&off_red(), b"not json", RANGE),
            Err(ProtocolError::Parse)
        );
    }
}
