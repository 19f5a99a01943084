// MQTT Task - Besitzt Socket und rust-mqtt Client, führt Requests der
// Steuerschleife aus
use core::sync::atomic::{AtomicBool, Ordering};

use defmt::{Debug2Format, info, warn};
use embassy_futures::select::{Either3, select3};
use embassy_net::{IpAddress, Stack, dns::DnsQueryType, tcp::TcpSocket};
use embassy_time::{Duration, Timer, with_timeout};
use esp_core::traits::ConnectOptions;
use esp_core::{MqttTransport, TransportError};
use heapless::{String, Vec};

use rust_mqtt::client::client::MqttClient;
use rust_mqtt::client::client_config::{ClientConfig, MqttVersion};
use rust_mqtt::packet::v5::publish_packet::QualityOfService;
use rust_mqtt::packet::v5::reason_codes::ReasonCode;
use rust_mqtt::utils::rng_generator::CountingRng;

use crate::config::*;
use crate::{MqttChannels, Topic};

/// Größte ausgehende Nachricht (Discovery-Konfiguration)
pub const OUTBOUND_PAYLOAD_CAPACITY: usize = esp_core::protocol::DISCOVERY_BUFFER_SIZE;

/// Größte eingehende Nachricht (Kommandos sind klein)
pub const INBOUND_PAYLOAD_CAPACITY: usize = esp_core::protocol::STATE_BUFFER_SIZE;

/// Broker-Verbindung steht (vom MQTT Task gesetzt, von der Steuerschleife
/// gelesen)
static MQTT_CONNECTED: AtomicBool = AtomicBool::new(false);

// ============================================================================
// Requests zwischen Steuerschleife und MQTT Task
// ============================================================================

/// Verbindungsparameter, als eigene Kopie für den MQTT Task
pub struct ConnectRequest {
    client_id: String<48>,
    username: Option<String<64>>,
    password: Option<String<64>>,
    will_topic: Topic,
    will_payload: Vec<u8, 16>,
    will_retain: bool,
    keep_alive_secs: u16,
}

impl ConnectRequest {
    fn from_options(options: &ConnectOptions<'_>) -> Result<Self, TransportError> {
        Ok(Self {
            client_id: String::try_from(options.client_id).map_err(too_large)?,
            username: options
                .username
                .map(String::try_from)
                .transpose()
                .map_err(too_large)?,
            password: options
                .password
                .map(String::try_from)
                .transpose()
                .map_err(too_large)?,
            will_topic: Topic::try_from(options.will_topic).map_err(too_large)?,
            will_payload: Vec::from_slice(options.will_payload).map_err(too_large)?,
            will_retain: options.will_retain,
            keep_alive_secs: options.keep_alive_secs,
        })
    }
}

pub struct OutboundMessage {
    topic: Topic,
    payload: Vec<u8, OUTBOUND_PAYLOAD_CAPACITY>,
    retain: bool,
}

pub struct InboundMessage {
    topic: Topic,
    payload: Vec<u8, INBOUND_PAYLOAD_CAPACITY>,
}

/// Jeder Request wird mit genau einer Antwort auf `responses` quittiert
pub enum MqttRequest {
    Connect(ConnectRequest),
    Publish(OutboundMessage),
    Subscribe(Topic),
    Disconnect,
}

fn too_large<E>(_: E) -> TransportError {
    TransportError::PayloadTooLarge
}

// ============================================================================
// MQTT Task
// ============================================================================

/// MQTT Task - läuft parallel zur Steuerschleife
///
/// Dieser Task übernimmt die Broker-Verbindung:
/// - Wartet auf einen Connect-Request der Steuerschleife
/// - DNS-Auflösung, TCP-Verbindung, MQTT CONNECT (inkl. Last Will)
/// - Führt Publish/Subscribe-Requests aus
/// - Leitet eingehende Nachrichten an die Steuerschleife weiter
/// - Hält die Verbindung mit Pings am Leben
///
/// Reconnects entscheidet die Steuerschleife, nicht dieser Task.
///
/// # Parameter
/// - `stack`: embassy-net Stack für Netzwerk-Zugriff
/// - `channels`: Request-, Antwort- und Eingangs-Channel
#[embassy_executor::task]
pub async fn mqtt_task(stack: Stack<'static>, channels: &'static MqttChannels) {
    info!("MQTT: Task started, waiting for requests...");

    loop {
        match channels.requests.receive().await {
            MqttRequest::Connect(request) => {
                let result = run_session(stack, channels, &request).await;
                MQTT_CONNECTED.store(false, Ordering::Relaxed);
                match result {
                    Ok(()) => info!("MQTT: Connection closed normally"),
                    Err(e) => warn!("MQTT: Connection ended: {}", e),
                }
            }
            MqttRequest::Disconnect => channels.responses.send(Ok(())).await,
            MqttRequest::Publish(_) | MqttRequest::Subscribe(_) => {
                channels
                    .responses
                    .send(Err(TransportError::NotConnected))
                    .await
            }
        }
    }
}

/// Baut die Verbindung auf und bedient sie bis zum Abbruch
///
/// Der Connect-Request wird hier quittiert: mit dem Fehler falls der Aufbau
/// scheitert, sonst mit `Ok` sobald der Broker die Verbindung bestätigt hat.
async fn run_session(
    stack: Stack<'static>,
    channels: &'static MqttChannels,
    request: &ConnectRequest,
) -> Result<(), MqttError> {
    // DNS Lookup
    info!("MQTT: Resolving '{}'...", MQTT_BROKER);
    let broker_ip = match resolve_hostname(stack, MQTT_BROKER).await {
        Ok(ip) => ip,
        Err(e) => return Err(reject(channels, e).await),
    };
    info!("MQTT: Resolved to {}", Debug2Format(&broker_ip));

    // TCP Connect
    let mut rx_buffer = [0u8; MQTT_SOCKET_BUFFER_SIZE];
    let mut tx_buffer = [0u8; MQTT_SOCKET_BUFFER_SIZE];
    let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
    socket.set_timeout(Some(Duration::from_secs(MQTT_SOCKET_TIMEOUT_SECS)));

    if socket.connect((broker_ip, MQTT_PORT)).await.is_err() {
        return Err(reject(channels, MqttError::ConnectionFailed).await);
    }
    info!("MQTT: TCP connected");

    // MQTT Client Configuration
    let rng = CountingRng(20000);
    let mut config = ClientConfig::<5, _>::new(MqttVersion::MQTTv5, rng);
    config.add_client_id(&request.client_id);
    if let Some(username) = &request.username {
        config.add_username(username);
    }
    if let Some(password) = &request.password {
        config.add_password(password);
    }
    config.add_will(&request.will_topic, &request.will_payload, request.will_retain);
    config.keep_alive = request.keep_alive_secs;
    config.max_packet_size = MQTT_BUFFER_SIZE as u32;

    // MQTT Buffer
    let mut send_buffer = [0u8; MQTT_BUFFER_SIZE];
    let mut recv_buffer = [0u8; MQTT_BUFFER_SIZE];

    let mut client = MqttClient::<_, 5, _>::new(
        socket,
        &mut send_buffer,
        MQTT_BUFFER_SIZE,
        &mut recv_buffer,
        MQTT_BUFFER_SIZE,
        config,
    );

    // MQTT CONNECT
    if let Err(code) = client.connect_to_broker().await {
        return Err(reject(channels, MqttError::Rejected(code)).await);
    }
    info!("MQTT: Connected to broker as {}", request.client_id.as_str());
    MQTT_CONNECTED.store(true, Ordering::Relaxed);
    channels.responses.send(Ok(())).await;

    serve(&mut client, channels, request.keep_alive_secs).await
}

/// Ereignis der Serve-Schleife, ohne Borrow auf den Client
enum Event {
    Request(MqttRequest),
    Ping,
    Forwarded,
}

/// Bedient eine bestehende Verbindung bis Disconnect oder Fehler
async fn serve(
    client: &mut MqttClient<'_, TcpSocket<'_>, 5, CountingRng>,
    channels: &'static MqttChannels,
    keep_alive_secs: u16,
) -> Result<(), MqttError> {
    let ping_interval = Duration::from_secs(u64::from(keep_alive_secs.max(2) / 2));

    loop {
        let event = match select3(
            channels.requests.receive(),
            client.receive_message(),
            Timer::after(ping_interval),
        )
        .await
        {
            Either3::First(request) => Event::Request(request),
            Either3::Second(Ok((topic, payload))) => {
                forward(channels, topic, payload);
                Event::Forwarded
            }
            Either3::Second(Err(code)) => return Err(MqttError::Transfer(code)),
            Either3::Third(()) => Event::Ping,
        };

        match event {
            Event::Request(MqttRequest::Publish(message)) => {
                let sent = client
                    .send_message(
                        &message.topic,
                        &message.payload,
                        QualityOfService::QoS0,
                        message.retain,
                    )
                    .await;
                if let Err(code) = sent {
                    return Err(reject(channels, MqttError::Transfer(code)).await);
                }
                channels.responses.send(Ok(())).await;
            }
            Event::Request(MqttRequest::Subscribe(topic)) => {
                if let Err(code) = client.subscribe_to_topic(&topic).await {
                    return Err(reject(channels, MqttError::Transfer(code)).await);
                }
                info!("MQTT: Subscribed to {}", topic.as_str());
                channels.responses.send(Ok(())).await;
            }
            Event::Request(MqttRequest::Disconnect) => {
                MQTT_CONNECTED.store(false, Ordering::Relaxed);
                let _ = client.disconnect().await;
                channels.responses.send(Ok(())).await;
                return Ok(());
            }
            // bereits verbunden
            Event::Request(MqttRequest::Connect(_)) => channels.responses.send(Ok(())).await,
            Event::Ping => client
                .send_ping()
                .await
                .map_err(MqttError::Transfer)?,
            Event::Forwarded => {}
        }
    }
}

/// Eingehende Nachricht in die Queue der Steuerschleife legen
fn forward(channels: &MqttChannels, topic: &str, payload: &[u8]) {
    let (Ok(topic), Ok(payload)) = (Topic::try_from(topic), Vec::from_slice(payload)) else {
        warn!("MQTT: Inbound message on {} too large, dropped", topic);
        return;
    };
    if channels
        .inbound
        .try_send(InboundMessage { topic, payload })
        .is_err()
    {
        warn!("MQTT: Inbound queue full, message dropped");
    }
}

/// Quittiert den offenen Request mit dem Fehler und gibt ihn zurück
async fn reject(channels: &MqttChannels, error: MqttError) -> MqttError {
    channels.responses.send(Err(error.kind())).await;
    error
}

/// Löst Hostname zu IPv4-Adresse auf
///
/// Nutzt embassy-net DNS-Stack mit konfigurierbarem Timeout.
async fn resolve_hostname(
    stack: Stack<'static>,
    hostname: &str,
) -> Result<embassy_net::Ipv4Address, MqttError> {
    let result = with_timeout(
        Duration::from_secs(DNS_TIMEOUT_SECS),
        stack.dns_query(hostname, DnsQueryType::A),
    )
    .await;

    match result {
        Ok(Ok(addrs)) => {
            for addr in addrs {
                if let IpAddress::Ipv4(ipv4) = addr {
                    return Ok(ipv4);
                }
            }
            Err(MqttError::DnsResolutionFailed)
        }
        Ok(Err(_)) => Err(MqttError::DnsResolutionFailed),
        Err(_) => Err(MqttError::DnsTimeout),
    }
}

/// MQTT Fehler-Typen
///
/// Alle möglichen Fehler die während MQTT-Operationen auftreten können.
#[derive(Debug)]
enum MqttError {
    DnsResolutionFailed,
    DnsTimeout,
    ConnectionFailed,
    /// Broker hat CONNECT abgelehnt
    Rejected(ReasonCode),
    /// Fehler bei bestehender Verbindung
    Transfer(ReasonCode),
}

impl MqttError {
    /// Abbildung auf die Fehlerarten der Session
    fn kind(&self) -> TransportError {
        match self {
            MqttError::DnsResolutionFailed | MqttError::ConnectionFailed => TransportError::Io,
            MqttError::DnsTimeout => TransportError::Timeout,
            MqttError::Rejected(code) | MqttError::Transfer(code) => match code {
                ReasonCode::BadUserNameOrPassword | ReasonCode::NotAuthorized => {
                    TransportError::BadCredentials
                }
                ReasonCode::ServerUnavailable | ReasonCode::ServerBusy | ReasonCode::Banned => {
                    TransportError::Refused
                }
                ReasonCode::NetworkError => TransportError::Io,
                _ => TransportError::Protocol,
            },
        }
    }
}

impl defmt::Format for MqttError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            MqttError::DnsResolutionFailed => defmt::write!(fmt, "DNS failed"),
            MqttError::DnsTimeout => defmt::write!(fmt, "DNS timeout"),
            MqttError::ConnectionFailed => defmt::write!(fmt, "Connection failed"),
            MqttError::Rejected(code) => {
                defmt::write!(fmt, "Rejected by broker: {}", Debug2Format(code))
            }
            MqttError::Transfer(code) => defmt::write!(fmt, "Transfer error: {}", Debug2Format(code)),
        }
    }
}

// ============================================================================
// MqttTransport für die Steuerschleife
// ============================================================================

/// `MqttTransport` über die Channels zum MQTT Task
///
/// Jeder Aufruf sendet einen Request und wartet auf die Antwort. Eingehende
/// Nachrichten liegen gepuffert in `channels.inbound`.
pub struct ChannelTransport {
    channels: &'static MqttChannels,
}

impl ChannelTransport {
    pub fn new(channels: &'static MqttChannels) -> Self {
        Self { channels }
    }

    async fn request(&self, request: MqttRequest) -> Result<(), TransportError> {
        self.channels.requests.send(request).await;
        self.channels.responses.receive().await
    }
}

impl MqttTransport for ChannelTransport {
    async fn connect(&mut self, options: &ConnectOptions<'_>) -> Result<(), TransportError> {
        let request = ConnectRequest::from_options(options)?;
        self.request(MqttRequest::Connect(request)).await
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), TransportError> {
        let message = OutboundMessage {
            topic: Topic::try_from(topic).map_err(too_large)?,
            payload: Vec::from_slice(payload).map_err(too_large)?,
            retain,
        };
        self.request(MqttRequest::Publish(message)).await
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let topic = Topic::try_from(topic).map_err(too_large)?;
        self.request(MqttRequest::Subscribe(topic)).await
    }

    async fn poll(
        &mut self,
        on_message: &mut dyn FnMut(&str, &[u8]),
    ) -> Result<bool, TransportError> {
        if let Ok(message) = self.channels.inbound.try_receive() {
            on_message(&message.topic, &message.payload);
            return Ok(true);
        }
        if self.is_connected() {
            Ok(false)
        } else {
            Err(TransportError::NotConnected)
        }
    }

    async fn disconnect(&mut self) {
        let _ = self.request(MqttRequest::Disconnect).await;
    }

    fn is_connected(&self) -> bool {
        MQTT_CONNECTED.load(Ordering::Relaxed)
    }
}
