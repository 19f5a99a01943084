// Projekt-Konfiguration: Konstanten und Hardware-Zuordnungen

use esp_core::DeviceInfo;

// ============================================================================
// LED Konfiguration (LEDC PWM)
// ============================================================================

// GPIO-Pins der drei LED-Kanäle: Rot GPIO5, Grün GPIO6, Blau GPIO7
// (Peripherals werden in main.rs direkt übergeben)

/// PWM-Frequenz der LEDC-Kanäle in kHz
/// 5 kHz ist flimmerfrei und erlaubt 11 Bit Auflösung
pub const PWM_FREQUENCY_KHZ: u32 = 5;

// ============================================================================
// Eingänge (Potentiometer + Taster)
// ============================================================================

// ADC1-Pins der Potentiometer: Rot GPIO0, Grün GPIO3, Blau GPIO4
// Das Poti für Rot hängt an GPIO0, die Platine ist so verdrahtet
//
// Modus-Taster: GPIO9 (interner Pull-Up, gedrückt = LOW)

/// Takt der Steuerschleife in Millisekunden
pub const CONTROL_TICK_MS: u64 = esp_core::controller::TICK_MS;

// ============================================================================
// WiFi Konfiguration
// ============================================================================

/// WiFi SSID (Netzwerk-Name)
/// Wird zur Build-Zeit aus der Environment Variable WIFI_SSID geladen
/// Setze diese in .env file (siehe .env.example)
pub const WIFI_SSID: &str = env!(
    "WIFI_SSID",
    "WiFi SSID nicht gesetzt! Erstelle .env file (siehe .env.example)"
);

/// WiFi Passwort
/// Wird zur Build-Zeit aus der Environment Variable WIFI_PASSWORD geladen
/// Setze diese in .env file (siehe .env.example)
pub const WIFI_PASSWORD: &str = env!(
    "WIFI_PASSWORD",
    "WiFi Password nicht gesetzt! Erstelle .env file (siehe .env.example)"
);

/// Heap-Größe für WiFi (Bytes)
/// WiFi benötigt dynamischen Speicher für Pakete
pub const WIFI_HEAP_SIZE: usize = 65536; // 64 KB

/// Zusätzliche Heap-Größe (Bytes)
pub const EXTRA_HEAP_SIZE: usize = 36864; // 36 KB

/// Wartezeit nach fehlgeschlagenem WiFi-Start in Sekunden
pub const WIFI_RETRY_DELAY_SECS: u64 = 5;

// ============================================================================
// MQTT Konfiguration
// ============================================================================

/// MQTT Broker Hostname oder IP-Adresse
/// Wird zur Build-Zeit aus der Environment Variable MQTT_BROKER geladen
/// Setze diese in .env file (siehe .env.example)
pub const MQTT_BROKER: &str = env!(
    "MQTT_BROKER",
    "MQTT Broker nicht gesetzt! Erstelle .env file (siehe .env.example)"
);

/// MQTT Broker Port
/// Standard: 1883 (unverschlüsselt), kann in .env überschrieben werden
pub const MQTT_PORT: u16 = match option_env!("MQTT_PORT") {
    Some(port) => parse_port(port),
    None => 1883,
};

/// MQTT Benutzername, leer oder nicht gesetzt = anonym
pub const MQTT_USER: Option<&str> = option_env!("MQTT_USER");

pub const MQTT_PASSWORD: Option<&str> = option_env!("MQTT_PASSWORD");

/// MQTT Buffer-Größe in Bytes
/// Muss die Discovery-Konfiguration (bis 1 KB) plus Header aufnehmen
pub const MQTT_BUFFER_SIZE: usize = 1536;

/// TCP RX/TX Buffer-Größe für die Broker-Verbindung
pub const MQTT_SOCKET_BUFFER_SIZE: usize = 4096;

/// TCP Timeout in Sekunden
pub const MQTT_SOCKET_TIMEOUT_SECS: u64 = 10;

/// DNS Query Timeout in Sekunden
pub const DNS_TIMEOUT_SECS: u64 = 10;

/// Eingehende Nachrichten, die zwischen zwei Ticks gepuffert werden
pub const MQTT_INBOUND_QUEUE: usize = 4;

// ============================================================================
// Geräte-Identität (Home Assistant)
// ============================================================================

pub const DEVICE_ID: &str = match option_env!("DEVICE_ID") {
    Some(id) => id,
    None => "color_shadow_lamp_01",
};

pub const DEVICE_NAME: &str = match option_env!("DEVICE_NAME") {
    Some(name) => name,
    None => "Color Shadow Lamp",
};

/// Geräte-Block für die Discovery-Konfiguration
pub fn device_info() -> DeviceInfo {
    DeviceInfo {
        id: DEVICE_ID,
        name: DEVICE_NAME,
        sw_version: env!("CARGO_PKG_VERSION"),
        ..DeviceInfo::default()
    }
}

/// Dezimalzahl zur Compile-Zeit parsen (ungültige Zeichen brechen den Build ab)
const fn parse_port(value: &str) -> u16 {
    let bytes = value.as_bytes();
    let mut port: u16 = 0;
    let mut i = 0;
    while i < bytes.len() {
        let digit = bytes[i];
        assert!(digit.is_ascii_digit(), "MQTT_PORT ist keine Zahl");
        port = port * 10 + (digit - b'0') as u16;
        i += 1;
    }
    port
}
