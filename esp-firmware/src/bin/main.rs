// Keine Standard-Bibliothek verwenden (Embedded System)
#![no_std]
// Kein normaler main() Einstiegspunkt (wird von esp_rtos bereitgestellt)
#![no_main]
// Verbiete mem::forget - gefährlich bei ESP HAL Types mit DMA-Buffern
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
// Verbiete große Stack-Frames (Stack ist auf Embedded Systemen begrenzt)
#![deny(clippy::large_stack_frames)]

// Heap Allocator (WiFi benötigt dynamischen Speicher)
extern crate alloc;

// Embassy Async Runtime
use embassy_executor::Spawner;
use embassy_net::{Config as NetConfig, Stack, StackResources};
use embassy_time::{Duration, Timer};

// ESP32-C6 HAL
use esp_hal::clock::CpuClock;
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;

// Backtrace bei Panic und println!() Support
use {esp_backtrace as _, esp_println as _};

// Lampen-Logik
use esp_core::protocol::DISCOVERY_PREFIX;
use esp_core::SessionSettings;

// Projekt-Module und Konfiguration
use esp_rgb_lampe::config::{
    DEVICE_ID, EXTRA_HEAP_SIZE, MQTT_PASSWORD, MQTT_USER, WIFI_HEAP_SIZE, device_info,
};
use esp_rgb_lampe::hal::{BoardInputs, LedcPwmWriter};
use esp_rgb_lampe::tasks::{
    ChannelTransport, EmbassyDelay, WifiLink, connection_task, control_task, mqtt_task, net_task,
};
use esp_rgb_lampe::{
    ControllerSettings, LampController, LampSynchronizer, MqttChannels, RemoteConfig, WifiSignal,
};

// ESP-IDF App Descriptor - erforderlich für den Bootloader!
// Ohne diesen schlägt das Flashen mit "ESP-IDF App Descriptor missing" fehl
esp_bootloader_esp_idf::esp_app_desc!();

/// Main Entry Point
///
/// Initialisiert Hardware, WiFi, startet Embassy Runtime und spawnt Tasks.
/// Danach schläft main() - alle Arbeit läuft in Tasks.
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    // ESP32-C6 Konfiguration: CPU auf maximale Taktfrequenz (160 MHz)
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // Heap Allocator initialisieren (WiFi braucht dynamischen Speicher!)
    // Zwei Bereiche: reclaimed RAM (64 KB) + extra (36 KB) = 100 KB total
    esp_alloc::heap_allocator!(
        #[esp_hal::ram(reclaimed)]
        size: WIFI_HEAP_SIZE
    );
    esp_alloc::heap_allocator!(size: EXTRA_HEAP_SIZE);

    // Embassy Runtime initialisieren (Timer + Software Interrupt)
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_interrupt =
        esp_hal::interrupt::software::SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0, sw_interrupt.software_interrupt0);

    // LED-Kanäle und Eingänge zuerst, damit die Lampe sofort dunkel ist
    let pwm = LedcPwmWriter::new(
        peripherals.LEDC,
        peripherals.GPIO5,
        peripherals.GPIO6,
        peripherals.GPIO7,
    )
    .expect("Failed to configure LEDC channels");
    let inputs = BoardInputs::new(
        peripherals.ADC1,
        peripherals.GPIO0,
        peripherals.GPIO3,
        peripherals.GPIO4,
        peripherals.GPIO9,
    );

    // WiFi Hardware initialisieren
    static RADIO_INIT: static_cell::StaticCell<esp_radio::Controller> =
        static_cell::StaticCell::new();
    let radio_init =
        RADIO_INIT.init(esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller"));

    let (wifi_controller, wifi_interface) =
        esp_radio::wifi::new(radio_init, peripherals.WIFI, Default::default())
            .expect("Failed to initialize Wi-Fi");

    // Netzwerk-Stack erstellen
    // Random seed für TCP/IP Stack (von Hardware RNG)
    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    // Static resources für embassy-net
    // 3 Sockets: MQTT (1) + DNS (1) + DHCP (1)
    static RESOURCES: static_cell::StaticCell<StackResources<3>> = static_cell::StaticCell::new();
    let resources = RESOURCES.init(StackResources::new());

    // embassy-net erstellt Stack + Runner (nutzt STA interface für Client-Modus)
    let (stack, runner) = embassy_net::new(
        wifi_interface.sta,
        NetConfig::dhcpv4(Default::default()),
        resources,
        seed,
    );

    // Stack muss 'static sein für Tasks
    static STACK: static_cell::StaticCell<Stack<'static>> = static_cell::StaticCell::new();
    let stack = *STACK.init(stack);

    // WiFi-Anforderungen (Steuerschleife → WiFi Task)
    static WIFI_SIGNAL: static_cell::StaticCell<WifiSignal> = static_cell::StaticCell::new();
    let wifi_signal = &*WIFI_SIGNAL.init(WifiSignal::new());

    // MQTT Channels (Steuerschleife ↔ MQTT Task)
    static MQTT_CHANNELS: static_cell::StaticCell<MqttChannels> = static_cell::StaticCell::new();
    let mqtt_channels = &*MQTT_CHANNELS.init(MqttChannels::new());

    // Remote-Modus: Geräte-Identität, Topics und Zugangsdaten
    defmt::info!("Lamp: Starting device '{}'", DEVICE_ID);
    let remote_config = RemoteConfig {
        device: device_info(),
        prefix: DISCOVERY_PREFIX,
        session: SessionSettings {
            username: MQTT_USER.filter(|user| !user.is_empty()),
            password: MQTT_PASSWORD.filter(|password| !password.is_empty()),
            ..SessionSettings::default()
        },
        ..RemoteConfig::default()
    };
    let remote = LampSynchronizer::new(
        ChannelTransport::new(mqtt_channels),
        remote_config,
        rng.random() as u16,
    )
    .expect("Device id does not fit into MQTT topics");

    let controller = LampController::new(
        inputs,
        pwm,
        WifiLink::new(stack, wifi_signal),
        EmbassyDelay,
        remote,
        ControllerSettings::default(),
    );

    // Spawn WiFi Tasks
    spawner
        .spawn(connection_task(wifi_controller, wifi_signal))
        .unwrap();
    spawner.spawn(net_task(runner)).unwrap();

    // Spawn MQTT Task (führt Requests der Steuerschleife aus)
    spawner.spawn(mqtt_task(stack, mqtt_channels)).unwrap();

    // Spawn Steuerschleife (besitzt die Lampen-Logik)
    spawner.spawn(control_task(controller)).unwrap();

    // Main-Loop: schläft (alle Arbeit läuft in Tasks)
    loop {
        Timer::after(Duration::from_secs(3600)).await;
    }
}
