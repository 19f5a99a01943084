// WiFi Task - Verbindet mit WLAN auf Anforderung der Steuerschleife
use defmt::{Debug2Format, error, info, warn};
use embassy_futures::select::{Either, select};
use embassy_net::{Runner, Stack};
use embassy_time::{Duration, Timer};
use esp_core::NetworkLink;
use esp_radio::wifi::{
    ClientConfig, ModeConfig, WifiController, WifiDevice, WifiError, WifiEvent,
};

use crate::config::{WIFI_PASSWORD, WIFI_RETRY_DELAY_SECS, WIFI_SSID};
use crate::{WifiRequest, WifiSignal};

/// WiFi Connection Task
///
/// Managed die WiFi-Verbindung:
/// - Verbindet mit dem Access Point wenn `WifiRequest::Connect` kommt
/// - Trennt bei `WifiRequest::Disconnect`
/// - Gescheiterte Verbindungsversuche werden wiederholt, bis die Verbindung
///   steht oder `Disconnect` kommt
/// - Nach einem Verbindungsabbruch wird auf die nächste Anforderung
///   gewartet, den Takt dafür gibt die Steuerschleife vor
#[embassy_executor::task]
pub async fn connection_task(
    mut controller: WifiController<'static>,
    requests: &'static WifiSignal,
) {
    info!("WiFi: Starting connection task");

    loop {
        if requests.wait().await != WifiRequest::Connect {
            continue;
        }

        if !associate(&mut controller, requests).await {
            continue;
        }

        let dropped = select(
            controller.wait_for_event(WifiEvent::StaDisconnected),
            stop_requested(requests),
        )
        .await;
        match dropped {
            Either::First(()) => warn!("WiFi: Disconnected from AP"),
            Either::Second(()) => disconnect(&mut controller).await,
        }
    }
}

/// Startet den Controller und verbindet mit dem Access Point
///
/// Fehlschläge werden alle `WIFI_RETRY_DELAY_SECS` wiederholt, bis die
/// Verbindung steht oder ein `Disconnect` angefordert wird. Gibt `false`
/// zurück wenn abgebrochen wurde.
async fn associate(
    controller: &mut WifiController<'static>,
    requests: &'static WifiSignal,
) -> bool {
    loop {
        if let Err(e) = start(controller).await {
            error!("WiFi: Failed to start: {}", Debug2Format(&e));
        } else {
            info!("WiFi: Connecting to '{}'...", WIFI_SSID);
            let connected = select(controller.connect_async(), stop_requested(requests)).await;
            match connected {
                Either::First(Ok(())) => {
                    info!("WiFi: Connected successfully!");
                    return true;
                }
                Either::First(Err(e)) => error!("WiFi: Connection failed: {}", Debug2Format(&e)),
                Either::Second(()) => {
                    disconnect(controller).await;
                    return false;
                }
            }
        }

        let retry = select(
            Timer::after(Duration::from_secs(WIFI_RETRY_DELAY_SECS)),
            stop_requested(requests),
        )
        .await;
        if let Either::Second(()) = retry {
            disconnect(controller).await;
            return false;
        }
    }
}

/// Konfiguriert und startet den Controller, falls noch nicht geschehen
async fn start(controller: &mut WifiController<'static>) -> Result<(), WifiError> {
    if matches!(controller.is_started(), Ok(true)) {
        return Ok(());
    }

    info!("WiFi: Configuring and starting...");
    let client_config = ModeConfig::Client(
        ClientConfig::default()
            .with_ssid(WIFI_SSID.into())
            .with_password(WIFI_PASSWORD.into()),
    );
    controller.set_config(&client_config)?;
    controller.start_async().await?;
    info!("WiFi: Started successfully");
    Ok(())
}

/// Wartet bis ein `Disconnect` angefordert wird, `Connect` wird ignoriert
async fn stop_requested(requests: &'static WifiSignal) {
    while requests.wait().await != WifiRequest::Disconnect {}
}

async fn disconnect(controller: &mut WifiController<'static>) {
    match controller.disconnect_async().await {
        Ok(()) => info!("WiFi: Disconnected on request"),
        Err(e) => warn!("WiFi: Disconnect failed: {}", Debug2Format(&e)),
    }
}

/// Network Task
///
/// Überwacht den Netzwerk-Stack:
/// - Prozessiert Netzwerk-Pakete
/// - Managed TCP/IP Stack
#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) -> ! {
    runner.run().await
}

/// `NetworkLink` für die Steuerschleife
///
/// Anforderungen gehen per Signal an den `connection_task` und kehren sofort
/// zurück. Der Status kommt direkt aus dem embassy-net Stack (Link + DHCP).
pub struct WifiLink {
    stack: Stack<'static>,
    requests: &'static WifiSignal,
}

impl WifiLink {
    pub fn new(stack: Stack<'static>, requests: &'static WifiSignal) -> Self {
        Self { stack, requests }
    }
}

impl NetworkLink for WifiLink {
    fn start_association(&mut self) {
        self.requests.signal(WifiRequest::Connect);
    }

    fn request_reassociation(&mut self) {
        self.requests.signal(WifiRequest::Connect);
    }

    fn disconnect(&mut self) {
        self.requests.signal(WifiRequest::Disconnect);
    }

    fn is_associated(&self) -> bool {
        self.stack.is_link_up() && self.stack.config_v4().is_some()
    }

    fn local_ip(&self) -> Option<core::net::Ipv4Addr> {
        self.stack.config_v4().map(|config| config.address.address())
    }
}
