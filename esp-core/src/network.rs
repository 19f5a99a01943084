//! WLAN ohne Lichtsteuerung (Modus `NetworkOnly`)
//!
//! Hält nur die WLAN-Verbindung aufrecht, z.B. für OTA oder Diagnose. Die
//! Assoziation blockiert nie: ist der Link weg, wird höchstens alle
//! `retry_interval_ms` eine neue Assoziation angefordert.

use crate::traits::NetworkLink;

pub const NETWORK_RETRY_MS: u64 = 5000;

#[derive(Debug, Clone)]
pub struct NetworkKeeper {
    retry_interval_ms: u64,
    last_request_ms: Option<u64>,
    was_up: bool,
    active: bool,
}

impl NetworkKeeper {
    pub const fn new() -> Self {
        Self::with_retry_interval(NETWORK_RETRY_MS)
    }

    pub const fn with_retry_interval(retry_interval_ms: u64) -> Self {
        Self {
            retry_interval_ms,
            last_request_ms: None,
            was_up: false,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Startet die Assoziation, kehrt sofort zurück
    pub fn begin(&mut self, link: &mut impl NetworkLink, now_ms: u64) {
        info!("WiFi: Network-only mode, connecting...");
        link.start_association();
        self.active = true;
        self.was_up = false;
        self.last_request_ms = Some(now_ms);
    }

    /// Link-Wechsel loggen, bei Bedarf erneut assoziieren
    pub fn poll(&mut self, link: &mut impl NetworkLink, now_ms: u64) {
        if !self.active {
            return;
        }

        let up = link.is_associated();
        if up != self.was_up {
            if up {
                match link.local_ip() {
                    Some(ip) => info!("WiFi: Connected, IP {}", ip.octets()),
                    None => info!("WiFi: Connected"),
                }
            } else {
                warn!("WiFi: Connection lost");
            }
            self.was_up = up;
        }

        if up {
            return;
        }

        let due = self
            .last_request_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.retry_interval_ms);
        if due {
            debug!("WiFi: Requesting reassociation");
            link.request_reassociation();
            self.last_request_ms = Some(now_ms);
        }
    }

    /// Trennt das WLAN, darf mehrfach aufgerufen werden
    pub fn stop(&mut self, link: &mut impl NetworkLink) {
        if self.active {
            info!("WiFi: Network-only mode stopped");
        }
        link.disconnect();
        self.active = false;
        self.was_up = false;
        self.last_request_ms = None;
    }
}

impl Default for NetworkKeeper {
    fn default() -> Self {
        Self::new()
    }
}
