//! Modus-Auswahl über den Taster
//!
//! Zustandsmaschine über [`OperatingMode`]. Jede steigende Flanke des Tasters
//! schaltet zum nächsten Modus, sofern seit der letzten akzeptierten Flanke
//! mindestens die Entprellzeit vergangen ist.

use crate::types::OperatingMode;

/// Standard-Entprellzeit in Millisekunden
pub const DEBOUNCE_MS: u64 = 50;

#[derive(Debug, Clone)]
pub struct ModeSelector {
    current: OperatingMode,
    debounce_ms: u64,
    last_accepted_ms: Option<u64>,
    was_pressed: bool,
}

impl ModeSelector {
    pub fn new(initial: OperatingMode) -> Self {
        Self::with_debounce(initial, DEBOUNCE_MS)
    }

    pub fn with_debounce(initial: OperatingMode, debounce_ms: u64) -> Self {
        info!("Mode: initial mode {}", initial.as_str());
        Self {
            current: initial,
            debounce_ms,
            last_accepted_ms: None,
            was_pressed: false,
        }
    }

    pub fn current(&self) -> OperatingMode {
        self.current
    }

    /// Taster-Pegel auswerten, gibt `true` zurück wenn der Modus gewechselt hat
    pub fn update(&mut self, pressed: bool, now_ms: u64) -> bool {
        let rising_edge = pressed && !self.was_pressed;
        self.was_pressed = pressed;

        if !rising_edge {
            return false;
        }

        let debounced = self
            .last_accepted_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.debounce_ms);
        if !debounced {
            debug!("Mode: edge at {} ms ignored (bounce)", now_ms);
            return false;
        }

        self.last_accepted_ms = Some(now_ms);
        self.current = self.current.next();
        info!("Mode: changed to {}", self.current.as_str());
        true
    }

    /// Modus direkt setzen (Fallback), Entprell-Zeitpunkt bleibt unverändert
    pub fn set_mode(&mut self, mode: OperatingMode) {
        self.current = mode;
        info!("Mode: set to {}", mode.as_str());
    }
}
