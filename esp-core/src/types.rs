//! Core Types für die Lampen-Steuerung
//!
//! Datenstrukturen ohne Hardware-Dependencies

/// Betriebs-Modus der Lampe
///
/// Genau ein Modus ist aktiv. `Ltt` und `PowerControl` sind in der aktuellen
/// Hardware-Revision deaktiviert, bleiben aber Teil des Taster-Zyklus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingMode {
    /// Potentiometer steuern die Kanäle direkt
    Manual,
    /// Deaktiviert
    Ltt,
    /// Deaktiviert
    PowerControl,
    /// Steuerung über MQTT / Home Assistant
    Remote,
    /// Nur WLAN, keine Lichtsteuerung
    NetworkOnly,
    Off,
}

impl OperatingMode {
    /// Nächster Modus im Taster-Zyklus
    ///
    /// Manual → Ltt → PowerControl → Remote → NetworkOnly → Off → Manual
    pub const fn next(self) -> Self {
        match self {
            Self::Manual => Self::Ltt,
            Self::Ltt => Self::PowerControl,
            Self::PowerControl => Self::Remote,
            Self::Remote => Self::NetworkOnly,
            Self::NetworkOnly => Self::Off,
            Self::Off => Self::Manual,
        }
    }

    /// `false` für Modi ohne Implementierung
    pub const fn is_implemented(self) -> bool {
        !matches!(self, Self::Ltt | Self::PowerControl)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "Manual",
            Self::Ltt => "LTT",
            Self::PowerControl => "PowerControl",
            Self::Remote => "Remote",
            Self::NetworkOnly => "NetworkOnly",
            Self::Off => "Off",
        }
    }
}

/// Potentiometer, benannt nach dem Kanal den es im manuellen Modus steuert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Knob {
    Red,
    Green,
    Blue,
}

impl Knob {
    pub const ALL: [Knob; 3] = [Knob::Red, Knob::Green, Knob::Blue];
}

/// Geräte-Identität für Topics und Home-Assistant-Discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Eindeutige ID, Teil aller Topics
    pub id: &'static str,
    pub name: &'static str,
    pub model: &'static str,
    pub manufacturer: &'static str,
    pub sw_version: &'static str,
    pub hw_version: &'static str,
    pub suggested_area: &'static str,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            id: "color_shadow_lamp_01",
            name: "Color Shadow Lamp",
            model: "Color Shadow LED Lamp",
            manufacturer: "RCTESTFLIGHT",
            sw_version: "1.0.0",
            hw_version: "1.0",
            suggested_area: "Living Room",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_cycle_closes_after_six_steps() {
        let mut mode = OperatingMode::Manual;
        for _ in 0..6 {
            mode = mode.next();
        }
        assert_eq!(mode, OperatingMode::Manual);
    }

    #[test]
    fn test_disabled_modes() {
        assert!(!OperatingMode::Ltt.is_implemented());
        assert!(!OperatingMode::PowerControl.is_implemented());
        assert!(OperatingMode::Remote.is_implemented());
    }
}
