//! ESP Core - Platform-agnostic Lamp Logic and Traits
//!
//! Diese Crate enthält KEINE Hardware-Dependencies.
//! Sie definiert die Traits zur Hardware und die komplette Lampen-Logik:
//! Modus-Auswahl, Kanal-Ausgabe, MQTT-Session und Home-Assistant-Abgleich.

#![no_std]

#[macro_use]
mod fmt;

pub mod controller;
pub mod logic;
pub mod mode;
pub mod network;
pub mod output;
pub mod protocol;
pub mod session;
pub mod smoothing;
pub mod sync;
pub mod traits;
pub mod types;

// Re-exports für einfachen Zugriff
pub use controller::{Controller, ControllerSettings};
pub use mode::ModeSelector;
pub use output::ChannelOutput;
pub use session::{ConnectivitySession, SessionSettings};
pub use sync::{LightSynchronizer, RemoteConfig};
pub use traits::{Delay, LampInputs, MqttTransport, NetworkLink, PwmWriter, TransportError};
pub use types::{DeviceInfo, Knob, OperatingMode};
