// Task-Modul: Enthält alle Embassy Tasks
//
// Jeder Task läuft asynchron und unabhängig.
// Die Steuerschleife besitzt die Lampen-Logik, WiFi und MQTT Task führen nur
// ihre Anforderungen aus (Signal bzw. Channels).

pub mod control;
pub mod mqtt;
pub mod wifi;

// Re-export Tasks für einfachen Import
pub use control::{EmbassyDelay, control_task};
pub use mqtt::{ChannelTransport, mqtt_task};
pub use wifi::{WifiLink, connection_task, net_task};
