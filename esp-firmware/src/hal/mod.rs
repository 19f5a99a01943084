// Hardware Abstraction Layer (HAL) Module
//
// Implementiert die Traits aus esp-core für die ESP32-C6 Hardware:
// LEDC-PWM für die LED-Kanäle, ADC1 + GPIO für Potis und Taster.

pub mod inputs;
pub mod pwm;

pub use inputs::BoardInputs;
pub use pwm::LedcPwmWriter;
