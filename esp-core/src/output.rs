//! LED-Kanal-Ausgabe mit Leistungsgrenze
//!
//! Hält die drei Kanalwerte und begrenzt sie auf die Obergrenze (Ceiling) des
//! aktiven Modus. Die Grenze begrenzt die Dauerleistung der LEDs.

use rgb::RGB16;

use crate::logic::PWM_MAX;
use crate::traits::PwmWriter;

/// Obergrenze im manuellen Modus: voller Poti-Bereich
pub const MANUAL_CEILING: u16 = PWM_MAX;

/// Obergrenze im Remote-Modus: 80% von PWM_MAX gegen Überhitzung
pub const REMOTE_CEILING: u16 = 1638;

const BLACK: RGB16 = RGB16 { r: 0, g: 0, b: 0 };

pub struct ChannelOutput<P: PwmWriter> {
    pwm: P,
    values: RGB16,
    ceiling: u16,
}

impl<P: PwmWriter> ChannelOutput<P> {
    pub fn new(pwm: P) -> Self {
        Self {
            pwm,
            values: BLACK,
            ceiling: PWM_MAX,
        }
    }

    /// Kanäle setzen (werden auf `[0, ceiling]` begrenzt) und ausgeben
    pub fn set_direct(&mut self, red: u16, green: u16, blue: u16) {
        self.set(RGB16 {
            r: red,
            g: green,
            b: blue,
        });
    }

    pub fn set(&mut self, color: RGB16) {
        self.values = self.clamp(color);
        self.pwm.write(self.values);
    }

    /// Alle Kanäle auf 0
    pub fn clear(&mut self) {
        self.set(BLACK);
    }

    /// Neue Obergrenze setzen, gespeicherte Werte werden sofort nachbegrenzt
    pub fn set_ceiling(&mut self, ceiling: u16) {
        self.ceiling = ceiling.min(PWM_MAX);
        let clamped = self.clamp(self.values);
        if clamped != self.values {
            self.values = clamped;
            self.pwm.write(self.values);
        }
    }

    pub fn ceiling(&self) -> u16 {
        self.ceiling
    }

    pub fn current(&self) -> RGB16 {
        self.values
    }

    /// Mindestens ein Kanal leuchtet
    pub fn is_lit(&self) -> bool {
        self.values != BLACK
    }

    /// Zugriff auf den PWM-Writer (z.B. für Assertions in Tests)
    pub fn pwm(&self) -> &P {
        &self.pwm
    }

    fn clamp(&self, color: RGB16) -> RGB16 {
        RGB16 {
            r: color.r.min(self.ceiling),
            g: color.g.min(self.ceiling),
            b: color.b.min(self.ceiling),
        }
    }
}
