// LEDC PWM Writer - drei LED-Kanäle mit 11 Bit Auflösung
//
// Die Tastverhältnisse kommen bereits begrenzt aus esp-core (0..=2047) und
// werden unverändert als Hardware-Duty geschrieben.

use esp_core::PwmWriter;
use esp_hal::gpio::DriveMode;
use esp_hal::ledc::channel::{self, ChannelHW, ChannelIFace};
use esp_hal::ledc::timer::{self, TimerIFace};
use esp_hal::ledc::{LSGlobalClkSource, Ledc, LowSpeed};
use esp_hal::peripherals::{GPIO5, GPIO6, GPIO7, LEDC};
use esp_hal::time::Rate;
use rgb::RGB16;
use static_cell::StaticCell;

use crate::config::PWM_FREQUENCY_KHZ;

/// Fehler beim Einrichten der LEDC-Peripherie
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum PwmError {
    Timer,
    Channel,
}

/// Timer muss 'static sein, die Kanäle halten eine Referenz darauf
static PWM_TIMER: StaticCell<timer::Timer<'static, LowSpeed>> = StaticCell::new();

/// Real Hardware PWM Writer
///
/// Ein LowSpeed-Timer (11 Bit, 5 kHz) treibt drei LEDC-Kanäle.
pub struct LedcPwmWriter {
    red: channel::Channel<'static, LowSpeed>,
    green: channel::Channel<'static, LowSpeed>,
    blue: channel::Channel<'static, LowSpeed>,
}

impl LedcPwmWriter {
    /// Konfiguriert Timer und Kanäle, alle Kanäle starten mit 0
    ///
    /// # Fehlerbehandlung
    /// Gibt `PwmError` zurück wenn Timer oder Kanal nicht konfiguriert werden
    /// können (z.B. Frequenz bei 11 Bit nicht erreichbar). Darf nur einmal
    /// aufgerufen werden.
    pub fn new(
        ledc: LEDC<'static>,
        red_pin: GPIO5<'static>,
        green_pin: GPIO6<'static>,
        blue_pin: GPIO7<'static>,
    ) -> Result<Self, PwmError> {
        let mut ledc = Ledc::new(ledc);
        ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);

        let mut pwm_timer = ledc.timer::<LowSpeed>(timer::Number::Timer0);
        pwm_timer
            .configure(timer::config::Config {
                duty: timer::config::Duty::Duty11Bit,
                clock_source: timer::LSClockSource::APBClk,
                frequency: Rate::from_khz(PWM_FREQUENCY_KHZ),
            })
            .map_err(|_| PwmError::Timer)?;
        let pwm_timer = &*PWM_TIMER.init(pwm_timer);

        let channel_config = || channel::config::Config {
            timer: pwm_timer,
            duty_pct: 0,
            drive_mode: DriveMode::PushPull,
        };

        let mut red = ledc.channel(channel::Number::Channel0, red_pin);
        let mut green = ledc.channel(channel::Number::Channel1, green_pin);
        let mut blue = ledc.channel(channel::Number::Channel2, blue_pin);
        for ch in [&mut red, &mut green, &mut blue] {
            ch.configure(channel_config()).map_err(|_| PwmError::Channel)?;
        }

        Ok(Self { red, green, blue })
    }
}

impl PwmWriter for LedcPwmWriter {
    fn write(&mut self, duty: RGB16) {
        self.red.set_duty_hw(u32::from(duty.r));
        self.green.set_duty_hw(u32::from(duty.g));
        self.blue.set_duty_hw(u32::from(duty.b));
    }
}
