// Eingänge der Lampe: drei Potentiometer an ADC1 und der Modus-Taster
//
// Die ADC-Pins nutzen die Kurven-Kalibrierung, `read_oneshot` liefert damit
// direkt Millivolt.

use defmt::warn;
use esp_core::{Knob, LampInputs};
use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcCalCurve, AdcConfig, AdcPin, Attenuation};
use esp_hal::gpio::{Input, InputConfig, Pull};
use esp_hal::peripherals::{ADC1, GPIO0, GPIO3, GPIO4, GPIO9};

type Calibration = AdcCalCurve<ADC1<'static>>;
type KnobPin<P> = AdcPin<P, ADC1<'static>, Calibration>;

pub struct BoardInputs {
    adc: Adc<'static, ADC1<'static>, Blocking>,
    red: KnobPin<GPIO0<'static>>,
    green: KnobPin<GPIO3<'static>>,
    blue: KnobPin<GPIO4<'static>>,
    button: Input<'static>,
}

impl BoardInputs {
    pub fn new(
        adc1: ADC1<'static>,
        red_pin: GPIO0<'static>,
        green_pin: GPIO3<'static>,
        blue_pin: GPIO4<'static>,
        button_pin: GPIO9<'static>,
    ) -> Self {
        // 2.5 dB: Messbereich bis ca. 1 V, passend zum Poti-Fenster 5..950 mV
        let mut config = AdcConfig::new();
        let red = config.enable_pin_with_cal::<_, Calibration>(red_pin, Attenuation::_2p5dB);
        let green = config.enable_pin_with_cal::<_, Calibration>(green_pin, Attenuation::_2p5dB);
        let blue = config.enable_pin_with_cal::<_, Calibration>(blue_pin, Attenuation::_2p5dB);

        Self {
            adc: Adc::new(adc1, config),
            red,
            green,
            blue,
            button: Input::new(button_pin, InputConfig::default().with_pull(Pull::Up)),
        }
    }
}

impl LampInputs for BoardInputs {
    fn mode_button_pressed(&mut self) -> bool {
        // Pull-Up: gedrückt = LOW
        self.button.is_low()
    }

    fn read_millivolts(&mut self, knob: Knob) -> u16 {
        let result = match knob {
            Knob::Red => nb::block!(self.adc.read_oneshot(&mut self.red)),
            Knob::Green => nb::block!(self.adc.read_oneshot(&mut self.green)),
            Knob::Blue => nb::block!(self.adc.read_oneshot(&mut self.blue)),
        };
        result.unwrap_or_else(|_| {
            warn!("Lamp: ADC read failed for {}", knob);
            0
        })
    }
}
