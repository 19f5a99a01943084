//! Pure Business Logic Functions
//!
//! Skalierung zwischen den Wertebereichen (Millivolt, PWM-Tastverhältnis,
//! Home Assistant 0-255). Funktionen ohne Hardware-Dependencies (testbar!)

use rgb::RGB16;

/// Maximales Tastverhältnis der LEDC-Kanäle (11 Bit)
pub const PWM_MAX: u16 = 2047;

/// Obere Grenze des externen Wertebereichs (Home Assistant)
pub const EXTERNAL_MAX: i32 = 255;

/// Lineare Abbildung mit Ganzzahl-Division (schneidet ab, rundet nicht)
///
/// # Beispiele
///
/// ```
/// # use esp_core::logic::map_range;
/// assert_eq!(map_range(128, 0, 255, 0, 1638), 822);
/// assert_eq!(map_range(822, 0, 1638, 0, 255), 127);
/// ```
pub fn map_range(x: i32, in_min: i32, in_max: i32, out_min: i32, out_max: i32) -> i32 {
    if in_max == in_min {
        return out_min;
    }
    (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

/// Externen Wert (0-255, wird begrenzt) auf `0..=range` abbilden
pub fn scale_to_pwm(value: i32, range: u16) -> u16 {
    let value = value.clamp(0, EXTERNAL_MAX);
    map_range(value, 0, EXTERNAL_MAX, 0, i32::from(range)) as u16
}

/// Kanalwert aus `0..=range` auf 0-255 abbilden
pub fn scale_to_external(value: u16, range: u16) -> u8 {
    let value = value.min(range);
    map_range(i32::from(value), 0, i32::from(range), 0, EXTERNAL_MAX) as u8
}

/// Höchster der drei Kanalwerte
pub fn max_channel(color: RGB16) -> u16 {
    color.r.max(color.g).max(color.b)
}

/// Neue Helligkeit anwenden, Farbverhältnis R:G:B bleibt erhalten
///
/// Sind alle Kanäle 0, wird Weiß mit der gewünschten Helligkeit gesetzt.
pub fn apply_brightness(current: RGB16, brightness: i32, range: u16) -> RGB16 {
    let target = scale_to_pwm(brightness, range);
    let max = max_channel(current);

    if max == 0 {
        return RGB16 {
            r: target,
            g: target,
            b: target,
        };
    }

    let scale = |channel: u16| (u32::from(channel) * u32::from(target) / u32::from(max)) as u16;
    RGB16 {
        r: scale(current.r),
        g: scale(current.g),
        b: scale(current.b),
    }
}

/// Kalibrierung der Potentiometer
///
/// Die Potis erreichen ihre Endanschläge elektrisch nicht ganz, daher wird
/// der nutzbare Bereich vor der Abbildung begrenzt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnobCalibration {
    pub min_mv: u16,
    pub max_mv: u16,
    pub duty_max: u16,
}

impl Default for KnobCalibration {
    fn default() -> Self {
        Self {
            min_mv: 5,
            max_mv: 950,
            duty_max: PWM_MAX,
        }
    }
}

/// Poti-Spannung (mV) in Tastverhältnis umrechnen
pub fn knob_to_duty(millivolts: u16, calibration: KnobCalibration) -> u16 {
    let mv = millivolts.clamp(calibration.min_mv, calibration.max_mv);
    map_range(
        i32::from(mv),
        i32::from(calibration.min_mv),
        i32::from(calibration.max_mv),
        0,
        i32::from(calibration.duty_max),
    ) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_range_truncates() {
        assert_eq!(map_range(1, 0, 255, 0, 1638), 6);
        assert_eq!(map_range(255, 0, 255, 0, 1638), 1638);
        assert_eq!(map_range(0, 0, 255, 0, 1638), 0);
    }

    #[test]
    fn test_map_range_empty_input_range() {
        assert_eq!(map_range(7, 3, 3, 10, 20), 10);
    }

    #[test]
    fn test_scale_to_pwm_clamps_input() {
        assert_eq!(scale_to_pwm(-20, 1638), 0);
        assert_eq!(scale_to_pwm(300, 1638), 1638);
    }

    #[test]
    fn test_scale_round_trip_within_one() {
        for value in 0..=255 {
            let pwm = scale_to_pwm(value, 1638);
            let back = i32::from(scale_to_external(pwm, 1638));
            assert!((value - back).abs() <= 1, "{value} -> {pwm} -> {back}");
        }
    }

    #[test]
    fn test_apply_brightness_keeps_ratio() {
        let current = RGB16 { r: 100, g: 50, b: 0 };
        let result = apply_brightness(current, 128, 1638);
        assert_eq!(result, RGB16 { r: 822, g: 411, b: 0 });
    }

    #[test]
    fn test_apply_brightness_from_black_is_white() {
        let result = apply_brightness(RGB16 { r: 0, g: 0, b: 0 }, 255, 1638);
        assert_eq!(
            result,
            RGB16 {
                r: 1638,
                g: 1638,
                b: 1638
            }
        );
    }

    #[test]
    fn test_apply_brightness_single_channel_full() {
        let result = apply_brightness(RGB16 { r: 0, g: 3, b: 0 }, 255, 1638);
        assert_eq!(result, RGB16 { r: 0, g: 1638, b: 0 });
    }

    #[test]
    fn test_knob_to_duty_clamps_calibration_window() {
        let cal = KnobCalibration::default();
        assert_eq!(knob_to_duty(0, cal), 0);
        assert_eq!(knob_to_duty(5, cal), 0);
        assert_eq!(knob_to_duty(950, cal), PWM_MAX);
        assert_eq!(knob_to_duty(3300, cal), PWM_MAX);
    }
}
