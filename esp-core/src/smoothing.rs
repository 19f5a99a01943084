//! Glättung der Potentiometer-Werte
//!
//! Gleitender Mittelwert über einen Ringpuffer fester Größe, ein Puffer pro
//! Kanal.

use rgb::RGB16;

use crate::types::Knob;

/// Anzahl Werte im gleitenden Mittelwert
pub const MOVING_AVERAGE_SIZE: usize = 8;

/// Gleitender Mittelwert über die letzten `N` Werte
///
/// Startet mit lauter Nullen, nach `N` Werten ist der Puffer eingeschwungen.
#[derive(Debug, Clone)]
pub struct MovingAverage<const N: usize> {
    values: [u16; N],
    index: usize,
}

impl<const N: usize> MovingAverage<N> {
    pub const fn new() -> Self {
        Self {
            values: [0; N],
            index: 0,
        }
    }

    /// Neuen Wert einfügen und aktuellen Mittelwert zurückgeben
    pub fn push(&mut self, value: u16) -> u16 {
        self.values[self.index] = value;
        self.index = (self.index + 1) % N;
        self.average()
    }

    pub fn average(&self) -> u16 {
        let sum: u32 = self.values.iter().map(|&v| u32::from(v)).sum();
        (sum / N as u32) as u16
    }
}

impl<const N: usize> Default for MovingAverage<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Ein Mittelwert-Filter pro Potentiometer
#[derive(Debug, Clone, Default)]
pub struct KnobFilter {
    red: MovingAverage<MOVING_AVERAGE_SIZE>,
    green: MovingAverage<MOVING_AVERAGE_SIZE>,
    blue: MovingAverage<MOVING_AVERAGE_SIZE>,
}

impl KnobFilter {
    pub const fn new() -> Self {
        Self {
            red: MovingAverage::new(),
            green: MovingAverage::new(),
            blue: MovingAverage::new(),
        }
    }

    pub fn push(&mut self, knob: Knob, duty: u16) -> u16 {
        match knob {
            Knob::Red => self.red.push(duty),
            Knob::Green => self.green.push(duty),
            Knob::Blue => self.blue.push(duty),
        }
    }

    /// Aktuelle geglättete Werte aller drei Kanäle
    pub fn current(&self) -> RGB16 {
        RGB16 {
            r: self.red.average(),
            g: self.green.average(),
            b: self.blue.average(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moving_average_ramps_up() {
        let mut avg = MovingAverage::<4>::new();
        assert_eq!(avg.push(100), 25);
        assert_eq!(avg.push(100), 50);
        assert_eq!(avg.push(100), 75);
        assert_eq!(avg.push(100), 100);
    }

    #[test]
    fn test_moving_average_wraps() {
        let mut avg = MovingAverage::<2>::new();
        avg.push(10);
        avg.push(20);
        // überschreibt den ältesten Wert (10)
        assert_eq!(avg.push(40), 30);
    }

    #[test]
    fn test_knob_filter_channels_independent() {
        let mut filter = KnobFilter::new();
        for _ in 0..MOVING_AVERAGE_SIZE {
            filter.push(Knob::Red, 2047);
            filter.push(Knob::Blue, 800);
        }
        assert_eq!(
            filter.current(),
            RGB16 {
                r: 2047,
                g: 0,
                b: 800
            }
        );
    }
}
