//! Steuerschleife der Lampe
//!
//! Ein Tick (Standard 20 ms) in fester Reihenfolge:
//! 1. Taster auswerten ([`ModeSelector`])
//! 2. Potentiometer abtasten und glätten
//! 3. Fallback: Remote-Start fehlgeschlagen → Blinken, zurück zu Manual
//! 4. Moduswechsel: alten Modus abbauen, neuen aufbauen, Obergrenze setzen
//!    (Remote übernimmt danach den gespeicherten Lichtzustand)
//! 5. Aktion des aktiven Modus
//!
//! Der Controller besitzt alle Komponenten exklusiv, es gibt keinen geteilten
//! Zustand.

use crate::logic::{knob_to_duty, KnobCalibration, PWM_MAX};
use crate::mode::{ModeSelector, DEBOUNCE_MS};
use crate::network::NetworkKeeper;
use crate::output::{ChannelOutput, MANUAL_CEILING, REMOTE_CEILING};
use crate::smoothing::KnobFilter;
use crate::sync::LightSynchronizer;
use crate::traits::{Delay, LampInputs, MqttTransport, NetworkLink, PwmWriter};
use crate::types::{Knob, OperatingMode};

/// Standard-Tick der Steuerschleife
pub const TICK_MS: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    pub initial_mode: OperatingMode,
    pub debounce_ms: u64,
    pub manual_ceiling: u16,
    pub remote_ceiling: u16,
    /// Blinkmuster bei fehlgeschlagenem Remote-Start
    pub blink_count: u8,
    pub blink_on_ms: u32,
    pub blink_off_ms: u32,
    /// Rohwerte pro Poti und Tick, werden gemittelt
    pub samples_per_read: u8,
    pub calibration: KnobCalibration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            initial_mode: OperatingMode::Remote,
            debounce_ms: DEBOUNCE_MS,
            manual_ceiling: MANUAL_CEILING,
            remote_ceiling: REMOTE_CEILING,
            blink_count: 3,
            blink_on_ms: 300,
            blink_off_ms: 300,
            samples_per_read: 4,
            calibration: KnobCalibration::default(),
        }
    }
}

impl ControllerSettings {
    /// Obergrenze der Kanäle für einen Modus
    pub fn ceiling_for(&self, mode: OperatingMode) -> u16 {
        match mode {
            OperatingMode::Manual => self.manual_ceiling,
            OperatingMode::Remote => self.remote_ceiling,
            _ => PWM_MAX,
        }
    }
}

pub struct Controller<I, P, N, T, D>
where
    I: LampInputs,
    P: PwmWriter,
    N: NetworkLink,
    T: MqttTransport,
    D: Delay,
{
    selector: ModeSelector,
    output: ChannelOutput<P>,
    filter: KnobFilter,
    remote: LightSynchronizer<T>,
    network: NetworkKeeper,
    inputs: I,
    link: N,
    delay: D,
    settings: ControllerSettings,
    /// Modus dessen Subsystem gerade aufgebaut ist
    armed: Option<OperatingMode>,
    fallback_handled: bool,
}

impl<I, P, N, T, D> Controller<I, P, N, T, D>
where
    I: LampInputs,
    P: PwmWriter,
    N: NetworkLink,
    T: MqttTransport,
    D: Delay,
{
    /// Erstellt den Controller, der Startmodus wird erst im ersten Tick
    /// aufgebaut
    pub fn new(
        inputs: I,
        pwm: P,
        link: N,
        delay: D,
        remote: LightSynchronizer<T>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            selector: ModeSelector::with_debounce(settings.initial_mode, settings.debounce_ms),
            output: ChannelOutput::new(pwm),
            filter: KnobFilter::new(),
            remote,
            network: NetworkKeeper::new(),
            inputs,
            link,
            delay,
            settings,
            armed: None,
            fallback_handled: false,
        }
    }

    pub fn mode(&self) -> OperatingMode {
        self.selector.current()
    }

    pub fn armed(&self) -> Option<OperatingMode> {
        self.armed
    }

    pub fn output(&self) -> &ChannelOutput<P> {
        &self.output
    }

    pub fn remote(&self) -> &LightSynchronizer<T> {
        &self.remote
    }

    pub fn remote_mut(&mut self) -> &mut LightSynchronizer<T> {
        &mut self.remote
    }

    pub fn network(&self) -> &NetworkKeeper {
        &self.network
    }

    pub fn inputs_mut(&mut self) -> &mut I {
        &mut self.inputs
    }

    pub fn link(&self) -> &N {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut N {
        &mut self.link
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    pub fn fallback_handled(&self) -> bool {
        self.fallback_handled
    }

    /// Ein Durchlauf der Steuerschleife
    pub async fn tick(&mut self, now_ms: u64) {
        let pressed = self.inputs.mode_button_pressed();
        self.selector.update(pressed, now_ms);

        self.sample_knobs();

        if self.fallback_due() {
            self.fall_back_to_manual().await;
        }

        let mode = self.selector.current();
        if self.armed != Some(mode) {
            self.transition(mode, now_ms).await;
        }

        match mode {
            OperatingMode::Manual => self.output.set(self.filter.current()),
            OperatingMode::Remote => {
                self.remote
                    .poll(&mut self.link, &mut self.output, now_ms)
                    .await;
            }
            OperatingMode::NetworkOnly => self.network.poll(&mut self.link, now_ms),
            // deaktivierte Modi
            OperatingMode::Ltt | OperatingMode::PowerControl => {}
            OperatingMode::Off => {}
        }
    }

    fn sample_knobs(&mut self) {
        let samples = u32::from(self.settings.samples_per_read.max(1));
        for knob in Knob::ALL {
            let sum: u32 = (0..samples)
                .map(|_| u32::from(self.inputs.read_millivolts(knob)))
                .sum();
            let millivolts = (sum / samples) as u16;
            self.filter
                .push(knob, knob_to_duty(millivolts, self.settings.calibration));
        }
    }

    fn fallback_due(&self) -> bool {
        self.selector.current() == OperatingMode::Remote
            && self.armed == Some(OperatingMode::Remote)
            && self.remote.initial_connection_failed()
            && !self.fallback_handled
    }

    /// Blinkt rot (blockierend), schaltet auf Manual und beendet die Session
    async fn fall_back_to_manual(&mut self) {
        warn!("Lamp: Remote mode unavailable, falling back to Manual");

        for _ in 0..self.settings.blink_count {
            self.output.set_direct(PWM_MAX, 0, 0);
            self.delay.delay_ms(self.settings.blink_on_ms).await;
            self.output.clear();
            self.delay.delay_ms(self.settings.blink_off_ms).await;
        }

        self.selector.set_mode(OperatingMode::Manual);
        self.remote.stop(&mut self.link).await;
        self.armed = None;
        self.fallback_handled = true;
    }

    async fn transition(&mut self, mode: OperatingMode, now_ms: u64) {
        if let Some(previous) = self.armed.take() {
            self.disarm(previous).await;
        }
        self.arm(mode, now_ms).await;
        self.output.set_ceiling(self.settings.ceiling_for(mode));
        if mode == OperatingMode::Remote {
            self.remote.apply(&mut self.output);
        }
        self.armed = Some(mode);
    }

    async fn disarm(&mut self, mode: OperatingMode) {
        match mode {
            OperatingMode::Remote => {
                self.remote.stop(&mut self.link).await;
                self.output.clear();
            }
            OperatingMode::NetworkOnly => {
                self.network.stop(&mut self.link);
                self.output.clear();
            }
            OperatingMode::Manual
            | OperatingMode::Ltt
            | OperatingMode::PowerControl
            | OperatingMode::Off => {}
        }
    }

    async fn arm(&mut self, mode: OperatingMode, now_ms: u64) {
        info!("Mode: entering {}", mode.as_str());
        match mode {
            OperatingMode::Manual => {}
            OperatingMode::Ltt | OperatingMode::PowerControl => {
                error!("Mode: {} is not available on this hardware", mode.as_str());
                self.output.clear();
            }
            OperatingMode::Remote => {
                self.fallback_handled = false;
                if let Err(e) = self
                    .remote
                    .begin(&mut self.link, &mut self.delay, now_ms)
                    .await
                {
                    warn!("Lamp: Remote start failed: {}", e);
                }
            }
            OperatingMode::NetworkOnly => self.network.begin(&mut self.link, now_ms),
            OperatingMode::Off => self.output.clear(),
        }
    }
}
