//! Integration Tests für die Steuerschleife
//!
//! Der Controller läuft auf dem Host mit Mocks für Taster, Potis, PWM, WLAN
//! und MQTT. Die Zeit wird von den Tests vorgegeben.

mod common;

use common::{MockDelay, MockInputs, MockLink, MockPwm, MockTransport};
use embassy_futures::block_on;
use esp_core::controller::TICK_MS;
use esp_core::network::NetworkKeeper;
use esp_core::{Controller, ControllerSettings, LightSynchronizer, OperatingMode, RemoteConfig};
use rgb::RGB16;

type Lamp = Controller<MockInputs, MockPwm, MockLink, MockTransport, MockDelay>;

const COMMAND: &str = "homeassistant/light/color_shadow_lamp_01/set";
const STATE: &str = "homeassistant/light/color_shadow_lamp_01/state";
const AVAILABILITY: &str = "homeassistant/light/color_shadow_lamp_01/availability";
const DARK: RGB16 = RGB16 { r: 0, g: 0, b: 0 };
const BLINK_RED: RGB16 = RGB16 { r: 1638, g: 0, b: 0 };

fn lamp(initial_mode: OperatingMode, link: MockLink, transport: MockTransport) -> Lamp {
    let remote = LightSynchronizer::new(transport, RemoteConfig::default(), 7).unwrap();
    Controller::new(
        MockInputs::default(),
        MockPwm::default(),
        link,
        MockDelay::default(),
        remote,
        ControllerSettings {
            initial_mode,
            ..ControllerSettings::default()
        },
    )
}

/// Lampe mit erreichbarem WLAN und Broker
fn online_lamp(initial_mode: OperatingMode) -> Lamp {
    lamp(initial_mode, MockLink::reachable(), MockTransport::default())
}

/// Simulierte Zeit, ein Aufruf von `tick()` = ein Tick
struct Clock {
    now_ms: u64,
}

impl Clock {
    fn new() -> Self {
        Self { now_ms: 0 }
    }

    fn tick(&mut self, lamp: &mut Lamp) {
        block_on(lamp.tick(self.now_ms));
        self.now_ms += TICK_MS;
    }

    fn ticks(&mut self, lamp: &mut Lamp, count: usize) {
        for _ in 0..count {
            self.tick(lamp);
        }
    }

    /// Taster drücken und loslassen, danach ist die Entprellzeit abgelaufen
    fn press(&mut self, lamp: &mut Lamp) {
        lamp.inputs_mut().pressed = true;
        self.tick(lamp);
        lamp.inputs_mut().pressed = false;
        self.ticks(lamp, 3);
    }
}

fn transport(lamp: &Lamp) -> &MockTransport {
    lamp.remote().session().transport()
}

// ============================================================================
// Tests: Moduswechsel
// ============================================================================

#[test]
fn test_six_presses_cycle_back_to_manual() {
    let mut lamp = online_lamp(OperatingMode::Manual);
    let mut clock = Clock::new();
    clock.tick(&mut lamp);

    let mut modes = Vec::new();
    for _ in 0..6 {
        clock.press(&mut lamp);
        modes.push(lamp.mode());
        assert_eq!(lamp.armed(), Some(lamp.mode()));
    }

    assert_eq!(
        modes,
        vec![
            OperatingMode::Ltt,
            OperatingMode::PowerControl,
            OperatingMode::Remote,
            OperatingMode::NetworkOnly,
            OperatingMode::Off,
            OperatingMode::Manual,
        ]
    );
}

#[test]
fn test_bounce_does_not_skip_modes() {
    let mut lamp = online_lamp(OperatingMode::Manual);
    let mut clock = Clock::new();
    clock.tick(&mut lamp);

    for (pressed, at) in [(true, 1000), (false, 1005), (true, 1010), (false, 1020)] {
        lamp.inputs_mut().pressed = pressed;
        block_on(lamp.tick(at));
    }

    assert_eq!(lamp.mode(), OperatingMode::Ltt);
}

#[test]
fn test_leaving_remote_stops_session() {
    let mut lamp = online_lamp(OperatingMode::Remote);
    let mut clock = Clock::new();
    clock.tick(&mut lamp);
    assert!(lamp.remote().is_connected(lamp.link()));

    clock.press(&mut lamp);

    assert_eq!(lamp.mode(), OperatingMode::NetworkOnly);
    assert_eq!(transport(&lamp).count_payload(AVAILABILITY, "offline"), 1);
    assert!(!transport(&lamp).connected);
}

// ============================================================================
// Tests: Fallback
// ============================================================================

#[test]
fn test_remote_start_failure_blinks_and_falls_back() {
    let mut lamp = lamp(
        OperatingMode::Remote,
        MockLink::unreachable(),
        MockTransport::default(),
    );
    let mut clock = Clock::new();

    clock.tick(&mut lamp);
    assert_eq!(lamp.mode(), OperatingMode::Remote);
    assert!(lamp.remote().initial_connection_failed());
    assert_eq!(lamp.output().pwm().count(BLINK_RED), 0);
    assert_eq!(lamp.delay().total_ms(), 15_000);

    clock.tick(&mut lamp);
    assert_eq!(lamp.mode(), OperatingMode::Manual);
    assert_eq!(lamp.armed(), Some(OperatingMode::Manual));
    assert!(lamp.fallback_handled());
    assert_eq!(lamp.output().pwm().count(BLINK_RED), 3);
    assert_eq!(lamp.delay().total_ms(), 15_000 + 6 * 300);
    assert_eq!(lamp.link().disconnect_calls, 1);
    assert_eq!(lamp.output().ceiling(), 2047);

    // jede Rot-Phase endet dunkel, nicht erst nach dem letzten Blinken
    let writes = &lamp.output().pwm().writes;
    let first_red = writes.iter().position(|w| *w == BLINK_RED).unwrap();
    let last_red = writes.iter().rposition(|w| *w == BLINK_RED).unwrap();
    let first_dark = first_red + writes[first_red..].iter().position(|w| *w == DARK).unwrap();
    assert!(first_dark < last_red);
    assert_eq!(
        writes
            .windows(2)
            .filter(|pair| pair[0] == BLINK_RED && pair[1] == DARK)
            .count(),
        3
    );

    clock.ticks(&mut lamp, 10);
    assert_eq!(lamp.mode(), OperatingMode::Manual);
    assert_eq!(lamp.output().pwm().count(BLINK_RED), 3);
}

#[test]
fn test_broker_failure_also_falls_back() {
    let mut lamp = lamp(
        OperatingMode::Remote,
        MockLink::reachable(),
        MockTransport::refusing(),
    );
    let mut clock = Clock::new();

    clock.ticks(&mut lamp, 2);

    assert_eq!(lamp.mode(), OperatingMode::Manual);
    assert_eq!(transport(&lamp).connects.len(), 2);
    assert_eq!(lamp.output().pwm().count(BLINK_RED), 3);
}

#[test]
fn test_fallback_rearmed_on_next_remote_entry() {
    let mut lamp = lamp(
        OperatingMode::Remote,
        MockLink::unreachable(),
        MockTransport::default(),
    );
    let mut clock = Clock::new();
    clock.ticks(&mut lamp, 2);
    assert_eq!(lamp.mode(), OperatingMode::Manual);

    // Manual → Ltt → PowerControl → Remote
    for _ in 0..3 {
        clock.press(&mut lamp);
    }

    assert_eq!(lamp.mode(), OperatingMode::Manual);
    assert_eq!(lamp.output().pwm().count(BLINK_RED), 6);
}

#[test]
fn test_button_cycle_continues_after_fallback() {
    let mut lamp = lamp(
        OperatingMode::Remote,
        MockLink::unreachable(),
        MockTransport::default(),
    );
    let mut clock = Clock::new();
    clock.ticks(&mut lamp, 2);

    clock.press(&mut lamp);

    assert_eq!(lamp.mode(), OperatingMode::Ltt);
}

// ============================================================================
// Tests: Manual-Modus und Obergrenzen
// ============================================================================

#[test]
fn test_manual_maps_knobs_to_channels() {
    let mut lamp = online_lamp(OperatingMode::Manual);
    lamp.inputs_mut().millivolts = [950, 5, 477];
    let mut clock = Clock::new();

    clock.tick(&mut lamp);
    assert_eq!(lamp.output().current().r, 2047 / 8);

    clock.ticks(&mut lamp, 7);
    assert_eq!(lamp.output().current(), RGB16 { r: 2047, g: 0, b: 1022 });
    assert_eq!(lamp.output().pwm().last(), Some(lamp.output().current()));
}

#[test]
fn test_knobs_sampled_four_times_per_tick() {
    let mut lamp = online_lamp(OperatingMode::Manual);
    let mut clock = Clock::new();

    clock.tick(&mut lamp);

    assert_eq!(lamp.inputs_mut().reads, 12);
}

#[test]
fn test_remote_output_limited_to_remote_ceiling() {
    let mut lamp = online_lamp(OperatingMode::Remote);
    let mut clock = Clock::new();
    clock.tick(&mut lamp);
    assert_eq!(lamp.output().ceiling(), 1638);

    lamp.remote_mut()
        .session_mut()
        .transport_mut()
        .push_inbound(COMMAND, br#"{"state":"ON","color":{"r":255,"g":255,"b":255}}"#);
    clock.tick(&mut lamp);

    assert_eq!(lamp.output().current(), RGB16 { r: 1638, g: 1638, b: 1638 });

    clock.press(&mut lamp);
    assert_eq!(lamp.mode(), OperatingMode::NetworkOnly);
    assert!(!lamp.output().is_lit());
    assert_eq!(lamp.output().ceiling(), 2047);
}

#[test]
fn test_remote_reentry_restores_announced_light() {
    let mut lamp = online_lamp(OperatingMode::Remote);
    let mut clock = Clock::new();
    clock.tick(&mut lamp);
    lamp.remote_mut()
        .session_mut()
        .transport_mut()
        .push_inbound(COMMAND, br#"{"state":"ON","color":{"r":255,"g":0,"b":0}}"#);
    clock.tick(&mut lamp);
    assert_eq!(lamp.output().current(), RGB16 { r: 1638, g: 0, b: 0 });

    // Remote → NetworkOnly → Off → Manual → Ltt → PowerControl → Remote
    for _ in 0..6 {
        clock.press(&mut lamp);
    }

    assert_eq!(lamp.mode(), OperatingMode::Remote);
    assert_eq!(lamp.output().current(), RGB16 { r: 1638, g: 0, b: 0 });
    assert_eq!(lamp.output().pwm().last(), Some(lamp.output().current()));
    let state = transport(&lamp).on_topic(STATE).last().unwrap().text().to_owned();
    assert!(state.contains(r#""state":"ON""#));
    assert!(state.contains(r#""color":{"r":255,"g":0,"b":0}"#));
}

#[test]
fn test_disabled_mode_clears_output_and_stays_idle() {
    let mut lamp = online_lamp(OperatingMode::Manual);
    lamp.inputs_mut().millivolts = [950, 950, 950];
    let mut clock = Clock::new();
    clock.ticks(&mut lamp, 8);
    assert!(lamp.output().is_lit());

    clock.press(&mut lamp);
    assert_eq!(lamp.mode(), OperatingMode::Ltt);
    assert!(!lamp.output().is_lit());

    let writes = lamp.output().pwm().writes.len();
    clock.ticks(&mut lamp, 5);
    assert_eq!(lamp.output().pwm().writes.len(), writes);
}

#[test]
fn test_off_mode_keeps_output_dark() {
    let mut lamp = online_lamp(OperatingMode::Off);
    lamp.inputs_mut().millivolts = [950, 950, 950];
    let mut clock = Clock::new();

    clock.ticks(&mut lamp, 10);

    assert!(!lamp.output().is_lit());
    assert_eq!(lamp.output().pwm().writes.len(), 1);
}

// ============================================================================
// Tests: NetworkOnly
// ============================================================================

#[test]
fn test_network_only_retries_every_five_seconds() {
    let mut lamp = lamp(
        OperatingMode::NetworkOnly,
        MockLink::unreachable(),
        MockTransport::default(),
    );

    block_on(lamp.tick(0));
    assert_eq!(lamp.link().start_calls, 1);

    block_on(lamp.tick(4980));
    assert_eq!(lamp.link().reassociation_calls, 0);

    block_on(lamp.tick(5000));
    assert_eq!(lamp.link().reassociation_calls, 1);

    lamp.link_mut().reachable = true;
    lamp.link_mut().associated = true;
    block_on(lamp.tick(10_000));
    block_on(lamp.tick(20_000));
    assert_eq!(lamp.link().reassociation_calls, 1);
    assert!(transport(&lamp).connects.is_empty());
}

#[test]
fn test_leaving_network_only_disconnects() {
    let mut lamp = online_lamp(OperatingMode::NetworkOnly);
    let mut clock = Clock::new();
    clock.tick(&mut lamp);
    assert!(lamp.network().is_active());

    clock.press(&mut lamp);

    assert_eq!(lamp.mode(), OperatingMode::Off);
    assert!(!lamp.network().is_active());
    assert_eq!(lamp.link().disconnect_calls, 1);
}

#[test]
fn test_network_keeper_stop_is_idempotent() {
    let mut keeper = NetworkKeeper::new();
    let mut link = MockLink::reachable();

    keeper.begin(&mut link, 0);
    keeper.poll(&mut link, 20);
    keeper.stop(&mut link);
    keeper.stop(&mut link);
    keeper.poll(&mut link, 10_000);

    assert_eq!(link.disconnect_calls, 2);
    assert_eq!(link.reassociation_calls, 0);
}
