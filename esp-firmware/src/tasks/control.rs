// Steuerschleife - ein Tick alle 20 ms
use defmt::info;
use embassy_time::{Duration, Instant, Ticker, Timer};
use esp_core::Delay;

use crate::LampController;
use crate::config::CONTROL_TICK_MS;

/// Wartezeit über den Embassy-Timer
///
/// Blockiert nur die Steuerschleife, WiFi und MQTT Task laufen weiter.
pub struct EmbassyDelay;

impl Delay for EmbassyDelay {
    async fn delay_ms(&mut self, ms: u32) {
        Timer::after_millis(u64::from(ms)).await;
    }
}

/// Control Task
///
/// Treibt den Controller im festen Takt. Ein Tick der länger dauert
/// (Verbindungsaufbau, Blinken) verschiebt nur die folgenden Ticks.
#[embassy_executor::task]
pub async fn control_task(mut controller: LampController) {
    info!("Lamp: Control loop started ({} ms tick)", CONTROL_TICK_MS);

    let mut ticker = Ticker::every(Duration::from_millis(CONTROL_TICK_MS));
    loop {
        controller.tick(Instant::now().as_millis()).await;
        ticker.next().await;
    }
}
