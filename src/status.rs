//! GPS fix status indicator.
//!
//! Runs beside session logging and shares the GPS driver through the same
//! mutex the scheduler uses; the driver's parser state is not safe under
//! concurrent fix checks and position reads.

use crate::hal::DigitalOutput;
use crate::scheduler::SharedPositionSource;
use tokio::time::{sleep, Duration};

pub const FIX_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Poll fix status once per period: unfixed blinks the indicator at 1Hz
/// (one period on, one period off), fixed holds it off.
pub async fn fix_indicator_loop(
    gps: SharedPositionSource,
    mut led: Box<dyn DigitalOutput>,
    period: Duration,
) {
    loop {
        let gps_handle = gps.clone();
        let fixed = tokio::task::spawn_blocking(move || match gps_handle.lock() {
            Ok(mut gps) => gps.fix().unwrap_or_else(|e| {
                log::warn!("fix check failed: {e}");
                false
            }),
            Err(_) => false,
        })
        .await
        .unwrap_or(false);

        if fixed {
            led.set_low();
            sleep(period).await;
        } else {
            led.set_high();
            sleep(period).await;
            led.set_low();
            sleep(period).await;
        }
    }
}
