use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use trip_logger_rs::buttons::{button_watch_loop, ButtonSource};
use trip_logger_rs::drivers::bno055::{Bno055, OperatingMode, I2C_ADDR_PRIMARY};
use trip_logger_rs::drivers::ds3231::{Ds3231, I2C_ADDR as RTC_ADDR};
use trip_logger_rs::drivers::gps::GpsReceiver;
use trip_logger_rs::hal::shared_bus;
use trip_logger_rs::scheduler::{SamplingMode, SamplingScheduler, SharedPositionSource};
use trip_logger_rs::sim::{SimBus, SimButton, SimButtonHandle, SimCamera, SimLed, SimNmeaFeed};
use trip_logger_rs::status::{fix_indicator_loop, FIX_POLL_INTERVAL};
use trip_logger_rs::storage::select_output_dir;
use trip_logger_rs::SessionController;

#[derive(Parser, Debug)]
#[command(name = "trip_logger")]
#[command(about = "Button-triggered IMU/GPS session logger", long_about = None)]
struct Args {
    /// Scripted session length in seconds (0 = wait for button presses)
    #[arg(value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// Read the two channels one after another instead of in parallel
    #[arg(long)]
    sequential: bool,

    /// Output directory
    #[arg(long, default_value = "trip_logger_sessions")]
    output_dir: String,

    /// Removable-media directory preferred over output-dir when mounted
    #[arg(long, default_value = "/media/usb/data")]
    usb_dir: String,

    /// Start with video recording armed
    #[arg(long)]
    record_video: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let output_dir = select_output_dir(
        &PathBuf::from(&args.usb_dir),
        &PathBuf::from(&args.output_dir),
    );
    std::fs::create_dir_all(&output_dir)?;
    info!("logging sessions to {}", output_dir.display());

    // Simulated rig: the drivers speak to an in-memory bus, NMEA feed, and
    // memory pins through the same seams a hardware build would plug into.
    let bus = shared_bus(SimBus::new());
    let mut imu = Bno055::new(bus.clone(), I2C_ADDR_PRIMARY, 0)?;
    imu.set_mode(OperatingMode::AccGyro)?;
    let rtc = Ds3231::new(bus.clone(), RTC_ADDR)?;
    let gps: SharedPositionSource = Arc::new(Mutex::new(GpsReceiver::new(Box::new(
        SimNmeaFeed::new(6),
    ))?));

    let epoch = Instant::now();
    let (events_tx, events_rx) = mpsc::channel(16);

    let (session_button, session_handle) = SimButton::new();
    let (record_button, _record_handle) = SimButton::new();
    let session_watcher = tokio::spawn(button_watch_loop(
        Box::new(session_button),
        ButtonSource::SessionToggle,
        epoch,
        events_tx.clone(),
    ));
    let record_watcher = tokio::spawn(button_watch_loop(
        Box::new(record_button),
        ButtonSource::RecordToggle,
        epoch,
        events_tx,
    ));

    let (session_led, session_led_level) = SimLed::new();
    let (fix_led, fix_led_level) = SimLed::new();
    let fix_indicator = tokio::spawn(fix_indicator_loop(
        gps.clone(),
        Box::new(fix_led),
        FIX_POLL_INTERVAL,
    ));

    let mode = if args.sequential {
        SamplingMode::Sequential
    } else {
        SamplingMode::Concurrent
    };
    let scheduler = SamplingScheduler::new(Arc::new(Mutex::new(imu)), gps.clone(), mode);

    let mut controller = SessionController::new(
        scheduler,
        Box::new(rtc),
        Box::new(session_led),
        events_rx,
        Some(Box::new(SimCamera::new())),
        args.record_video,
        output_dir,
        epoch,
    );

    info!(
        "ready ({}); press the session button to start logging",
        if args.sequential {
            "sequential sampling"
        } else {
            "concurrent sampling"
        }
    );

    tokio::select! {
        result = controller.run() => {
            result?;
        }
        _ = scripted_operator(args.duration, session_handle) => {
            info!("scripted session complete");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, tearing down");
        }
    }

    // Teardown runs on every exit path: stop auxiliary tasks, reset every
    // toggled output, release the bus with the rig.
    session_watcher.abort();
    record_watcher.abort();
    fix_indicator.abort();
    session_led_level.store(false, std::sync::atomic::Ordering::SeqCst);
    fix_led_level.store(false, std::sync::atomic::Ordering::SeqCst);
    drop(bus);

    Ok(())
}

/// Stand-in operator for bounded runs: one press to start, one to stop.
async fn scripted_operator(duration_secs: u64, session_button: SimButtonHandle) {
    if duration_secs == 0 {
        std::future::pending::<()>().await;
    }

    sleep(Duration::from_millis(500)).await;
    info!("scripted operator: starting session");
    session_button.press().await;

    sleep(Duration::from_secs(duration_secs)).await;
    info!("scripted operator: stopping session");
    session_button.press().await;

    // Leave room for the stop transition to flush and close the file
    sleep(Duration::from_millis(500)).await;
}
