//! Host Simulator
//!
//! Plays the audio host against the driver: registers a client, starts IO,
//! runs real-time IO cycles on a timer and prints zero timestamps, change
//! notifications and a final state snapshot.
//!
//! Usage: `simulator [cycles] [frames-per-cycle]`

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use usb_audio_driver::{
    audio::{IoCycleInfo, IoOperation},
    config::DriverConfig,
    constants::{BYTES_PER_FRAME, SAMPLE_RATE_OPTION_2},
    driver::ClientInfo,
    host::{ChannelHost, MonotonicClock, Notification},
    object::ObjectId,
    property::{PropertyAddress, Selector},
    AudioServerPlugIn, Driver, DriverError,
};

const CLIENT_ID: u32 = 1;

fn log_notifications(rx: &crossbeam_channel::Receiver<Notification>) {
    for notification in rx.try_iter() {
        let selectors: Vec<String> = notification
            .addresses
            .iter()
            .map(|a| a.selector.to_string())
            .collect();
        tracing::info!(
            "Host notified: object {} changed {}",
            notification.object,
            selectors.join(", ")
        );
    }
}

fn run_cycle(
    driver: &Driver,
    cycle: &IoCycleInfo,
    frames: u32,
    input: &mut [u8],
    output: &mut [u8],
) -> Result<(), DriverError> {
    for (op, stream, buffer) in [
        (IoOperation::ReadInput, ObjectId::STREAM_INPUT, &mut *input),
        (IoOperation::WriteMix, ObjectId::STREAM_OUTPUT, &mut *output),
    ] {
        if !driver
            .will_do_io_operation(ObjectId::DEVICE, CLIENT_ID, op)?
            .will_do
        {
            continue;
        }
        driver.begin_io_operation(ObjectId::DEVICE, CLIENT_ID, op, frames, cycle)?;
        driver.do_io_operation(
            ObjectId::DEVICE,
            stream,
            CLIENT_ID,
            op,
            frames,
            cycle,
            buffer,
        )?;
        driver.end_io_operation(ObjectId::DEVICE, CLIENT_ID, op, frames, cycle)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting host simulator");

    let mut args = std::env::args().skip(1);
    let cycles: u64 = match args.next() {
        Some(arg) => arg.parse().context("cycle count must be a number")?,
        None => 200,
    };
    let frames: u32 = match args.next() {
        Some(arg) => arg.parse().context("frames per cycle must be a number")?,
        None => 512,
    };
    if frames == 0 {
        anyhow::bail!("frames per cycle must be positive");
    }

    let config = DriverConfig::load().unwrap_or_else(|e| {
        tracing::warn!("Using default configuration: {}", e);
        DriverConfig::default()
    });

    let driver = Driver::new(config, Arc::new(MonotonicClock::new()));
    let (host, notifications) = ChannelHost::new();
    driver.initialize(Arc::new(host))?;

    let client = ClientInfo {
        client_id: CLIENT_ID,
        pid: std::process::id() as i32,
        bundle_id: Some("com.example.simulator".to_string()),
    };
    driver.add_device_client(ObjectId::DEVICE, &client)?;

    // Configure while idle
    let rate_address = PropertyAddress::global(Selector::NOMINAL_SAMPLE_RATE);
    driver.set_property_data(
        ObjectId::DEVICE,
        &rate_address,
        &[],
        &SAMPLE_RATE_OPTION_2.to_ne_bytes(),
    )?;
    let volume_address = PropertyAddress::global(Selector::DECIBEL_VALUE);
    driver.set_property_data(
        ObjectId::VOLUME_OUTPUT,
        &volume_address,
        &[],
        &(-12.0f32).to_ne_bytes(),
    )?;

    let sample_rate = driver.snapshot().sample_rate;
    driver.start_io(ObjectId::DEVICE, CLIENT_ID)?;

    match driver.set_property_data(ObjectId::DEVICE, &rate_address, &[], &32_000.0f64.to_ne_bytes()) {
        Err(e) => tracing::info!("Rate change while running rejected as expected: {}", e),
        Ok(_) => tracing::warn!("Rate change while running was accepted"),
    }

    let buffer_len = frames as usize * BYTES_PER_FRAME as usize;
    let mut input = vec![0u8; buffer_len];
    let mut output: Vec<u8> = (0..buffer_len).map(|i| (i % 251) as u8).collect();
    let mut tap = vec![0u8; buffer_len];

    let period = Duration::from_secs_f64(frames as f64 / sample_rate);
    let mut ticker = tokio::time::interval(period);
    tracing::info!(
        "Running {} cycles of {} frames at {} Hz - press Ctrl+C to stop",
        cycles,
        frames,
        sample_rate
    );

    let mut counter = 0u64;
    while counter < cycles {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }

        let zts = driver.get_zero_timestamp(ObjectId::DEVICE, CLIENT_ID)?;
        let cycle = IoCycleInfo {
            cycle_counter: counter,
            input_sample_time: (counter * frames as u64) as f64,
            output_sample_time: ((counter + 1) * frames as u64) as f64,
            current_host_time: zts.host_time,
        };
        if let Err(e) = run_cycle(&driver, &cycle, frames, &mut input, &mut output) {
            tracing::warn!("IO cycle {} failed: {}", counter, e);
        }
        driver.read_output_tap(&mut tap);

        if counter % 50 == 0 {
            println!(
                "cycle {:>6}  zero timestamp: sample {:>10.0}  host {:>14}  seed {}",
                counter, zts.sample_time, zts.host_time, zts.seed
            );
        }
        log_notifications(&notifications);
        counter += 1;
    }

    driver.stop_io(ObjectId::DEVICE, CLIENT_ID)?;
    driver.remove_device_client(ObjectId::DEVICE, &client)?;
    log_notifications(&notifications);

    let snapshot = serde_json::to_string_pretty(&driver.snapshot())?;
    println!("\n=== Device Snapshot ===\n{}", snapshot);

    Ok(())
}
