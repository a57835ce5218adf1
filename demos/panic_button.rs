//! Panic button example.
//!
//! Buffers the default microphone, then "presses the panic button" after a
//! few seconds and writes the last 15 seconds of audio to a raw PCM file.
//!
//! Run with: cargo run --example panic_button -- [seconds] [device name]
//!
//! Play back with: ffplay -f s16be -ar 8000 -ac 1 panic.pcm

use std::time::Duration;

use panic_buffer::{list_input_devices, CpalInput, PanicRecorder};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let seconds: u64 = args.next().map(|s| s.parse()).transpose()?.unwrap_or(5);
    let device = match args.next() {
        Some(name) => CpalInput::named(name),
        None => CpalInput::default_device(),
    };

    println!("Input devices: {:?}", list_input_devices()?);

    let recorder = PanicRecorder::builder()
        .device(device)
        .on_event(|e| tracing::info!(?e, "buffer event"))
        .build()?;

    recorder.start_buffering()?;
    println!("Buffering for {seconds} seconds...");
    std::thread::sleep(Duration::from_secs(seconds));

    // Panic button pressed
    recorder.stop_buffering();

    let snapshot = recorder.snapshot();
    std::fs::write("panic.pcm", snapshot.to_be_bytes())?;

    println!(
        "Saved {} samples ({:.1}s) to panic.pcm",
        snapshot.len(),
        snapshot.duration().as_secs_f64()
    );
    println!("Stats: {:?}", recorder.stats());

    Ok(())
}
