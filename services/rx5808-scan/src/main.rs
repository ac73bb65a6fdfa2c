//! RX5808 Scan - 5.8 GHz video receiver scanner
//!
//! Tunes an RX5808 across the band, averages RSSI per step, and reports
//! frequencies carrying a signal. The run mode is picked from `SCAN_MODE`;
//! Ctrl+C cancels the running sweep or watch between steps.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, RecvTimeoutError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rx5808_scan::scanner::{
    ChannelObserver, Monitor, MonitorSettings, ScanEvent, ScanSettings, Scanner, StepReport,
};
use rx5808_scan::{Clock, Config, Receiver, RunMode, RunOptions, SimulatedTransport, SystemClock, Transport};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rx5808_scan=info")),
        )
        .with_target(false)
        .init();

    info!("===========================================");
    info!("   RX5808 Scan - 5.8 GHz video receiver");
    info!("===========================================");

    // Load configuration
    let config = Config::from_env();
    config.validate().context("Invalid configuration")?;
    let options = RunOptions::from_env(&config).context("Invalid run options")?;

    info!("Configuration:");
    info!("  Band: {}-{} MHz (step {} MHz)", config.band.min, config.band.max, config.step_mhz);
    info!("  RSSI threshold: {:.0}%", config.rssi_threshold);
    info!("  RSSI input: {:?}, {} samples", config.rssi_input, config.sample_count);
    info!(
        "  Pins: CS={} MOSI={} MISO={} SCK={} RSSI={}",
        config.pins.cs, config.pins.mosi, config.pins.miso, config.pins.sck, config.pins.rssi
    );
    info!("  Mode: {:?}", options.mode);
    info!("  Simulated emitters: {}", options.emitters.len());

    let transport = SimulatedTransport::new(options.emitters.clone()).with_noise_floor(5.0);
    let receiver = Receiver::new(transport, SystemClock, &config).context("Failed to set up receiver")?;
    let stats = receiver.stats().clone();

    // Ctrl+C cancels the scan loop between steps
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping...");
            signal_token.cancel();
        }
    });

    // Bus work runs on its own thread; events come back over a channel
    let (event_tx, event_rx) = bounded::<ScanEvent>(1000);
    let scan_config = config.clone();
    let scan_token = cancel.clone();
    let mode = options.mode;
    let scan_handle = thread::Builder::new()
        .name("rx5808-scan".to_string())
        .spawn(move || {
            let mut receiver = receiver;
            let mut observer = ChannelObserver::new(event_tx);
            run_mode(&mut receiver, &scan_config, mode, &scan_token, &mut observer)
        })
        .context("Failed to spawn scan thread")?;

    info!("  Press Ctrl+C to stop.");

    let mut last_stats_report = Instant::now();
    loop {
        match event_rx.recv_timeout(Duration::from_millis(500)) {
            Ok(event) => report(&event, options.json),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if last_stats_report.elapsed() >= Duration::from_secs(10) {
            info!("[Stats] {}", stats.snapshot());
            last_stats_report = Instant::now();
        }
    }

    let outcome = scan_handle
        .join()
        .map_err(|_| anyhow!("Scan thread panicked"))?;
    if let Err(e) = &outcome {
        error!("Scan failed: {}", e);
    }
    outcome?;

    info!("Shutdown complete. {}", stats.snapshot());
    Ok(())
}

/// Run one mode to completion or cancellation
fn run_mode<T: Transport, C: Clock>(
    receiver: &mut Receiver<T, C>,
    config: &Config,
    mode: RunMode,
    cancel: &CancellationToken,
    observer: &mut ChannelObserver,
) -> rx5808_scan::Result<()> {
    let settings = ScanSettings::from(config);
    match mode {
        RunMode::Full => {
            let band = receiver.band();
            Scanner::new(receiver, settings).sweep(band.min, band.max, settings.step_mhz, cancel, observer)?;
        }
        RunMode::Range { start, end } => {
            Scanner::new(receiver, settings).sweep(start, end, settings.step_mhz, cancel, observer)?;
        }
        RunMode::Continuous => {
            Scanner::new(receiver, settings).continuous(cancel, observer)?;
        }
        RunMode::Monitor { frequency, secs } => {
            let watch = Monitor::new(receiver, MonitorSettings::from(config)).watch(
                frequency,
                Duration::from_secs(secs),
                cancel.clone(),
            )?;
            if let Some(e) = watch.baseline_error() {
                warn!("Baseline read at {} MHz failed, starting from 0%: {}", frequency, e);
            }
            for change in watch {
                observer.forward(ScanEvent::Change(change));
            }
        }
        RunMode::Probe { frequency } => {
            let reading = Scanner::new(receiver, settings).probe(frequency)?;
            observer.forward(ScanEvent::Step(StepReport {
                frequency,
                rssi: reading.rssi,
                classified_as_signal: reading.rssi > settings.threshold,
                samples: reading.samples,
                failed_samples: reading.failed,
                tune_error: None,
            }));
        }
    }
    Ok(())
}

/// Print one scan event for the operator
fn report(event: &ScanEvent, json: bool) {
    if let ScanEvent::Step(step) = event {
        if let Some(e) = &step.tune_error {
            warn!("{} MHz skipped: {}", step.frequency, e);
        }
        if !step.classified_as_signal {
            return;
        }
    }

    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to encode event: {}", e),
        }
        return;
    }

    match event {
        ScanEvent::Step(step) => {
            println!("SIGNAL {} MHz: RSSI {:.1}%", step.frequency, step.rssi);
        }
        ScanEvent::Sweep(summary) => {
            if summary.detections.is_empty() {
                println!("No signals detected in {}-{} MHz", summary.start, summary.end);
            } else {
                println!(
                    "Detected {} signals in {}-{} MHz:",
                    summary.detections.len(),
                    summary.start,
                    summary.end
                );
                for detection in &summary.detections {
                    println!("   {} MHz: {:.1}%", detection.frequency, detection.rssi);
                }
            }
            if !summary.completed {
                println!("(sweep interrupted after {} steps)", summary.steps);
            }
        }
        ScanEvent::Change(change) => {
            if let Some(e) = &change.read_error {
                println!("{} MHz: RSSI read failed (+{} ms): {}", change.frequency, change.elapsed_ms, e);
                return;
            }
            println!(
                "{} MHz: RSSI {:.1}% (was {:.1}%, +{} ms)",
                change.frequency, change.rssi, change.previous, change.elapsed_ms
            );
        }
    }
}
