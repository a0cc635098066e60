use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use stereocam_hw::sim::SimBackend;
use tracing_subscriber::EnvFilter;

mod capture;
mod config;
mod publisher;

use capture::CaptureError;
use config::Config;
use publisher::Publisher;

#[derive(Parser)]
#[command(name = "stereocamd", version, about = "Stereo camera capture driver")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "/etc/stereocam/stereocam.toml")]
    config: PathBuf,

    /// Stop after this many stereo pairs
    #[arg(short = 'n', long)]
    frames: Option<u64>,

    /// Trigger rate in Hz (overrides the config file)
    #[arg(short, long)]
    rate: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = Config::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(rate) = args.rate {
        config.driver.rate_hz = rate;
    }
    if let Some(frames) = args.frames {
        config.driver.max_pairs = Some(frames);
    }
    let period = config.driver.period()?;

    tracing::info!(
        config = %args.config.display(),
        rate_hz = config.driver.rate_hz,
        "stereocamd starting"
    );

    // No vendor binding is linked into this build; drive the simulated rig.
    let (handle, join) = match capture::spawn_capture(SimBackend::stereo_rig(), &config.camera) {
        Ok(spawned) => spawned,
        Err(e) => {
            tracing::error!(error = %e, kind = ?e.kind(), "camera setup failed");
            return Err(e.into());
        }
    };

    let mut publisher = Publisher::default();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let outcome: Result<(), CaptureError> = loop {
        if config
            .driver
            .max_pairs
            .is_some_and(|max| publisher.pairs() >= max)
        {
            break Ok(());
        }
        tokio::select! {
            _ = ticker.tick() => {
                match handle.grab(chrono::Utc::now()).await {
                    Ok(pair) => publisher.publish(&pair),
                    Err(e) => break Err(e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break Ok(());
            }
        }
    };

    publisher.log_summary();
    drop(handle);
    let teardown = tokio::task::spawn_blocking(move || join.join())
        .await
        .context("joining capture thread")?;

    match teardown {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "camera teardown failed"),
        Err(_) => tracing::error!("capture thread panicked"),
    }

    if let Err(e) = outcome {
        tracing::error!(error = %e, kind = ?e.kind(), "capture failed; shutting down");
        return Err(e.into());
    }

    tracing::info!("stereocamd stopped");
    Ok(())
}
