// ABOUTME: Bridge binary polling CareLink and uploading normalized events to Nightscout
// ABOUTME: Reads configuration from the environment; flags override the interval and upload mode
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # CareLink Bridge Binary
//!
//! Runs the poll loop until Ctrl-C, or a single cycle with `--once`.

use std::time::Duration;

use anyhow::{Context, Result};
use carelink_bridge::{
    config::BridgeConfig, logging, DryRunSink, EventSink, NightscoutClient, Normalizer, Poller,
};
use carelink_client::DataFetcher;
use clap::Parser;
use tracing::info;

#[derive(Parser)]
#[command(name = "carelink-bridge")]
#[command(about = "Upload CareLink pump and sensor data to a Nightscout site")]
pub struct Args {
    /// Run one cycle and exit
    #[arg(long)]
    once: bool,

    /// Override the poll interval in milliseconds
    #[arg(long)]
    interval: Option<u64>,

    /// Log payloads instead of uploading them
    #[arg(long)]
    dry_run: bool,

    /// Only log warnings and errors unless RUST_LOG is set
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env(args.quiet || BridgeConfig::quiet_from_env())?;

    let mut config = BridgeConfig::from_env()?;
    if let Some(interval) = args.interval {
        config.poll_interval = Duration::from_millis(interval);
        config.validate()?;
    }
    info!("{}", config.summary());

    let fetcher =
        DataFetcher::from_config(&config.client).context("Failed to build CareLink client")?;
    let normalizer = Normalizer::new(config.client.region);

    let sink: Box<dyn EventSink> = if args.dry_run {
        info!("Dry run enabled, nothing will be uploaded");
        Box::new(DryRunSink)
    } else {
        Box::new(
            NightscoutClient::new(
                config.nightscout.base_url.clone(),
                config.nightscout.api_secret(),
                config.client.request_timeout,
            )
            .context("Failed to build Nightscout client")?,
        )
    };

    Poller::new(fetcher, normalizer, sink, config.limits, config.poll_interval)
        .run(args.once)
        .await;
    Ok(())
}
