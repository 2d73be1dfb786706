// ABOUTME: Poll loop driving fetch, normalization, recency filtering, and upload each interval
// ABOUTME: Failures end the current cycle only; Ctrl-C stops the loop between cycles
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::time::Duration;

use carelink_client::errors::error_chain;
use carelink_client::DataFetcher;
use serde::Serialize;
use tokio::signal;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use crate::filter::StreamFilters;
use crate::nightscout::{upload_batch, Collection, EventSink};
use crate::transform::{NormalizedSnapshot, Normalizer, TransformLimits};

/// Outcome of one poll cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// A snapshot was fetched
    pub fetched: bool,
    /// The snapshot was skipped as stale
    pub stale: bool,
    /// Glucose entries accepted by the sink
    pub glucose: usize,
    /// Device status documents accepted by the sink
    pub device_status: usize,
    /// Treatments accepted by the sink
    pub treatments: usize,
    /// Finger-stick checks accepted by the sink
    pub bg_checks: usize,
    /// Uploads that failed
    pub upload_failures: usize,
}

/// Owns the per-account pipeline state
pub struct Poller {
    fetcher: DataFetcher,
    normalizer: Normalizer,
    filters: StreamFilters,
    sink: Box<dyn EventSink>,
    limits: TransformLimits,
    interval: Duration,
}

impl Poller {
    /// Assemble a poller
    #[must_use]
    pub fn new(
        fetcher: DataFetcher,
        normalizer: Normalizer,
        sink: Box<dyn EventSink>,
        limits: TransformLimits,
        interval: Duration,
    ) -> Self {
        Self {
            fetcher,
            normalizer,
            filters: StreamFilters::default(),
            sink,
            limits,
            interval,
        }
    }

    /// Recency cursors, for inspection
    #[must_use]
    pub const fn filters(&self) -> &StreamFilters {
        &self.filters
    }

    /// Run cycles until Ctrl-C, or a single cycle when `once` is set
    pub async fn run(mut self, once: bool) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            once,
            "Poll loop starting"
        );
        loop {
            self.run_cycle().await;
            if once {
                break;
            }
            tokio::select! {
                () = sleep(self.interval) => {}
                result = signal::ctrl_c() => {
                    if let Err(e) = result {
                        warn!(error = %e, "Failed to listen for Ctrl-C");
                    }
                    info!("Shutdown requested");
                    break;
                }
            }
        }
        info!("Poll loop stopped");
    }

    /// Fetch, normalize, filter and upload once
    #[instrument(skip(self))]
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        let snapshot = match self.fetcher.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %error_chain(&e), "CareLink fetch failed, waiting for next cycle");
                return report;
            }
        };
        report.fetched = true;

        let normalized = match self.normalizer.transform(&snapshot, &self.limits) {
            Ok(normalized) => normalized,
            Err(e) => {
                error!(error = %e, "Could not normalize CareLink snapshot");
                return report;
            }
        };
        report.stale = normalized.stale;

        let fresh = self.filters.admit(normalized);
        self.deliver(fresh, &mut report).await;
        report
    }

    async fn deliver(&self, fresh: NormalizedSnapshot, report: &mut CycleReport) {
        // Entries before device status, treatments last
        let outcomes = [
            self.deliver_batch(Collection::Entries, &fresh.glucose).await,
            self.deliver_batch(Collection::DeviceStatus, &fresh.device_status)
                .await,
            self.deliver_batch(Collection::Treatments, &fresh.treatments)
                .await,
            self.deliver_batch(Collection::Treatments, &fresh.bg_checks)
                .await,
        ];
        report.upload_failures = outcomes.iter().filter(|outcome| outcome.is_none()).count();
        let [glucose, device_status, treatments, bg_checks] =
            outcomes.map(|outcome| outcome.unwrap_or(0));
        report.glucose = glucose;
        report.device_status = device_status;
        report.treatments = treatments;
        report.bg_checks = bg_checks;
    }

    /// Accepted count, or `None` when the upload failed
    async fn deliver_batch<T: Serialize + Sync>(
        &self,
        collection: Collection,
        events: &[T],
    ) -> Option<usize> {
        match upload_batch(self.sink.as_ref(), collection, events).await {
            Ok(accepted) => Some(accepted),
            Err(e) => {
                // Keep polling even when Nightscout is unreachable
                error!(collection = %collection, error = %error_chain(&e), "Upload failed");
                None
            }
        }
    }
}
