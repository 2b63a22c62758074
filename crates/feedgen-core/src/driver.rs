use std::io::Write;
use std::time::Duration;

use feedgen_client::FeedbackService;
use feedgen_common::config::DriverConfig;
use feedgen_common::{FeedgenError, Result};
use tokio::time;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverParams {
    pub target: u64,
    pub batch_size: u64,
    pub delay: Duration,
}

impl From<&DriverConfig> for DriverParams {
    fn from(cfg: &DriverConfig) -> Self {
        Self { target: cfg.target, batch_size: cfg.batch_size, delay: cfg.delay() }
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub initial: u64,
    pub batches: u64,
    /// The error that stopped the loop early, if any.
    pub aborted: Option<FeedgenError>,
    pub final_progress: Result<u64>,
}

impl RunSummary {
    /// True when the loop ran to the target and the final count was read.
    pub fn completed(&self) -> bool {
        self.aborted.is_none() && self.final_progress.is_ok()
    }
}

/// Drive the service until it holds `params.target` items or a batch fails.
///
/// A failing initial progress read is returned as an error before anything is
/// printed. Every later failure is written to `out` and recorded in the
/// summary, and the final progress read happens regardless.
pub async fn run<S, W>(service: &S, params: &DriverParams, out: &mut W) -> Result<RunSummary>
where
    S: FeedbackService + ?Sized,
    W: Write,
{
    let target = params.target;
    let initial = service.fetch_progress().await?.count;
    writeln!(out, "Current progress: {}/{}", initial, target)?;
    tracing::info!(target: "driver", initial, goal = target, batch_size = params.batch_size, "starting run");

    let mut remaining = target.saturating_sub(initial);
    let mut last_total = initial;
    let mut batches = 0u64;
    let mut aborted = None;

    while remaining > 0 {
        let to_generate = params.batch_size.min(remaining);
        batches += 1;
        writeln!(out)?;
        writeln!(out, "Batch {} - generating {} feedbacks...", batches, to_generate)?;

        match service.generate_batch(to_generate).await.and_then(|r| r.into_outcome()) {
            Ok(batch) => {
                writeln!(out, "Generated {} feedbacks", batch.generated)?;
                writeln!(out, "Total: {}/{}", batch.total_count, target)?;
                if batch.total_count <= last_total {
                    tracing::warn!(target: "driver", total = batch.total_count, previous = last_total, "service total did not advance");
                }
                last_total = batch.total_count;
                remaining = target.saturating_sub(batch.total_count);
            }
            Err(e) => {
                match &e {
                    FeedgenError::Application(msg) => writeln!(out, "Error: {}", msg)?,
                    other => writeln!(out, "Request failed: {}", other)?,
                }
                tracing::error!(target: "driver", batch = batches, error = %e, "batch failed, stopping");
                aborted = Some(e);
                break;
            }
        }

        if remaining > 0 && !params.delay.is_zero() {
            time::sleep(params.delay).await;
        }
    }

    writeln!(out)?;
    match &aborted {
        None => writeln!(out, "All done!")?,
        Some(_) => writeln!(out, "Stopped after batch {}.", batches)?,
    }

    let final_progress = service.fetch_progress().await.map(|p| p.count);
    match &final_progress {
        Ok(count) => writeln!(out, "Final count: {}/{}", count, target)?,
        Err(e) => writeln!(out, "Final count unavailable: {}", e)?,
    }
    tracing::info!(target: "driver", batches, aborted = aborted.is_some(), "run finished");

    Ok(RunSummary { initial, batches, aborted, final_progress })
}
