use std::time::{Duration, Instant};

use outage_domain::domain::MetricPoint;

use crate::{
    http::HttpClient,
    pipeline::{Pipeline, PipelineError, RunSummary, Sink, Source, SourceDocument, Transform},
    sinks::ServiceCheckReporter,
};

/// Outcome counts of a scheduled loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTally {
    pub succeeded: u64,
    pub failed: u64,
}

/// A pipeline plus the heartbeat posted after each successful run.
pub struct Runner<S, X, K, C> {
    pub pipeline: Pipeline<S, X, K>,
    pub health: Option<ServiceCheckReporter<C>>,
}

impl<S, X, K, C> Runner<S, X, K, C>
where
    S: Source,
    X: Transform<SourceDocument, Vec<MetricPoint>>,
    K: Sink<MetricPoint>,
    C: HttpClient,
{
    /// One collection. The service check is only posted once the pipeline has
    /// emitted everything; any failure is returned without posting it.
    pub fn run_once(&self) -> Result<RunSummary, PipelineError> {
        tracing::info!("starting DTE outage metric collection");
        metrics::counter!("outage_runs_total").increment(1);
        let started = Instant::now();

        let summary = match self.pipeline.run() {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "outage metric collection failed");
                return Err(e);
            }
        };

        if let Some(reporter) = &self.health {
            reporter.report_ok()?;
        }

        tracing::info!(
            documents = summary.documents,
            points = summary.points,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "finished DTE outage metric collection"
        );
        Ok(summary)
    }

    /// Repeat `run_once` every `interval`, `runs` times or forever when `None`.
    ///
    /// A failed run is logged and does not stop the loop.
    pub fn run_scheduled(&self, interval: Duration, runs: Option<u64>) -> RunTally {
        let mut tally = RunTally::default();
        loop {
            match self.run_once() {
                Ok(_) => tally.succeeded += 1,
                Err(e) => {
                    tally.failed += 1;
                    tracing::warn!(
                        error = %e,
                        failed_runs = tally.failed,
                        "collection failed, will retry next interval"
                    );
                }
            }

            if runs.is_some_and(|n| tally.succeeded + tally.failed >= n) {
                return tally;
            }
            tracing::info!(wait_secs = interval.as_secs(), "waiting for next collection");
            std::thread::sleep(interval);
        }
    }
}
