use std::time::{Duration, SystemTime};

use outage_domain::domain::MetricPoint;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    http::HttpClient,
    pipeline::{Envelope, PipelineError, Sink},
    sinks::{Credentials, SubmitFailure},
};

/// Datadog v2 intake type for gauges.
const GAUGE: u8 = 3;

#[derive(Serialize)]
struct SeriesPayload<'a> {
    series: Vec<Series<'a>>,
}

#[derive(Serialize)]
struct Series<'a> {
    metric: &'a str,
    #[serde(rename = "type")]
    kind: u8,
    points: [SeriesPoint; 1],
    tags: Vec<&'a str>,
    resources: [Resource<'a>; 1],
}

#[derive(Serialize)]
struct SeriesPoint {
    timestamp: i64,
    value: f64,
}

#[derive(Serialize)]
struct Resource<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize, Default)]
struct IntakeResponse {
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

/// Submits metric points to the Datadog v2 series endpoint.
///
/// Points are sent in batches, one gauge series per point, stamped with the
/// time of the request. A rejected batch does not stop later batches; the
/// failures are reported together once every batch has been tried. Rejected
/// credentials stop the run immediately.
pub struct DatadogSink<C> {
    client: C,
    series_url: String,
    credentials: Credentials,
    resource_name: String,
    batch_size: usize,
    max_retries: u32,
    retry_backoff: Duration,
}

impl<C: HttpClient> DatadogSink<C> {
    pub fn new(
        client: C,
        site: &str,
        credentials: Credentials,
        resource_name: impl Into<String>,
        batch_size: usize,
        max_retries: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            client,
            series_url: format!("{}/api/v2/series", site.trim_end_matches('/')),
            credentials,
            resource_name: resource_name.into(),
            batch_size: batch_size.max(1),
            max_retries,
            retry_backoff,
        }
    }

    fn encode_batch(&self, batch: &[MetricPoint], timestamp: i64) -> Result<Vec<u8>, SubmitFailure> {
        let payload = SeriesPayload {
            series: batch
                .iter()
                .map(|p| Series {
                    metric: &p.name,
                    kind: GAUGE,
                    points: [SeriesPoint {
                        timestamp,
                        value: p.value,
                    }],
                    tags: p.tags.iter().map(String::as_str).collect(),
                    resources: [Resource {
                        name: &self.resource_name,
                        kind: "host",
                    }],
                })
                .collect(),
        };

        serde_json::to_vec(&payload).map_err(|e| SubmitFailure::Rejected(format!("failed to encode series: {e}")))
    }

    fn submit_once(&self, batch: &[MetricPoint]) -> Result<(), SubmitFailure> {
        let timestamp = OffsetDateTime::now_utc().unix_timestamp();
        let body = self.encode_batch(batch, timestamp)?;

        let response = self
            .client
            .post_json(&self.series_url, &self.credentials.headers(), body)
            .map_err(SubmitFailure::from_transport)?;

        if !response.is_success() {
            return Err(SubmitFailure::from_status(&response));
        }

        let intake: IntakeResponse = match serde_json::from_slice(&response.body) {
            Ok(intake) => intake,
            Err(e) => {
                tracing::warn!(
                    status = response.status,
                    error = %e,
                    body = %response.body_snippet(),
                    "metrics intake accepted the batch but returned an unreadable body"
                );
                IntakeResponse::default()
            }
        };
        if !intake.errors.is_empty() {
            let errors: Vec<String> = intake.errors.iter().map(|e| e.to_string()).collect();
            return Err(SubmitFailure::Rejected(format!("backend reported errors: {}", errors.join(", "))));
        }

        Ok(())
    }

    fn flush_batch(&self, batch: &[MetricPoint], received_at: SystemTime) -> Result<(), SubmitFailure> {
        let mut attempt: u32 = 0;
        loop {
            match self.submit_once(batch) {
                Ok(()) => {
                    metrics::counter!("outage_points_submitted_total").increment(batch.len() as u64);
                    if let Some(age) = scrape_age(received_at, SystemTime::now()) {
                        metrics::histogram!("outage_scrape_to_send_seconds").record(age.as_secs_f64());
                    }
                    return Ok(());
                }
                Err(SubmitFailure::Transient(e)) if attempt < self.max_retries => {
                    attempt += 1;
                    let sleep_for = self.retry_backoff * attempt;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        "metrics submission failed, retrying with backoff"
                    );
                    std::thread::sleep(sleep_for);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Time between the upstream fetch and a successful submission.
///
/// `None` if the clock went backwards in between.
fn scrape_age(received_at: SystemTime, sent_at: SystemTime) -> Option<Duration> {
    sent_at.duration_since(received_at).ok()
}

impl<C: HttpClient> Sink<MetricPoint> for DatadogSink<C> {
    fn run(&self, input: Envelope<Vec<MetricPoint>>) -> Result<(), PipelineError> {
        let Envelope {
            payload: input,
            received_at,
        } = input;
        if input.is_empty() {
            tracing::info!("no metric points to submit");
            return Ok(());
        }

        let batches = input.len().div_ceil(self.batch_size);
        tracing::info!(points = input.len(), batches, "submitting metrics");

        let mut failures = Vec::new();
        for (idx, batch) in input.chunks(self.batch_size).enumerate() {
            match self.flush_batch(batch, received_at) {
                Ok(()) => {}
                Err(SubmitFailure::Auth(e)) => {
                    metrics::counter!("outage_submit_errors_total").increment(1);
                    tracing::error!(error = %e, "metrics API rejected credentials, giving up");
                    return Err(PipelineError::Auth(format!("metrics API rejected credentials: {e}")));
                }
                Err(e) => {
                    let message = e.message();
                    metrics::counter!("outage_submit_errors_total").increment(1);
                    tracing::error!(batch = idx + 1, points = batch.len(), error = %message, "metrics batch failed");
                    failures.push(format!("batch {}: {message}", idx + 1));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Submit(format!(
                "{} of {} batches failed: {}",
                failures.len(),
                batches,
                failures.join("; ")
            )))
        }
    }
}
