use std::time::SystemTime;

use outage_domain::domain::MetricPoint;

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: SystemTime,
}

impl<T> Envelope<T> {
    pub fn now(payload: T) -> Self {
        Self {
            payload,
            received_at: SystemTime::now(),
        }
    }
}

/// A decoded upstream JSON document and the naming it feeds into.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub url: String,
    /// Tag key for areas in this document (`area`, `county`, `zip_code`, ...).
    pub level: String,
    /// Metric name prefix for points derived from this document.
    pub metric_prefix: String,
    pub body: serde_json::Value,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("GET {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("GET {url} returned a body that is not JSON: {message}")]
    Decode { url: String, message: String },
}

impl FetchError {
    /// Rate limiting, gateway errors and transport failures are worth another try.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::Transport { .. } => true,
            Self::Decode { .. } => false,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("submit error: {0}")]
    Submit(String),
    #[error("config error: {0}")]
    Config(String),
}

pub trait Source: Send + Sync {
    fn fetch(&self) -> Result<Vec<Envelope<SourceDocument>>, PipelineError>;
}

pub trait Transform<I, O>: Send + Sync {
    fn apply(&self, input: Envelope<I>) -> Result<Envelope<O>, PipelineError>;
}

/// Receives every point of a run at once. `received_at` is the time the
/// earliest contributing document was fetched.
pub trait Sink<T>: Send + Sync {
    fn run(&self, input: Envelope<Vec<T>>) -> Result<(), PipelineError>;
}

/// Counts from one completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub documents: usize,
    pub points: usize,
}

pub struct Pipeline<S, X, K> {
    pub source: S,
    pub transform: X,
    pub sink: K,
}

impl<S, X, K> Pipeline<S, X, K>
where
    S: Source,
    X: Transform<SourceDocument, Vec<MetricPoint>>,
    K: Sink<MetricPoint>,
{
    /// Fetch, transform and emit once.
    ///
    /// Every document is transformed before anything is emitted, so a schema
    /// error in any document means no points are sent at all.
    pub fn run(&self) -> Result<RunSummary, PipelineError> {
        let documents = self.source.fetch()?;
        let document_count = documents.len();
        tracing::debug!(documents = document_count, "fetch complete");

        let mut points = Vec::new();
        let mut earliest: Option<SystemTime> = None;
        for doc in documents {
            let url = doc.payload.url.clone();
            let out = self.transform.apply(doc)?;
            tracing::debug!(url = %url, points = out.payload.len(), "document transformed");
            earliest = Some(earliest.map_or(out.received_at, |t| t.min(out.received_at)));
            points.extend(out.payload);
        }

        let point_count = points.len();
        self.sink.run(Envelope {
            payload: points,
            received_at: earliest.unwrap_or_else(SystemTime::now),
        })?;

        Ok(RunSummary {
            documents: document_count,
            points: point_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource(Result<Vec<serde_json::Value>, FetchError>);

    impl Source for FixedSource {
        fn fetch(&self) -> Result<Vec<Envelope<SourceDocument>>, PipelineError> {
            let bodies = self.0.clone()?;
            Ok(bodies
                .into_iter()
                .map(|body| {
                    Envelope::now(SourceDocument {
                        url: "http://upstream/areas.json".to_string(),
                        level: "area".to_string(),
                        metric_prefix: "dte.outage".to_string(),
                        body,
                    })
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct CountingTransform {
        calls: AtomicUsize,
    }

    impl Transform<SourceDocument, Vec<MetricPoint>> for CountingTransform {
        fn apply(&self, input: Envelope<SourceDocument>) -> Result<Envelope<Vec<MetricPoint>>, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if input.payload.body.get("bad").is_some() {
                return Err(PipelineError::Schema("bad document".to_string()));
            }
            Ok(Envelope {
                payload: vec![MetricPoint::new("m", 1.0, ["area:x"])],
                received_at: input.received_at,
            })
        }
    }

    #[derive(Default)]
    struct CountingSink {
        runs: AtomicUsize,
        points: AtomicUsize,
        received_at: std::sync::Mutex<Option<SystemTime>>,
    }

    impl Sink<MetricPoint> for CountingSink {
        fn run(&self, input: Envelope<Vec<MetricPoint>>) -> Result<(), PipelineError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.points.fetch_add(input.payload.len(), Ordering::SeqCst);
            *self.received_at.lock().unwrap() = Some(input.received_at);
            Ok(())
        }
    }

    #[test]
    fn fetch_failure_stops_before_transform_and_sink() {
        let pipeline = Pipeline {
            source: FixedSource(Err(FetchError::Status {
                url: "http://upstream".to_string(),
                status: 500,
            })),
            transform: CountingTransform::default(),
            sink: CountingSink::default(),
        };

        let res = pipeline.run();
        assert!(matches!(res, Err(PipelineError::Fetch(FetchError::Status { status: 500, .. }))));
        assert_eq!(pipeline.transform.calls.load(Ordering::SeqCst), 0);
        assert_eq!(pipeline.sink.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn schema_error_in_any_document_emits_nothing() {
        let pipeline = Pipeline {
            source: FixedSource(Ok(vec![serde_json::json!({"ok": 1}), serde_json::json!({"bad": 1})])),
            transform: CountingTransform::default(),
            sink: CountingSink::default(),
        };

        let res = pipeline.run();
        assert!(matches!(res, Err(PipelineError::Schema(_))));
        assert_eq!(pipeline.sink.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn successful_run_reports_counts() {
        let pipeline = Pipeline {
            source: FixedSource(Ok(vec![serde_json::json!({}), serde_json::json!({})])),
            transform: CountingTransform::default(),
            sink: CountingSink::default(),
        };

        let summary = pipeline.run().unwrap();
        assert_eq!(summary, RunSummary { documents: 2, points: 2 });
        assert_eq!(pipeline.sink.points.load(Ordering::SeqCst), 2);
    }

    struct StaggeredSource {
        fetched: Vec<SystemTime>,
    }

    impl Source for StaggeredSource {
        fn fetch(&self) -> Result<Vec<Envelope<SourceDocument>>, PipelineError> {
            Ok(self
                .fetched
                .iter()
                .map(|t| Envelope {
                    payload: SourceDocument {
                        url: "http://upstream/thematic.json".to_string(),
                        level: "county".to_string(),
                        metric_prefix: "dte.outage.county".to_string(),
                        body: serde_json::json!({}),
                    },
                    received_at: *t,
                })
                .collect())
        }
    }

    #[test]
    fn sink_sees_earliest_fetch_time() {
        let later = SystemTime::now();
        let earlier = later - std::time::Duration::from_secs(30);
        let pipeline = Pipeline {
            source: StaggeredSource {
                fetched: vec![later, earlier],
            },
            transform: CountingTransform::default(),
            sink: CountingSink::default(),
        };

        pipeline.run().unwrap();
        assert_eq!(*pipeline.sink.received_at.lock().unwrap(), Some(earlier));
    }

    #[test]
    fn only_gateway_and_rate_limit_statuses_are_retryable() {
        let status = |s| FetchError::Status {
            url: String::new(),
            status: s,
        };
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(!FetchError::Decode {
            url: String::new(),
            message: String::new()
        }
        .is_retryable());
    }
}
