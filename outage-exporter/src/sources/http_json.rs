use crate::{
    http::HttpClient,
    pipeline::{Envelope, FetchError, PipelineError, Source, SourceDocument},
    sources::RetryPolicy,
};

/// GET `url` and decode the body as JSON.
///
/// A non-2xx status, a transport failure, or a body that is not JSON all
/// surface as `FetchError`. No retries happen here; see `RetryPolicy`.
pub fn fetch_json<C>(client: &C, url: &str) -> Result<serde_json::Value, FetchError>
where
    C: HttpClient + ?Sized,
{
    metrics::counter!("outage_fetch_requests_total").increment(1);

    let result = client
        .get(url)
        .map_err(|message| FetchError::Transport {
            url: url.to_string(),
            message,
        })
        .and_then(|response| {
            if !response.is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: response.status,
                });
            }
            serde_json::from_slice(&response.body).map_err(|e| FetchError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })
        });

    if let Err(e) = &result {
        tracing::error!(error = %e, "failed fetching upstream document");
        metrics::counter!("outage_fetch_errors_total").increment(1);
    }

    result
}

/// Pulls a single JSON document from a fixed URL.
pub struct HttpJsonSource<C> {
    client: C,
    url: String,
    level: String,
    metric_prefix: String,
    retry: RetryPolicy,
}

impl<C: HttpClient> HttpJsonSource<C> {
    pub fn new(
        client: C,
        url: impl Into<String>,
        level: impl Into<String>,
        metric_prefix: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            level: level.into(),
            metric_prefix: metric_prefix.into(),
            retry,
        }
    }
}

impl<C: HttpClient> Source for HttpJsonSource<C> {
    fn fetch(&self) -> Result<Vec<Envelope<SourceDocument>>, PipelineError> {
        tracing::info!(url = %self.url, "fetching outage data");
        let body = self.retry.run(|| fetch_json(&self.client, &self.url))?;

        Ok(vec![Envelope::now(SourceDocument {
            url: self.url.clone(),
            level: self.level.clone(),
            metric_prefix: self.metric_prefix.clone(),
            body,
        })])
    }
}
