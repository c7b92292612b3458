use serde::Deserialize;

use crate::{
    http::HttpClient,
    pipeline::{Envelope, PipelineError, Source, SourceDocument},
    sources::{http_json::fetch_json, RetryPolicy},
};

/// One area granularity published by the storm center, e.g. `county` served
/// from the `thematic-1` layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ThematicLevel {
    pub name: String,
    pub thematic: String,
}

impl ThematicLevel {
    pub fn new(name: impl Into<String>, thematic: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            thematic: thematic.into(),
        }
    }
}

#[derive(Deserialize)]
struct CurrentState {
    data: Option<CurrentStateData>,
}

#[derive(Deserialize)]
struct CurrentStateData {
    interval_generation_data: Option<String>,
}

/// Kubra storm center source.
///
/// The storm center regenerates its data files on an interval and publishes
/// the current interval path in its `currentState` document. Each run reads
/// that path first, then fetches `thematic_areas.json` for every level.
pub struct KubraSource<C> {
    client: C,
    state_url: String,
    base_url: String,
    metric_namespace: String,
    levels: Vec<ThematicLevel>,
    retry: RetryPolicy,
}

impl<C: HttpClient> KubraSource<C> {
    pub fn new(
        client: C,
        state_url: impl Into<String>,
        base_url: impl Into<String>,
        metric_namespace: impl Into<String>,
        levels: Vec<ThematicLevel>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            state_url: state_url.into(),
            base_url: base_url.into(),
            metric_namespace: metric_namespace.into(),
            levels,
            retry,
        }
    }

    /// Path of the data generation interval currently being served.
    pub fn current_interval(&self) -> Result<String, PipelineError> {
        let body = self.retry.run(|| fetch_json(&self.client, &self.state_url))?;
        let state = CurrentState::deserialize(&body)
            .map_err(|e| PipelineError::Schema(format!("unexpected currentState document: {e}")))?;

        state
            .data
            .and_then(|d| d.interval_generation_data)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                metrics::counter!("outage_schema_errors_total").increment(1);
                PipelineError::Schema(format!(
                    "currentState from {} has no data.interval_generation_data",
                    self.state_url
                ))
            })
    }

    pub fn thematic_url(&self, interval: &str, level: &ThematicLevel) -> String {
        format!(
            "{}/{}/public/{}/thematic_areas.json",
            self.base_url.trim_end_matches('/'),
            interval.trim_matches('/'),
            level.thematic.trim_matches('/'),
        )
    }
}

impl<C: HttpClient> Source for KubraSource<C> {
    fn fetch(&self) -> Result<Vec<Envelope<SourceDocument>>, PipelineError> {
        let interval = self.current_interval()?;
        tracing::info!(interval = %interval, "resolved current data interval");

        let mut documents = Vec::with_capacity(self.levels.len());
        for level in &self.levels {
            let url = self.thematic_url(&interval, level);
            tracing::info!(level = %level.name, url = %url, "fetching outage data");
            let body = self.retry.run(|| fetch_json(&self.client, &url))?;

            documents.push(Envelope::now(SourceDocument {
                url,
                level: level.name.clone(),
                metric_prefix: format!("{}.{}", self.metric_namespace, level.name),
                body,
            }));
        }

        Ok(documents)
    }
}
