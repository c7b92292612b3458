use anyhow::Result;
use dte_outage_exporter::{
    config::{AppConfig, SourceKind},
    http::ReqwestClient,
    metrics_server,
    observability,
    pipeline::{Envelope, Pipeline, PipelineError, Source, SourceDocument},
    runner::Runner,
    sinks::{Credentials, DatadogSink, ServiceCheckReporter},
    sources::{HttpJsonSource, KubraSource},
    transform::OutageTransform,
};
use std::time::Duration;

enum OutageSource {
    Kubra(KubraSource<ReqwestClient>),
    HttpJson(HttpJsonSource<ReqwestClient>),
}

impl Source for OutageSource {
    fn fetch(&self) -> Result<Vec<Envelope<SourceDocument>>, PipelineError> {
        match self {
            Self::Kubra(s) => s.fetch(),
            Self::HttpJson(s) => s.fetch(),
        }
    }
}

fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let client = ReqwestClient::new(cfg.http.timeout(), &cfg.http.user_agent)?;
    let credentials = Credentials::from_env(&cfg.datadog.api_key_env, &cfg.datadog.app_key_env)?;

    let src_cfg = &cfg.source;
    let source = match src_cfg.kind {
        SourceKind::Kubra => OutageSource::Kubra(KubraSource::new(
            client.clone(),
            &src_cfg.state_url,
            &src_cfg.base_url,
            &src_cfg.metric_namespace,
            src_cfg.levels.clone(),
            cfg.http.retry_policy(),
        )),
        SourceKind::HttpJson => OutageSource::HttpJson(HttpJsonSource::new(
            client.clone(),
            src_cfg.url.clone().unwrap_or_default(),
            &src_cfg.level,
            &src_cfg.metric_namespace,
            cfg.http.retry_policy(),
        )),
    };

    let dd_cfg = &cfg.datadog;
    let sink = DatadogSink::new(
        client.clone(),
        &dd_cfg.site,
        credentials.clone(),
        &dd_cfg.resource_name,
        dd_cfg.batch_size,
        dd_cfg.max_retries,
        Duration::from_millis(dd_cfg.retry_backoff_ms),
    );
    let health = dd_cfg.service_check.then(|| {
        ServiceCheckReporter::new(
            client,
            &dd_cfg.site,
            credentials,
            &dd_cfg.service_check_name,
            &dd_cfg.resource_name,
            Vec::new(),
        )
    });

    let runner = Runner {
        pipeline: Pipeline {
            source,
            transform: OutageTransform,
            sink,
        },
        health,
    };

    match cfg.schedule.interval_secs {
        None => {
            runner.run_once()?;
            Ok(())
        }
        Some(secs) => {
            runner.run_scheduled(Duration::from_secs(secs), None);
            Ok(())
        }
    }
}
