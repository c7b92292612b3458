use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    http::HttpClient,
    pipeline::PipelineError,
    sinks::{Credentials, SubmitFailure},
};

/// Datadog service check status for OK.
const STATUS_OK: u8 = 0;

#[derive(Serialize)]
struct ServiceCheck<'a> {
    check: &'a str,
    host_name: &'a str,
    status: u8,
    timestamp: i64,
    tags: &'a [String],
}

#[derive(Deserialize)]
struct CheckRunResponse {
    status: Option<String>,
}

/// Posts a heartbeat service check after a successful run so the backend can
/// alert when the exporter goes quiet.
pub struct ServiceCheckReporter<C> {
    client: C,
    url: String,
    credentials: Credentials,
    check: String,
    host_name: String,
    tags: Vec<String>,
}

impl<C: HttpClient> ServiceCheckReporter<C> {
    pub fn new(
        client: C,
        site: &str,
        credentials: Credentials,
        check: impl Into<String>,
        host_name: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            client,
            url: format!("{}/api/v1/check_run", site.trim_end_matches('/')),
            credentials,
            check: check.into(),
            host_name: host_name.into(),
            tags,
        }
    }

    pub fn report_ok(&self) -> Result<(), PipelineError> {
        let body = serde_json::to_vec(&[ServiceCheck {
            check: &self.check,
            host_name: &self.host_name,
            status: STATUS_OK,
            timestamp: OffsetDateTime::now_utc().unix_timestamp(),
            tags: &self.tags,
        }])
        .map_err(|e| PipelineError::Submit(format!("failed to encode service check: {e}")))?;

        tracing::info!(check = %self.check, "submitting health check");
        let outcome = self
            .client
            .post_json(&self.url, &self.credentials.headers(), body)
            .map_err(SubmitFailure::from_transport)
            .and_then(|response| {
                if !response.is_success() {
                    return Err(SubmitFailure::from_status(&response));
                }
                match serde_json::from_slice::<CheckRunResponse>(&response.body) {
                    Ok(CheckRunResponse { status: Some(s) }) if s != "ok" => {
                        Err(SubmitFailure::Rejected(format!("service check status: {s}")))
                    }
                    _ => Ok(()),
                }
            });

        match outcome {
            Ok(()) => Ok(()),
            Err(SubmitFailure::Auth(e)) => Err(PipelineError::Auth(format!("metrics API rejected credentials: {e}"))),
            Err(e) => {
                let message = e.message();
                tracing::error!(error = %message, "error submitting service check");
                Err(PipelineError::Submit(format!("service check failed: {message}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::ScriptedHttpClient;
    use std::sync::Arc;

    fn reporter(client: Arc<ScriptedHttpClient>) -> ServiceCheckReporter<Arc<ScriptedHttpClient>> {
        ServiceCheckReporter::new(
            client,
            "https://api.datadoghq.test",
            Credentials::new("api", "app").unwrap(),
            "dte.outage.ok",
            "dte-outage",
            Vec::new(),
        )
    }

    #[test]
    fn posts_ok_check() {
        let client = Arc::new(ScriptedHttpClient::new().respond(202, r#"{"status":"ok"}"#));
        reporter(client.clone()).report_ok().unwrap();

        let calls = client.calls();
        assert_eq!(calls[0].url, "https://api.datadoghq.test/api/v1/check_run");
        let body: serde_json::Value = serde_json::from_slice(&calls[0].body).unwrap();
        assert_eq!(body[0]["check"], "dte.outage.ok");
        assert_eq!(body[0]["host_name"], "dte-outage");
        assert_eq!(body[0]["status"], 0);
    }

    #[test]
    fn non_ok_status_in_body_is_submit_error() {
        let client = Arc::new(ScriptedHttpClient::new().respond(202, r#"{"status":"error"}"#));
        assert!(matches!(reporter(client).report_ok(), Err(PipelineError::Submit(_))));
    }

    #[test]
    fn forbidden_is_auth_error() {
        let client = Arc::new(ScriptedHttpClient::new().respond(403, ""));
        assert!(matches!(reporter(client).report_ok(), Err(PipelineError::Auth(_))));
    }
}
