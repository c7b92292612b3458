pub mod credentials;
pub mod datadog;
pub mod service_check;

pub use credentials::Credentials;
pub use datadog::DatadogSink;
pub use service_check::ServiceCheckReporter;

use crate::http::HttpResponse;

/// Why a single submission to the metrics backend did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SubmitFailure {
    /// Credentials rejected (401/403). Retrying cannot help.
    Auth(String),
    /// Backend refused the payload (other 4xx, or errors reported in a 2xx body).
    Rejected(String),
    /// 429, 5xx or transport failure; may succeed on retry.
    Transient(String),
}

impl SubmitFailure {
    pub(crate) fn from_transport(message: String) -> Self {
        Self::Transient(format!("request failed: {message}"))
    }

    pub(crate) fn from_status(response: &HttpResponse) -> Self {
        let detail = format!("HTTP {}: {}", response.status, response.body_snippet());
        match response.status {
            401 | 403 => Self::Auth(detail),
            429 | 500..=599 => Self::Transient(detail),
            _ => Self::Rejected(detail),
        }
    }

    pub(crate) fn message(&self) -> &str {
        match self {
            Self::Auth(m) | Self::Rejected(m) | Self::Transient(m) => m,
        }
    }
}
