use std::fmt;

use crate::pipeline::PipelineError;

/// Datadog API and application keys.
///
/// Built once at startup and handed to the sinks; nothing downstream reads
/// the environment.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
    app_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, app_key: impl Into<String>) -> Result<Self, PipelineError> {
        let api_key = api_key.into().trim().to_string();
        let app_key = app_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(PipelineError::Auth("API key is empty".to_string()));
        }
        if app_key.is_empty() {
            return Err(PipelineError::Auth("application key is empty".to_string()));
        }
        Ok(Self { api_key, app_key })
    }

    /// Read both keys from the named environment variables.
    pub fn from_env(api_key_var: &str, app_key_var: &str) -> Result<Self, PipelineError> {
        Self::from_lookup(api_key_var, app_key_var, |name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(api_key_var: &str, app_key_var: &str, lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(api_key_var)
            .ok_or_else(|| PipelineError::Auth(format!("environment variable {api_key_var} is not set")))?;
        let app_key = lookup(app_key_var)
            .ok_or_else(|| PipelineError::Auth(format!("environment variable {app_key_var} is not set")))?;
        Self::new(api_key, app_key)
    }

    /// Headers authenticating a request against the Datadog API.
    pub fn headers(&self) -> [(&'static str, &str); 2] {
        [("DD-API-KEY", self.api_key.as_str()), ("DD-APPLICATION-KEY", self.app_key.as_str())]
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("app_key", &"<redacted>")
            .finish()
    }
}
