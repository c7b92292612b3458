use std::{sync::Arc, time::Duration};

use crate::pipeline::PipelineError;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Short, lossy rendering of the body for log and error messages.
    pub fn body_snippet(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        let mut snippet: String = text.chars().take(200).collect();
        if text.chars().count() > 200 {
            snippet.push_str("...");
        }
        snippet
    }
}

/// Blocking HTTP operations used by sources and sinks.
///
/// `Err` means the exchange never completed (DNS, connect, timeout, TLS).
/// Any status code, including 5xx, comes back as `Ok`.
pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str) -> Result<HttpResponse, String>;

    fn post_json(&self, url: &str, headers: &[(&str, &str)], body: Vec<u8>) -> Result<HttpResponse, String>;
}

impl<T: HttpClient + ?Sized> HttpClient for Arc<T> {
    fn get(&self, url: &str) -> Result<HttpResponse, String> {
        (**self).get(url)
    }

    fn post_json(&self, url: &str, headers: &[(&str, &str)], body: Vec<u8>) -> Result<HttpResponse, String> {
        (**self).post_json(url, headers, body)
    }
}

/// `HttpClient` backed by `reqwest::blocking`.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, PipelineError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    fn finish(response: reqwest::blocking::Response) -> Result<HttpResponse, String> {
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| format!("failed to read response body: {e}"))?;

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<HttpResponse, String> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .map_err(|e| e.to_string())?;

        Self::finish(response)
    }

    fn post_json(&self, url: &str, headers: &[(&str, &str)], body: Vec<u8>) -> Result<HttpResponse, String> {
        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.body(body).send().map_err(|e| e.to_string())?;
        Self::finish(response)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::{collections::VecDeque, sync::Mutex};

    /// A recorded call made against `ScriptedHttpClient`.
    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub method: &'static str,
        pub url: String,
        pub headers: Vec<(String, String)>,
        pub body: Vec<u8>,
    }

    /// Replays canned responses in order and records every call.
    #[derive(Default)]
    pub struct ScriptedHttpClient {
        responses: Mutex<VecDeque<Result<HttpResponse, String>>>,
        pub calls: Mutex<Vec<RecordedCall>>,
    }

    impl ScriptedHttpClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(self, status: u16, body: &str) -> Self {
            self.responses.lock().unwrap().push_back(Ok(HttpResponse {
                status,
                body: body.as_bytes().to_vec(),
            }));
            self
        }

        pub fn fail(self, message: &str) -> Self {
            self.responses.lock().unwrap().push_back(Err(message.to_string()));
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }

        fn next(&self) -> Result<HttpResponse, String> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err("no scripted response left".to_string()))
        }
    }

    impl HttpClient for ScriptedHttpClient {
        fn get(&self, url: &str) -> Result<HttpResponse, String> {
            self.calls.lock().unwrap().push(RecordedCall {
                method: "GET",
                url: url.to_string(),
                headers: Vec::new(),
                body: Vec::new(),
            });
            self.next()
        }

        fn post_json(&self, url: &str, headers: &[(&str, &str)], body: Vec<u8>) -> Result<HttpResponse, String> {
            self.calls.lock().unwrap().push(RecordedCall {
                method: "POST",
                url: url.to_string(),
                headers: headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                body,
            });
            self.next()
        }
    }

    #[test]
    fn success_covers_2xx_only() {
        let ok = HttpResponse { status: 202, body: vec![] };
        let redirect = HttpResponse { status: 302, body: vec![] };
        assert!(ok.is_success());
        assert!(!redirect.is_success());
    }

    #[test]
    fn body_snippet_truncates_long_bodies() {
        let r = HttpResponse {
            status: 500,
            body: "x".repeat(500).into_bytes(),
        };
        let snippet = r.body_snippet();
        assert_eq!(snippet.len(), 203);
        assert!(snippet.ends_with("..."));
    }

    #[test]
    fn scripted_client_replays_in_order() {
        let client = ScriptedHttpClient::new().respond(200, "{}").fail("boom");
        assert_eq!(client.get("http://a").unwrap().status, 200);
        assert_eq!(client.get("http://b").unwrap_err(), "boom");
        assert!(client.get("http://c").is_err());
        assert_eq!(client.call_count(), 3);
    }
}
