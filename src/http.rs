use std::time::Duration;

use serde_json::Value;

use crate::error::{SyncError, SyncResult};

const MAX_ERROR_BODY_CHARS: usize = 240;

/// Blocking JSON client bound to one service base URL. Every call is a single
/// attempt; the next poll tick is the retry.
#[derive(Debug, Clone)]
pub(crate) struct JsonClient {
    service: &'static str,
    base_url: String,
    headers: Vec<(String, String)>,
    agent: ureq::Agent,
}

impl JsonClient {
    pub(crate) fn new(service: &'static str, base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();

        Self {
            service,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers: Vec::new(),
            agent,
        }
    }

    pub(crate) fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub(crate) fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    pub(crate) fn get(&self, path: &str, query: &[(&str, &str)]) -> SyncResult<Value> {
        let mut request = self.request("GET", path);
        for (key, value) in query {
            request = request.query(key, value);
        }
        self.send(request, None)
    }

    pub(crate) fn put(&self, path: &str, body: &Value) -> SyncResult<Value> {
        self.send(self.request("PUT", path), Some(body))
    }

    pub(crate) fn post(&self, path: &str, body: &Value) -> SyncResult<Value> {
        self.send(self.request("POST", path), Some(body))
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let mut request = self.agent.request(method, &self.url(path));
        for (name, value) in &self.headers {
            request = request.set(name, value);
        }
        request
    }

    fn send(&self, request: ureq::Request, body: Option<&Value>) -> SyncResult<Value> {
        let result = match body {
            Some(body) => request
                .set("Content-Type", "application/json")
                .send_string(&body.to_string()),
            None => request.call(),
        };

        match result {
            Ok(response) => {
                let raw = response.into_string().map_err(|err| SyncError::Transport {
                    service: self.service,
                    detail: format!("response decode failed: {err}"),
                })?;
                parse_json_body(self.service, &raw)
            }
            Err(ureq::Error::Status(status, response)) => {
                let response_body = response.into_string().ok().unwrap_or_default();
                Err(SyncError::Transport {
                    service: self.service,
                    detail: status_error(status, &response_body),
                })
            }
            Err(ureq::Error::Transport(err)) => Err(SyncError::Transport {
                service: self.service,
                detail: format!("transport error: {err}"),
            }),
        }
    }
}

fn status_error(status: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP status {status}")
    } else {
        let truncated = body.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>();
        format!("HTTP status {status} ({truncated})")
    }
}

fn parse_json_body(service: &'static str, raw: &str) -> SyncResult<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(raw).map_err(|err| SyncError::InvalidResponse {
        service,
        detail: format!("malformed JSON body: {err}"),
    })
}
