//! Test doubles for the HTTP seam.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::http::{HttpError, HttpHeaders, HttpRequest, HttpResponse};
use crate::transport::Transport;

type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse, HttpError> + Send + Sync;

/// Transport answering from a closure and recording every request it sees.
pub(crate) struct MockTransport {
    handler: Box<Handler>,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub(crate) fn new(
        handler: impl Fn(&HttpRequest) -> Result<HttpResponse, HttpError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Every response is delayed, so concurrent callers overlap.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url().path() == path)
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(&request)
    }
}

pub(crate) fn json_response(status: u16, body: serde_json::Value) -> HttpResponse {
    let mut headers = HttpHeaders::new();
    headers.insert("Content-Type", "application/json").unwrap();
    HttpResponse::new(
        status,
        headers,
        serde_json::to_vec(&body).unwrap(),
        "mock".to_string(),
    )
}

pub(crate) fn empty_response(status: u16) -> HttpResponse {
    HttpResponse::new(status, HttpHeaders::new(), Vec::new(), "mock".to_string())
}

pub(crate) fn token_pair(access: &str, refresh: &str) -> serde_json::Value {
    serde_json::json!({
        "accessToken": access,
        "refreshToken": refresh,
        "tokenType": "Bearer",
        "expiresIn": 900,
        "userId": 7
    })
}
