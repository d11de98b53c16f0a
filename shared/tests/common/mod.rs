#![allow(dead_code)]

use async_trait::async_trait;
use crux_core::testing::AppTester;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shared::http::{HttpError, HttpHeaders, HttpRequest, HttpResponse};
use shared::{App, Effect, EffectExecutor, Event, Model, Transport};

pub const BASE_URL: &str = "https://recetas.example.com";

type Handler = Box<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

/// In-process stand-in for the REST backend: one handler per path, a 404 for
/// everything else, and a log of what was called.
#[derive(Default)]
pub struct FakeBackend {
    routes: HashMap<String, Handler>,
    calls: Mutex<Vec<HttpRequest>>,
    latency: Option<Duration>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        mut self,
        path: &str,
        handler: impl Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    ) -> Self {
        self.routes.insert(path.to_owned(), Box::new(handler));
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url().path() == path)
            .count()
    }

    pub fn last_call_to(&self, path: &str) -> Option<HttpRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.url().path() == path)
            .cloned()
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        self.calls.lock().unwrap().push(request.clone());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(match self.routes.get(request.url().path()) {
            Some(handler) => handler(&request),
            None => status(404),
        })
    }
}

pub fn json(code: u16, body: serde_json::Value) -> HttpResponse {
    let mut headers = HttpHeaders::new();
    headers.insert("Content-Type", "application/json").unwrap();
    HttpResponse::new(
        code,
        headers,
        serde_json::to_vec(&body).unwrap(),
        "fake".into(),
    )
}

pub fn status(code: u16) -> HttpResponse {
    HttpResponse::new(code, HttpHeaders::new(), Vec::new(), "fake".into())
}

pub fn tokens(access: &str, refresh: &str) -> HttpResponse {
    json(
        200,
        serde_json::json!({
            "accessToken": access,
            "refreshToken": refresh,
            "tokenType": "Bearer",
            "expiresIn": 900,
            "userId": 7
        }),
    )
}

/// Only answers when the request carries `Bearer <token>`.
pub fn requires_bearer(
    token: &'static str,
    ok: impl Fn() -> HttpResponse + Send + Sync + 'static,
) -> impl Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static {
    move |req| {
        if req.bearer_token() == Some(token) {
            ok()
        } else {
            json(401, serde_json::json!({"code": "UNAUTHENTICATED"}))
        }
    }
}

/// Feeds `event` to the core and plays the shell: every `Api` request is run
/// on the executor and resolved, until the core has nothing left to ask.
/// Timers are left pending.
pub async fn drive(
    app: &AppTester<App, Effect>,
    executor: &EffectExecutor,
    model: &mut Model,
    event: Event,
) {
    let mut pending = vec![app.update(event, model)];
    while let Some(update) = pending.pop() {
        for event in update.events {
            pending.push(app.update(event, model));
        }
        for effect in update.effects {
            if let Effect::Api(mut request) = effect {
                let result = executor.execute_api(request.operation.clone()).await;
                pending.push(app.resolve(&mut request, result).expect("an update"));
            }
        }
    }
}

pub fn executor(backend: Arc<FakeBackend>, store: Arc<shared::TokenStore>) -> EffectExecutor {
    EffectExecutor::build(backend, store, &shared::ClientConfig::new(BASE_URL)).unwrap()
}
