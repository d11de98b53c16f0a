//! Bearer interceptor and single-flight refresh-on-401.

use secrecy::ExposeSecret;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::api::types::{AuthResponse, RefreshRequest};
use crate::config::ClientConfig;
use crate::http::{HttpError, HttpRequest, HttpResponse, ValidatedUrl};
use crate::token_store::TokenStore;
use crate::transport::Transport;

pub const REFRESH_PATH: &str = "/api/auth/refresh";

/// Every authenticated call goes through one pipeline per client. The
/// refresh lock is scoped to this instance, so two pipelines over the same
/// store would each be allowed one refresh.
pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenStore>,
    refresh_url: ValidatedUrl,
    timeout_ms: u64,
    refresh_lock: Mutex<()>,
}

impl RequestPipeline {
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<TokenStore>,
        config: &ClientConfig,
    ) -> Result<Self, HttpError> {
        let refresh_url = config.base_url()?.join(REFRESH_PATH)?;
        Ok(Self {
            transport,
            tokens,
            refresh_url,
            timeout_ms: config.read_timeout_ms,
            refresh_lock: Mutex::new(()),
        })
    }

    /// Sends `request` with the current bearer token. A 401 triggers at most
    /// one refresh-and-retry; if that is not possible the 401 is returned.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let request = self.authorize(request)?;
        let method = request.method();
        let path = request.url().path().to_owned();

        let response = self.transport.send(request.clone()).await?;
        tracing::debug!(%method, path = %path, status = response.status(), "response");

        if !response.is_unauthorized() {
            return Ok(response);
        }

        match self.authenticate(&request).await {
            Some(retry) => {
                let retried = self.transport.send(retry).await?;
                tracing::debug!(%method, path = %path, status = retried.status(), "retried after 401");
                Ok(retried)
            }
            None => Ok(response),
        }
    }

    fn authorize(&self, request: HttpRequest) -> Result<HttpRequest, HttpError> {
        match self.tokens.access_token() {
            Some(token) => request.with_bearer(token.expose_secret()),
            None => Ok(request),
        }
    }

    /// Returns the request to retry, or `None` to give up with the 401.
    async fn authenticate(&self, failed: &HttpRequest) -> Option<HttpRequest> {
        let failed_token = failed.bearer_token().map(str::to_owned);

        if self.tokens.refresh_token().is_none() {
            tracing::debug!("401 without refresh token, not authenticated");
            return None;
        }

        let _guard = self.refresh_lock.lock().await;

        // Someone else may have refreshed (or logged out) while we waited.
        let Some(session) = self.tokens.session() else {
            tracing::debug!("session cleared while waiting for refresh");
            return None;
        };
        let current = session.access_token().expose_secret();
        if failed_token.as_deref() != Some(current.as_str()) {
            tracing::debug!("access token already rotated, retrying");
            return failed.clone().with_bearer(current).ok();
        }

        let refresh_token = session.refresh_token().expose_secret().clone();
        match self.refresh(refresh_token).await {
            Some((access, refresh)) => {
                if let Err(e) = self.tokens.save_tokens(&access, &refresh) {
                    tracing::error!(error = %e, "failed to persist rotated tokens");
                }
                tracing::info!("access token refreshed");
                failed.clone().with_bearer(&access).ok()
            }
            None => {
                if let Err(e) = self.tokens.clear() {
                    tracing::error!(error = %e, "failed to clear session after refresh failure");
                }
                tracing::info!("refresh rejected, session cleared");
                None
            }
        }
    }

    /// Calls the refresh endpoint directly on the transport, skipping the
    /// interceptor. Only a complete token pair counts as success.
    async fn refresh(&self, refresh_token: String) -> Option<(String, String)> {
        let request = HttpRequest::post(self.refresh_url.clone())
            .with_timeout_ms(self.timeout_ms)
            .and_then(|r| r.with_json(&RefreshRequest { refresh_token }));
        let request = match request {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "could not build refresh request");
                return None;
            }
        };

        let response = match self.transport.send(request).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "refresh call failed");
                return None;
            }
        };

        if !response.is_success() {
            tracing::warn!(status = response.status(), "refresh rejected");
            return None;
        }

        match response.json::<AuthResponse>() {
            Ok(auth) => match auth.token_pair() {
                Some((access, refresh)) => Some((access.to_owned(), refresh.to_owned())),
                None => {
                    tracing::warn!("refresh returned an incomplete token pair");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "refresh body unreadable");
                None
            }
        }
    }
}
