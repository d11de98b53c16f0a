//! The HTTP seam. The pipeline only ever talks to a [`Transport`]; shells
//! plug in their platform client, Rust-native shells can use
//! [`ReqwestTransport`] behind the `native` feature.

use async_trait::async_trait;

use crate::http::{HttpError, HttpRequest, HttpResponse};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request. Non-2xx statuses are returned as responses, only
    /// failures to obtain a response are errors.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

#[cfg(feature = "native")]
pub use native::ReqwestTransport;

#[cfg(feature = "native")]
mod native {
    use async_trait::async_trait;
    use std::time::Duration;

    use super::Transport;
    use crate::config::ClientConfig;
    use crate::http::{HttpError, HttpHeaders, HttpMethod, HttpRequest, HttpResponse};

    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        /// # Errors
        ///
        /// Returns an error when the reqwest client cannot be constructed.
        pub fn new(config: &ClientConfig) -> Result<Self, reqwest::Error> {
            let client = reqwest::Client::builder()
                .connect_timeout(config.connect_timeout())
                .timeout(config.read_timeout())
                .build()?;
            Ok(Self { client })
        }
    }

    #[async_trait]
    impl Transport for ReqwestTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            let method = match request.method() {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Post => reqwest::Method::POST,
                HttpMethod::Put => reqwest::Method::PUT,
                HttpMethod::Delete => reqwest::Method::DELETE,
            };

            let mut builder = self
                .client
                .request(method, request.url().as_str())
                .timeout(Duration::from_millis(request.timeout_ms()))
                .header(reqwest::header::ACCEPT, "application/json");
            for (name, value) in request.headers().iter() {
                builder = builder.header(name, value);
            }
            if let Some(body) = request.body() {
                builder = builder.body(body.to_vec());
            }

            let response = builder
                .send()
                .await
                .map_err(|e| map_transport_error(&request, &e))?;

            let status = response.status().as_u16();
            let mut headers = HttpHeaders::new();
            for (name, value) in response.headers() {
                if let Ok(value) = value.to_str() {
                    // Managed headers such as content-length are rejected by
                    // the validator and are not needed downstream.
                    let _ = headers.insert(name.as_str(), value);
                }
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| map_transport_error(&request, &e))?;

            Ok(HttpResponse::new(
                status,
                headers,
                body.to_vec(),
                request.request_id().to_string(),
            ))
        }
    }

    fn map_transport_error(request: &HttpRequest, error: &reqwest::Error) -> HttpError {
        if error.is_timeout() {
            HttpError::Timeout {
                timeout_ms: request.timeout_ms(),
                request_id: request.request_id().to_string(),
            }
        } else if error.is_decode() || error.is_body() {
            HttpError::InvalidResponse {
                reason: error.to_string(),
                request_id: request.request_id().to_string(),
            }
        } else {
            HttpError::ConnectionError {
                host: request.url().host().to_string(),
                message: error.to_string(),
            }
        }
    }
}
