//! Typed backend endpoints.

pub mod types;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::ApiFailure;
use crate::http::{HttpError, HttpRequest, HttpResponse, ValidatedUrl};
use crate::pipeline::RequestPipeline;

pub use types::{
    AuthResponse, ChangePasswordRequest, Condition, ConditionId, Food, Ingredient, LoginRequest,
    Recipe, RefreshRequest, RegisterRequest, Stats, User, UserConditionRequest, UserId,
};

pub struct ApiClient {
    pipeline: Arc<RequestPipeline>,
    base_url: ValidatedUrl,
    timeout_ms: u64,
}

impl ApiClient {
    pub fn new(pipeline: Arc<RequestPipeline>, config: &ClientConfig) -> Result<Self, HttpError> {
        Ok(Self {
            pipeline,
            base_url: config.base_url()?,
            timeout_ms: config.read_timeout_ms,
        })
    }

    pub async fn register(&self, body: &RegisterRequest) -> Result<AuthResponse, ApiFailure> {
        let request = self.post("/api/auth/register", body)?;
        self.fetch_json(request).await
    }

    pub async fn login(&self, body: &LoginRequest) -> Result<AuthResponse, ApiFailure> {
        let request = self.post("/api/auth/login", body)?;
        self.fetch_json(request).await
    }

    pub async fn logout(&self, body: &RefreshRequest) -> Result<(), ApiFailure> {
        let request = self.post("/api/auth/logout", body)?;
        self.fetch_empty(request).await
    }

    pub async fn me(&self) -> Result<User, ApiFailure> {
        let request = self.get("/api/auth/me")?;
        self.fetch_json(request).await
    }

    pub async fn conditions(&self) -> Result<Vec<Condition>, ApiFailure> {
        let request = self.get("/api/conditions")?;
        self.fetch_json(request).await
    }

    pub async fn user_conditions(&self, user_id: UserId) -> Result<Vec<Condition>, ApiFailure> {
        let request = self.get(&format!("/api/users/{user_id}/conditions"))?;
        self.fetch_json(request).await
    }

    pub async fn set_user_conditions(
        &self,
        user_id: UserId,
        body: &UserConditionRequest,
    ) -> Result<(), ApiFailure> {
        let request = self.post(&format!("/api/users/{user_id}/conditions"), body)?;
        self.fetch_empty(request).await
    }

    pub async fn safe_foods(&self, user_id: UserId) -> Result<Vec<Food>, ApiFailure> {
        let request = self.get(&format!("/api/users/{user_id}/safe-foods"))?;
        self.fetch_json(request).await
    }

    pub async fn safe_recipes(&self, user_id: UserId) -> Result<Vec<Recipe>, ApiFailure> {
        let request = self.get(&format!("/api/users/{user_id}/safe-recipes"))?;
        self.fetch_json(request).await
    }

    pub async fn change_password(&self, body: &ChangePasswordRequest) -> Result<(), ApiFailure> {
        let request = self.post("/api/auth/change-password", body)?;
        self.fetch_empty(request).await
    }

    pub async fn stats(&self) -> Result<Stats, ApiFailure> {
        let request = self.get("/api/admin/stats")?;
        self.fetch_json(request).await
    }

    fn get(&self, path: &str) -> Result<HttpRequest, ApiFailure> {
        let url = self.base_url.join(path)?;
        Ok(HttpRequest::get(url).with_timeout_ms(self.timeout_ms)?)
    }

    fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<HttpRequest, ApiFailure> {
        let url = self.base_url.join(path)?;
        Ok(HttpRequest::post(url)
            .with_timeout_ms(self.timeout_ms)?
            .with_json(body)?)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiFailure> {
        let path = request.url().path().to_owned();
        let response = self.pipeline.execute(request).await.map_err(|e| {
            tracing::warn!(path = %path, error = %e, "request failed");
            ApiFailure::from(e)
        })?;

        if response.is_success() {
            Ok(response)
        } else {
            let failure = ApiFailure::from_http_status(response.status(), response.body());
            tracing::info!(
                path = %path,
                status = response.status(),
                code = failure.code().unwrap_or("-"),
                "request rejected"
            );
            Err(failure)
        }
    }

    async fn fetch_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T, ApiFailure> {
        let response = self.send(request).await?;
        response.json().map_err(ApiFailure::from)
    }

    async fn fetch_empty(&self, request: HttpRequest) -> Result<(), ApiFailure> {
        self.send(request).await.map(|_| ())
    }
}
