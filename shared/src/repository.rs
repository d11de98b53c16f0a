//! Domain-facing operations over the API client and the token store.

use secrecy::ExposeSecret;
use std::sync::Arc;

use crate::api::{
    ApiClient, AuthResponse, ChangePasswordRequest, Condition, ConditionId, Food, LoginRequest,
    Recipe, RefreshRequest, RegisterRequest, Stats, User, UserConditionRequest, UserId,
};
use crate::config::ClientConfig;
use crate::error::ApiFailure;
use crate::http::HttpError;
use crate::pipeline::RequestPipeline;
use crate::token_store::TokenStore;
use crate::transport::Transport;

pub struct Repository {
    api: ApiClient,
    tokens: Arc<TokenStore>,
}

impl Repository {
    pub fn new(api: ApiClient, tokens: Arc<TokenStore>) -> Self {
        Self { api, tokens }
    }

    /// Composition root: one pipeline, one client, one shared store.
    pub fn build(
        transport: Arc<dyn Transport>,
        tokens: Arc<TokenStore>,
        config: &ClientConfig,
    ) -> Result<Self, HttpError> {
        let pipeline = Arc::new(RequestPipeline::new(transport, tokens.clone(), config)?);
        let api = ApiClient::new(pipeline, config)?;
        Ok(Self::new(api, tokens))
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiFailure> {
        tracing::debug!(email, "login");
        let response = self
            .api
            .login(&LoginRequest {
                email: email.to_owned(),
                password: password.to_owned(),
            })
            .await?;
        self.persist(&response);
        Ok(response)
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiFailure> {
        tracing::debug!(username, email, "register");
        let response = self
            .api
            .register(&RegisterRequest {
                username: username.to_owned(),
                email: email.to_owned(),
                password: password.to_owned(),
            })
            .await?;
        self.persist(&response);
        Ok(response)
    }

    /// Tells the backend when there is a refresh token to revoke, then clears
    /// the local session no matter how that went.
    pub async fn logout(&self) -> Result<(), ApiFailure> {
        if let Some(refresh_token) = self.tokens.refresh_token() {
            let body = RefreshRequest {
                refresh_token: refresh_token.expose_secret().clone(),
            };
            if let Err(e) = self.api.logout(&body).await {
                tracing::info!(error = %e, "backend logout failed, clearing locally");
            }
        }
        self.tokens.clear()?;
        Ok(())
    }

    pub async fn me(&self) -> Result<User, ApiFailure> {
        self.api.me().await
    }

    pub async fn conditions(&self) -> Result<Vec<Condition>, ApiFailure> {
        self.api.conditions().await
    }

    pub async fn user_conditions(&self, user_id: UserId) -> Result<Vec<Condition>, ApiFailure> {
        self.api.user_conditions(user_id).await
    }

    /// Catalog and the user's selection, fetched concurrently. Only the
    /// catalog is required; a failed selection lookup reads as "nothing
    /// selected yet".
    pub async fn condition_overview(
        &self,
        user_id: UserId,
    ) -> Result<(Vec<Condition>, Vec<Condition>), ApiFailure> {
        let (catalog, selected) = tokio::join!(self.conditions(), self.user_conditions(user_id));
        let selected = selected.unwrap_or_else(|e| {
            tracing::warn!(user_id, error = %e, "could not load user conditions");
            Vec::new()
        });
        Ok((catalog?, selected))
    }

    pub async fn save_user_conditions(
        &self,
        user_id: UserId,
        condition_ids: Vec<ConditionId>,
    ) -> Result<(), ApiFailure> {
        self.api
            .set_user_conditions(user_id, &UserConditionRequest { condition_ids })
            .await
    }

    pub async fn safe_foods(&self, user_id: UserId) -> Result<Vec<Food>, ApiFailure> {
        self.api.safe_foods(user_id).await
    }

    pub async fn safe_recipes(&self, user_id: UserId) -> Result<Vec<Recipe>, ApiFailure> {
        self.api.safe_recipes(user_id).await
    }

    /// Safe foods and recipes, fetched concurrently.
    pub async fn suggestions(
        &self,
        user_id: UserId,
    ) -> Result<(Vec<Food>, Vec<Recipe>), ApiFailure> {
        tokio::try_join!(self.safe_foods(user_id), self.safe_recipes(user_id))
    }

    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), ApiFailure> {
        self.api
            .change_password(&ChangePasswordRequest {
                old_password: old_password.to_owned(),
                new_password: new_password.to_owned(),
                confirm_password: confirm_password.to_owned(),
            })
            .await
    }

    pub async fn stats(&self) -> Result<Stats, ApiFailure> {
        self.api.stats().await
    }

    /// Whether an access token is still held; the pipeline clears it when a
    /// refresh is rejected.
    pub fn session_active(&self) -> bool {
        self.tokens.has_session()
    }

    fn persist(&self, response: &AuthResponse) {
        let Some((access, refresh)) = response.token_pair() else {
            tracing::warn!(?response, "auth response without a complete token pair");
            return;
        };
        if let Err(e) = self.tokens.save_tokens(access, refresh) {
            // The in-memory session is live, so the user can carry on.
            tracing::error!(error = %e, "failed to persist session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{empty_response, json_response, token_pair, MockTransport};

    fn repository(transport: Arc<MockTransport>) -> Repository {
        Repository::build(
            transport,
            Arc::new(TokenStore::in_memory()),
            &ClientConfig::new("https://api.example.com"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn login_persists_complete_pair_and_me_succeeds() {
        let transport = MockTransport::new(|req| match req.url().path() {
            "/api/auth/login" => Ok(json_response(200, token_pair("acc", "ref"))),
            "/api/auth/me" if req.bearer_token() == Some("acc") => Ok(json_response(
                200,
                serde_json::json!({"id": 7, "username": "ana", "role": "ROLE_USER"}),
            )),
            _ => Ok(empty_response(401)),
        })
        .into_arc();
        let repo = repository(transport);

        repo.login("ana@example.com", "secret123").await.unwrap();
        let session = repo.tokens().session().unwrap();
        assert_eq!(session.access_token().expose_secret(), "acc");
        assert_eq!(session.refresh_token().expose_secret(), "ref");

        let user = repo.me().await.unwrap();
        assert_eq!(user.id, Some(7));
    }

    #[tokio::test]
    async fn login_without_pair_stores_nothing() {
        let transport = MockTransport::new(|_| {
            Ok(json_response(200, serde_json::json!({"accessToken": "a"})))
        })
        .into_arc();
        let repo = repository(transport);

        repo.login("a@b.c", "secret123").await.unwrap();
        assert!(!repo.session_active());
    }

    #[tokio::test]
    async fn register_persists_pair() {
        let transport = MockTransport::new(|req| {
            assert_eq!(req.url().path(), "/api/auth/register");
            Ok(json_response(201, token_pair("a", "r")))
        })
        .into_arc();
        let repo = repository(transport);

        repo.register("ana", "ana@example.com", "secret123")
            .await
            .unwrap();
        assert!(repo.session_active());
    }

    #[tokio::test]
    async fn logout_clears_even_when_backend_fails() {
        let transport = MockTransport::new(|_| Ok(empty_response(500))).into_arc();
        let repo = repository(transport.clone());
        repo.tokens().save_tokens("a", "r").unwrap();

        repo.logout().await.unwrap();
        assert!(!repo.session_active());
        assert_eq!(transport.count("/api/auth/logout"), 1);
    }

    #[tokio::test]
    async fn logout_without_refresh_token_skips_backend() {
        let transport = MockTransport::new(|_| Ok(empty_response(204))).into_arc();
        let repo = repository(transport.clone());

        repo.logout().await.unwrap();
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn suggestions_fetches_both_lists() {
        let transport = MockTransport::new(|req| match req.url().path() {
            "/api/users/3/safe-foods" => Ok(json_response(
                200,
                serde_json::json!([{"id": 1, "name": "Arroz", "category": "CEREAL"}]),
            )),
            "/api/users/3/safe-recipes" => Ok(json_response(
                200,
                serde_json::json!([{"id": 9, "title": "Arroz con verduras"}]),
            )),
            _ => Ok(empty_response(404)),
        })
        .into_arc();
        let repo = repository(transport);

        let (foods, recipes) = repo.suggestions(3).await.unwrap();
        assert_eq!(foods.len(), 1);
        assert_eq!(recipes[0].title.as_deref(), Some("Arroz con verduras"));
    }

    #[tokio::test]
    async fn overview_tolerates_missing_selection() {
        let transport = MockTransport::new(|req| match req.url().path() {
            "/api/conditions" => Ok(json_response(
                200,
                serde_json::json!([{"id": 1, "name": "Diabetes", "conditionType": "CHRONIC"}]),
            )),
            _ => Ok(json_response(500, serde_json::json!({"code": "INTERNAL_ERROR"}))),
        })
        .into_arc();
        let repo = repository(transport);

        let (catalog, selected) = repo.condition_overview(3).await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(selected.is_empty());
    }

    #[tokio::test]
    async fn overview_fails_without_catalog() {
        let transport = MockTransport::new(|req| match req.url().path() {
            "/api/users/3/conditions" => Ok(json_response(200, serde_json::json!([]))),
            _ => Ok(empty_response(503)),
        })
        .into_arc();
        let repo = repository(transport);

        let failure = repo.condition_overview(3).await.unwrap_err();
        assert_eq!(failure.status, Some(503));
    }

    #[tokio::test]
    async fn suggestions_fail_if_either_fails() {
        let transport = MockTransport::new(|req| match req.url().path() {
            "/api/users/3/safe-foods" => Ok(json_response(200, serde_json::json!([]))),
            _ => Ok(json_response(500, serde_json::json!({"code": "INTERNAL_ERROR"}))),
        })
        .into_arc();
        let repo = repository(transport);

        let failure = repo.suggestions(3).await.unwrap_err();
        assert_eq!(failure.code(), Some("INTERNAL_ERROR"));
    }
}
