//! Shell-side execution of the core's effects.
//!
//! A Rust shell (or a test harness) hands every `Api` and `Timer` request it
//! receives from the core to an [`EffectExecutor`], then resolves the request
//! with the returned value.

use std::sync::Arc;

use crate::capabilities::{ApiOperation, ApiOutput, ApiResult, TimerOperation, TimerOutput};
use crate::config::ClientConfig;
use crate::error::{ApiFailure, ErrorKind};
use crate::http::HttpError;
use crate::repository::Repository;
use crate::token_store::TokenStore;
use crate::transport::Transport;

pub struct EffectExecutor {
    repository: Arc<Repository>,
}

impl EffectExecutor {
    pub fn new(repository: Arc<Repository>) -> Self {
        Self { repository }
    }

    pub fn build(
        transport: Arc<dyn Transport>,
        tokens: Arc<TokenStore>,
        config: &ClientConfig,
    ) -> Result<Self, HttpError> {
        let repository = Repository::build(transport, tokens, config)?;
        Ok(Self::new(Arc::new(repository)))
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }

    pub async fn execute_api(&self, operation: ApiOperation) -> ApiResult {
        let name = operation.name();
        let guarded = uses_session(&operation);
        tracing::debug!(operation = name, "executing");
        let result = match self.dispatch(operation).await {
            // The pipeline drops the tokens once a refresh is refused. A 401
            // with the tokens still in place is an ordinary failure.
            Err(failure)
                if guarded
                    && failure.kind == ErrorKind::Authentication
                    && !self.repository.session_active() =>
            {
                Err(ApiFailure::session_expired())
            }
            other => other,
        };
        if let Err(failure) = &result {
            tracing::debug!(operation = name, error = %failure, "operation failed");
        }
        result
    }

    async fn dispatch(&self, operation: ApiOperation) -> ApiResult {
        let repo = &self.repository;
        match operation {
            ApiOperation::SessionStatus => Ok(ApiOutput::SessionActive(repo.session_active())),

            ApiOperation::Login { email, password } => {
                let response = repo.login(&email, password.expose()).await?;
                Ok(ApiOutput::Authenticated {
                    user_id: response.user_id,
                })
            }

            ApiOperation::Register {
                username,
                email,
                password,
            } => {
                let response = repo.register(&username, &email, password.expose()).await?;
                Ok(ApiOutput::Authenticated {
                    user_id: response.user_id,
                })
            }

            ApiOperation::Logout => {
                repo.logout().await?;
                Ok(ApiOutput::Done)
            }

            ApiOperation::Me => Ok(ApiOutput::User(repo.me().await?)),

            ApiOperation::Conditions => Ok(ApiOutput::ConditionList(repo.conditions().await?)),

            ApiOperation::ConditionOverview { user_id } => {
                let (catalog, selected) = repo.condition_overview(user_id).await?;
                Ok(ApiOutput::Conditions { catalog, selected })
            }

            ApiOperation::SaveUserConditions {
                user_id,
                condition_ids,
            } => {
                repo.save_user_conditions(user_id, condition_ids).await?;
                Ok(ApiOutput::Done)
            }

            ApiOperation::Suggestions { user_id } => {
                let (foods, recipes) = repo.suggestions(user_id).await?;
                Ok(ApiOutput::Suggestions { foods, recipes })
            }

            ApiOperation::ChangePassword {
                old_password,
                new_password,
                confirm_password,
            } => {
                repo.change_password(
                    old_password.expose(),
                    new_password.expose(),
                    confirm_password.expose(),
                )
                .await?;
                Ok(ApiOutput::Done)
            }

            ApiOperation::Stats => Ok(ApiOutput::Stats(repo.stats().await?)),
        }
    }

    pub async fn run_timer(&self, operation: TimerOperation) -> TimerOutput {
        tokio::time::sleep(operation.duration()).await;
        TimerOutput::Elapsed
    }
}

/// Operations sent on behalf of a signed-in user.
fn uses_session(operation: &ApiOperation) -> bool {
    !matches!(
        operation,
        ApiOperation::SessionStatus
            | ApiOperation::Login { .. }
            | ApiOperation::Register { .. }
            | ApiOperation::Logout
    )
}
