//! Backend operations the core hands to the shell.
//!
//! The shell runs each [`ApiOperation`] against the repository (see
//! [`crate::executor::EffectExecutor`]) and answers with an [`ApiResult`].
//! Tokens never cross this boundary; a successful login only reports who
//! logged in.

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

use crate::api::{Condition, ConditionId, Food, Recipe, Stats, User, UserId};
use crate::error::ApiFailure;
use crate::event::Password;

pub struct Api<Ev> {
    context: CapabilityContext<ApiOperation, Ev>,
}

impl<Ev> Capability<Ev> for Api<Ev> {
    type Operation = ApiOperation;
    type MappedSelf<MappedEv> = Api<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Api::new(self.context.map_event(f))
    }
}

impl<Ev> Api<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<ApiOperation, Ev>) -> Self {
        Self { context }
    }

    /// Sends `operation` to the shell and feeds its answer back as an event.
    pub fn request<F>(&self, operation: ApiOperation, make_event: F)
    where
        F: FnOnce(ApiResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx.request_from_shell(operation).await;
            ctx.update_app(make_event(result));
        });
    }

    /// A shell that cannot answer counts as "no session".
    pub fn session_status<F>(&self, make_event: F)
    where
        F: FnOnce(bool) -> Ev + Send + 'static,
    {
        self.request(ApiOperation::SessionStatus, move |result| {
            make_event(matches!(result, Ok(ApiOutput::SessionActive(true))))
        });
    }

    pub fn login<F>(&self, email: String, password: Password, make_event: F)
    where
        F: FnOnce(Result<Option<UserId>, ApiFailure>) -> Ev + Send + 'static,
    {
        self.request(ApiOperation::Login { email, password }, move |result| {
            make_event(typed(result, |output| match output {
                ApiOutput::Authenticated { user_id } => Some(user_id),
                _ => None,
            }))
        });
    }

    pub fn register<F>(&self, username: String, email: String, password: Password, make_event: F)
    where
        F: FnOnce(Result<Option<UserId>, ApiFailure>) -> Ev + Send + 'static,
    {
        let operation = ApiOperation::Register {
            username,
            email,
            password,
        };
        self.request(operation, move |result| {
            make_event(typed(result, |output| match output {
                ApiOutput::Authenticated { user_id } => Some(user_id),
                _ => None,
            }))
        });
    }

    pub fn logout<F>(&self, make_event: F)
    where
        F: FnOnce(Result<(), ApiFailure>) -> Ev + Send + 'static,
    {
        self.request(ApiOperation::Logout, move |result| {
            make_event(typed(result, done))
        });
    }

    pub fn me<F>(&self, make_event: F)
    where
        F: FnOnce(Result<User, ApiFailure>) -> Ev + Send + 'static,
    {
        self.request(ApiOperation::Me, move |result| {
            make_event(typed(result, |output| match output {
                ApiOutput::User(user) => Some(user),
                _ => None,
            }))
        });
    }

    pub fn conditions<F>(&self, make_event: F)
    where
        F: FnOnce(Result<Vec<Condition>, ApiFailure>) -> Ev + Send + 'static,
    {
        self.request(ApiOperation::Conditions, move |result| {
            make_event(typed(result, |output| match output {
                ApiOutput::ConditionList(catalog) => Some(catalog),
                _ => None,
            }))
        });
    }

    pub fn condition_overview<F>(&self, user_id: UserId, make_event: F)
    where
        F: FnOnce(Result<(Vec<Condition>, Vec<Condition>), ApiFailure>) -> Ev + Send + 'static,
    {
        self.request(ApiOperation::ConditionOverview { user_id }, move |result| {
            make_event(typed(result, |output| match output {
                ApiOutput::Conditions { catalog, selected } => Some((catalog, selected)),
                _ => None,
            }))
        });
    }

    pub fn save_user_conditions<F>(
        &self,
        user_id: UserId,
        condition_ids: Vec<ConditionId>,
        make_event: F,
    ) where
        F: FnOnce(Result<(), ApiFailure>) -> Ev + Send + 'static,
    {
        let operation = ApiOperation::SaveUserConditions {
            user_id,
            condition_ids,
        };
        self.request(operation, move |result| make_event(typed(result, done)));
    }

    pub fn suggestions<F>(&self, user_id: UserId, make_event: F)
    where
        F: FnOnce(Result<(Vec<Food>, Vec<Recipe>), ApiFailure>) -> Ev + Send + 'static,
    {
        self.request(ApiOperation::Suggestions { user_id }, move |result| {
            make_event(typed(result, |output| match output {
                ApiOutput::Suggestions { foods, recipes } => Some((foods, recipes)),
                _ => None,
            }))
        });
    }

    pub fn change_password<F>(
        &self,
        old_password: Password,
        new_password: Password,
        confirm_password: Password,
        make_event: F,
    ) where
        F: FnOnce(Result<(), ApiFailure>) -> Ev + Send + 'static,
    {
        let operation = ApiOperation::ChangePassword {
            old_password,
            new_password,
            confirm_password,
        };
        self.request(operation, move |result| make_event(typed(result, done)));
    }

    pub fn stats<F>(&self, make_event: F)
    where
        F: FnOnce(Result<Stats, ApiFailure>) -> Ev + Send + 'static,
    {
        self.request(ApiOperation::Stats, move |result| {
            make_event(typed(result, |output| match output {
                ApiOutput::Stats(stats) => Some(stats),
                _ => None,
            }))
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiOperation {
    SessionStatus,
    Login {
        email: String,
        password: Password,
    },
    Register {
        username: String,
        email: String,
        password: Password,
    },
    Logout,
    Me,
    /// Catalog only, for when the current user is unknown.
    Conditions,
    ConditionOverview {
        user_id: UserId,
    },
    SaveUserConditions {
        user_id: UserId,
        condition_ids: Vec<ConditionId>,
    },
    Suggestions {
        user_id: UserId,
    },
    ChangePassword {
        old_password: Password,
        new_password: Password,
        confirm_password: Password,
    },
    Stats,
}

impl ApiOperation {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SessionStatus => "session_status",
            Self::Login { .. } => "login",
            Self::Register { .. } => "register",
            Self::Logout => "logout",
            Self::Me => "me",
            Self::Conditions => "conditions",
            Self::ConditionOverview { .. } => "condition_overview",
            Self::SaveUserConditions { .. } => "save_user_conditions",
            Self::Suggestions { .. } => "suggestions",
            Self::ChangePassword { .. } => "change_password",
            Self::Stats => "stats",
        }
    }
}

impl Operation for ApiOperation {
    type Output = ApiResult;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiOutput {
    SessionActive(bool),
    Authenticated { user_id: Option<UserId> },
    Done,
    User(User),
    ConditionList(Vec<Condition>),
    Conditions {
        catalog: Vec<Condition>,
        selected: Vec<Condition>,
    },
    Suggestions {
        foods: Vec<Food>,
        recipes: Vec<Recipe>,
    },
    Stats(Stats),
}

pub type ApiResult = Result<ApiOutput, ApiFailure>;

fn done(output: ApiOutput) -> Option<()> {
    matches!(output, ApiOutput::Done).then_some(())
}

/// Narrows a shell answer to the shape the caller asked for. A mismatched
/// answer is a shell bug and surfaces as a decode failure.
fn typed<T>(result: ApiResult, pick: impl FnOnce(ApiOutput) -> Option<T>) -> Result<T, ApiFailure> {
    let output = result?;
    pick(output).ok_or_else(|| ApiFailure::decode("unexpected output for operation"))
}
