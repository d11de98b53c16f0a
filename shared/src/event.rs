use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

use crate::api::{Condition, ConditionId, Food, Recipe, Stats, User, UserId};
use crate::error::ApiFailure;
use crate::model::{Destination, Route};

// --- Password wrapper: redacts Debug, zeroizes on Drop ---

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for Password {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

// --- Event enum: user intents first, then shell answers ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Lifecycle
    Start,

    // Auth
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

    // Navigation
    Navigate(Route),
    SelectDestination(Destination),
    OpenRecipe {
        index: usize,
    },
    CloseRecipe,
    DismissMessage,

    // Conditions
    ConditionQueryChanged(String),
    AddCondition(ConditionId),
    RemoveCondition(ConditionId),
    SaveConditions,

    // Suggestions, profile, admin
    RefreshSuggestions,
    OpenChangePassword,
    CloseChangePassword,
    ChangePassword {
        old_password: Password,
        new_password: Password,
        confirm_password: Password,
    },
    LoadStats,

    // Shell answers
    SessionChecked(bool),
    LoggedIn(Result<Option<UserId>, ApiFailure>),
    Registered(Result<Option<UserId>, ApiFailure>),
    LoggedOut(Result<(), ApiFailure>),
    UserLoaded(Result<User, ApiFailure>),
    CatalogLoaded(Result<Vec<Condition>, ApiFailure>),
    ConditionsLoaded(Result<(Vec<Condition>, Vec<Condition>), ApiFailure>),
    ConditionsSaved(Result<(), ApiFailure>),
    SuggestionsLoaded(Result<(Vec<Food>, Vec<Recipe>), ApiFailure>),
    PasswordChanged(Result<(), ApiFailure>),
    StatsLoaded(Result<Stats, ApiFailure>),

    // Session watch, tagged with the session generation that scheduled it
    SessionTick {
        generation: u64,
    },
    SessionPolled {
        generation: u64,
        active: bool,
    },
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Login { .. } => "login",
            Self::Register { .. } => "register",
            Self::Logout => "logout",
            Self::Navigate(_) => "navigate",
            Self::SelectDestination(_) => "select_destination",
            Self::OpenRecipe { .. } => "open_recipe",
            Self::CloseRecipe => "close_recipe",
            Self::DismissMessage => "dismiss_message",
            Self::ConditionQueryChanged(_) => "condition_query_changed",
            Self::AddCondition(_) => "add_condition",
            Self::RemoveCondition(_) => "remove_condition",
            Self::SaveConditions => "save_conditions",
            Self::RefreshSuggestions => "refresh_suggestions",
            Self::OpenChangePassword => "open_change_password",
            Self::CloseChangePassword => "close_change_password",
            Self::ChangePassword { .. } => "change_password",
            Self::LoadStats => "load_stats",
            Self::SessionChecked(_) => "session_checked",
            Self::LoggedIn(_) => "logged_in",
            Self::Registered(_) => "registered",
            Self::LoggedOut(_) => "logged_out",
            Self::UserLoaded(_) => "user_loaded",
            Self::CatalogLoaded(_) => "catalog_loaded",
            Self::ConditionsLoaded(_) => "conditions_loaded",
            Self::ConditionsSaved(_) => "conditions_saved",
            Self::SuggestionsLoaded(_) => "suggestions_loaded",
            Self::PasswordChanged(_) => "password_changed",
            Self::StatsLoaded(_) => "stats_loaded",
            Self::SessionTick { .. } => "session_tick",
            Self::SessionPolled { .. } => "session_polled",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::Login { .. }
                | Self::Register { .. }
                | Self::Logout
                | Self::Navigate(_)
                | Self::SelectDestination(_)
                | Self::OpenRecipe { .. }
                | Self::CloseRecipe
                | Self::DismissMessage
                | Self::ConditionQueryChanged(_)
                | Self::AddCondition(_)
                | Self::RemoveCondition(_)
                | Self::SaveConditions
                | Self::RefreshSuggestions
                | Self::OpenChangePassword
                | Self::CloseChangePassword
                | Self::ChangePassword { .. }
                | Self::LoadStats
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_debug_is_redacted() {
        let p = Password::new("super_secret");
        assert_eq!(format!("{p:?}"), "[REDACTED]");
        assert_eq!(p.expose(), "super_secret");
    }

    #[test]
    fn password_length_counts_characters() {
        assert_eq!(Password::new("contraseña").len(), 10);
        assert!(Password::new("").is_empty());
    }

    #[test]
    fn login_event_debug_hides_password() {
        let event = Event::Login {
            email: "ana@example.com".into(),
            password: Password::new("hunter22"),
        };
        assert!(!format!("{event:?}").contains("hunter22"));
    }

    #[test]
    fn event_names() {
        assert_eq!(Event::Start.name(), "start");
        assert_eq!(Event::SessionTick { generation: 1 }.name(), "session_tick");
        assert_eq!(Event::LoggedOut(Ok(())).name(), "logged_out");
    }

    #[test]
    fn answers_are_not_user_initiated() {
        assert!(Event::Logout.is_user_initiated());
        assert!(Event::SaveConditions.is_user_initiated());
        assert!(!Event::Start.is_user_initiated());
        assert!(!Event::SessionChecked(true).is_user_initiated());
        assert!(!Event::SessionPolled {
            generation: 0,
            active: false
        }
        .is_user_initiated());
    }

    #[test]
    fn event_carries_failure_through_serde() {
        let event = Event::StatsLoaded(Err(ApiFailure::network("offline")));
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
