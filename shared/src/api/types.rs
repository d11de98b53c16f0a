//! Wire shapes of the backend REST API (camelCase JSON).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ADMIN_ROLE;

pub type UserId = i64;
pub type ConditionId = i32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConditionRequest {
    pub condition_ids: Vec<ConditionId>,
}

fn default_token_type() -> Option<String> {
    Some("Bearer".to_string())
}

/// Tokens are optional on the wire; only a complete pair counts as a session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

impl AuthResponse {
    /// `(access, refresh)` when both are present and non-empty.
    pub fn token_pair(&self) -> Option<(&str, &str)> {
        let access = self.access_token.as_deref().filter(|t| !t.is_empty())?;
        let refresh = self.refresh_token.as_deref().filter(|t| !t.is_empty())?;
        Some((access, refresh))
    }
}

impl std::fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthResponse")
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("user_id", &self.user_id)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: Option<UserId>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub id: ConditionId,
    pub name: String,
    pub condition_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Food {
    pub id: i32,
    pub name: String,
    pub category: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    #[serde(default)]
    pub food_id: Option<i32>,
    #[serde(default)]
    pub food_name: Option<String>,
    #[serde(default)]
    pub quantity: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    #[serde(default)]
    pub id: Option<i32>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Option<String>,
    #[serde(default)]
    pub ingredients: Option<Vec<Ingredient>>,
}

/// Admin dashboard counters keyed by entity name.
pub type Stats = BTreeMap<String, i64>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_response_incomplete_pair() {
        let full: AuthResponse =
            serde_json::from_str(r#"{"accessToken": "a", "refreshToken": "r"}"#).unwrap();
        assert_eq!(full.token_pair(), Some(("a", "r")));
        assert_eq!(full.token_type.as_deref(), Some("Bearer"));

        let partial: AuthResponse = serde_json::from_str(r#"{"accessToken": "a"}"#).unwrap();
        assert_eq!(partial.token_pair(), None);

        let empty: AuthResponse =
            serde_json::from_str(r#"{"accessToken": "", "refreshToken": "r"}"#).unwrap();
        assert_eq!(empty.token_pair(), None);
    }

    #[test]
    fn auth_response_debug_hides_tokens() {
        let resp: AuthResponse =
            serde_json::from_str(r#"{"accessToken": "top-secret", "refreshToken": "r"}"#).unwrap();
        assert!(!format!("{resp:?}").contains("top-secret"));
    }

    #[test]
    fn requests_serialize_camel_case() {
        let body = serde_json::to_value(ChangePasswordRequest {
            old_password: "a".into(),
            new_password: "b".into(),
            confirm_password: "b".into(),
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"oldPassword": "a", "newPassword": "b", "confirmPassword": "b"})
        );

        let body = serde_json::to_value(UserConditionRequest {
            condition_ids: vec![1, 2],
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"conditionIds": [1, 2]}));
    }

    #[test]
    fn user_admin_role() {
        let admin: User = serde_json::from_str(r#"{"id": 1, "role": "ROLE_ADMIN"}"#).unwrap();
        assert!(admin.is_admin());

        let user: User = serde_json::from_str(r#"{"id": 2, "role": "ROLE_USER"}"#).unwrap();
        assert!(!user.is_admin());
        assert!(!User::default().is_admin());
    }

    #[test]
    fn recipe_tolerates_missing_fields() {
        let recipe: Recipe = serde_json::from_str(
            r#"{"title": "Sopa", "ingredients": [{"foodName": "Zanahoria"}], "extra": true}"#,
        )
        .unwrap();
        assert_eq!(recipe.title.as_deref(), Some("Sopa"));
        assert_eq!(recipe.id, None);
        let ingredients = recipe.ingredients.unwrap();
        assert_eq!(ingredients[0].food_name.as_deref(), Some("Zanahoria"));
    }

    #[test]
    fn condition_uses_condition_type_key() {
        let c: Condition =
            serde_json::from_str(r#"{"id": 3, "name": "Celiaquía", "conditionType": "ALLERGY"}"#)
                .unwrap();
        assert_eq!(c.condition_type, "ALLERGY");
    }
}
