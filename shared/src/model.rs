//! Per-screen view state.
//!
//! Each holder owns its `loading` flag and every completion path (success or
//! failure) clears it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::{Condition, ConditionId, Food, Recipe, Stats, User, UserId};
use crate::error::ApiFailure;
use crate::event::Password;
use crate::MIN_PASSWORD_LENGTH;

pub const LOGIN_SUCCESS_MESSAGE: &str = "Inicio de sesión exitoso";
pub const REGISTER_SUCCESS_MESSAGE: &str = "Registro exitoso";
pub const PASSWORD_CHANGED_MESSAGE: &str = "Contraseña cambiada exitosamente";
pub const FIX_FIELDS_MESSAGE: &str = "Por favor corrige los campos resaltados";
pub const CONDITIONS_LOAD_ERROR: &str = "No se pudo cargar las condiciones";
pub const CONDITIONS_SAVE_ERROR: &str = "No se pudo guardar las condiciones";

// --- Navigation ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Route {
    #[default]
    Loading,
    Login,
    Register,
    ConditionSelection,
    Home,
    RecipeDetail,
    Profile,
    Stats,
}

impl Route {
    #[must_use]
    pub const fn requires_session(self) -> bool {
        !matches!(self, Self::Loading | Self::Login | Self::Register)
    }

    /// The navigation entry this route lives under, if any.
    #[must_use]
    pub const fn destination(self) -> Option<Destination> {
        match self {
            Self::ConditionSelection => Some(Destination::ConditionSelection),
            Self::Home | Self::RecipeDetail => Some(Destination::Home),
            Self::Profile => Some(Destination::Profile),
            Self::Stats => Some(Destination::Summary),
            Self::Loading | Self::Login | Self::Register => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Destination {
    Home,
    ConditionSelection,
    Profile,
    Summary,
}

const ADMIN_DESTINATIONS: &[Destination] = &[Destination::Summary, Destination::Profile];
const USER_DESTINATIONS: &[Destination] = &[
    Destination::ConditionSelection,
    Destination::Home,
    Destination::Profile,
];

impl Destination {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Home => "Sugerencias",
            Self::ConditionSelection => "Condiciones",
            Self::Profile => "Perfil",
            Self::Summary => "Resumen",
        }
    }

    #[must_use]
    pub const fn route(self) -> Route {
        match self {
            Self::Home => Route::Home,
            Self::ConditionSelection => Route::ConditionSelection,
            Self::Profile => Route::Profile,
            Self::Summary => Route::Stats,
        }
    }

    /// Navigation entries in display order; the first is the landing one.
    #[must_use]
    pub const fn visible(is_admin: bool) -> &'static [Destination] {
        if is_admin {
            ADMIN_DESTINATIONS
        } else {
            USER_DESTINATIONS
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// Start-up, before the shell has said whether tokens exist.
    #[default]
    Unknown,
    Unauthenticated,
    Authenticated,
}

// --- Transient messages ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Error,
}

impl ToastKind {
    #[must_use]
    pub const fn default_duration_ms(self) -> u64 {
        match self {
            Self::Info => 3000,
            Self::Success => 2000,
            Self::Error => 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToastMessage {
    pub message: String,
    pub kind: ToastKind,
}

impl ToastMessage {
    pub fn new(message: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

// --- Form state (login, register, change password) ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthForm {
    pub loading: bool,
    pub error: Option<String>,
    pub field_errors: BTreeMap<String, String>,
}

impl AuthForm {
    pub fn start(&mut self) {
        self.loading = true;
        self.error = None;
        self.field_errors.clear();
    }

    /// Back to a blank, idle form.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn succeed(&mut self) {
        self.reset();
    }

    /// Field errors from the body win; then a field inferred from the error
    /// code; the banner is used only when no field can be blamed.
    pub fn fail(&mut self, failure: &ApiFailure) {
        self.loading = false;
        let mut fields = failure.field_errors();
        if fields.is_empty() {
            if let Some(field) = failure.inferred_field() {
                fields.insert(field.to_owned(), failure.user_message());
            }
        }
        self.error = fields.is_empty().then(|| failure.user_message());
        self.field_errors = fields;
    }

    /// Local validation failed; nothing was sent.
    pub fn reject(&mut self, field_errors: BTreeMap<String, String>) {
        self.loading = false;
        self.error = None;
        self.field_errors = field_errors;
    }

    #[must_use]
    pub fn field_error(&self, field: &str) -> Option<&str> {
        self.field_errors.get(field).map(String::as_str)
    }
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Client-side checks run before a registration request.
#[must_use]
pub fn validate_registration(
    username: &str,
    email: &str,
    password: &Password,
) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    if username.trim().is_empty() {
        errors.insert(
            "username".to_owned(),
            "El nombre de usuario es obligatorio".to_owned(),
        );
    }
    if !looks_like_email(email.trim()) {
        errors.insert(
            "email".to_owned(),
            "Proporciona un correo electrónico válido".to_owned(),
        );
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        errors.insert(
            "password".to_owned(),
            format!("La contraseña debe tener al menos {MIN_PASSWORD_LENGTH} caracteres"),
        );
    }
    errors
}

// --- Conditions ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionsState {
    pub catalog: Vec<Condition>,
    pub selected: Vec<Condition>,
    pub query: String,
    pub loading: bool,
    pub error: Option<String>,
}

impl ConditionsState {
    pub fn start(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub fn load_overview(&mut self, catalog: Vec<Condition>, selected: Vec<Condition>) {
        self.loading = false;
        self.catalog = catalog;
        self.selected = selected;
    }

    pub fn load_catalog(&mut self, catalog: Vec<Condition>) {
        self.loading = false;
        self.catalog = catalog;
        self.selected.clear();
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.loading = false;
        self.error = Some(message.into());
    }

    /// Finishes a save; the selection stays as the user left it.
    pub fn saved(&mut self) {
        self.loading = false;
    }

    /// Adds a catalog entry to the selection. Unknown ids and duplicates are
    /// ignored.
    pub fn add(&mut self, id: ConditionId) -> bool {
        if self.is_selected(id) {
            return false;
        }
        match self.catalog.iter().find(|c| c.id == id) {
            Some(condition) => {
                self.selected.push(condition.clone());
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: ConditionId) -> bool {
        let before = self.selected.len();
        self.selected.retain(|c| c.id != id);
        self.selected.len() != before
    }

    #[must_use]
    pub fn is_selected(&self, id: ConditionId) -> bool {
        self.selected.iter().any(|c| c.id == id)
    }

    /// Catalog entries whose name contains the query, ignoring case.
    pub fn filtered(&self) -> impl Iterator<Item = &Condition> {
        let query = self.query.trim().to_lowercase();
        self.catalog
            .iter()
            .filter(move |c| query.is_empty() || c.name.to_lowercase().contains(&query))
    }

    #[must_use]
    pub fn can_save(&self) -> bool {
        !self.selected.is_empty() && !self.loading
    }

    #[must_use]
    pub fn selected_ids(&self) -> Vec<ConditionId> {
        self.selected.iter().map(|c| c.id).collect()
    }
}

// --- Suggestions ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionsState {
    pub foods: Vec<Food>,
    pub recipes: Vec<Recipe>,
    pub loading: bool,
    pub error: Option<String>,
}

impl SuggestionsState {
    pub fn start(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub fn load(&mut self, foods: Vec<Food>, recipes: Vec<Recipe>) {
        self.loading = false;
        self.foods = foods;
        self.recipes = recipes;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.loading = false;
        self.error = Some(message.into());
    }
}

// --- Admin stats ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsState {
    pub stats: Option<Stats>,
    pub loading: bool,
    pub error: Option<String>,
}

impl StatsState {
    pub fn start(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub fn load(&mut self, stats: Stats) {
        self.loading = false;
        self.stats = Some(stats);
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.loading = false;
        self.error = Some(message.into());
    }

    /// Nothing loaded, nothing in flight and no error on screen.
    #[must_use]
    pub fn needs_load(&self) -> bool {
        self.stats.is_none() && !self.loading && self.error.is_none()
    }

    #[must_use]
    pub fn count(&self, key: &str) -> i64 {
        self.stats
            .as_ref()
            .and_then(|s| s.get(key).copied())
            .unwrap_or(0)
    }
}

// --- Application model ---

#[derive(Debug, Default)]
pub struct Model {
    pub route: Route,
    pub session: SessionState,
    /// Bumped whenever a session starts or ends; stale session-watch ticks
    /// carry an older value.
    pub generation: u64,
    pub user: Option<User>,
    pub login: AuthForm,
    pub register: AuthForm,
    pub password: AuthForm,
    pub password_dialog_open: bool,
    pub conditions: ConditionsState,
    pub suggestions: SuggestionsState,
    pub stats: StatsState,
    pub selected_recipe: Option<Recipe>,
    pub message: Option<ToastMessage>,
}

impl Model {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session == SessionState::Authenticated
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(User::is_admin)
    }

    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.user.as_ref().and_then(|u| u.id)
    }

    #[must_use]
    pub fn visible_destinations(&self) -> &'static [Destination] {
        Destination::visible(self.is_admin())
    }

    /// Where a request to show `route` actually lands.
    #[must_use]
    pub fn resolve(&self, route: Route) -> Route {
        if route.requires_session() && !self.is_authenticated() {
            return Route::Login;
        }
        if route == Route::RecipeDetail && self.selected_recipe.is_none() {
            return Route::Home;
        }
        match route.destination() {
            Some(dest) if !self.visible_destinations().contains(&dest) => self
                .visible_destinations()
                .first()
                .map_or(Route::Home, |d| d.route()),
            _ => route,
        }
    }

    /// Navigates and returns the route actually shown.
    pub fn navigate(&mut self, route: Route) -> Route {
        let target = self.resolve(route);
        if target != Route::RecipeDetail {
            self.selected_recipe = None;
        }
        self.route = target;
        target
    }

    pub fn begin_session(&mut self) {
        self.session = SessionState::Authenticated;
        self.generation += 1;
        self.route = Route::Loading;
    }

    /// Drops everything tied to the signed-in user and shows login.
    pub fn end_session(&mut self) {
        let generation = self.generation + 1;
        let message = self.message.take();
        *self = Self {
            session: SessionState::Unauthenticated,
            generation,
            route: Route::Login,
            message,
            ..Self::default()
        };
    }

    pub fn notify(&mut self, message: impl Into<String>, kind: ToastKind) {
        self.message = Some(ToastMessage::new(message, kind));
    }
}
