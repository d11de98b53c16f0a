//! Render-ready screens derived from the [`Model`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::{ConditionId, Recipe};
use crate::model::{AuthForm, Destination, Model, Route, ToastKind, ToastMessage};

pub const LOADING_SUGGESTIONS_TEXT: &str = "Cargando sugerencias...";
pub const NO_SAFE_FOODS_TEXT: &str = "No hay comidas seguras disponibles.";
pub const NO_SAFE_RECIPES_TEXT: &str = "No hay recetas seguras disponibles.";
pub const NO_INGREDIENTS_TEXT: &str = "No hay ingredientes disponibles";
pub const NO_STEPS_TEXT: &str = "No hay pasos de preparación disponibles";
pub const STATS_TITLE: &str = "Resumen del sistema";
pub const RETRY_LABEL: &str = "Reintentar";

const UNNAMED: &str = "Sin nombre";
const UNTITLED: &str = "Sin título";
const NO_DESCRIPTION: &str = "Sin descripción";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewModel {
    pub screen: ScreenView,
    pub navigation: Vec<NavItem>,
    pub message: Option<ToastView>,
    pub is_authenticated: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScreenView {
    Loading,
    Login(FormView),
    Register(FormView),
    ConditionSelection(ConditionsView),
    Home(HomeView),
    RecipeDetail(RecipeView),
    Profile(ProfileView),
    Stats(StatsView),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NavItem {
    pub destination: Destination,
    pub label: String,
    pub selected: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastView {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl From<&ToastMessage> for ToastView {
    fn from(t: &ToastMessage) -> Self {
        Self {
            message: t.message.clone(),
            kind: t.kind,
            duration_ms: t.kind.default_duration_ms(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormView {
    pub loading: bool,
    pub error: Option<String>,
    pub field_errors: BTreeMap<String, String>,
}

impl From<&AuthForm> for FormView {
    fn from(form: &AuthForm) -> Self {
        Self {
            loading: form.loading,
            error: form.error.clone(),
            field_errors: form.field_errors.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConditionItem {
    pub id: ConditionId,
    pub name: String,
    pub selected: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConditionsView {
    pub query: String,
    pub results: Vec<ConditionItem>,
    pub selected: Vec<ConditionItem>,
    pub loading: bool,
    pub error: Option<String>,
    pub can_save: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FoodItem {
    pub name: String,
    pub category: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeItem {
    /// Position in the suggestion list; send it back with `OpenRecipe`.
    pub index: usize,
    pub title: String,
    pub description: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HomeView {
    pub loading: bool,
    pub status_text: Option<String>,
    pub foods: Vec<FoodItem>,
    pub foods_empty_text: Option<String>,
    pub recipes: Vec<RecipeItem>,
    pub recipes_empty_text: Option<String>,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngredientItem {
    pub name: String,
    pub quantity: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeView {
    pub title: String,
    pub description: String,
    pub ingredients: Vec<IngredientItem>,
    pub ingredients_empty_text: Option<String>,
    pub steps: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileView {
    pub username: String,
    pub email: String,
    pub dialog_open: bool,
    pub password_form: FormView,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatCard {
    pub title: String,
    pub value: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatsView {
    pub title: String,
    pub loading: bool,
    pub error: Option<String>,
    pub retry_label: Option<String>,
    pub cards: Vec<StatCard>,
}

const STAT_CARDS: &[(&str, &str)] = &[
    ("Usuarios", "users"),
    ("Recetas", "recipes"),
    ("Comidas", "foods"),
    ("Condiciones", "conditions"),
];

#[must_use]
pub fn build(model: &Model) -> ViewModel {
    let screen = match model.route {
        Route::Loading => ScreenView::Loading,
        Route::Login => ScreenView::Login(FormView::from(&model.login)),
        Route::Register => ScreenView::Register(FormView::from(&model.register)),
        Route::ConditionSelection => ScreenView::ConditionSelection(conditions_view(model)),
        Route::Home => ScreenView::Home(home_view(model)),
        Route::RecipeDetail => match &model.selected_recipe {
            Some(recipe) => ScreenView::RecipeDetail(recipe_view(recipe)),
            None => ScreenView::Home(home_view(model)),
        },
        Route::Profile => ScreenView::Profile(profile_view(model)),
        Route::Stats => ScreenView::Stats(stats_view(model)),
    };

    ViewModel {
        screen,
        navigation: navigation(model),
        message: model.message.as_ref().map(ToastView::from),
        is_authenticated: model.is_authenticated(),
    }
}

/// The bar is hidden outside the signed-in destinations and on the recipe
/// detail screen.
fn navigation(model: &Model) -> Vec<NavItem> {
    if !model.is_authenticated() || matches!(model.route, Route::Loading | Route::RecipeDetail) {
        return Vec::new();
    }
    let current = model.route.destination();
    model
        .visible_destinations()
        .iter()
        .map(|&destination| NavItem {
            destination,
            label: destination.label().to_owned(),
            selected: current == Some(destination),
        })
        .collect()
}

fn conditions_view(model: &Model) -> ConditionsView {
    let state = &model.conditions;
    let results = state
        .filtered()
        .map(|c| ConditionItem {
            id: c.id,
            name: c.name.clone(),
            selected: state.is_selected(c.id),
        })
        .collect();
    let selected = state
        .selected
        .iter()
        .map(|c| ConditionItem {
            id: c.id,
            name: c.name.clone(),
            selected: true,
        })
        .collect();
    ConditionsView {
        query: state.query.clone(),
        results,
        selected,
        loading: state.loading,
        error: state.error.clone(),
        can_save: state.can_save() && model.user_id().is_some(),
    }
}

fn home_view(model: &Model) -> HomeView {
    let state = &model.suggestions;
    let idle = !state.loading;
    let foods: Vec<FoodItem> = state
        .foods
        .iter()
        .map(|f| FoodItem {
            name: non_blank(&f.name).unwrap_or(UNNAMED).to_owned(),
            category: f.category.clone(),
        })
        .collect();
    let recipes: Vec<RecipeItem> = state
        .recipes
        .iter()
        .enumerate()
        .map(|(index, r)| RecipeItem {
            index,
            title: r.title.clone().unwrap_or_else(|| UNNAMED.to_owned()),
            description: r
                .description
                .clone()
                .unwrap_or_else(|| NO_DESCRIPTION.to_owned()),
        })
        .collect();

    HomeView {
        loading: state.loading,
        status_text: state.loading.then(|| LOADING_SUGGESTIONS_TEXT.to_owned()),
        foods_empty_text: (idle && foods.is_empty()).then(|| NO_SAFE_FOODS_TEXT.to_owned()),
        recipes_empty_text: (idle && recipes.is_empty()).then(|| NO_SAFE_RECIPES_TEXT.to_owned()),
        foods,
        recipes,
        error: state.error.clone(),
    }
}

fn recipe_view(recipe: &Recipe) -> RecipeView {
    let ingredients: Vec<IngredientItem> = recipe
        .ingredients
        .iter()
        .flatten()
        .enumerate()
        .map(|(i, ingredient)| IngredientItem {
            name: ingredient
                .food_name
                .clone()
                .unwrap_or_else(|| format!("Ingrediente {}", i + 1)),
            quantity: ingredient
                .quantity
                .as_deref()
                .and_then(non_blank)
                .map(str::to_owned),
        })
        .collect();

    RecipeView {
        title: recipe.title.clone().unwrap_or_else(|| UNTITLED.to_owned()),
        description: recipe
            .description
            .clone()
            .unwrap_or_else(|| NO_DESCRIPTION.to_owned()),
        ingredients_empty_text: ingredients
            .is_empty()
            .then(|| NO_INGREDIENTS_TEXT.to_owned()),
        ingredients,
        steps: recipe
            .steps
            .clone()
            .unwrap_or_else(|| NO_STEPS_TEXT.to_owned()),
    }
}

fn profile_view(model: &Model) -> ProfileView {
    let user = model.user.as_ref();
    ProfileView {
        username: user.and_then(|u| u.username.clone()).unwrap_or_default(),
        email: user.and_then(|u| u.email.clone()).unwrap_or_default(),
        dialog_open: model.password_dialog_open,
        password_form: FormView::from(&model.password),
    }
}

fn stats_view(model: &Model) -> StatsView {
    let state = &model.stats;
    StatsView {
        title: STATS_TITLE.to_owned(),
        loading: state.loading,
        error: state.error.clone(),
        retry_label: state.error.as_ref().map(|_| RETRY_LABEL.to_owned()),
        cards: STAT_CARDS
            .iter()
            .map(|(title, key)| StatCard {
                title: (*title).to_owned(),
                value: state.count(key),
            })
            .collect(),
    }
}

fn non_blank(s: &str) -> Option<&str> {
    (!s.trim().is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Food, Ingredient, User};

    fn user_model() -> Model {
        let mut model = Model::default();
        model.begin_session();
        model.user = Some(User {
            id: Some(3),
            username: Some("ana".into()),
            email: Some("ana@example.com".into()),
            role: Some("ROLE_USER".into()),
        });
        model
    }

    #[test]
    fn login_screen_has_no_navigation() {
        let mut model = Model::default();
        model.end_session();
        let view = build(&model);
        assert_eq!(view.screen, ScreenView::Login(FormView::default()));
        assert!(view.navigation.is_empty());
        assert!(!view.is_authenticated);
    }

    #[test]
    fn navigation_marks_current_destination() {
        let mut model = user_model();
        model.navigate(Route::Profile);
        let view = build(&model);
        let labels: Vec<_> = view.navigation.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["Condiciones", "Sugerencias", "Perfil"]);
        assert!(view.navigation[2].selected);
        assert!(!view.navigation[0].selected);
    }

    #[test]
    fn home_empty_and_loading_texts() {
        let mut model = user_model();
        model.navigate(Route::Home);
        model.suggestions.start();
        let ScreenView::Home(home) = build(&model).screen else {
            panic!("expected home");
        };
        assert_eq!(home.status_text.as_deref(), Some(LOADING_SUGGESTIONS_TEXT));
        assert!(home.foods_empty_text.is_none());

        model.suggestions.load(
            vec![Food {
                id: 1,
                name: "Avena".into(),
                category: "CEREAL".into(),
            }],
            Vec::new(),
        );
        let ScreenView::Home(home) = build(&model).screen else {
            panic!("expected home");
        };
        assert!(home.status_text.is_none());
        assert_eq!(home.foods[0].name, "Avena");
        assert!(home.foods_empty_text.is_none());
        assert_eq!(home.recipes_empty_text.as_deref(), Some(NO_SAFE_RECIPES_TEXT));
    }

    #[test]
    fn recipe_detail_fallbacks() {
        let view = recipe_view(&Recipe {
            ingredients: Some(vec![
                Ingredient {
                    food_name: Some("Arroz".into()),
                    quantity: Some("  ".into()),
                    ..Ingredient::default()
                },
                Ingredient::default(),
            ]),
            ..Recipe::default()
        });
        assert_eq!(view.title, "Sin título");
        assert_eq!(view.steps, NO_STEPS_TEXT);
        assert_eq!(view.ingredients[0].quantity, None);
        assert_eq!(view.ingredients[1].name, "Ingrediente 2");
        assert!(view.ingredients_empty_text.is_none());

        let empty = recipe_view(&Recipe::default());
        assert_eq!(empty.ingredients_empty_text.as_deref(), Some(NO_INGREDIENTS_TEXT));
    }

    #[test]
    fn stats_cards_default_to_zero() {
        let mut model = user_model();
        model.stats.fail("boom");
        let view = stats_view(&model);
        assert_eq!(view.title, STATS_TITLE);
        assert_eq!(view.retry_label.as_deref(), Some(RETRY_LABEL));
        assert!(view.cards.iter().all(|c| c.value == 0));
        assert_eq!(view.cards[0].title, "Usuarios");
    }

    #[test]
    fn profile_shows_user() {
        let mut model = user_model();
        model.navigate(Route::Profile);
        let ScreenView::Profile(profile) = build(&model).screen else {
            panic!("expected profile");
        };
        assert_eq!(profile.username, "ana");
        assert_eq!(profile.email, "ana@example.com");
        assert!(!profile.dialog_open);
    }
}
