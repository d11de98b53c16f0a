//! The Recetas Seguras core: intents in, view model out.

use crate::api::UserId;
use crate::capabilities::Capabilities;
use crate::error::ApiFailure;
use crate::event::Event;
use crate::model::{
    validate_registration, Model, Route, SessionState, ToastKind, CONDITIONS_LOAD_ERROR,
    CONDITIONS_SAVE_ERROR, FIX_FIELDS_MESSAGE, LOGIN_SUCCESS_MESSAGE, PASSWORD_CHANGED_MESSAGE,
    REGISTER_SUCCESS_MESSAGE,
};
use crate::view::{self, ViewModel};
use crate::{SESSION_EXPIRED_MESSAGE, SESSION_POLL_INTERVAL};

#[derive(Default)]
pub struct App;

impl App {
    fn start_session(model: &mut Model, caps: &Capabilities) {
        model.begin_session();
        caps.api.me(Event::UserLoaded);
        Self::watch_session(model, caps);
    }

    fn watch_session(model: &Model, caps: &Capabilities) {
        let generation = model.generation;
        caps.timer
            .after(SESSION_POLL_INTERVAL, move || Event::SessionTick { generation });
    }

    fn expire_session(model: &mut Model) {
        tracing::info!("session expired");
        model.end_session();
        model.notify(SESSION_EXPIRED_MESSAGE, ToastKind::Error);
    }

    /// Ends the session when the failure means the tokens are gone. Returns
    /// whether it did.
    fn expired(model: &mut Model, failure: &ApiFailure) -> bool {
        if failure.is_session_expired() {
            Self::expire_session(model);
            true
        } else {
            false
        }
    }

    fn go(model: &mut Model, route: Route, caps: &Capabilities) {
        let shown = model.navigate(route);
        if shown == Route::Stats && model.stats.needs_load() {
            Self::load_stats(model, caps);
        }
    }

    fn load_suggestions(model: &mut Model, caps: &Capabilities) {
        let Some(user_id) = model.user_id() else {
            return;
        };
        model.suggestions.start();
        caps.api.suggestions(user_id, Event::SuggestionsLoaded);
    }

    fn load_stats(model: &mut Model, caps: &Capabilities) {
        model.stats.start();
        caps.api.stats(Event::StatsLoaded);
    }

    fn load_conditions(user_id: Option<UserId>, model: &mut Model, caps: &Capabilities) {
        model.conditions.start();
        match user_id {
            Some(id) => caps.api.condition_overview(id, Event::ConditionsLoaded),
            None => caps.api.conditions(Event::CatalogLoaded),
        }
    }

    /// Answers that only make sense for the session that asked for them.
    fn needs_session(event: &Event) -> bool {
        matches!(
            event,
            Event::UserLoaded(_)
                | Event::CatalogLoaded(_)
                | Event::ConditionsLoaded(_)
                | Event::ConditionsSaved(_)
                | Event::SuggestionsLoaded(_)
                | Event::PasswordChanged(_)
                | Event::StatsLoaded(_)
        )
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        tracing::debug!(
            event = event.name(),
            user_initiated = event.is_user_initiated(),
            "update"
        );

        if Self::needs_session(&event) && !model.is_authenticated() {
            tracing::debug!(event = event.name(), "dropping answer for an ended session");
            return;
        }

        match event {
            Event::Start => {
                model.route = Route::Loading;
                caps.api.session_status(Event::SessionChecked);
            }

            Event::SessionChecked(active) => {
                if model.session != SessionState::Unknown {
                    return;
                }
                if active {
                    Self::start_session(model, caps);
                } else {
                    model.end_session();
                }
            }

            Event::Login { email, password } => {
                if model.login.loading {
                    return;
                }
                model.login.start();
                caps.api
                    .login(email.trim().to_owned(), password, Event::LoggedIn);
            }

            Event::LoggedIn(result) | Event::Registered(result) if model.is_authenticated() => {
                tracing::debug!(ok = result.is_ok(), "auth answer after session start, ignored");
            }

            Event::LoggedIn(Ok(user_id)) => {
                tracing::info!(?user_id, "logged in");
                model.login.succeed();
                model.notify(LOGIN_SUCCESS_MESSAGE, ToastKind::Success);
                Self::start_session(model, caps);
            }

            Event::LoggedIn(Err(failure)) => {
                tracing::info!(error = %failure, "login failed");
                model.login.fail(&failure);
                model.notify(failure.user_message(), ToastKind::Error);
            }

            Event::Register {
                username,
                email,
                password,
            } => {
                if model.register.loading {
                    return;
                }
                let errors = validate_registration(&username, &email, &password);
                if !errors.is_empty() {
                    model.register.reject(errors);
                    model.notify(FIX_FIELDS_MESSAGE, ToastKind::Error);
                } else {
                    model.register.start();
                    caps.api.register(
                        username.trim().to_owned(),
                        email.trim().to_owned(),
                        password,
                        Event::Registered,
                    );
                }
            }

            Event::Registered(Ok(user_id)) => {
                tracing::info!(?user_id, "registered");
                model.register.succeed();
                model.notify(REGISTER_SUCCESS_MESSAGE, ToastKind::Success);
                Self::start_session(model, caps);
            }

            Event::Registered(Err(failure)) => {
                tracing::info!(error = %failure, "registration failed");
                model.register.fail(&failure);
                model.notify(failure.user_message(), ToastKind::Error);
            }

            Event::Logout => {
                model.end_session();
                caps.api.logout(Event::LoggedOut);
            }

            Event::LoggedOut(result) => {
                if let Err(failure) = result {
                    tracing::warn!(error = %failure, "logout did not complete cleanly");
                }
            }

            Event::Navigate(route) => Self::go(model, route, caps),

            Event::SelectDestination(destination) => Self::go(model, destination.route(), caps),

            Event::OpenRecipe { index } => {
                if let Some(recipe) = model.suggestions.recipes.get(index).cloned() {
                    model.selected_recipe = Some(recipe);
                    model.navigate(Route::RecipeDetail);
                }
            }

            Event::CloseRecipe => {
                model.navigate(Route::Home);
            }

            Event::DismissMessage => model.message = None,

            Event::ConditionQueryChanged(query) => model.conditions.query = query,

            Event::AddCondition(id) => {
                model.conditions.add(id);
            }

            Event::RemoveCondition(id) => {
                model.conditions.remove(id);
            }

            Event::SaveConditions => {
                let Some(user_id) = model.user_id() else {
                    tracing::warn!("save requested without a known user");
                    return;
                };
                if !model.conditions.can_save() {
                    return;
                }
                model.conditions.start();
                caps.api.save_user_conditions(
                    user_id,
                    model.conditions.selected_ids(),
                    Event::ConditionsSaved,
                );
            }

            Event::RefreshSuggestions => Self::load_suggestions(model, caps),

            Event::OpenChangePassword => {
                model.password.reset();
                model.password_dialog_open = true;
            }

            Event::CloseChangePassword => {
                if !model.password.loading {
                    model.password_dialog_open = false;
                }
            }

            Event::ChangePassword {
                old_password,
                new_password,
                confirm_password,
            } => {
                if model.password.loading {
                    return;
                }
                model.password.start();
                caps.api.change_password(
                    old_password,
                    new_password,
                    confirm_password,
                    Event::PasswordChanged,
                );
            }

            Event::LoadStats => Self::load_stats(model, caps),

            Event::UserLoaded(Ok(user)) => {
                tracing::debug!(user_id = ?user.id, admin = user.is_admin(), "user loaded");
                model.user = Some(user);
                Self::load_conditions(model.user_id(), model, caps);
            }

            Event::UserLoaded(Err(failure)) => {
                if !Self::expired(model, &failure) {
                    tracing::warn!(error = %failure, "could not load user, continuing without one");
                    model.user = None;
                    Self::load_conditions(None, model, caps);
                }
            }

            Event::ConditionsLoaded(Ok((catalog, selected))) => {
                let needs_selection = selected.is_empty();
                model.conditions.load_overview(catalog, selected);
                if needs_selection {
                    Self::go(model, Route::ConditionSelection, caps);
                } else {
                    Self::go(model, Route::Home, caps);
                    Self::load_suggestions(model, caps);
                }
            }

            Event::CatalogLoaded(Ok(catalog)) => {
                model.conditions.load_catalog(catalog);
                Self::go(model, Route::ConditionSelection, caps);
            }

            Event::ConditionsLoaded(Err(failure)) | Event::CatalogLoaded(Err(failure)) => {
                if !Self::expired(model, &failure) {
                    tracing::warn!(error = %failure, "could not load conditions");
                    model.conditions.fail(CONDITIONS_LOAD_ERROR);
                    Self::go(model, Route::ConditionSelection, caps);
                }
            }

            Event::ConditionsSaved(Ok(())) => {
                model.conditions.saved();
                Self::go(model, Route::Home, caps);
                Self::load_suggestions(model, caps);
            }

            Event::ConditionsSaved(Err(failure)) => {
                model.conditions.saved();
                if !Self::expired(model, &failure) {
                    tracing::warn!(error = %failure, "could not save conditions");
                    model.notify(CONDITIONS_SAVE_ERROR, ToastKind::Error);
                }
            }

            Event::SuggestionsLoaded(Ok((foods, recipes))) => {
                model.suggestions.load(foods, recipes);
            }

            Event::SuggestionsLoaded(Err(failure)) => {
                if !Self::expired(model, &failure) {
                    tracing::warn!(error = %failure, "could not load suggestions");
                    model.suggestions.fail(failure.user_message());
                }
            }

            Event::PasswordChanged(Ok(())) => {
                model.password.succeed();
                model.password_dialog_open = false;
                model.notify(PASSWORD_CHANGED_MESSAGE, ToastKind::Success);
            }

            Event::PasswordChanged(Err(failure)) => {
                if !Self::expired(model, &failure) {
                    model.password.fail(&failure);
                    model.notify(failure.user_message(), ToastKind::Error);
                }
            }

            Event::StatsLoaded(Ok(stats)) => model.stats.load(stats),

            Event::StatsLoaded(Err(failure)) => {
                if !Self::expired(model, &failure) {
                    let message = failure.user_message();
                    model.stats.fail(message.clone());
                    model.notify(message, ToastKind::Error);
                }
            }

            Event::SessionTick { generation } => {
                if generation != model.generation || !model.is_authenticated() {
                    return;
                }
                caps.api
                    .session_status(move |active| Event::SessionPolled { generation, active });
            }

            Event::SessionPolled { generation, active } => {
                if generation != model.generation || !model.is_authenticated() {
                    return;
                }
                if active {
                    Self::watch_session(model, caps);
                } else {
                    Self::expire_session(model);
                }
            }
        }

        caps.render.render();
    }

    fn view(&self, model: &Model) -> ViewModel {
        view::build(model)
    }
}
