// lib.rs - Recetas Seguras shared core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod api;
pub mod app;
pub mod capabilities;
pub mod config;
pub mod crypto;
pub mod error;
pub mod event;
pub mod executor;
pub mod http;
pub mod model;
pub mod pipeline;
pub mod repository;
pub mod token_store;
pub mod transport;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

pub use api::{ApiClient, AuthResponse, Condition, Food, Ingredient, Recipe, Stats, User};
pub use app::App;
pub use capabilities::{
    ApiOperation, ApiOutput, ApiResult, Capabilities, TimerOperation, TimerOutput,
};
pub use config::ClientConfig;
pub use crux_core::{render::Render, App as CruxApp};
pub use error::{ApiError, ApiFailure, ErrorKind};
pub use event::{Event, Password};
pub use executor::EffectExecutor;
pub use model::{Destination, Model, Route};
pub use pipeline::RequestPipeline;
pub use repository::Repository;
pub use token_store::{Session, TokenStore};
pub use transport::Transport;
pub use view::{ScreenView, ViewModel};

// The Effect type is generated by the derive on `Capabilities`.
pub use capabilities::Effect;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
pub const SESSION_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const ADMIN_ROLE: &str = "ROLE_ADMIN";

pub const CONNECTION_ERROR_MESSAGE: &str = "No se pudo conectar con el servidor";
pub const GENERIC_ERROR_MESSAGE: &str = "Ocurrió un error, intenta más tarde";
pub const SESSION_EXPIRED_MESSAGE: &str =
    "Tu sesión ha expirado. Por favor, inicia sesión nuevamente.";
