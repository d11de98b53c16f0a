//! Failure values shared by the network stack and the core.
//!
//! Backend failures arrive as an [`ApiError`] body; every layer above the
//! transport talks in terms of [`ApiFailure`], which is serialisable so it
//! can travel inside core events.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::http::HttpError;
use crate::token_store::StoreError;
use crate::{CONNECTION_ERROR_MESSAGE, GENERIC_ERROR_MESSAGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Authentication,
    Authorization,
    Validation,
    Domain,
    NotFound,
    Server,
    Decode,
    Storage,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Authentication => "AUTH_ERROR",
            Self::Authorization => "FORBIDDEN",
            Self::Validation => "VALIDATION_ERROR",
            Self::Domain => "DOMAIN_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Server => "SERVER_ERROR",
            Self::Decode => "DECODE_ERROR",
            Self::Storage => "STORAGE_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn is_connectivity(self) -> bool {
        matches!(self, Self::Network | Self::Timeout)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: Option<String>,
    pub message: Option<String>,
}

/// Error body returned by the backend for any non-2xx response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub timestamp: Option<String>,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
    pub errors: Option<Vec<FieldError>>,
}

impl ApiError {
    /// Lenient parse: numbers may come as floats, extra keys are ignored and
    /// any field may be missing. Anything that is not a JSON object is `None`.
    #[must_use]
    pub fn parse(body: &[u8]) -> Option<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return None;
        }

        let value: serde_json::Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "error body is not JSON");
                return None;
            }
        };
        let map = value.as_object()?;

        let text = |key: &str| -> Option<String> {
            match map.get(key)? {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            }
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let status = map.get("status").and_then(|s| {
            s.as_u64()
                .or_else(|| s.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .and_then(|n| u16::try_from(n).ok())
        });

        let errors = map.get("errors").and_then(|raw| raw.as_array()).map(|items| {
            items
                .iter()
                .filter_map(serde_json::Value::as_object)
                .map(|item| FieldError {
                    field: item.get("field").and_then(|f| f.as_str()).map(str::to_owned),
                    message: item.get("message").and_then(|m| m.as_str()).map(str::to_owned),
                })
                .collect()
        });

        Some(Self {
            timestamp: text("timestamp"),
            status,
            error: text("error"),
            code: text("code"),
            message: text("message"),
            errors,
        })
    }

    /// `code` wins; older backends only send `error`.
    #[must_use]
    pub fn effective_code(&self) -> Option<&str> {
        self.code.as_deref().or(self.error.as_deref())
    }

    #[must_use]
    pub fn has_field_errors(&self) -> bool {
        self.errors
            .as_ref()
            .is_some_and(|errs| errs.iter().any(|e| e.field.is_some()))
    }
}

/// Fixed user-facing string for a known backend code. Unknown codes fall back
/// to the server message.
#[must_use]
pub fn friendly_message(code: Option<&str>, server_message: Option<&str>) -> Option<String> {
    let fixed = match code? {
        "USER_NOT_FOUND" => "Usuario no encontrado. Verifica tu correo y vuelve a intentarlo.",
        "USERNAME_ALREADY_EXISTS" => "El nombre de usuario ya está en uso. Elige otro nombre.",
        "INVALID_PASSWORD" => "Contraseña incorrecta. Verifica e intenta de nuevo.",
        "PASSWORD_ERROR" => {
            "Error con la contraseña. Verifica que tenga al menos 8 caracteres, incluyendo letras y números."
        }
        "EMAIL_ALREADY_EXISTS" => "El correo ya está registrado. Usa otro correo o inicia sesión.",
        "VALIDATION_FAILED" => {
            "Hay errores en los datos enviados. Revisa los campos marcados y corrígelos."
        }
        "MALFORMED_JSON" => {
            "El formato JSON de la petición es inválido. Revisa la estructura enviada."
        }
        "ACCESS_DENIED" => "Acceso denegado. No tienes permisos para esta operación.",
        "AUTH_ERROR" => "Error de autenticación. Verifica tus credenciales e intenta de nuevo.",
        "CONSTRAINT_VIOLATION" => {
            "La solicitud viola una restricción del servidor. Revisa los datos y vuelve a intentarlo."
        }
        "RUNTIME_ERROR" => {
            return Some(
                server_message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or("Ocurrió un error. Intenta de nuevo más tarde.")
                    .to_owned(),
            )
        }
        "INTERNAL_ERROR" => "Error interno del servidor. Intenta más tarde.",
        "OLD_PASSWORD_MISMATCH" => "La contraseña actual no coincide. Verifica e intenta de nuevo.",
        "PASSWORD_CONFIRMATION_MISMATCH" => {
            "Las contraseñas nuevas no coinciden. Verifica y vuelve a intentarlo."
        }
        "NOT_AUTHENTICATED" | "UNAUTHENTICATED" => {
            "No estás autenticado. Por favor, inicia sesión."
        }
        "MISSING_FIELDS" => {
            "Faltan campos obligatorios en la petición. Completa todos los campos requeridos."
        }
        _ => return server_message.map(str::to_owned),
    };
    Some(fixed.to_owned())
}

/// Translates the common validator phrases the backend emits in English.
#[must_use]
pub fn translate_validation_message(field: Option<&str>, raw: &str) -> Option<&'static str> {
    let msg = raw.trim().to_lowercase();
    if msg.is_empty() {
        return None;
    }
    if msg.contains("well-formed email address") {
        return Some("El correo debe tener un formato válido.");
    }
    if msg.contains("size must be between")
        && field.is_some_and(|f| f.eq_ignore_ascii_case("password"))
    {
        return Some("La contraseña no cumple los requisitos de longitud.");
    }
    if msg.contains("must not be null") || msg.contains("may not be null") {
        return Some("Este campo es obligatorio.");
    }
    None
}

/// Form field a domain code is about, when the code names one.
#[must_use]
pub fn field_for_code(code: &str) -> Option<&'static str> {
    match code {
        "INVALID_PASSWORD" | "PASSWORD_ERROR" => Some("password"),
        "USER_NOT_FOUND" | "EMAIL_ALREADY_EXISTS" => Some("email"),
        "USERNAME_ALREADY_EXISTS" => Some("username"),
        "OLD_PASSWORD_MISMATCH" => Some("oldPassword"),
        "PASSWORD_CONFIRMATION_MISMATCH" => Some("confirmPassword"),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiFailure {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub api_error: Option<ApiError>,
    pub message: String,
    /// Set once the stored tokens are gone; a plain 401 leaves it false.
    #[serde(default)]
    pub session_ended: bool,
}

impl ApiFailure {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            api_error: None,
            message: message.into(),
            session_ended: false,
        }
    }

    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, message)
    }

    #[must_use]
    pub fn session_expired() -> Self {
        let mut failure = Self::new(ErrorKind::Authentication, "session expired");
        failure.status = Some(401);
        failure.session_ended = true;
        failure
    }

    #[must_use]
    pub fn from_http_status(status: u16, body: &[u8]) -> Self {
        let api_error = ApiError::parse(body);

        let kind = match status {
            401 => ErrorKind::Authentication,
            403 => ErrorKind::Authorization,
            404 => ErrorKind::NotFound,
            400 | 422 if api_error.as_ref().is_some_and(ApiError::has_field_errors) => {
                ErrorKind::Validation
            }
            500..=599 => ErrorKind::Server,
            400..=499 if api_error.as_ref().and_then(ApiError::effective_code).is_some() => {
                ErrorKind::Domain
            }
            400 | 422 => ErrorKind::Validation,
            _ => ErrorKind::Unknown,
        };

        let message = api_error
            .as_ref()
            .and_then(|e| e.message.clone())
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("HTTP error: {status}"));

        Self {
            kind,
            status: Some(status),
            api_error,
            message,
            session_ended: false,
        }
    }

    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.api_error.as_ref().and_then(ApiError::effective_code)
    }

    /// The pipeline gave up and the local session was dropped.
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        self.session_ended
    }

    #[must_use]
    pub fn user_message(&self) -> String {
        if self.kind.is_connectivity() {
            return CONNECTION_ERROR_MESSAGE.to_owned();
        }
        let server_message = self
            .api_error
            .as_ref()
            .and_then(|e| e.message.as_deref())
            .filter(|m| !m.trim().is_empty());
        if let Some(mapped) = friendly_message(self.code(), server_message) {
            return mapped;
        }
        match self.kind {
            ErrorKind::Authentication => "No estás autenticado. Por favor, inicia sesión.".into(),
            ErrorKind::Authorization => {
                "Acceso denegado. No tienes permisos para esta operación.".into()
            }
            ErrorKind::Storage => "No se pudo guardar la sesión en el dispositivo.".into(),
            _ => server_message.map_or_else(|| GENERIC_ERROR_MESSAGE.to_owned(), str::to_owned),
        }
    }

    /// Per-field messages from a validation body, translated where possible.
    #[must_use]
    pub fn field_errors(&self) -> BTreeMap<String, String> {
        let Some(errors) = self.api_error.as_ref().and_then(|e| e.errors.as_ref()) else {
            return BTreeMap::new();
        };
        errors
            .iter()
            .filter_map(|e| {
                let field = e.field.as_deref()?;
                let raw = e.message.as_deref().unwrap_or_default();
                let message = translate_validation_message(Some(field), raw)
                    .map_or_else(|| raw.to_owned(), str::to_owned);
                Some((field.to_owned(), message))
            })
            .collect()
    }

    #[must_use]
    pub fn inferred_field(&self) -> Option<&'static str> {
        self.code().and_then(field_for_code)
    }
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind.code(), self.message)?;
        if let Some(status) = self.status {
            write!(f, " (status {status})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiFailure {}

impl From<HttpError> for ApiFailure {
    fn from(e: HttpError) -> Self {
        let kind = match &e {
            HttpError::Timeout { .. } => ErrorKind::Timeout,
            HttpError::ConnectionError { .. } => ErrorKind::Network,
            HttpError::InvalidResponse { .. } | HttpError::SerializationError { .. } => {
                ErrorKind::Decode
            }
            _ => ErrorKind::Unknown,
        };
        Self::new(kind, e.to_string())
    }
}

impl From<StoreError> for ApiFailure {
    fn from(e: StoreError) -> Self {
        Self::new(ErrorKind::Storage, e.to_string())
    }
}
