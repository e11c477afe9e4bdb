use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identidad autenticada, reflejada localmente desde el servicio de auth
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct Identity {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>, email: Option<String>) -> Self {
        Self {
            uid: uid.into(),
            email,
            display_name: None,
        }
    }
}

pub const MSG_INVALID_CREDENTIALS: &str =
    "Credenciales inválidas. Por favor, verifica tu correo y contraseña.";
pub const MSG_EMAIL_IN_USE: &str = "El correo electrónico ya está registrado.";
pub const MSG_WEAK_PASSWORD: &str = "La contraseña debe tener al menos 6 caracteres.";
pub const MSG_UNEXPECTED: &str = "Ocurrió un error inesperado. Intente de nuevo.";
pub const MSG_LOGOUT_FAILED: &str = "No se pudo cerrar la sesión.";

/// Códigos de error del servicio de autenticación (`auth/...`)
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum AuthErrorCode {
    #[error("auth/user-not-found")]
    UserNotFound,
    #[error("auth/wrong-password")]
    WrongPassword,
    #[error("auth/invalid-credential")]
    InvalidCredential,
    #[error("auth/email-already-in-use")]
    EmailAlreadyInUse,
    #[error("auth/weak-password")]
    WeakPassword,
    #[error("auth/invalid-email")]
    InvalidEmail,
    #[error("auth/network-request-failed: fallo de red ({0})")]
    Network(String),
    #[error("{0}")]
    Other(String),
}

impl AuthErrorCode {
    /// Parsear el código textual (`auth/weak-password`, ...)
    pub fn from_code(code: &str) -> Self {
        match code {
            "auth/user-not-found" => Self::UserNotFound,
            "auth/wrong-password" => Self::WrongPassword,
            "auth/invalid-credential" => Self::InvalidCredential,
            "auth/email-already-in-use" => Self::EmailAlreadyInUse,
            "auth/weak-password" => Self::WeakPassword,
            "auth/invalid-email" => Self::InvalidEmail,
            "auth/network-request-failed" => Self::Network(String::new()),
            other => Self::Other(other.to_string()),
        }
    }

    /// Mensaje para la UI
    pub fn friendly_message(&self) -> &'static str {
        match self {
            Self::UserNotFound | Self::WrongPassword | Self::InvalidCredential => {
                MSG_INVALID_CREDENTIALS
            }
            Self::EmailAlreadyInUse => MSG_EMAIL_IN_USE,
            Self::WeakPassword => MSG_WEAK_PASSWORD,
            _ => MSG_UNEXPECTED,
        }
    }
}

/// Traduce un código `auth/...` directamente al mensaje de la UI
pub fn friendly_error_message(code: &str) -> &'static str {
    AuthErrorCode::from_code(code).friendly_message()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weak_password_message() {
        assert_eq!(
            friendly_error_message("auth/weak-password"),
            "La contraseña debe tener al menos 6 caracteres."
        );
    }

    #[test]
    fn test_credential_codes_share_message() {
        for code in ["auth/user-not-found", "auth/wrong-password", "auth/invalid-credential"] {
            assert_eq!(friendly_error_message(code), MSG_INVALID_CREDENTIALS);
        }
        assert_eq!(friendly_error_message("auth/email-already-in-use"), MSG_EMAIL_IN_USE);
    }

    #[test]
    fn test_unknown_codes_fall_back() {
        assert_eq!(friendly_error_message("auth/too-many-requests"), MSG_UNEXPECTED);
        assert_eq!(friendly_error_message(""), MSG_UNEXPECTED);
        assert_eq!(
            AuthErrorCode::Network("timeout".to_string()).friendly_message(),
            MSG_UNEXPECTED
        );
    }

    #[test]
    fn test_code_display_round_trips_known_codes() {
        assert_eq!(AuthErrorCode::WeakPassword.to_string(), "auth/weak-password");
        assert_eq!(AuthErrorCode::from_code("auth/invalid-email"), AuthErrorCode::InvalidEmail);
        assert_eq!(
            AuthErrorCode::Network("timeout".to_string()).to_string(),
            "auth/network-request-failed: fallo de red (timeout)"
        );
    }
}
