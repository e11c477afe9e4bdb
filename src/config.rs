use serde::{Deserialize, Serialize};

use crate::utils::constants::{
    DEFAULT_AUTH_ENDPOINT, DEFAULT_COURSES_COLLECTION, DEFAULT_FIRESTORE_ENDPOINT,
    DEFAULT_SNAPSHOT_POLL_INTERVAL_MS, DEFAULT_TOKEN_ENDPOINT,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: String,
    pub enable_logging: bool,
    pub firebase: FirebaseConfig,
    pub courses_collection: String,
    pub snapshot_poll_interval_ms: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FirebaseConfig {
    pub api_key: Option<String>,
    pub project_id: Option<String>,
    pub auth_endpoint: String,
    /// Renovación del id token (`/token`)
    pub token_endpoint: String,
    pub firestore_endpoint: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            enable_logging: true,
            firebase: FirebaseConfig {
                api_key: None,
                project_id: None,
                auth_endpoint: DEFAULT_AUTH_ENDPOINT.to_string(),
                token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
                firestore_endpoint: DEFAULT_FIRESTORE_ENDPOINT.to_string(),
            },
            courses_collection: DEFAULT_COURSES_COLLECTION.to_string(),
            snapshot_poll_interval_ms: DEFAULT_SNAPSHOT_POLL_INTERVAL_MS,
        }
    }
}

/// Lectura de variables: `None` si no existen o están vacías
fn non_empty(value: Option<&'static str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno en tiempo de compilación
    /// (build.rs las copia desde `.env`)
    pub fn from_env() -> Self {
        Self::from_values(|key| match key {
            "ENVIRONMENT" => option_env!("ENVIRONMENT"),
            "ENABLE_LOGGING" => option_env!("ENABLE_LOGGING"),
            "FIREBASE_API_KEY" => option_env!("FIREBASE_API_KEY"),
            "FIREBASE_PROJECT_ID" => option_env!("FIREBASE_PROJECT_ID"),
            "AUTH_ENDPOINT" => option_env!("AUTH_ENDPOINT"),
            "TOKEN_ENDPOINT" => option_env!("TOKEN_ENDPOINT"),
            "FIRESTORE_ENDPOINT" => option_env!("FIRESTORE_ENDPOINT"),
            "COURSES_COLLECTION" => option_env!("COURSES_COLLECTION"),
            "SNAPSHOT_POLL_INTERVAL_MS" => option_env!("SNAPSHOT_POLL_INTERVAL_MS"),
            _ => None,
        })
    }

    /// Construye la configuración a partir de un lector de variables
    pub fn from_values<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<&'static str>,
    {
        let defaults = Self::default();
        Self {
            environment: non_empty(get("ENVIRONMENT")).unwrap_or(defaults.environment),
            enable_logging: non_empty(get("ENABLE_LOGGING"))
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.enable_logging),
            firebase: FirebaseConfig {
                api_key: non_empty(get("FIREBASE_API_KEY")),
                project_id: non_empty(get("FIREBASE_PROJECT_ID")),
                auth_endpoint: non_empty(get("AUTH_ENDPOINT"))
                    .unwrap_or(defaults.firebase.auth_endpoint),
                token_endpoint: non_empty(get("TOKEN_ENDPOINT"))
                    .unwrap_or(defaults.firebase.token_endpoint),
                firestore_endpoint: non_empty(get("FIRESTORE_ENDPOINT"))
                    .unwrap_or(defaults.firebase.firestore_endpoint),
            },
            courses_collection: non_empty(get("COURSES_COLLECTION"))
                .unwrap_or(defaults.courses_collection),
            snapshot_poll_interval_ms: non_empty(get("SNAPSHOT_POLL_INTERVAL_MS"))
                .and_then(|v| v.parse().ok())
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.snapshot_poll_interval_ms),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_logging_enabled(&self) -> bool {
        self.enable_logging
    }

    /// Sin proyecto Firebase configurado se usan los backends en memoria
    pub fn use_memory_backend(&self) -> bool {
        self.firebase.api_key.is_none() || self.firebase.project_id.is_none()
    }
}

// Configuración global estática
lazy_static::lazy_static! {
    pub static ref CONFIG: AppConfig = AppConfig::from_env();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        let config = AppConfig::from_values(|_| None);
        assert_eq!(config.courses_collection, "cursos");
        assert_eq!(config.snapshot_poll_interval_ms, 5_000);
        assert!(config.use_memory_backend());
        assert!(!config.is_production());
        assert_eq!(config.firebase.token_endpoint, "https://securetoken.googleapis.com/v1");
    }

    #[test]
    fn test_values_override_defaults() {
        let config = AppConfig::from_values(|key| match key {
            "ENVIRONMENT" => Some("production"),
            "FIREBASE_API_KEY" => Some("AIza-test"),
            "FIREBASE_PROJECT_ID" => Some("cursos-demo"),
            "COURSES_COLLECTION" => Some("cursos_v2"),
            "SNAPSHOT_POLL_INTERVAL_MS" => Some("1500"),
            "ENABLE_LOGGING" => Some("false"),
            "TOKEN_ENDPOINT" => Some("http://localhost:9099/securetoken.googleapis.com/v1"),
            _ => None,
        });
        assert!(config.is_production());
        assert!(!config.use_memory_backend());
        assert_eq!(config.courses_collection, "cursos_v2");
        assert_eq!(config.snapshot_poll_interval_ms, 1500);
        assert!(!config.is_logging_enabled());
        assert_eq!(
            config.firebase.token_endpoint,
            "http://localhost:9099/securetoken.googleapis.com/v1"
        );
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = AppConfig::from_values(|key| match key {
            "SNAPSHOT_POLL_INTERVAL_MS" => Some("0"),
            "ENABLE_LOGGING" => Some("quizás"),
            "FIREBASE_API_KEY" => Some("   "),
            _ => None,
        });
        assert_eq!(config.snapshot_poll_interval_ms, 5_000);
        assert!(config.is_logging_enabled());
        assert_eq!(config.firebase.api_key, None);
    }
}
