// ============================================================================
// FIREBASE AUTH - Identity Toolkit REST + sesión persistida en localStorage
// ============================================================================

use std::cell::RefCell;
use std::rc::Rc;

use chrono::Utc;
use gloo_net::http::{Request, Response};

use crate::config::FirebaseConfig;
use crate::models::{AuthErrorCode, Identity};
use crate::services::firebase::codec::{
    auth_error_from_rest, PasswordRequest, PasswordResponse, RefreshRequest, RefreshResponse,
    RestErrorBody, StoredSession,
};
use crate::services::subscription::Listeners;
use crate::services::{AuthService, Subscription};
use crate::utils::constants::STORAGE_KEY_AUTH_SESSION;
use crate::utils::storage::{load_from_storage, remove_from_storage, save_to_storage};

struct AuthInner {
    endpoint: String,
    token_endpoint: String,
    api_key: String,
    session: RefCell<Option<StoredSession>>,
    listeners: Listeners<Option<Identity>>,
}

/// Cliente de Firebase Auth (email + contraseña)
#[derive(Clone)]
pub struct FirebaseAuth {
    inner: Rc<AuthInner>,
}

impl FirebaseAuth {
    /// `None` si falta la API key. Restaura la sesión guardada.
    pub fn new(config: &FirebaseConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        let session = load_from_storage::<StoredSession>(STORAGE_KEY_AUTH_SESSION);
        if let Some(stored) = &session {
            log::info!(
                "🔐 Sesión restaurada: {}",
                stored.identity.email.as_deref().unwrap_or(&stored.identity.uid)
            );
        }

        Some(Self {
            inner: Rc::new(AuthInner {
                endpoint: config.auth_endpoint.trim_end_matches('/').to_string(),
                token_endpoint: config.token_endpoint.trim_end_matches('/').to_string(),
                api_key,
                session: RefCell::new(session),
                listeners: Listeners::new(),
            }),
        })
    }

    /// Token vigente para autorizar las llamadas a Firestore.
    /// Si está por vencer se renueva; si el servidor rechaza la renovación
    /// se cierra la sesión.
    pub async fn id_token(&self) -> Option<String> {
        let session = self.inner.session.borrow().clone()?;
        if !session.needs_refresh(Utc::now()) {
            return Some(session.id_token);
        }

        let result = self.refresh(&session).await;

        // la sesión pudo cerrarse o renovarse mientras tanto
        let unchanged = self.inner.session.borrow().as_ref().map(|s| &s.refresh_token)
            == Some(&session.refresh_token);
        if !unchanged {
            return self.inner.session.borrow().as_ref().map(|s| s.id_token.clone());
        }

        match result {
            Ok(renewed) => {
                let token = renewed.id_token.clone();
                self.persist(&renewed);
                *self.inner.session.borrow_mut() = Some(renewed);
                log::debug!("🔑 Id token renovado");
                Some(token)
            }
            Err(AuthErrorCode::Network(e)) => {
                log::warn!("⚠️ Sin red para renovar la sesión: {}", e);
                None
            }
            Err(e) => {
                log::error!("❌ Sesión rechazada al renovar: {}", e);
                self.set_session(None);
                None
            }
        }
    }

    async fn refresh(&self, session: &StoredSession) -> Result<StoredSession, AuthErrorCode> {
        let refresh_token = session
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthErrorCode::Other("auth/user-token-expired".to_string()))?;
        let url = format!("{}/token?key={}", self.inner.token_endpoint, self.inner.api_key);

        let response = Request::post(&url)
            .json(&RefreshRequest::new(refresh_token))
            .map_err(|e| AuthErrorCode::Other(format!("auth/internal-error: {}", e)))?
            .send()
            .await
            .map_err(|e| AuthErrorCode::Network(e.to_string()))?;

        if !response.ok() {
            return Err(rest_error(response).await);
        }

        let payload = response
            .json::<RefreshResponse>()
            .await
            .map_err(|e| AuthErrorCode::Other(format!("auth/internal-error: {}", e)))?;
        Ok(session.refreshed(payload, Utc::now()))
    }

    fn current(&self) -> Option<Identity> {
        self.inner.session.borrow().as_ref().map(|s| s.identity.clone())
    }

    fn persist(&self, stored: &StoredSession) {
        if let Err(e) = save_to_storage(STORAGE_KEY_AUTH_SESSION, stored) {
            log::warn!("⚠️ No se pudo persistir la sesión: {}", e);
        }
    }

    fn set_session(&self, session: Option<StoredSession>) {
        match &session {
            Some(stored) => self.persist(stored),
            None => remove_from_storage(STORAGE_KEY_AUTH_SESSION),
        }

        let identity = session.as_ref().map(|s| s.identity.clone());
        *self.inner.session.borrow_mut() = session;
        self.inner.listeners.broadcast(identity);
    }

    async fn password_call(&self, action: &str, email: &str, password: &str) -> Result<Identity, AuthErrorCode> {
        let url = format!("{}/accounts:{}?key={}", self.inner.endpoint, action, self.inner.api_key);
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };

        let response = Request::post(&url)
            .json(&body)
            .map_err(|e| AuthErrorCode::Other(format!("auth/internal-error: {}", e)))?
            .send()
            .await
            .map_err(|e| AuthErrorCode::Network(e.to_string()))?;

        if !response.ok() {
            return Err(rest_error(response).await);
        }

        let payload = response
            .json::<PasswordResponse>()
            .await
            .map_err(|e| AuthErrorCode::Other(format!("auth/internal-error: {}", e)))?;

        let stored = StoredSession::from_sign_in(payload, Utc::now());
        let identity = stored.identity.clone();
        self.set_session(Some(stored));
        Ok(identity)
    }
}

async fn rest_error(response: Response) -> AuthErrorCode {
    let status = response.status();
    match response.json::<RestErrorBody>().await {
        Ok(body) => auth_error_from_rest(&body.error.message),
        Err(e) => AuthErrorCode::Network(format!("HTTP {}: {}", status, e)),
    }
}

impl AuthService for FirebaseAuth {
    async fn verify_credentials(&self, email: &str, password: &str) -> Result<Identity, AuthErrorCode> {
        log::info!("🔐 Iniciando sesión: {}", email);
        self.password_call("signInWithPassword", email, password).await
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthErrorCode> {
        log::info!("📝 Registrando cuenta: {}", email);
        self.password_call("signUp", email, password).await
    }

    /// La sesión REST es solo local: basta con olvidar el token
    async fn end_session(&self) -> Result<(), AuthErrorCode> {
        log::info!("👋 Cerrando sesión");
        self.set_session(None);
        Ok(())
    }

    fn session_changes(&self) -> Subscription<Option<Identity>> {
        self.inner.listeners.subscribe(self.current())
    }
}
