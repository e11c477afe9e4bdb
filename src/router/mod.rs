// ============================================================================
// ROUTER - Rutas + guardia, con la sesión pasada explícitamente
// ============================================================================

pub mod guard;
pub mod routes;

pub use guard::{decide, NavigationDecision};
pub use routes::{Route, RouteMeta, RouteName};

use crate::services::AuthService;
use crate::state::reactivity::{ReactiveState, WatchId};
use crate::state::SessionStore;

pub const MSG_SESSION_NOT_INITIALIZED: &str = "La sesión no fue inicializada.";

/// Router de la app. Nunca decide con una sesión sin inicializar:
/// espera la primera notificación del servicio de auth.
pub struct Router<A> {
    session: SessionStore<A>,
    current: ReactiveState<Option<Route>>,
}

impl<A> Clone for Router<A> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            current: self.current.clone(),
        }
    }
}

impl<A: AuthService + 'static> Router<A> {
    pub fn new(session: SessionStore<A>) -> Self {
        Self {
            session,
            current: ReactiveState::new(None),
        }
    }

    /// Navegar a un path. Devuelve la ruta final (tras redirección).
    pub async fn navigate(&self, path: &str) -> Result<Route, String> {
        let target = Route::resolve(path).ok_or_else(|| {
            log::warn!("⚠️ Ruta no encontrada: {}", path);
            format!("Ruta no encontrada: {}", path)
        })?;
        self.navigate_to(target).await
    }

    pub async fn navigate_to(&self, target: Route) -> Result<Route, String> {
        if !self.session.is_initialized() {
            log::error!("❌ Navegación a {} antes de init_auth", target.path());
            return Err(MSG_SESSION_NOT_INITIALIZED.to_string());
        }

        self.session.wait_until_ready().await;

        let resolved = self.apply_guard(target);
        self.current.set(Some(resolved.clone()));
        Ok(resolved)
    }

    /// Volver a pasar la ruta actual por la guardia (tras un cambio de sesión).
    /// Devuelve la nueva ruta si hubo redirección.
    pub fn revalidate(&self) -> Option<Route> {
        if !self.session.is_ready() {
            return None;
        }
        let current = self.current.get()?;
        let resolved = self.apply_guard(current.clone());
        if resolved == current {
            return None;
        }
        self.current.set(Some(resolved.clone()));
        Some(resolved)
    }

    fn apply_guard(&self, target: Route) -> Route {
        match decide(&target, self.session.is_authenticated()) {
            NavigationDecision::Allow => target,
            NavigationDecision::Redirect(name) => {
                let redirect = Route::new(name);
                log::info!("🔀 Redirigiendo {} → {}", target.path(), redirect.path());
                redirect
            }
        }
    }
}

impl<A> Router<A> {
    pub fn current(&self) -> Option<Route> {
        self.current.get()
    }

    pub fn watch<F>(&self, callback: F) -> WatchId
    where
        F: Fn() + 'static,
    {
        self.current.subscribe(callback)
    }
}
