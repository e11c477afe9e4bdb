// ============================================================================
// GUARDIA DE NAVEGACIÓN - decisión pura sobre (ruta, autenticado)
// ============================================================================

use crate::router::routes::{Route, RouteName};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavigationDecision {
    Allow,
    Redirect(RouteName),
}

/// Decide si se entra a la ruta o a dónde se redirige
pub fn decide(target: &Route, is_authenticated: bool) -> NavigationDecision {
    if target.meta().requires_auth && !is_authenticated {
        NavigationDecision::Redirect(RouteName::Login)
    } else if target.name.is_auth_entry() && is_authenticated {
        NavigationDecision::Redirect(RouteName::Home)
    } else {
        NavigationDecision::Allow
    }
}
