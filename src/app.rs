// ============================================================================
// APP - Contexto de la aplicación (stores + router)
// ============================================================================
// Los stores se construyen aquí con sus clientes y se pasan explícitamente:
// no hay estado global fuera del contexto.
// ============================================================================

use std::cell::Cell;
use std::rc::Rc;

use crate::config::AppConfig;
use crate::router::Router;
use crate::services::{AuthService, CourseCollection};
use crate::state::{CourseStore, SessionStore, WatchId};
use crate::utils::Spawner;

/// Aplicación principal
pub struct App<A, C> {
    config: AppConfig,
    session: SessionStore<A>,
    courses: CourseStore<C>,
    router: Router<A>,
    session_watch: Cell<Option<WatchId>>,
    /// Último estado de autenticación aplicado a la suscripción de cursos
    applied_auth: Rc<Cell<Option<bool>>>,
}

impl<A, C> App<A, C>
where
    A: AuthService + 'static,
    C: CourseCollection + 'static,
{
    pub fn new(config: AppConfig, auth: A, collection: C, spawner: Spawner) -> Self {
        let session = SessionStore::new(auth, spawner.clone());
        let courses = CourseStore::new(collection, spawner);
        let router = Router::new(session.clone());

        Self {
            config,
            session,
            courses,
            router,
            session_watch: Cell::new(None),
            applied_auth: Rc::new(Cell::new(None)),
        }
    }

    /// Arrancar: listener de sesión + suscripción de cursos mientras haya
    /// usuario. Llamar más de una vez no registra nada nuevo.
    pub fn start(&self) {
        if self.session_watch.get().is_some() {
            return;
        }

        log::info!(
            "🚀 Iniciando app ({}, colección '{}')",
            self.config.environment,
            self.config.courses_collection
        );

        let session = self.session.clone();
        let courses = self.courses.clone();
        let router = self.router.clone();
        let applied_auth = self.applied_auth.clone();
        let watch = self.session.watch(move || {
            if !session.is_ready() {
                return;
            }
            // solo los cambios de autenticación tocan la suscripción
            let authenticated = session.is_authenticated();
            if applied_auth.replace(Some(authenticated)) == Some(authenticated) {
                return;
            }
            if authenticated {
                courses.start_subscription();
            } else {
                courses.stop_subscription();
            }
            router.revalidate();
        });
        self.session_watch.set(Some(watch));

        self.session.init_auth();
    }

    /// Cerrar sesión soltando antes la suscripción de cursos.
    /// Si el cierre falla la suscripción queda detenida hasta un
    /// `start_subscription()` explícito.
    pub async fn logout(&self) -> Result<(), String> {
        self.courses.stop_subscription();
        self.session.logout().await
    }

    /// Soltar listeners y suscripciones
    pub fn dispose(&self) {
        if let Some(watch) = self.session_watch.take() {
            self.session.unwatch(watch);
        }
        self.courses.stop_subscription();
        self.session.dispose();
        log::info!("👋 App detenida");
    }
}

impl<A, C> App<A, C> {
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionStore<A> {
        &self.session
    }

    pub fn courses(&self) -> &CourseStore<C> {
        &self.courses
    }

    pub fn router(&self) -> &Router<A> {
        &self.router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthErrorCode, Course, Identity, NewCourse};
    use crate::router::{Route, RouteName};
    use crate::services::{MemoryAuth, MemoryCollection, ServiceError};
    use futures::executor::LocalPool;
    use std::rc::Rc;

    fn course(id: &str) -> Course {
        Course::from_new(
            id,
            NewCourse {
                name: "Rust para la web".to_string(),
                code: "RS-101".to_string(),
                price: 45000,
                capacity: 20,
                active: true,
                ..NewCourse::default()
            },
        )
    }

    fn setup(
        auth: MemoryAuth,
        collection: MemoryCollection,
    ) -> (LocalPool, App<MemoryAuth, MemoryCollection>) {
        let _ = env_logger::builder().is_test(true).try_init();
        let pool = LocalPool::new();
        let app = App::new(AppConfig::default(), auth, collection, Rc::new(pool.spawner()));
        (pool, app)
    }

    #[test]
    fn test_persisted_session_loads_courses() {
        let auth = MemoryAuth::permissive().with_session(Identity::new("u1", None));
        let collection = MemoryCollection::new("cursos").with_courses(vec![course("curso1")]);
        let (mut pool, app) = setup(auth, collection.clone());

        app.start();
        pool.run_until_stalled();

        assert!(app.courses().is_subscribed());
        assert_eq!(app.courses().total(), 1);
        assert_eq!(collection.listener_count(), 1);
    }

    #[test]
    fn test_no_subscription_while_signed_out() {
        let collection = MemoryCollection::new("cursos").with_courses(vec![course("curso1")]);
        let (mut pool, app) = setup(MemoryAuth::permissive(), collection.clone());

        app.start();
        pool.run_until_stalled();

        assert!(!app.courses().is_subscribed());
        assert_eq!(collection.listener_count(), 0);

        pool.run_until(app.session().login("usuario@ejemplo.com", "123456")).unwrap();
        pool.run_until_stalled();
        assert!(app.courses().is_subscribed());
        assert_eq!(app.courses().total(), 1);
    }

    #[test]
    fn test_logout_stops_subscription_and_redirects() {
        let auth = MemoryAuth::permissive().with_session(Identity::new("u1", None));
        let collection = MemoryCollection::new("cursos");
        let (mut pool, app) = setup(auth, collection.clone());
        app.start();

        let route = pool.run_until(app.router().navigate("/admin")).unwrap();
        assert_eq!(route, Route::new(RouteName::Admin));
        assert!(app.courses().is_subscribed());

        pool.run_until(app.logout()).unwrap();
        pool.run_until_stalled();

        assert!(!app.courses().is_subscribed());
        assert_eq!(collection.listener_count(), 0);
        assert_eq!(app.router().current(), Some(Route::new(RouteName::Login)));
    }

    #[test]
    fn test_logout_keeps_subscription_stopped_on_return() {
        let auth = MemoryAuth::permissive().with_session(Identity::new("u1", None));
        let collection = MemoryCollection::new("cursos");
        let (mut pool, app) = setup(auth, collection.clone());
        app.start();
        pool.run_until_stalled();
        assert!(app.courses().is_subscribed());

        assert_eq!(pool.run_until(app.logout()), Ok(()));
        assert!(!app.courses().is_subscribed());
        assert_eq!(collection.listener_count(), 0);
    }

    #[test]
    fn test_broken_subscription_is_not_reopened_by_session_updates() {
        let auth = MemoryAuth::permissive().with_session(Identity::new("u1", None));
        let collection = MemoryCollection::new("cursos").with_courses(vec![course("curso1")]);
        let (mut pool, app) = setup(auth.clone(), collection.clone());
        app.start();
        pool.run_until_stalled();

        collection.break_subscriptions(ServiceError::PermissionDenied("reglas".to_string()));
        pool.run_until_stalled();
        assert!(!app.courses().is_subscribed());

        // un error de login o de logout no es un cambio de sesión
        auth.fail_next(AuthErrorCode::WrongPassword);
        assert!(pool.run_until(app.session().login("u1@ejemplo.com", "otra")).is_err());
        auth.fail_next(AuthErrorCode::Network("caída".to_string()));
        assert!(pool.run_until(app.logout()).is_err());
        pool.run_until_stalled();

        assert!(app.session().is_authenticated());
        assert!(!app.courses().is_subscribed());
        assert_eq!(collection.listener_count(), 0);
    }

    #[test]
    fn test_sign_in_again_reopens_subscription() {
        let auth = MemoryAuth::permissive().with_session(Identity::new("u1", None));
        let collection = MemoryCollection::new("cursos");
        let (mut pool, app) = setup(auth, collection.clone());
        app.start();
        pool.run_until_stalled();

        pool.run_until(app.logout()).unwrap();
        pool.run_until_stalled();
        assert!(!app.courses().is_subscribed());

        pool.run_until(app.session().login("u1@ejemplo.com", "123456")).unwrap();
        pool.run_until_stalled();
        assert!(app.courses().is_subscribed());
        assert_eq!(collection.listener_count(), 1);
    }

    #[test]
    fn test_start_twice_registers_once() {
        let auth = MemoryAuth::permissive().with_session(Identity::new("u1", None));
        let collection = MemoryCollection::new("cursos");
        let (mut pool, app) = setup(auth.clone(), collection.clone());

        app.start();
        app.start();
        pool.run_until_stalled();

        assert_eq!(auth.registration_count(), 1);
        assert_eq!(collection.listener_count(), 1);
    }

    #[test]
    fn test_dispose_releases_everything() {
        let auth = MemoryAuth::permissive().with_session(Identity::new("u1", None));
        let collection = MemoryCollection::new("cursos");
        let (mut pool, app) = setup(auth.clone(), collection.clone());
        app.start();
        pool.run_until_stalled();

        app.dispose();
        pool.run_until_stalled();

        assert_eq!(auth.listener_count(), 0);
        assert_eq!(collection.listener_count(), 0);
    }
}
