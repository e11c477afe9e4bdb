// ============================================================================
// CURSOS ADMIN - Cliente del catálogo de cursos (RUST PURO)
// ============================================================================
// Arquitectura:
// - Models: Estructuras compartidas con los documentos remotos
// - Services: SOLO comunicación con auth y la colección de cursos
// - State: Stores con Rc<RefCell> + notificaciones a las vistas
// - Router: Rutas + guardia de navegación
// - App: Contexto que conecta todo lo anterior
// ============================================================================

pub mod app;
pub mod config;
pub mod models;
pub mod router;
pub mod services;
pub mod state;
pub mod utils;

pub use app::App;
pub use config::{AppConfig, CONFIG};
pub use models::{Course, CoursePatch, Identity, NewCourse};
pub use router::{Route, RouteName, Router};
pub use services::{AuthService, CourseCollection, MemoryAuth, MemoryCollection, ServiceError};
pub use state::{CourseStore, SessionStore};

#[cfg(target_arch = "wasm32")]
mod web {
    use std::cell::RefCell;
    use std::rc::Rc;

    use wasm_bindgen::prelude::*;

    use crate::app::App;
    use crate::config::{AppConfig, CONFIG};
    use crate::services::firebase::{FirebaseAuth, FirestoreCollection};
    use crate::services::{AuthService, CourseCollection, MemoryAuth, MemoryCollection};
    use crate::utils::spawn::BrowserSpawner;

    /// Instancia viva de la app con el backend elegido al arrancar
    enum RunningApp {
        Firebase(App<FirebaseAuth, FirestoreCollection>),
        Memory(App<MemoryAuth, MemoryCollection>),
    }

    // Variable estática global para mantener la instancia de App
    thread_local! {
        static APP: RefCell<Option<RunningApp>> = RefCell::new(None);
    }

    fn firebase_app(config: &AppConfig) -> Option<App<FirebaseAuth, FirestoreCollection>> {
        let auth = FirebaseAuth::new(&config.firebase)?;
        let collection = FirestoreCollection::new(config, Some(auth.clone()))?;
        Some(App::new(config.clone(), auth, collection, Rc::new(BrowserSpawner)))
    }

    fn memory_app(config: &AppConfig) -> App<MemoryAuth, MemoryCollection> {
        log::warn!("⚠️ Firebase no configurado, usando backends en memoria");
        App::new(
            config.clone(),
            MemoryAuth::permissive(),
            MemoryCollection::new(config.courses_collection.clone()),
            Rc::new(BrowserSpawner),
        )
    }

    fn navigate<A, C>(app: &App<A, C>, path: String)
    where
        A: AuthService + 'static,
        C: CourseCollection + 'static,
    {
        let router = app.router().clone();
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = router.navigate(&path).await {
                log::error!("❌ {}", e);
            }
        });
    }

    fn current_path() -> String {
        web_sys::window()
            .and_then(|w| w.location().pathname().ok())
            .unwrap_or_else(|| "/".to_string())
    }

    #[wasm_bindgen(start)]
    pub fn main() -> Result<(), JsValue> {
        // Inicializar panic hook para mejor debugging
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        let config: &AppConfig = &CONFIG;
        if config.is_logging_enabled() {
            let level = if config.is_production() {
                log::Level::Info
            } else {
                log::Level::Debug
            };
            wasm_logger::init(wasm_logger::Config::new(level));
        }
        log::info!("🚀 Cursos Admin - Rust Puro");

        let firebase = if config.use_memory_backend() {
            None
        } else {
            firebase_app(config)
        };
        let running = match firebase {
            Some(app) => RunningApp::Firebase(app),
            None => RunningApp::Memory(memory_app(config)),
        };

        let path = current_path();
        match &running {
            RunningApp::Firebase(app) => {
                app.start();
                navigate(app, path);
            }
            RunningApp::Memory(app) => {
                app.start();
                navigate(app, path);
            }
        }

        APP.with(|cell| {
            *cell.borrow_mut() = Some(running);
        });
        Ok(())
    }

    /// Navegación desde JavaScript (links y botones de la vista)
    #[wasm_bindgen]
    pub fn navigate_to(path: String) {
        APP.with(|cell| match cell.borrow().as_ref() {
            Some(RunningApp::Firebase(app)) => navigate(app, path),
            Some(RunningApp::Memory(app)) => navigate(app, path),
            None => log::warn!("⚠️ App no está inicializada"),
        });
    }
}
