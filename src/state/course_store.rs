// ============================================================================
// COURSE STORE - Espejo en vivo de la colección de cursos
// ============================================================================
// Una única suscripción push entrega el snapshot completo en cada cambio y
// reemplaza `items` entero. Las acciones de escritura solo escriben en la
// colección remota: el cambio se ve cuando llega el siguiente snapshot.
// ============================================================================

use std::cell::RefCell;
use std::rc::Rc;

use chrono::Utc;
use futures::future::{AbortHandle, Abortable};
use futures::task::LocalSpawnExt;
use futures::StreamExt;

use crate::models::{Course, CoursePatch, NewCourse};
use crate::services::{CancelHandle, CourseCollection, ServiceError, SnapshotEvent, Subscription};
use crate::state::reactivity::{ReactiveState, WatchId};
use crate::utils::Spawner;

pub const MSG_LOAD_FAILED: &str =
    "No se pudieron cargar los cursos. Verifique la conexión a Firebase.";
pub const MSG_FETCH_ONE_FAILED: &str = "Fallo al obtener el curso específico.";
pub const MSG_CREATE_FAILED: &str = "Fallo al crear el curso.";
pub const MSG_UPDATE_FAILED: &str = "Fallo al actualizar el curso.";
pub const MSG_DELETE_FAILED: &str = "Fallo al eliminar el curso.";

fn not_found_message(id: &str) -> String {
    format!("Curso con ID {} no encontrado.", id)
}

/// Estado visible por las vistas
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CourseState {
    pub items: Vec<Course>,
    /// Esperando el primer snapshot de la suscripción
    pub loading: bool,
    /// Escritura en curso
    pub saving: bool,
    pub error: Option<String>,
}

struct ActiveSubscription {
    remote: CancelHandle,
    task: AbortHandle,
}

impl ActiveSubscription {
    fn cancel(self) {
        self.remote.cancel();
        self.task.abort();
    }
}

struct CourseInner<C> {
    collection: C,
    spawner: Spawner,
    state: ReactiveState<CourseState>,
    subscription: RefCell<Option<ActiveSubscription>>,
}

/// Store de cursos
pub struct CourseStore<C> {
    inner: Rc<CourseInner<C>>,
}

impl<C> Clone for CourseStore<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: CourseCollection + 'static> CourseStore<C> {
    pub fn new(collection: C, spawner: Spawner) -> Self {
        Self {
            inner: Rc::new(CourseInner {
                collection,
                spawner,
                state: ReactiveState::new(CourseState::default()),
                subscription: RefCell::new(None),
            }),
        }
    }

    /// Abrir la suscripción en vivo. Devuelve `false` si ya había una.
    pub fn start_subscription(&self) -> bool {
        if self.inner.subscription.borrow().is_some() {
            log::debug!("📡 Suscripción de cursos ya activa");
            return false;
        }

        self.inner.state.update(|s| {
            s.loading = true;
            s.error = None;
        });

        let Subscription { stream, cancel } = self.inner.collection.subscribe();
        let (task, registration) = AbortHandle::new_pair();

        let store = self.clone();
        let pump = async move {
            let mut stream = stream;
            while let Some(event) = stream.next().await {
                if !store.apply_event(event) {
                    break;
                }
            }
        };

        let task_future = async move {
            let _ = Abortable::new(pump, registration).await;
        };

        if let Err(e) = self.inner.spawner.spawn_local(task_future) {
            log::error!("❌ No se pudo lanzar la suscripción de cursos: {}", e);
            cancel.cancel();
            self.inner.state.update(|s| {
                s.loading = false;
                s.error = Some(MSG_LOAD_FAILED.to_string());
            });
            return false;
        }

        *self.inner.subscription.borrow_mut() = Some(ActiveSubscription {
            remote: cancel,
            task,
        });
        log::info!("📡 Suscripción de cursos iniciada");
        true
    }

    /// Cerrar la suscripción. Devuelve `false` si no había ninguna.
    pub fn stop_subscription(&self) -> bool {
        let active = self.inner.subscription.borrow_mut().take();
        match active {
            Some(active) => {
                active.cancel();
                self.inner.state.update(|s| s.loading = false);
                log::info!("🔌 Suscripción de cursos detenida");
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.subscription.borrow().is_some()
    }

    /// Aplica una entrega. `false` corta el bucle de lectura.
    fn apply_event(&self, event: SnapshotEvent) -> bool {
        match event {
            Ok(courses) => {
                log::debug!("📚 Snapshot recibido: {} cursos", courses.len());
                self.inner.state.update(|s| {
                    s.items = courses;
                    s.loading = false;
                });
                true
            }
            Err(e) => {
                // sin reconexión automática
                log::error!("❌ Error en la suscripción de cursos: {}", e);
                let active = self.inner.subscription.borrow_mut().take();
                if let Some(active) = active {
                    active.remote.cancel();
                }
                self.inner.state.update(|s| {
                    s.loading = false;
                    s.error = Some(MSG_LOAD_FAILED.to_string());
                });
                false
            }
        }
    }

    /// Lectura puntual de un curso. No modifica `items`.
    pub async fn fetch_by_id(&self, id: &str) -> Result<Course, String> {
        self.clear_error();
        match self.inner.collection.read_one(id).await {
            Ok(Some(course)) => Ok(course),
            Ok(None) => {
                let message = not_found_message(id);
                log::warn!("⚠️ {}", message);
                self.set_error(&message);
                Err(message)
            }
            Err(e) => {
                log::error!("❌ Error al obtener curso {}: {}", id, e);
                self.set_error(MSG_FETCH_ONE_FAILED);
                Err(MSG_FETCH_ONE_FAILED.to_string())
            }
        }
    }

    /// Crear curso; devuelve el id generado.
    /// El curso aparece en `items` con el siguiente snapshot, no antes.
    pub async fn create(&self, mut fields: NewCourse) -> Result<String, String> {
        self.begin_write();
        if fields.created_at.is_none() {
            fields.created_at = Some(Utc::now());
        }
        let result = self.inner.collection.create(&fields).await;
        match self.end_write(result, MSG_CREATE_FAILED) {
            Ok(id) => {
                log::info!("✅ Curso creado: {} ({})", fields.name, id);
                Ok(id)
            }
            Err(message) => Err(message),
        }
    }

    /// Actualización parcial. Visible con el siguiente snapshot.
    pub async fn update(&self, id: &str, patch: CoursePatch) -> Result<(), String> {
        self.begin_write();
        let result = self.inner.collection.update(id, &patch).await;
        self.end_write(result, MSG_UPDATE_FAILED)?;
        log::info!("✅ Curso actualizado: {}", id);
        Ok(())
    }

    /// Eliminar curso. Desaparece de `items` con el siguiente snapshot.
    pub async fn delete(&self, id: &str) -> Result<(), String> {
        self.begin_write();
        let result = self.inner.collection.delete(id).await;
        self.end_write(result, MSG_DELETE_FAILED)?;
        log::info!("🗑️ Curso eliminado: {}", id);
        Ok(())
    }

    fn begin_write(&self) {
        self.inner.state.update(|s| {
            s.saving = true;
            s.error = None;
        });
    }

    fn end_write<T>(&self, result: Result<T, ServiceError>, message: &str) -> Result<T, String> {
        match result {
            Ok(value) => {
                self.inner.state.update(|s| s.saving = false);
                Ok(value)
            }
            Err(e) => {
                log::error!("❌ {} ({})", message, e);
                self.inner.state.update(|s| {
                    s.saving = false;
                    s.error = Some(message.to_string());
                });
                Err(message.to_string())
            }
        }
    }

    fn clear_error(&self) {
        self.inner.state.update(|s| s.error = None);
    }

    fn set_error(&self, message: &str) {
        self.inner.state.update(|s| s.error = Some(message.to_string()));
    }
}

impl<C> CourseStore<C> {
    pub fn items(&self) -> Vec<Course> {
        self.inner.state.with(|s| s.items.clone())
    }

    pub fn total(&self) -> usize {
        self.inner.state.with(|s| s.items.len())
    }

    pub fn active_courses(&self) -> Vec<Course> {
        self.inner
            .state
            .with(|s| s.items.iter().filter(|c| c.active).cloned().collect())
    }

    /// Búsqueda en el espejo local (sin ir a la colección)
    pub fn get_by_id(&self, id: &str) -> Option<Course> {
        self.inner
            .state
            .with(|s| s.items.iter().find(|c| c.id == id).cloned())
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.with(|s| s.loading)
    }

    pub fn is_saving(&self) -> bool {
        self.inner.state.with(|s| s.saving)
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.with(|s| s.error.clone())
    }

    pub fn snapshot(&self) -> CourseState {
        self.inner.state.get()
    }

    pub fn watch<F>(&self, callback: F) -> WatchId
    where
        F: Fn() + 'static,
    {
        self.inner.state.subscribe(callback)
    }

    pub fn unwatch(&self, id: WatchId) {
        self.inner.state.unsubscribe(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::CollectionCall;
    use crate::services::MemoryCollection;
    use futures::executor::LocalPool;

    fn course(id: &str, name: &str, active: bool) -> Course {
        Course::from_new(
            id,
            NewCourse {
                name: name.to_string(),
                code: "001".to_string(),
                price: 1000,
                enrolled: 0,
                capacity: 10,
                active,
                created_at: None,
            },
        )
    }

    fn new_course(name: &str) -> NewCourse {
        NewCourse {
            name: name.to_string(),
            code: "RS-101".to_string(),
            price: 45000,
            enrolled: 3,
            capacity: 20,
            active: true,
            created_at: None,
        }
    }

    fn setup(collection: MemoryCollection) -> (LocalPool, CourseStore<MemoryCollection>) {
        let _ = env_logger::builder().is_test(true).try_init();
        let pool = LocalPool::new();
        let store = CourseStore::new(collection, Rc::new(pool.spawner()));
        (pool, store)
    }

    #[test]
    fn test_loading_until_first_snapshot() {
        let collection =
            MemoryCollection::new("cursos").with_courses(vec![course("curso1", "Curso de Prueba", true)]);
        let (mut pool, store) = setup(collection);

        assert!(store.start_subscription());
        assert!(store.is_loading());
        assert!(store.items().is_empty());

        pool.run_until_stalled();
        assert!(!store.is_loading());
        assert_eq!(store.total(), 1);
    }

    #[test]
    fn test_start_twice_keeps_one_listener() {
        let collection = MemoryCollection::new("cursos");
        let (mut pool, store) = setup(collection.clone());

        assert!(store.start_subscription());
        assert!(!store.start_subscription());
        pool.run_until_stalled();
        assert_eq!(collection.listener_count(), 1);

        assert!(store.stop_subscription());
        assert!(!store.stop_subscription());
        assert_eq!(collection.listener_count(), 0);

        assert!(store.start_subscription());
        pool.run_until_stalled();
        assert_eq!(collection.listener_count(), 1);

        collection.insert_remote(course("otro", "Agregado por otro cliente", true));
        pool.run_until_stalled();
        assert_eq!(store.total(), 1);
    }

    #[test]
    fn test_create_returns_fresh_id_and_mirror_converges() {
        let collection = MemoryCollection::new("cursos").with_courses(vec![
            course("curso1", "Curso de Prueba", true),
            course("curso2", "Otro", false),
        ]);
        let (mut pool, store) = setup(collection.clone());
        store.start_subscription();
        pool.run_until_stalled();
        let before: Vec<String> = store.items().into_iter().map(|c| c.id).collect();

        let id = pool.run_until(store.create(new_course("Rust Básico"))).unwrap();
        assert!(!before.contains(&id));

        pool.run_until_stalled();
        let created = store.get_by_id(&id).unwrap();
        assert_eq!(created.name, "Rust Básico");
        assert!(created.created_at.is_some());
        assert_eq!(store.total(), 3);
        assert!(!store.is_saving());
    }

    #[test]
    fn test_failed_write_sets_error_and_keeps_items() {
        let collection =
            MemoryCollection::new("cursos").with_courses(vec![course("curso1", "Curso de Prueba", true)]);
        let (mut pool, store) = setup(collection.clone());
        store.start_subscription();
        pool.run_until_stalled();
        let before = store.items();

        collection.fail_next(ServiceError::Network("timeout".to_string()));
        let result = pool.run_until(store.create(new_course("No llega")));
        pool.run_until_stalled();

        assert_eq!(result, Err(MSG_CREATE_FAILED.to_string()));
        assert_eq!(store.error(), Some(MSG_CREATE_FAILED.to_string()));
        assert_eq!(store.items(), before);

        // el siguiente intento limpia el error
        let patch = CoursePatch {
            enrolled: Some(5),
            ..Default::default()
        };
        assert_eq!(pool.run_until(store.update("curso1", patch)), Ok(()));
        pool.run_until_stalled();
        assert_eq!(store.error(), None);
        assert_eq!(store.get_by_id("curso1").map(|c| c.enrolled), Some(5));
    }

    #[test]
    fn test_delete_calls_remote_once_and_mirror_converges() {
        let collection =
            MemoryCollection::new("cursos").with_courses(vec![course("curso1", "Curso de Prueba", true)]);
        let (mut pool, store) = setup(collection.clone());
        store.start_subscription();
        pool.run_until_stalled();
        assert!(store.get_by_id("curso1").is_some());

        assert_eq!(pool.run_until(store.delete("curso1")), Ok(()));
        pool.run_until_stalled();

        let deletes: Vec<CollectionCall> = collection
            .calls()
            .into_iter()
            .filter(|c| matches!(c, CollectionCall::Delete(_)))
            .collect();
        assert_eq!(deletes, vec![CollectionCall::Delete("curso1".to_string())]);
        assert!(store.get_by_id("curso1").is_none());
        assert_eq!(store.total(), 0);
    }

    #[test]
    fn test_update_missing_course_fails() {
        let (mut pool, store) = setup(MemoryCollection::new("cursos"));

        let result = pool.run_until(store.update("fantasma", CoursePatch::default()));
        assert_eq!(result, Err(MSG_UPDATE_FAILED.to_string()));
        assert_eq!(store.error(), Some(MSG_UPDATE_FAILED.to_string()));
    }

    #[test]
    fn test_fetch_by_id_does_not_touch_items() {
        let collection =
            MemoryCollection::new("cursos").with_courses(vec![course("curso1", "Curso de Prueba", true)]);
        let (mut pool, store) = setup(collection.clone());

        let found = pool.run_until(store.fetch_by_id("curso1")).unwrap();
        assert_eq!(found.name, "Curso de Prueba");
        assert!(store.items().is_empty());

        let missing = pool.run_until(store.fetch_by_id("nada"));
        assert_eq!(missing, Err("Curso con ID nada no encontrado.".to_string()));

        collection.set_offline(true);
        let offline = pool.run_until(store.fetch_by_id("curso1"));
        assert_eq!(offline, Err(MSG_FETCH_ONE_FAILED.to_string()));
    }

    #[test]
    fn test_subscription_error_cancels_without_retry() {
        let collection =
            MemoryCollection::new("cursos").with_courses(vec![course("curso1", "Curso de Prueba", true)]);
        let (mut pool, store) = setup(collection.clone());
        store.start_subscription();
        pool.run_until_stalled();

        collection.break_subscriptions(ServiceError::PermissionDenied("reglas".to_string()));
        pool.run_until_stalled();

        assert!(!store.is_subscribed());
        assert_eq!(store.error(), Some(MSG_LOAD_FAILED.to_string()));
        // el espejo queda con el último snapshot
        assert_eq!(store.total(), 1);
        assert_eq!(collection.listener_count(), 0);

        // se puede volver a suscribir explícitamente
        assert!(store.start_subscription());
        pool.run_until_stalled();
        assert_eq!(store.error(), None);
        assert_eq!(collection.listener_count(), 1);
    }

    #[test]
    fn test_offline_subscription_reports_error() {
        let collection = MemoryCollection::new("cursos");
        collection.set_offline(true);
        let (mut pool, store) = setup(collection);

        store.start_subscription();
        pool.run_until_stalled();

        assert!(!store.is_loading());
        assert!(!store.is_subscribed());
        assert_eq!(store.error(), Some(MSG_LOAD_FAILED.to_string()));
    }

    #[test]
    fn test_active_courses_getter() {
        let collection = MemoryCollection::new("cursos").with_courses(vec![
            course("a", "Activo", true),
            course("b", "Inactivo", false),
        ]);
        let (mut pool, store) = setup(collection);
        store.start_subscription();
        pool.run_until_stalled();

        let active: Vec<String> = store.active_courses().into_iter().map(|c| c.id).collect();
        assert_eq!(active, vec!["a".to_string()]);
    }
}
