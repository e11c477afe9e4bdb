// ============================================================================
// MEMORY BACKEND - Auth y colección en memoria (modo offline / demo / tests)
// ============================================================================
// Se comportan como los servicios remotos: la colección re-entrega el
// snapshot completo en cada escritura y el auth notifica cada cambio de
// sesión a todos sus listeners.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use futures::channel::mpsc::unbounded;
use futures::StreamExt;

use crate::models::{AuthErrorCode, Course, CoursePatch, Identity, NewCourse};
use crate::services::subscription::Listeners;
use crate::services::{
    AuthService, CancelHandle, CourseCollection, ServiceError, SnapshotEvent, Subscription,
};

const MIN_PASSWORD_LEN: usize = 6;
const GENERATED_ID_LEN: usize = 20;

/// Id con la forma de los ids automáticos de la colección (20 caracteres)
fn generate_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(GENERATED_ID_LEN);
    id
}

// ----------------------------------------------------------------------------
// AUTH
// ----------------------------------------------------------------------------

struct Account {
    uid: String,
    password: String,
}

struct AuthInner {
    accounts: RefCell<HashMap<String, Account>>,
    current: RefCell<Option<Identity>>,
    listeners: Listeners<Option<Identity>>,
    accept_any: bool,
    fail_next: RefCell<Option<AuthErrorCode>>,
}

/// Servicio de auth en memoria
#[derive(Clone)]
pub struct MemoryAuth {
    inner: Rc<AuthInner>,
}

impl MemoryAuth {
    /// Solo acepta cuentas registradas
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Acepta cualquier credencial (cuenta creada al vuelo)
    pub fn permissive() -> Self {
        Self::build(true)
    }

    fn build(accept_any: bool) -> Self {
        Self {
            inner: Rc::new(AuthInner {
                accounts: RefCell::new(HashMap::new()),
                current: RefCell::new(None),
                listeners: Listeners::new(),
                accept_any,
                fail_next: RefCell::new(None),
            }),
        }
    }

    pub fn with_account(self, email: &str, password: &str) -> Self {
        self.inner.accounts.borrow_mut().insert(
            email.to_string(),
            Account {
                uid: generate_id(),
                password: password.to_string(),
            },
        );
        self
    }

    /// Sesión persistida de una ejecución anterior
    pub fn with_session(self, identity: Identity) -> Self {
        *self.inner.current.borrow_mut() = Some(identity);
        self
    }

    /// La próxima operación falla con este código
    pub fn fail_next(&self, code: AuthErrorCode) {
        *self.inner.fail_next.borrow_mut() = Some(code);
    }

    pub fn current(&self) -> Option<Identity> {
        self.inner.current.borrow().clone()
    }

    /// Listeners conectados ahora mismo
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.active()
    }

    /// Listeners registrados desde el inicio (incluye los cancelados)
    pub fn registration_count(&self) -> usize {
        self.inner.listeners.registered()
    }

    fn take_failure(&self) -> Result<(), AuthErrorCode> {
        match self.inner.fail_next.borrow_mut().take() {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn set_current(&self, identity: Option<Identity>) {
        *self.inner.current.borrow_mut() = identity.clone();
        self.inner.listeners.broadcast(identity);
    }
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthService for MemoryAuth {
    async fn verify_credentials(&self, email: &str, password: &str) -> Result<Identity, AuthErrorCode> {
        self.take_failure()?;

        let uid = {
            let mut accounts = self.inner.accounts.borrow_mut();
            let existing = accounts
                .get(email)
                .map(|account| (account.uid.clone(), account.password == password));
            match existing {
                Some((uid, true)) => uid,
                Some((uid, false)) if self.inner.accept_any => uid,
                Some(_) => return Err(AuthErrorCode::WrongPassword),
                None if self.inner.accept_any => {
                    let uid = generate_id();
                    accounts.insert(
                        email.to_string(),
                        Account {
                            uid: uid.clone(),
                            password: password.to_string(),
                        },
                    );
                    uid
                }
                None => return Err(AuthErrorCode::UserNotFound),
            }
        };

        let identity = Identity::new(uid, Some(email.to_string()));
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthErrorCode> {
        self.take_failure()?;

        if !email.contains('@') {
            return Err(AuthErrorCode::InvalidEmail);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthErrorCode::WeakPassword);
        }

        let uid = generate_id();
        {
            let mut accounts = self.inner.accounts.borrow_mut();
            if accounts.contains_key(email) {
                return Err(AuthErrorCode::EmailAlreadyInUse);
            }
            accounts.insert(
                email.to_string(),
                Account {
                    uid: uid.clone(),
                    password: password.to_string(),
                },
            );
        }

        // igual que el servicio real: crear la cuenta inicia sesión
        let identity = Identity::new(uid, Some(email.to_string()));
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    async fn end_session(&self) -> Result<(), AuthErrorCode> {
        self.take_failure()?;
        self.set_current(None);
        Ok(())
    }

    fn session_changes(&self) -> Subscription<Option<Identity>> {
        self.inner.listeners.subscribe(self.current())
    }
}

// ----------------------------------------------------------------------------
// COLECCIÓN
// ----------------------------------------------------------------------------

/// Llamadas recibidas por la colección (para verificar escrituras)
#[derive(Clone, Debug, PartialEq)]
pub enum CollectionCall {
    ReadAll,
    ReadOne(String),
    Create(String),
    Update(String),
    Delete(String),
}

struct CollectionInner {
    name: String,
    docs: RefCell<Vec<Course>>,
    listeners: Listeners<SnapshotEvent>,
    calls: RefCell<Vec<CollectionCall>>,
    fail_next: RefCell<Option<ServiceError>>,
    offline: Cell<bool>,
}

/// Colección de cursos en memoria con entrega push de snapshots
#[derive(Clone)]
pub struct MemoryCollection {
    inner: Rc<CollectionInner>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(CollectionInner {
                name: name.into(),
                docs: RefCell::new(Vec::new()),
                listeners: Listeners::new(),
                calls: RefCell::new(Vec::new()),
                fail_next: RefCell::new(None),
                offline: Cell::new(false),
            }),
        }
    }

    /// Documentos iniciales (sin notificar)
    pub fn with_courses(self, courses: Vec<Course>) -> Self {
        *self.inner.docs.borrow_mut() = courses;
        self
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn docs(&self) -> Vec<Course> {
        self.inner.docs.borrow().clone()
    }

    pub fn calls(&self) -> Vec<CollectionCall> {
        self.inner.calls.borrow().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.active()
    }

    /// La próxima operación falla con este error
    pub fn fail_next(&self, error: ServiceError) {
        *self.inner.fail_next.borrow_mut() = Some(error);
    }

    /// Sin conexión: todas las operaciones fallan hasta volver a `false`
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.set(offline);
    }

    /// Cambio hecho por otro cliente: se notifica como cualquier escritura
    pub fn insert_remote(&self, course: Course) {
        self.inner.docs.borrow_mut().push(course);
        self.notify();
    }

    /// El servidor corta todas las suscripciones con un error
    pub fn break_subscriptions(&self, error: ServiceError) {
        self.inner.listeners.broadcast(Err(error));
        self.inner.listeners.clear();
    }

    fn record(&self, call: CollectionCall) {
        self.inner.calls.borrow_mut().push(call);
    }

    fn check(&self) -> Result<(), ServiceError> {
        if self.inner.offline.get() {
            return Err(ServiceError::Network("sin conexión".to_string()));
        }
        match self.inner.fail_next.borrow_mut().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn notify(&self) {
        let snapshot = self.docs();
        self.inner.listeners.broadcast(Ok(snapshot));
    }
}

impl CourseCollection for MemoryCollection {
    async fn read_all(&self) -> Result<Vec<Course>, ServiceError> {
        self.record(CollectionCall::ReadAll);
        self.check()?;
        Ok(self.docs())
    }

    async fn read_one(&self, id: &str) -> Result<Option<Course>, ServiceError> {
        self.record(CollectionCall::ReadOne(id.to_string()));
        self.check()?;
        Ok(self.inner.docs.borrow().iter().find(|c| c.id == id).cloned())
    }

    async fn create(&self, fields: &NewCourse) -> Result<String, ServiceError> {
        self.check()?;
        let id = generate_id();
        self.record(CollectionCall::Create(id.clone()));
        self.inner
            .docs
            .borrow_mut()
            .push(Course::from_new(id.clone(), fields.clone()));
        self.notify();
        Ok(id)
    }

    async fn update(&self, id: &str, patch: &CoursePatch) -> Result<(), ServiceError> {
        self.record(CollectionCall::Update(id.to_string()));
        self.check()?;
        {
            let mut docs = self.inner.docs.borrow_mut();
            let course = docs
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;
            course.apply_patch(patch);
        }
        self.notify();
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        self.record(CollectionCall::Delete(id.to_string()));
        self.check()?;
        self.inner.docs.borrow_mut().retain(|c| c.id != id);
        self.notify();
        Ok(())
    }

    fn subscribe(&self) -> Subscription<SnapshotEvent> {
        if let Err(error) = self.check() {
            let (sender, receiver) = unbounded();
            let _ = sender.unbounded_send(Err(error));
            return Subscription::new(receiver.boxed_local(), CancelHandle::noop());
        }

        self.inner.listeners.subscribe(Ok(self.docs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn sample(id: &str) -> Course {
        Course::from_new(
            id,
            NewCourse {
                name: "Curso de Prueba".to_string(),
                code: "001".to_string(),
                price: 1000,
                enrolled: 0,
                capacity: 10,
                active: true,
                created_at: None,
            },
        )
    }

    #[test]
    fn test_register_rules() {
        let auth = MemoryAuth::new().with_account("ya@existe.cl", "secreto1");

        let weak = block_on(auth.create_account("nuevo@ejemplo.com", "123"));
        assert_eq!(weak, Err(AuthErrorCode::WeakPassword));

        let dup = block_on(auth.create_account("ya@existe.cl", "secreto1"));
        assert_eq!(dup, Err(AuthErrorCode::EmailAlreadyInUse));

        let bad = block_on(auth.create_account("sin-arroba", "secreto1"));
        assert_eq!(bad, Err(AuthErrorCode::InvalidEmail));

        let ok = block_on(auth.create_account("nuevo@ejemplo.com", "secreto1")).unwrap();
        assert_eq!(auth.current(), Some(ok));
    }

    #[test]
    fn test_strict_login_rejects_unknown_users() {
        let auth = MemoryAuth::new().with_account("hola@groman.cl", "123xmi");

        assert_eq!(
            block_on(auth.verify_credentials("otro@groman.cl", "123xmi")),
            Err(AuthErrorCode::UserNotFound)
        );
        assert_eq!(
            block_on(auth.verify_credentials("hola@groman.cl", "incorrecta")),
            Err(AuthErrorCode::WrongPassword)
        );
        assert!(block_on(auth.verify_credentials("hola@groman.cl", "123xmi")).is_ok());
    }

    #[test]
    fn test_session_changes_replays_current_and_cancels() {
        let auth = MemoryAuth::permissive().with_session(Identity::new("u1", None));
        let Subscription { mut stream, cancel } = auth.session_changes();

        let first = block_on(stream.next()).flatten();
        assert_eq!(first.map(|i| i.uid), Some("u1".to_string()));
        assert_eq!(auth.listener_count(), 1);

        cancel.cancel();
        assert_eq!(auth.listener_count(), 0);
        assert_eq!(block_on(stream.next()), None);
    }

    #[test]
    fn test_writes_broadcast_full_snapshot() {
        let collection = MemoryCollection::new("cursos").with_courses(vec![sample("curso1")]);
        let Subscription { mut stream, cancel: _cancel } = collection.subscribe();

        let initial = block_on(stream.next()).unwrap().unwrap();
        assert_eq!(initial.len(), 1);

        block_on(collection.delete("curso1")).unwrap();
        let after = block_on(stream.next()).unwrap().unwrap();
        assert!(after.is_empty());
        assert_eq!(collection.calls(), vec![CollectionCall::Delete("curso1".to_string())]);
    }

    #[test]
    fn test_update_missing_document_fails() {
        let collection = MemoryCollection::new("cursos");
        let result = block_on(collection.update("nope", &CoursePatch::default()));
        assert_eq!(result, Err(ServiceError::NotFound("nope".to_string())));
    }

    #[test]
    fn test_offline_subscription_yields_error() {
        let collection = MemoryCollection::new("cursos");
        collection.set_offline(true);
        let Subscription { mut stream, .. } = collection.subscribe();

        assert!(matches!(block_on(stream.next()), Some(Err(ServiceError::Network(_)))));
        assert_eq!(collection.listener_count(), 0);
    }
}
