// ============================================================================
// SESSION STORE - Espejo local de la sesión del servicio de auth
// ============================================================================
// `current_user` SOLO cambia con las notificaciones del servicio:
// login/register/logout no lo tocan directamente.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::task::LocalSpawnExt;
use futures::StreamExt;

use crate::models::auth::{MSG_LOGOUT_FAILED, MSG_UNEXPECTED};
use crate::models::{AuthErrorCode, Identity};
use crate::services::{AuthService, CancelHandle, Subscription};
use crate::state::reactivity::{ReactiveState, WatchId};
use crate::utils::Spawner;

/// Estado visible por las vistas
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    pub current_user: Option<Identity>,
    pub loading: bool,
    pub error: Option<String>,
    /// Ya se aplicó al menos una notificación del servicio
    pub ready: bool,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }
}

struct SessionInner<A> {
    auth: A,
    spawner: Spawner,
    state: ReactiveState<SessionState>,
    initialized: Cell<bool>,
    listener: RefCell<Option<CancelHandle>>,
    ready_waiters: RefCell<Vec<oneshot::Sender<()>>>,
}

/// Store de sesión
pub struct SessionStore<A> {
    inner: Rc<SessionInner<A>>,
}

impl<A> Clone for SessionStore<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A: AuthService + 'static> SessionStore<A> {
    pub fn new(auth: A, spawner: Spawner) -> Self {
        Self {
            inner: Rc::new(SessionInner {
                auth,
                spawner,
                state: ReactiveState::new(SessionState::default()),
                initialized: Cell::new(false),
                listener: RefCell::new(None),
                ready_waiters: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Registrar el listener de sesión. Llamar una vez al arrancar;
    /// las llamadas siguientes no hacen nada.
    pub fn init_auth(&self) {
        if self.inner.initialized.replace(true) {
            log::debug!("🔐 init_auth ya fue llamado, se ignora");
            return;
        }

        self.inner.state.update(|s| s.loading = true);

        let Subscription { stream, cancel } = self.inner.auth.session_changes();
        *self.inner.listener.borrow_mut() = Some(cancel.clone());

        let store = self.clone();
        let pump = stream.for_each(move |identity| {
            store.apply_session(identity);
            futures::future::ready(())
        });

        if let Err(e) = self.inner.spawner.spawn_local(pump) {
            log::error!("❌ No se pudo lanzar el listener de sesión: {}", e);
            cancel.cancel();
            self.inner.listener.borrow_mut().take();
            self.inner.state.update(|s| {
                s.loading = false;
                s.error = Some(MSG_UNEXPECTED.to_string());
            });
        }
    }

    fn apply_session(&self, identity: Option<Identity>) {
        log::info!(
            "🔐 Cambio de sesión. Usuario: {}",
            identity
                .as_ref()
                .and_then(|i| i.email.as_deref())
                .unwrap_or("ninguno")
        );

        self.inner.state.update(|s| {
            s.current_user = identity;
            s.ready = true;
            s.loading = false;
        });

        let waiters = std::mem::take(&mut *self.inner.ready_waiters.borrow_mut());
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }

    /// Se resuelve cuando se aplicó la primera notificación de sesión
    pub fn wait_until_ready(&self) -> impl Future<Output = ()> + 'static {
        let receiver = if self.is_ready() {
            None
        } else {
            let (sender, receiver) = oneshot::channel();
            self.inner.ready_waiters.borrow_mut().push(sender);
            Some(receiver)
        };

        async move {
            if let Some(receiver) = receiver {
                let _ = receiver.await;
            }
        }
    }

    /// Inicio de sesión. El usuario llega después por la notificación.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), String> {
        self.begin();
        let result = self.inner.auth.verify_credentials(email, password).await;
        self.finish("inicio de sesión", result.map(|_| ()))
    }

    /// Registro de cuenta. Mismo contrato que `login`.
    pub async fn register(&self, email: &str, password: &str) -> Result<(), String> {
        self.begin();
        let result = self.inner.auth.create_account(email, password).await;
        self.finish("registro", result.map(|_| ()))
    }

    /// Cierre de sesión. `is_authenticated()` puede seguir en true
    /// hasta que llegue la notificación.
    pub async fn logout(&self) -> Result<(), String> {
        self.begin();
        match self.inner.auth.end_session().await {
            Ok(()) => {
                self.inner.state.update(|s| s.loading = false);
                Ok(())
            }
            Err(e) => {
                log::error!("❌ Error al cerrar sesión: {}", e);
                self.inner.state.update(|s| {
                    s.loading = false;
                    s.error = Some(MSG_LOGOUT_FAILED.to_string());
                });
                Err(MSG_LOGOUT_FAILED.to_string())
            }
        }
    }

    fn begin(&self) {
        self.inner.state.update(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    fn finish(&self, action: &str, result: Result<(), AuthErrorCode>) -> Result<(), String> {
        match result {
            Ok(()) => {
                self.inner.state.update(|s| s.loading = false);
                Ok(())
            }
            Err(code) => {
                log::error!("❌ Error de {}: {}", action, code);
                let message = code.friendly_message().to_string();
                self.inner.state.update(|s| {
                    s.loading = false;
                    s.error = Some(message.clone());
                });
                Err(message)
            }
        }
    }

    /// Soltar el listener de sesión (al descartar la app)
    pub fn dispose(&self) {
        if let Some(listener) = self.inner.listener.borrow_mut().take() {
            listener.cancel();
        }
    }
}

impl<A> SessionStore<A> {
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.with(SessionState::is_authenticated)
    }

    pub fn current_user(&self) -> Option<Identity> {
        self.inner.state.with(|s| s.current_user.clone())
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.with(|s| s.error.clone())
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.with(|s| s.loading)
    }

    pub fn is_ready(&self) -> bool {
        self.inner.state.with(|s| s.ready)
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.get()
    }

    pub fn snapshot(&self) -> SessionState {
        self.inner.state.get()
    }

    /// Binding reactivo para las vistas
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
