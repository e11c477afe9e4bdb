// ============================================================================
// SUBSCRIPTION - Stream de notificaciones + handle de cancelación
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::stream::LocalBoxStream;
use futures::StreamExt;

type CancelFn = Box<dyn FnOnce()>;

/// Handle de cancelación. `cancel()` es idempotente: la función de
/// desconexión se ejecuta como mucho una vez.
#[derive(Clone)]
pub struct CancelHandle {
    inner: Rc<RefCell<Option<CancelFn>>>,
}

impl CancelHandle {
    pub fn new<F>(on_cancel: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            inner: Rc::new(RefCell::new(Some(Box::new(on_cancel)))),
        }
    }

    /// Handle sin efecto (suscripciones que no tienen nada que liberar)
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    pub fn cancel(&self) {
        // soltar el borrow antes de ejecutar: on_cancel puede tocar este handle
        let on_cancel = self.inner.borrow_mut().take();
        if let Some(on_cancel) = on_cancel {
            on_cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.borrow().is_none()
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Suscripción push: cada elemento del stream es una entrega completa
pub struct Subscription<T> {
    pub stream: LocalBoxStream<'static, T>,
    pub cancel: CancelHandle,
}

impl<T> Subscription<T> {
    pub fn new(stream: LocalBoxStream<'static, T>, cancel: CancelHandle) -> Self {
        Self { stream, cancel }
    }
}

struct ListenersInner<T> {
    senders: RefCell<Vec<(u64, UnboundedSender<T>)>>,
    next_id: Cell<u64>,
    registered: Cell<usize>,
}

/// Listeners de un servicio push. Cada uno recibe su propio stream y se
/// desconecta con su `CancelHandle`.
pub struct Listeners<T> {
    inner: Rc<ListenersInner<T>>,
}

impl<T> Clone for Listeners<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> Listeners<T> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ListenersInner {
                senders: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
                registered: Cell::new(0),
            }),
        }
    }

    /// Registrar un listener; `initial` es su primera entrega
    pub fn subscribe(&self, initial: T) -> Subscription<T> {
        self.register(Some(initial))
    }

    /// Registrar un listener que recibe solo las próximas entregas
    pub fn subscribe_pending(&self) -> Subscription<T> {
        self.register(None)
    }

    fn register(&self, initial: Option<T>) -> Subscription<T> {
        let (sender, receiver) = unbounded();
        if let Some(initial) = initial {
            let _ = sender.unbounded_send(initial);
        }

        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.registered.set(self.inner.registered.get() + 1);
        self.inner.senders.borrow_mut().push((id, sender));

        let weak: Weak<ListenersInner<T>> = Rc::downgrade(&self.inner);
        let cancel = CancelHandle::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.senders.borrow_mut().retain(|(listener_id, _)| *listener_id != id);
            }
        });

        Subscription::new(receiver.boxed_local(), cancel)
    }

    /// Entregar a todos; los receptores cerrados se descartan
    pub fn broadcast(&self, value: T) {
        self.inner
            .senders
            .borrow_mut()
            .retain(|(_, sender)| sender.unbounded_send(value.clone()).is_ok());
    }

    /// Desconectar a todos (sus streams terminan)
    pub fn clear(&self) {
        self.inner.senders.borrow_mut().clear();
    }

    /// Listeners conectados ahora mismo
    pub fn active(&self) -> usize {
        self.inner.senders.borrow().len()
    }

    /// Listeners registrados desde el inicio (incluye los cancelados)
    pub fn registered(&self) -> usize {
        self.inner.registered.get()
    }
}

impl<T: Clone + 'static> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}
