// ============================================================================
// REACTIVITY - Estado con notificación a subscribers (binding de las vistas)
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

type Callback = Rc<dyn Fn()>;

/// Identificador de un subscriber, para poder darlo de baja
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchId(usize);

/// Estado reactivo: cada `set`/`update` notifica a todos los subscribers.
/// Los clones comparten valor y subscribers.
pub struct ReactiveState<T> {
    value: Rc<RefCell<T>>,
    subscribers: Rc<RefCell<Vec<(WatchId, Callback)>>>,
    next_id: Rc<Cell<usize>>,
}

impl<T> ReactiveState<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Rc::new(RefCell::new(value)),
            subscribers: Rc::new(RefCell::new(Vec::new())),
            next_id: Rc::new(Cell::new(0)),
        }
    }

    /// Leer el valor sin clonarlo
    pub fn with<R>(&self, reader: impl FnOnce(&T) -> R) -> R {
        reader(&self.value.borrow())
    }

    /// Establecer nuevo valor y notificar
    pub fn set(&self, new_value: T) {
        *self.value.borrow_mut() = new_value;
        self.notify();
    }

    /// Actualizar con closure y notificar
    pub fn update<F>(&self, updater: F)
    where
        F: FnOnce(&mut T),
    {
        updater(&mut self.value.borrow_mut());
        self.notify();
    }

    /// Suscribirse a cambios
    pub fn subscribe<F>(&self, callback: F) -> WatchId
    where
        F: Fn() + 'static,
    {
        let id = WatchId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscribers.borrow_mut().push((id, Rc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: WatchId) {
        self.subscribers.borrow_mut().retain(|(watch_id, _)| *watch_id != id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Notificar a todos los subscribers.
    /// Se copia la lista: un callback puede suscribir o leer el valor.
    fn notify(&self) {
        let callbacks: Vec<Callback> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback();
        }
    }
}

impl<T: Clone> ReactiveState<T> {
    /// Copia del valor actual
    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }
}

impl<T> Clone for ReactiveState<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            subscribers: self.subscribers.clone(),
            next_id: self.next_id.clone(),
        }
    }
}

impl<T: Default> Default for ReactiveState<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_notifies_and_unsubscribe_stops() {
        let state = ReactiveState::new(0u32);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let id = {
            let seen = seen.clone();
            let reader = state.clone();
            state.subscribe(move || seen.borrow_mut().push(reader.get()))
        };

        state.set(3);
        state.update(|v| *v += 1);
        state.unsubscribe(id);
        state.set(10);

        assert_eq!(*seen.borrow(), vec![3, 4]);
        assert_eq!(state.subscriber_count(), 0);
    }

    #[test]
    fn test_callback_may_subscribe_during_notify() {
        let state = ReactiveState::new(());
        let inner = state.clone();
        state.subscribe(move || {
            inner.subscribe(|| {});
        });

        state.set(());
        assert_eq!(state.subscriber_count(), 2);
    }
}
