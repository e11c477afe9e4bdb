use gloo_storage::{LocalStorage, Storage};
use serde::{de::DeserializeOwned, Serialize};

pub fn save_to_storage<T: Serialize>(key: &str, value: &T) -> Result<(), String> {
    LocalStorage::set(key, value).map_err(|e| format!("Error guardando en localStorage: {}", e))
}

/// `None` si no existe o no se puede deserializar
pub fn load_from_storage<T: DeserializeOwned>(key: &str) -> Option<T> {
    match LocalStorage::get::<T>(key) {
        Ok(value) => Some(value),
        Err(gloo_storage::errors::StorageError::KeyNotFound(_)) => None,
        Err(e) => {
            log::warn!("⚠️ Dato inválido en localStorage ({}): {}", key, e);
            None
        }
    }
}

pub fn remove_from_storage(key: &str) {
    LocalStorage::delete(key);
}
