// ============================================================================
// FIREBASE - Backends REST (Identity Toolkit + Firestore)
// ============================================================================
// El codec compila en todos los targets; los clientes HTTP solo en wasm32.
// ============================================================================

pub mod codec;

#[cfg(target_arch = "wasm32")]
mod auth;
#[cfg(target_arch = "wasm32")]
mod firestore;

#[cfg(target_arch = "wasm32")]
pub use auth::FirebaseAuth;
#[cfg(target_arch = "wasm32")]
pub use firestore::FirestoreCollection;
