use std::rc::Rc;

use futures::task::LocalSpawn;

/// Ejecutor de tareas locales inyectado en los stores
/// (`LocalPool` en nativo, `spawn_local` del navegador en wasm)
pub type Spawner = Rc<dyn LocalSpawn>;

#[cfg(target_arch = "wasm32")]
pub use browser::BrowserSpawner;

#[cfg(target_arch = "wasm32")]
mod browser {
    use futures::future::LocalFutureObj;
    use futures::task::{LocalSpawn, SpawnError};

    /// Lanza las tareas en el event loop del navegador
    pub struct BrowserSpawner;

    impl LocalSpawn for BrowserSpawner {
        fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
            wasm_bindgen_futures::spawn_local(future);
            Ok(())
        }
    }
}
