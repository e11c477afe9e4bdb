// Utils compartidos

pub mod constants;
pub mod spawn;
#[cfg(target_arch = "wasm32")]
pub mod storage;

pub use constants::*;
pub use spawn::Spawner;
