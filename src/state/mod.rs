// ============================================================================
// STATE MODULE - Stores con Rc<RefCell> + notificaciones
// ============================================================================

pub mod course_store;
pub mod reactivity;
pub mod session_store;

pub use course_store::{CourseState, CourseStore};
pub use reactivity::{ReactiveState, WatchId};
pub use session_store::{SessionState, SessionStore};
