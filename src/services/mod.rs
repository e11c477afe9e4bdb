// ============================================================================
// SERVICES - SOLO comunicación con los servicios remotos
// ============================================================================
// Auth y colección de documentos son sistemas externos: los stores los
// reciben por constructor a través de estos traits.
// ============================================================================

pub mod error;
pub mod firebase;
pub mod memory;
pub mod subscription;

pub use error::ServiceError;
pub use memory::{MemoryAuth, MemoryCollection};
pub use subscription::{CancelHandle, Subscription};

use crate::models::{AuthErrorCode, Course, CoursePatch, Identity, NewCourse};

/// Snapshot completo de la colección o el error que cortó la entrega
pub type SnapshotEvent = Result<Vec<Course>, ServiceError>;

/// Servicio de autenticación remoto
#[allow(async_fn_in_trait)]
pub trait AuthService {
    async fn verify_credentials(&self, email: &str, password: &str) -> Result<Identity, AuthErrorCode>;

    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthErrorCode>;

    async fn end_session(&self) -> Result<(), AuthErrorCode>;

    /// Cambios de sesión. La primera entrega es el estado actual
    /// (identidad persistida o `None`).
    fn session_changes(&self) -> Subscription<Option<Identity>>;
}

/// Colección remota de cursos, ligada a un nombre de colección al construirse
#[allow(async_fn_in_trait)]
pub trait CourseCollection {
    async fn read_all(&self) -> Result<Vec<Course>, ServiceError>;

    async fn read_one(&self, id: &str) -> Result<Option<Course>, ServiceError>;

    /// Devuelve el id generado
    async fn create(&self, fields: &NewCourse) -> Result<String, ServiceError>;

    async fn update(&self, id: &str, patch: &CoursePatch) -> Result<(), ServiceError>;

    async fn delete(&self, id: &str) -> Result<(), ServiceError>;

    /// Suscripción push: entrega el snapshot completo en cada cambio.
    /// Un `Err` termina la entrega.
    fn subscribe(&self) -> Subscription<SnapshotEvent>;
}
