/// Colección de cursos por defecto
pub const DEFAULT_COURSES_COLLECTION: &str = "cursos";

/// Endpoints REST de Firebase (sobrescribibles para el emulador)
pub const DEFAULT_AUTH_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com/v1";
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://securetoken.googleapis.com/v1";

/// Margen antes del vencimiento del id token para renovarlo
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Cada cuánto se consulta la colección para emular la entrega en tiempo real
pub const DEFAULT_SNAPSHOT_POLL_INTERVAL_MS: u32 = 5_000;

/// Clave de localStorage con la sesión de auth persistida
pub const STORAGE_KEY_AUTH_SESSION: &str = "cursosAdmin_authSession";
