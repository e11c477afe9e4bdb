use thiserror::Error;

/// Errores de la colección remota (red, permisos, datos)
#[derive(Clone, PartialEq, Debug, Error)]
pub enum ServiceError {
    #[error("error de red: {0}")]
    Network(String),
    #[error("permiso denegado: {0}")]
    PermissionDenied(String),
    #[error("documento no encontrado: {0}")]
    NotFound(String),
    #[error("error de decodificación: {0}")]
    Decode(String),
    #[error("servicio no disponible")]
    Unavailable,
}

impl ServiceError {
    /// Clasificar una respuesta HTTP no exitosa
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => Self::PermissionDenied(body.to_string()),
            404 => Self::NotFound(body.to_string()),
            503 => Self::Unavailable,
            _ => Self::Network(format!("HTTP {}: {}", status, body)),
        }
    }
}
