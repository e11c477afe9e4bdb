// ============================================================================
// CODEC - Formato REST de Firestore (valores tipados) e Identity Toolkit
// ============================================================================

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AuthErrorCode, Course, CoursePatch, Identity, NewCourse};
use crate::services::ServiceError;
use crate::utils::constants::TOKEN_REFRESH_MARGIN_SECS;

pub const FIELD_NAME: &str = "nombre";
pub const FIELD_CODE: &str = "codigo";
pub const FIELD_PRICE: &str = "precio";
pub const FIELD_ENROLLED: &str = "inscritos";
pub const FIELD_CAPACITY: &str = "cupos";
pub const FIELD_ACTIVE: &str = "estado";
pub const FIELD_ACTIVE_LEGACY: &str = "activo";
pub const FIELD_CREATED_AT: &str = "fechaCreacion";

/// Valor tipado de Firestore: `{"stringValue": "..."}`, `{"integerValue": "3"}`, ...
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FirestoreValue {
    NullValue(()),
    BooleanValue(bool),
    /// int64 viaja como string
    IntegerValue(String),
    DoubleValue(f64),
    StringValue(String),
    TimestampValue(String),
    MapValue(serde_json::Value),
    ArrayValue(serde_json::Value),
    ReferenceValue(String),
    GeoPointValue(serde_json::Value),
    BytesValue(String),
}

impl FirestoreValue {
    fn integer(value: i64) -> Self {
        Self::IntegerValue(value.to_string())
    }

    fn timestamp(value: &DateTime<Utc>) -> Self {
        Self::TimestampValue(value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::IntegerValue(raw) | Self::StringValue(raw) => raw.trim().parse().ok(),
            Self::DoubleValue(v) if v.is_finite() => Some(v.round() as i64),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Self::BooleanValue(v) => Some(*v),
            _ => None,
        }
    }

    fn as_string(&self) -> Option<String> {
        match self {
            Self::StringValue(v) => Some(v.clone()),
            Self::IntegerValue(v) => Some(v.clone()),
            _ => None,
        }
    }

    fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::TimestampValue(raw) | Self::StringValue(raw) => parse_timestamp(raw),
            _ => None,
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

pub type Fields = BTreeMap<String, FirestoreValue>;

/// Documento tal como lo devuelve la API REST
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirestoreDocument {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub fields: Fields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl FirestoreDocument {
    /// Id = último segmento de `projects/.../documents/cursos/{id}`
    pub fn id(&self) -> Option<&str> {
        self.name.rsplit('/').next().filter(|id| !id.is_empty())
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsResponse {
    #[serde(default)]
    pub documents: Vec<FirestoreDocument>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Campos de un curso nuevo
pub fn encode_new_course(course: &NewCourse) -> FirestoreDocument {
    let mut fields = Fields::new();
    fields.insert(FIELD_NAME.to_string(), FirestoreValue::StringValue(course.name.clone()));
    fields.insert(FIELD_CODE.to_string(), FirestoreValue::StringValue(course.code.clone()));
    fields.insert(FIELD_PRICE.to_string(), FirestoreValue::integer(course.price));
    fields.insert(FIELD_ENROLLED.to_string(), FirestoreValue::integer(course.enrolled.into()));
    fields.insert(FIELD_CAPACITY.to_string(), FirestoreValue::integer(course.capacity.into()));
    fields.insert(FIELD_ACTIVE.to_string(), FirestoreValue::BooleanValue(course.active));
    if let Some(created_at) = &course.created_at {
        fields.insert(FIELD_CREATED_AT.to_string(), FirestoreValue::timestamp(created_at));
    }
    FirestoreDocument {
        fields,
        ..Default::default()
    }
}

/// Campos presentes del patch + la lista para `updateMask.fieldPaths`
pub fn encode_patch(patch: &CoursePatch) -> (FirestoreDocument, Vec<&'static str>) {
    let mut fields = Fields::new();
    let mut mask = Vec::new();
    let mut put = |key: &'static str, value: FirestoreValue| {
        fields.insert(key.to_string(), value);
        mask.push(key);
    };

    if let Some(name) = &patch.name {
        put(FIELD_NAME, FirestoreValue::StringValue(name.clone()));
    }
    if let Some(code) = &patch.code {
        put(FIELD_CODE, FirestoreValue::StringValue(code.clone()));
    }
    if let Some(price) = patch.price {
        put(FIELD_PRICE, FirestoreValue::integer(price));
    }
    if let Some(enrolled) = patch.enrolled {
        put(FIELD_ENROLLED, FirestoreValue::integer(enrolled.into()));
    }
    if let Some(capacity) = patch.capacity {
        put(FIELD_CAPACITY, FirestoreValue::integer(capacity.into()));
    }
    if let Some(active) = patch.active {
        put(FIELD_ACTIVE, FirestoreValue::BooleanValue(active));
    }

    (
        FirestoreDocument {
            fields,
            ..Default::default()
        },
        mask,
    )
}

/// Documento → curso. Campos ausentes toman su valor por defecto.
pub fn decode_course(document: &FirestoreDocument) -> Result<Course, ServiceError> {
    let id = document
        .id()
        .ok_or_else(|| ServiceError::Decode(format!("documento sin id: '{}'", document.name)))?;
    let fields = &document.fields;

    let text = |key: &str| fields.get(key).and_then(FirestoreValue::as_string).unwrap_or_default();
    let number = |key: &str| fields.get(key).and_then(FirestoreValue::as_i64).unwrap_or(0);

    let active = fields
        .get(FIELD_ACTIVE)
        .or_else(|| fields.get(FIELD_ACTIVE_LEGACY))
        .and_then(FirestoreValue::as_bool)
        .unwrap_or(false);

    let created_at = fields
        .get(FIELD_CREATED_AT)
        .and_then(FirestoreValue::as_timestamp)
        .or_else(|| document.create_time.as_deref().and_then(parse_timestamp));

    Ok(Course {
        id: id.to_string(),
        name: text(FIELD_NAME),
        code: text(FIELD_CODE),
        price: number(FIELD_PRICE),
        enrolled: to_u32(number(FIELD_ENROLLED)),
        capacity: to_u32(number(FIELD_CAPACITY)),
        active,
        created_at,
    })
}

// ----------------------------------------------------------------------------
// Identity Toolkit
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub return_secure_token: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResponse {
    pub local_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    pub id_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Segundos de validez del id token, como string
    #[serde(default)]
    pub expires_in: Option<String>,
}

/// Cuerpo de `POST {token_endpoint}/token`
#[derive(Clone, Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub grant_type: &'static str,
    pub refresh_token: &'a str,
}

impl<'a> RefreshRequest<'a> {
    pub fn new(refresh_token: &'a str) -> Self {
        Self {
            grant_type: "refresh_token",
            refresh_token,
        }
    }
}

/// Respuesta de la renovación (snake_case, a diferencia de Identity Toolkit)
#[derive(Clone, Debug, Deserialize)]
pub struct RefreshResponse {
    pub id_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// `"3600"` → instante de vencimiento
fn expiry_from(expires_in: Option<&str>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let seconds: i64 = expires_in?.trim().parse().ok()?;
    Some(now + Duration::try_seconds(seconds)?)
}

#[derive(Clone, Debug, Deserialize)]
pub struct RestErrorBody {
    pub error: RestErrorDetail,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RestErrorDetail {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
}

/// Sesión persistida entre recargas
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub identity: Identity,
    pub id_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Sesiones guardadas sin vencimiento se renuevan antes de usarse
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredSession {
    pub fn from_sign_in(response: PasswordResponse, now: DateTime<Utc>) -> Self {
        let expires_at = expiry_from(response.expires_in.as_deref(), now);
        Self {
            identity: Identity {
                uid: response.local_id,
                email: response.email,
                display_name: response.display_name.filter(|n| !n.is_empty()),
            },
            id_token: response.id_token,
            refresh_token: response.refresh_token,
            expires_at,
        }
    }

    /// El id token vence (o no se sabe cuándo) dentro del margen
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) >= expires_at,
            None => true,
        }
    }

    /// Sesión con los tokens renovados; la identidad no cambia
    pub fn refreshed(&self, response: RefreshResponse, now: DateTime<Utc>) -> Self {
        Self {
            identity: self.identity.clone(),
            expires_at: expiry_from(response.expires_in.as_deref(), now),
            id_token: response.id_token,
            refresh_token: Some(response.refresh_token),
        }
    }
}

/// `WEAK_PASSWORD : Password should be at least 6 characters` → `auth/weak-password`
pub fn auth_error_from_rest(message: &str) -> AuthErrorCode {
    let code = message.split(':').next().unwrap_or("").trim();
    match code {
        "EMAIL_NOT_FOUND" => AuthErrorCode::UserNotFound,
        "INVALID_PASSWORD" => AuthErrorCode::WrongPassword,
        "INVALID_LOGIN_CREDENTIALS" => AuthErrorCode::InvalidCredential,
        "EMAIL_EXISTS" => AuthErrorCode::EmailAlreadyInUse,
        "WEAK_PASSWORD" => AuthErrorCode::WeakPassword,
        "INVALID_EMAIL" | "MISSING_EMAIL" => AuthErrorCode::InvalidEmail,
        other => AuthErrorCode::Other(format!("auth/{}", other.to_lowercase().replace('_', "-"))),
    }
}
