use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Curso tal como vive en la colección remota.
/// El `id` lo genera la colección y no cambia nunca.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct Course {
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "precio")]
    pub price: i64,
    #[serde(rename = "inscritos", default)]
    pub enrolled: u32,
    #[serde(rename = "cupos", default)]
    pub capacity: u32,
    #[serde(rename = "estado", alias = "activo", default)]
    pub active: bool,
    #[serde(rename = "fechaCreacion", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Course {
    /// Construir un curso a partir del id generado y sus campos
    pub fn from_new(id: impl Into<String>, fields: NewCourse) -> Self {
        Self {
            id: id.into(),
            name: fields.name,
            code: fields.code,
            price: fields.price,
            enrolled: fields.enrolled,
            capacity: fields.capacity,
            active: fields.active,
            created_at: fields.created_at,
        }
    }

    /// Cupos libres (nunca negativo)
    pub fn available_spots(&self) -> u32 {
        self.capacity.saturating_sub(self.enrolled)
    }

    /// Aplica una actualización parcial (merge de campos presentes)
    pub fn apply_patch(&mut self, patch: &CoursePatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(code) = &patch.code {
            self.code = code.clone();
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(enrolled) = patch.enrolled {
            self.enrolled = enrolled;
        }
        if let Some(capacity) = patch.capacity {
            self.capacity = capacity;
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
    }
}

/// Campos de un curso nuevo (sin id todavía)
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug, Default)]
pub struct NewCourse {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "precio")]
    pub price: i64,
    #[serde(rename = "inscritos", default)]
    pub enrolled: u32,
    #[serde(rename = "cupos", default)]
    pub capacity: u32,
    #[serde(rename = "estado", alias = "activo", default)]
    pub active: bool,
    #[serde(rename = "fechaCreacion", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Actualización parcial: solo se escriben los campos presentes
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug, Default)]
pub struct CoursePatch {
    #[serde(rename = "nombre", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "codigo", skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(rename = "precio", skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    #[serde(rename = "inscritos", skip_serializing_if = "Option::is_none")]
    pub enrolled: Option<u32>,
    #[serde(rename = "cupos", skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(rename = "estado", skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl CoursePatch {
    pub fn is_empty(&self) -> bool {
        self == &CoursePatch::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_merges_only_present_fields() {
        let mut course = Course::from_new(
            "curso1",
            NewCourse {
                name: "Curso de Prueba".to_string(),
                code: "001".to_string(),
                price: 1000,
                enrolled: 0,
                capacity: 10,
                active: true,
                created_at: None,
            },
        );

        course.apply_patch(&CoursePatch {
            price: Some(1500),
            enrolled: Some(4),
            ..Default::default()
        });

        assert_eq!(course.price, 1500);
        assert_eq!(course.enrolled, 4);
        assert_eq!(course.name, "Curso de Prueba");
        assert_eq!(course.available_spots(), 6);
    }

    #[test]
    fn test_legacy_activo_field_is_accepted() {
        let json = r#"{"id":"x","nombre":"Rust","codigo":"R1","precio":2000,"activo":true}"#;
        let course: Course = serde_json::from_str(json).unwrap();
        assert!(course.active);
        assert_eq!(course.capacity, 0);
        assert!(course.created_at.is_none());
    }

    #[test]
    fn test_patch_emptiness() {
        assert!(CoursePatch::default().is_empty());
        let patch = CoursePatch {
            active: Some(false),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_overbooked_course_has_no_spots() {
        let mut course = Course::from_new("c", NewCourse::default());
        course.capacity = 2;
        course.enrolled = 5;
        assert_eq!(course.available_spots(), 0);
    }
}
