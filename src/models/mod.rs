pub mod auth;
pub mod course;

pub use auth::{friendly_error_message, AuthErrorCode, Identity};
pub use course::{Course, CoursePatch, NewCourse};
