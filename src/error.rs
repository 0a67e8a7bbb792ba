use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::error;

use crate::forms::{Field, FieldErrors};

pub const MSG_NETWORK: &str = "No se pudo conectar con el servidor. Verifica tu conexión.";
pub const MSG_SERVER: &str = "El servidor no está disponible en este momento. Intenta más tarde.";
pub const MSG_UNKNOWN: &str = "Ocurrió un error inesperado. Intenta de nuevo.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Backend error {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("Failed to decode backend response: {0}")]
    Decode(String),

    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error")]
    InternalServerError,
}

/// Coarse classes used to pick the message a user gets to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Network,
    Server,
    Validation,
    Unknown,
}

impl AppError {
    /// Map a non-2xx backend response onto the error taxonomy.
    pub fn from_backend(status: u16, body: &str) -> Self {
        if status == 404 {
            return AppError::NotFound;
        }
        // Only bad-request answers carry field validation; other client
        // errors keep their status.
        if status == 400 || status == 422 {
            if let Some(fields) = parse_field_errors(body) {
                return AppError::Validation(fields);
            }
        }
        AppError::Backend {
            status,
            body: body.to_string(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            AppError::Transport(_) => ErrorClass::Network,
            AppError::Backend { status, .. } if *status >= 500 => ErrorClass::Server,
            AppError::Validation(_) | AppError::BadRequest(_) => ErrorClass::Validation,
            _ => ErrorClass::Unknown,
        }
    }

    pub fn user_message(&self) -> String {
        match self.class() {
            ErrorClass::Network => MSG_NETWORK.to_string(),
            ErrorClass::Server => MSG_SERVER.to_string(),
            ErrorClass::Validation => match self {
                AppError::Validation(fields) => fields
                    .first_message()
                    .unwrap_or(MSG_UNKNOWN)
                    .to_string(),
                AppError::BadRequest(msg) => msg.clone(),
                _ => MSG_UNKNOWN.to_string(),
            },
            ErrorClass::Unknown => match self {
                AppError::Backend { body, .. } => backend_detail(body).unwrap_or_else(|| MSG_UNKNOWN.to_string()),
                _ => MSG_UNKNOWN.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::Decode(err.to_string())
        } else {
            AppError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Decode(err.to_string())
    }
}

fn backend_field(key: &str) -> Option<Field> {
    match key {
        "title" => Some(Field::Title),
        "name" => Some(Field::CourseName),
        "course" => Some(Field::Course),
        "type" => Some(Field::Kind),
        "deadline" => Some(Field::Deadline),
        "event_datetime" => Some(Field::EventDate),
        "estimated_hours" => Some(Field::EstimatedHours),
        "target_date" => Some(Field::TargetDate),
        "non_field_errors" => Some(Field::General),
        _ => None,
    }
}

fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(first_text),
        _ => None,
    }
}

/// `{"detail": "..."}`, the shape of permission and throttling errors.
fn backend_detail(body: &str) -> Option<String> {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
        return None;
    };
    map.get("detail").and_then(first_text)
}

/// DRF validation payloads look like `{"title": ["This field is required."]}`.
fn parse_field_errors(body: &str) -> Option<FieldErrors> {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
        return None;
    };

    let mut fields = FieldErrors::default();
    for (key, value) in &map {
        if let (Some(field), Some(message)) = (backend_field(key), first_text(value)) {
            fields.insert(field, message);
        }
    }

    if fields.is_empty() { None } else { Some(fields) }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.user_message();
        let (status, fields) = match self {
            AppError::Transport(e) => {
                error!("backend unreachable: {}", e);
                (StatusCode::BAD_GATEWAY, None)
            }
            AppError::Decode(e) => {
                error!("undecodable backend response: {}", e);
                (StatusCode::BAD_GATEWAY, None)
            }
            AppError::Backend { status, body } => {
                error!("backend returned {}: {}", status, body);
                match StatusCode::from_u16(status) {
                    Ok(code) if code.is_client_error() => (code, None),
                    _ => (StatusCode::BAD_GATEWAY, None),
                }
            }
            AppError::Validation(fields) => (StatusCode::UNPROCESSABLE_ENTITY, Some(fields)),
            AppError::NotFound => (StatusCode::NOT_FOUND, None),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            AppError::Conflict(_) => (StatusCode::CONFLICT, None),
            AppError::Config(e) => {
                error!("configuration error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
            AppError::InternalServerError => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message,
            fields,
        });

        (status, body).into_response()
    }
}
