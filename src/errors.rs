use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{Map, Value};

use crate::render::RenderError;
use crate::store::StoreError;
use crate::tutor::TutorError;

/// Errors returned by HTTP handlers. Rendered as `{"erro": message}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Não autenticado")]
    Unauthenticated,

    #[error("E-mail ou senha incorretos.")]
    WrongCredentials,

    #[error("{0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Tutor(#[from] TutorError),

    #[error("Rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("Internal error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::EmailTaken) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated | ApiError::WrongCredentials => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::Tutor(_) | ApiError::Render(_) | ApiError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Response with the message under `key`.
    pub fn into_response_with_key(self, key: &str) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Store(StoreError::EmailTaken) => "Este e-mail já está cadastrado.".to_string(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            log::error!("{} -> {}", message, status);
        } else {
            log::debug!("{} -> {}", message, status);
        }
        let mut body = Map::new();
        body.insert(key.to_string(), Value::String(message));
        (status, Json(Value::Object(body))).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.into_response_with_key("erro")
    }
}

/// Same as [`ApiError`] but rendered as `{"error": message}`, for the
/// standalone board endpoint.
#[derive(Debug)]
pub struct PlainError(pub ApiError);

impl From<ApiError> for PlainError {
    fn from(e: ApiError) -> Self {
        PlainError(e)
    }
}

impl From<RenderError> for PlainError {
    fn from(e: RenderError) -> Self {
        PlainError(ApiError::Render(e))
    }
}

impl IntoResponse for PlainError {
    fn into_response(self) -> Response {
        self.0.into_response_with_key("error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(ApiError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::WrongCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Store(StoreError::EmailTaken).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Tutor(TutorError::Timeout).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn tutor_messages_pass_through() {
        let e = ApiError::from(TutorError::Api("quota".into()));
        assert_eq!(e.to_string(), "Erro do Gemini: quota");
    }
}
