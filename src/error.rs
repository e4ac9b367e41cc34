use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Field name -> list of messages, ordered so response bodies are deterministic.
pub type FieldErrors = BTreeMap<&'static str, Vec<String>>;

/// Every failure a handler can report to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 400 with a field-to-messages map under `error`.
    #[error("{mensaje}")]
    Validation {
        mensaje: &'static str,
        fields: FieldErrors,
    },

    /// 404 with a plain `mensaje`.
    #[error("{0}")]
    NotFound(&'static str),

    /// 400 on bad login input or credentials. Deliberately a client error,
    /// not a server fault.
    #[error("{0}")]
    Credentials(&'static str),

    /// 401 from token verification outside the bearer extractor.
    #[error("{0}")]
    Unauthorized(&'static str),

    /// 500; the raw error string ends up in the body, matching the original
    /// service's behavior. Flagged in DESIGN.md as an information leak.
    #[error("{mensaje}")]
    Internal {
        mensaje: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl ApiError {
    pub fn internal(mensaje: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::Internal { mensaje, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation { mensaje, fields } => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "mensaje": mensaje, "error": fields })),
            )
                .into_response(),
            ApiError::NotFound(mensaje) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "mensaje": mensaje })),
            )
                .into_response(),
            ApiError::Credentials(mensaje) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "mensaje": mensaje })),
            )
                .into_response(),
            ApiError::Unauthorized(mensaje) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "mensaje": mensaje })),
            )
                .into_response(),
            ApiError::Internal { mensaje, source } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "mensaje": mensaje, "error": source.to_string() })),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(res: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("body is json")
    }

    #[tokio::test]
    async fn validation_renders_field_map() {
        let mut fields = FieldErrors::new();
        fields.insert("password", vec!["demasiado corta".to_string()]);
        let res = ApiError::Validation {
            mensaje: "Error al crear el usuario",
            fields,
        }
        .into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = body_json(res).await;
        assert_eq!(body["mensaje"], "Error al crear el usuario");
        assert_eq!(body["error"]["password"][0], "demasiado corta");
    }

    #[tokio::test]
    async fn not_found_renders_mensaje_only() {
        let res = ApiError::NotFound("El usuario no existe").into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body = body_json(res).await;
        assert_eq!(body["mensaje"], "El usuario no existe");
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn internal_exposes_raw_error_string() {
        let res = ApiError::Internal {
            mensaje: "Error interno al crear el usuario",
            source: anyhow::anyhow!("duplicate key value violates unique constraint"),
        }
        .into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(res).await;
        assert_eq!(
            body["error"],
            "duplicate key value violates unique constraint"
        );
    }
}
