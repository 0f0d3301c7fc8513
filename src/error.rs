use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Uniform failure envelope. Every error leaving the service looks like
/// `{"success": false, "message": "..."}` regardless of where it came from.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}

/// Single interception point for every failure in the request path.
/// Handlers return `Result<_, ApiError>` and conversion to the wire
/// envelope happens exactly once, here.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    /// Schema-level validation: all failing fields, not just the first.
    #[error("{}", .0.join(", "))]
    Validation(Vec<String>),

    #[error(transparent)]
    JsonRejection(#[from] JsonRejection),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Hash(#[from] bcrypt::BcryptError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => {
                tracing::info!("bad request: {}", msg);
                (StatusCode::BAD_REQUEST, msg)
            }
            ApiError::Unauthorized(msg) => {
                tracing::info!("unauthorized: {}", msg);
                (StatusCode::UNAUTHORIZED, msg)
            }
            ApiError::NotFound(msg) => {
                tracing::info!("not found: {}", msg);
                (StatusCode::NOT_FOUND, msg)
            }
            ApiError::Validation(messages) => {
                let joined = messages.join(", ");
                tracing::info!("validation failed: {}", joined);
                (StatusCode::BAD_REQUEST, joined)
            }
            ApiError::JsonRejection(e) => {
                tracing::info!(error = %e, "json body rejected");
                (StatusCode::BAD_REQUEST, e.body_text())
            }
            ApiError::Database(e) => match duplicate_key_field(&e) {
                Some(field) => {
                    tracing::info!(field = %field, "duplicate key");
                    (StatusCode::BAD_REQUEST, format!("{field} already exists"))
                }
                None => {
                    tracing::error!(error = %e, "database error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".into(),
                    )
                }
            },
            ApiError::Hash(e) => {
                tracing::error!(error = %e, "bcrypt error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
        };

        let body = Json(ErrorBody {
            success: false,
            message,
        });
        (status, body).into_response()
    }
}

/// For a Postgres unique violation, recover the offending field name from the
/// constraint (`users_email_key` -> `Email`). Anything else returns `None`.
fn duplicate_key_field(e: &sqlx::Error) -> Option<String> {
    let db = e.as_database_error()?;
    if db.code().as_deref() != Some("23505") {
        return None;
    }
    let field = db
        .constraint()
        .and_then(|c| {
            c.strip_prefix("users_")
                .and_then(|rest| rest.strip_suffix("_key"))
        })
        .unwrap_or("email");
    let mut chars = field.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => return None,
    };
    Some(capitalized)
}
