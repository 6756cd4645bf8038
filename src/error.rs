use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error, Clone)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("chat not found")]
    NotFound,

    #[error("persistence error: {0}")]
    Persistence(String),
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Persistence(e.to_string())
    }
}

// The wire format carries no structured error codes: every lifecycle failure
// surfaces as a 500 with a human-readable message. The enum above keeps the
// taxonomy for in-process callers.
impl ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        actix_web::http::StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::InternalServerError().body(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_error_maps_to_500() {
        let errors = [
            AppError::Config("x".into()),
            AppError::Validation("x".into()),
            AppError::Unauthorized,
            AppError::NotFound,
            AppError::Persistence("x".into()),
        ];
        for e in errors {
            assert_eq!(e.status_code().as_u16(), 500);
        }
    }
}
