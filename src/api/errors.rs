use std::any::Any;
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, OriginalUri, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::{status_for, AppError};

/// How much of an error the client gets to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMode {
    /// Full error details and source chain.
    Development,
    /// Classified operational messages only; everything else is a generic 500.
    Production,
}

impl ErrorMode {
    /// Anything other than `development` is treated as production.
    pub fn from_env_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("development") {
            ErrorMode::Development
        } else {
            ErrorMode::Production
        }
    }
}

/// Error raised by a handler, waiting in the response extensions for
/// [`handle_errors`] to render it.
#[derive(Debug, Clone)]
pub struct RaisedError(pub Arc<AppError>);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = status.into_response();
        response.extensions_mut().insert(RaisedError(Arc::new(self)));
        response
    }
}

/// Catch-all error mapper. Every error response produced below this layer is
/// re-rendered according to the configured mode.
pub async fn handle_errors(State(mode): State<ErrorMode>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    match response.extensions().get::<RaisedError>() {
        Some(RaisedError(error)) => render(mode, error),
        None => response,
    }
}

/// Build the JSON error response for `error`.
pub fn render(mode: ErrorMode, error: &AppError) -> Response {
    let (code, body) = match mode {
        ErrorMode::Development => {
            let code = error.code();
            let body = json!({
                "status": error.status(),
                "message": error.to_string(),
                "error": {
                    "kind": error.kind(),
                    "code": code,
                    "status": error.status(),
                    "isOperational": error.is_operational(),
                },
                "stack": source_chain(error),
            });
            (code, body)
        }
        ErrorMode::Production => {
            let classified = error.clone().classify();
            if classified.is_operational() {
                let code = classified.code();
                let body = json!({
                    "status": classified.status(),
                    "message": classified.to_string(),
                });
                (code, body)
            } else {
                tracing::error!(error = %error, kind = error.kind(), "Unhandled error");
                let body = json!({
                    "status": status_for(500),
                    "message": "Something went wrong!",
                });
                (500, body)
            }
        }
    };

    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, axum::Json(body)).into_response()
}

fn source_chain(error: &AppError) -> String {
    let mut chain = format!("{}: {}", error.kind(), error);
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        chain.push_str(&format!("\n    caused by: {cause}"));
        source = cause.source();
    }
    chain
}

/// Fallback for every unmatched route and method.
pub async fn not_found_handler(OriginalUri(uri): OriginalUri) -> AppError {
    let url = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    AppError::not_found(format!("Can't find {url} on this server!"))
}

/// Turn a handler panic into a non-operational error response.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    AppError::Internal(format!("Handler panicked: {detail}")).into_response()
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let code = match &rejection {
            JsonRejection::MissingJsonContentType(_) => 415,
            _ => 400,
        };
        AppError::operational(rejection.body_text(), code)
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

/// JSON body extractor whose rejections go through the error mapper.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Query-string extractor whose rejections go through the error mapper.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tour_validator::{FieldError, ValidationErrors};

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_error_mode_from_env_name() {
        assert_eq!(ErrorMode::from_env_name("development"), ErrorMode::Development);
        assert_eq!(ErrorMode::from_env_name("Development "), ErrorMode::Development);
        assert_eq!(ErrorMode::from_env_name("production"), ErrorMode::Production);
        assert_eq!(ErrorMode::from_env_name("staging"), ErrorMode::Production);
    }

    #[test]
    fn test_into_response_carries_the_error() {
        let response = AppError::not_found("No tour found with ID x").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let raised = response.extensions().get::<RaisedError>().unwrap();
        assert_eq!(raised.0.to_string(), "No tour found with ID x");
    }

    #[tokio::test]
    async fn test_production_operational_error() {
        let response = render(ErrorMode::Production, &AppError::not_found("No tour found with ID x"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body, json!({ "status": "fail", "message": "No tour found with ID x" }));
    }

    #[tokio::test]
    async fn test_production_hides_internal_errors() {
        let response = render(ErrorMode::Production, &AppError::Database("connection reset".into()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body, json!({ "status": "error", "message": "Something went wrong!" }));
    }

    #[tokio::test]
    async fn test_production_classifies_validation_errors() {
        let errors = ValidationErrors::from(vec![
            FieldError::new("name", "A tour name must have less or equal then 30 characters"),
            FieldError::new("price", "A tour must have a price"),
        ]);
        let response = render(ErrorMode::Production, &AppError::Validation(errors));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(
            body["message"],
            "A tour name must have less or equal then 30 characters. A tour must have a price"
        );
    }

    #[tokio::test]
    async fn test_development_is_verbose() {
        let error = AppError::Cast {
            path: "_id".into(),
            value: "abc".into(),
            expected: "ObjectId",
        };
        let response = render(ErrorMode::Development, &error);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"]["kind"], "CastError");
        assert_eq!(body["error"]["isOperational"], false);
        assert!(body["stack"].as_str().unwrap().starts_with("CastError: "));
    }

    #[test]
    fn test_panic_payloads() {
        let response = handle_panic(Box::new("boom"));
        let raised = response.extensions().get::<RaisedError>().unwrap();
        assert_eq!(raised.0.to_string(), "Internal error: Handler panicked: boom");

        let response = handle_panic(Box::new(String::from("owned boom")));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
