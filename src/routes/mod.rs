pub mod image;
pub mod llm;

use crate::{
    chat::ChatRelayError,
    gallery::GalleryError,
    workflow::{executor::GenerationError, history::ImageDescriptor, view::ViewError},
};
use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use utoipa::{OpenApi, ToSchema};

pub const OPENAPI_TAG: &str = "Relay";

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        llm::relay_chat,
        image::generate_image,
        image::view_image,
        image::list_outputs,
    ),
    components(schemas(
        HealthResponse,
        ErrorResponse,
        ImageDescriptor,
        image::GenerateImageRequest,
        image::GenerateImageResponse,
        image::ListingEntry,
        image::ListingResponse,
    )),
    tags((name = "Relay", description = "Local LLM and ComfyUI relay"))
)]
pub struct ApiDoc;

// Create our own JSON extractor by wrapping `axum::Json`. This makes it easy to override the
// rejection and provide our own which formats errors to match our application.
//
// `axum::Json` responds with plain text if the input is invalid.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

impl<T> IntoResponse for AppJson<T>
where
    axum::Json<T>: IntoResponse,
{
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    raw: Option<Value>,
}

#[derive(Debug)]
pub enum AppError {
    JsonRejection(JsonRejection),
    BadRequest(String),
    BadGateway {
        error: String,
        detail: Option<String>,
        raw: Option<Value>,
    },
    GatewayTimeout {
        error: String,
        detail: Option<String>,
    },
    InternalServerError {
        error: String,
        detail: Option<String>,
    },
}

impl AppError {
    fn bad_gateway(error: &str, detail: impl ToString) -> Self {
        Self::BadGateway {
            error: error.to_string(),
            detail: Some(detail.to_string()),
            raw: None,
        }
    }

    fn internal(error: &str, detail: impl ToString) -> Self {
        Self::InternalServerError {
            error: error.to_string(),
            detail: Some(detail.to_string()),
        }
    }
}

// Tell axum how `AppError` should be converted into a response.
//
// This is also a convenient place to log errors.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::JsonRejection(rejection) => {
                // This error is caused by bad user input so don't log it
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse {
                        error: "Invalid request body".to_string(),
                        detail: Some(rejection.body_text()),
                        raw: None,
                    },
                )
            }
            AppError::BadRequest(error) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error,
                    detail: None,
                    raw: None,
                },
            ),
            AppError::BadGateway { error, detail, raw } => {
                tracing::warn!("bad gateway: {} ({:?})", error, detail);
                (StatusCode::BAD_GATEWAY, ErrorResponse { error, detail, raw })
            }
            AppError::GatewayTimeout { error, detail } => {
                tracing::warn!("gateway timeout: {} ({:?})", error, detail);
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    ErrorResponse {
                        error,
                        detail,
                        raw: None,
                    },
                )
            }
            AppError::InternalServerError { error, detail } => {
                tracing::error!("internal server error: {} ({:?})", error, detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error,
                        detail,
                        raw: None,
                    },
                )
            }
        };

        (status, AppJson(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::JsonRejection(rejection)
    }
}

impl From<ChatRelayError> for AppError {
    fn from(error: ChatRelayError) -> Self {
        match error {
            ChatRelayError::InvalidBody => Self::BadRequest(error.to_string()),
            ChatRelayError::Timeout(ref source) => Self::GatewayTimeout {
                error: error.to_string(),
                detail: Some(source.to_string()),
            },
            ChatRelayError::Upstream(ref source) => Self::bad_gateway(&error.to_string(), source),
        }
    }
}

impl From<GenerationError> for AppError {
    fn from(error: GenerationError) -> Self {
        match error {
            GenerationError::EmptyPrompt => Self::BadRequest(error.to_string()),
            GenerationError::Rejected { status, raw } => Self::BadGateway {
                error: "ComfyUI rejected the workflow".to_string(),
                detail: Some(format!("upstream status {}", status)),
                raw: Some(serde_json::from_str(&raw).unwrap_or(Value::String(raw))),
            },
            GenerationError::InvalidResponse { ref raw } => Self::BadGateway {
                error: error.to_string(),
                detail: None,
                raw: Some(Value::String(raw.clone())),
            },
            GenerationError::MissingPromptId { ref raw } => Self::BadGateway {
                error: error.to_string(),
                detail: None,
                raw: Some(raw.clone()),
            },
            GenerationError::ComfyUIError(source) => Self::bad_gateway("ComfyUI error", source),
            GenerationError::InvalidUrl(source) => Self::internal("Invalid ComfyUI url", source),
            GenerationError::TimedOut => Self::GatewayTimeout {
                error: error.to_string(),
                detail: None,
            },
        }
    }
}

impl From<ViewError> for AppError {
    fn from(error: ViewError) -> Self {
        match error {
            ViewError::MissingFilename => Self::BadRequest(error.to_string()),
            ViewError::ComfyUIError(source) => Self::bad_gateway("ComfyUI view error", source),
            ViewError::InvalidUrl(source) => Self::internal("Invalid ComfyUI url", source),
        }
    }
}

impl From<GalleryError> for AppError {
    fn from(error: GalleryError) -> Self {
        match error {
            GalleryError::NotConfigured => Self::InternalServerError {
                error: error.to_string(),
                detail: None,
            },
            GalleryError::ReadDir(ref source) => Self::internal(&error.to_string(), source),
        }
    }
}

impl From<url::ParseError> for AppError {
    fn from(error: url::ParseError) -> Self {
        Self::internal("Invalid url", error)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
}

pub async fn index() -> &'static str {
    "Local AI proxy running"
}

/// Health check
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = OK, body = HealthResponse)),
    tag = OPENAPI_TAG
)]
pub async fn health_check() -> AppJson<HealthResponse> {
    AppJson(HealthResponse {
        status: "ok".to_string(),
    })
}
