use super::{AppError, AppJson, ErrorResponse, OPENAPI_TAG};
use crate::{
    config::{as_base_url, AppConfig},
    gallery,
    state::AppState,
    workflow::{
        executor::{GenerationError, TaskExecutor},
        history::ImageDescriptor,
        payload::TextToImageTemplate,
        view::fetch_image,
    },
};
use axum::{
    body::Body,
    extract::{Host, Query, State},
    http::header::CONTENT_TYPE,
    response::Response,
    routing::{get, post},
    Router,
};
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use url::Url;
use utoipa::{IntoParams, ToSchema};

#[derive(Clone, Debug, ToSchema)]
pub struct GenerateImageRequest {
    #[schema(value_type = Option<String>)]
    prompt: Option<Value>,
}

impl From<Map<String, Value>> for GenerateImageRequest {
    fn from(mut body: Map<String, Value>) -> Self {
        Self {
            prompt: body.remove("prompt"),
        }
    }
}

impl GenerateImageRequest {
    /// Falsy values (`null`, `false`, `0`, `""`) count as empty, `true` and
    /// other numbers are taken as their text. Arrays and objects are empty.
    fn prompt_text(&self) -> String {
        match &self.prompt {
            Some(Value::String(text)) => text.trim().to_string(),
            Some(Value::Number(number)) if number.as_f64() != Some(0.0) => number.to_string(),
            Some(Value::Bool(true)) => "true".to_string(),
            _ => String::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct GenerateImageResponse {
    prompt_id: String,
    image_url: String,
    image: ImageDescriptor,
}

#[derive(Clone, Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ViewQuery {
    /// Required.
    filename: Option<String>,
    /// Defaults to the output root.
    subfolder: Option<String>,
    /// Defaults to `output`.
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl From<ViewQuery> for ImageDescriptor {
    fn from(query: ViewQuery) -> Self {
        Self {
            filename: query.filename.unwrap_or_default(),
            subfolder: query.subfolder.unwrap_or_default(),
            kind: query
                .kind
                .filter(|kind| !kind.is_empty())
                .unwrap_or_else(|| "output".to_string()),
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ListingEntry {
    filename: String,
    url: String,
    /// Modification time, milliseconds since the Unix epoch.
    mtime: u64,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ListingResponse {
    images: Vec<ListingEntry>,
}

/// Base of the urls handed back to the browser.
fn public_origin(config: &AppConfig, host: &str) -> Result<Url, url::ParseError> {
    match &config.public_url {
        Some(url) => Ok(as_base_url(url.clone())),
        None => Url::parse(&format!("http://{}/", host)),
    }
}

/// Generate image
///
/// Submit the text-to-image workflow to ComfyUI and wait for the first
/// rendered image.
#[utoipa::path(
    post,
    path = "/api/image",
    request_body(content = GenerateImageRequest, content_type = "application/json"),
    responses((
        status = OK, body = GenerateImageResponse
    ), (
        status = BAD_REQUEST, description = "Prompt is empty.", body = ErrorResponse
    ), (
        status = BAD_GATEWAY, description = "ComfyUI failed or answered garbage.", body = ErrorResponse
    ), (
        status = GATEWAY_TIMEOUT, description = "No image before the deadline.", body = ErrorResponse
    )),
    tag = OPENAPI_TAG
)]
pub async fn generate_image(
    State(app_state): State<Arc<AppState>>,
    Host(host): Host,
    AppJson(body): AppJson<Map<String, Value>>,
) -> Result<AppJson<GenerateImageResponse>, AppError> {
    let prompt_text = GenerateImageRequest::from(body).prompt_text();
    if prompt_text.is_empty() {
        return Err(GenerationError::EmptyPrompt.into());
    }

    let config = app_state.config();
    let origin = public_origin(config, &host)?;
    let prompt = TextToImageTemplate::new(&config.checkpoint).render(&prompt_text);

    let executor = TaskExecutor::new(
        app_state.client(),
        &config.comfy_url,
        config.poll_interval,
        config.generation_timeout,
    );
    let result = executor.run(&prompt).await?;

    let image_url = result.image.relay_url(&origin)?;

    Ok(AppJson(GenerateImageResponse {
        prompt_id: result.prompt_id,
        image_url: image_url.to_string(),
        image: result.image,
    }))
}

/// View image
///
/// Stream an image from ComfyUI's output store. Only the status and the
/// content type of the upstream response are kept.
#[utoipa::path(
    get,
    path = "/api/image/view",
    params(ViewQuery),
    responses((
        status = OK, description = "Image bytes."
    ), (
        status = BAD_REQUEST, description = "Filename is missing.", body = ErrorResponse
    ), (
        status = BAD_GATEWAY, description = "ComfyUI unreachable.", body = ErrorResponse
    )),
    tag = OPENAPI_TAG
)]
pub async fn view_image(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ViewQuery>,
) -> Result<Response, AppError> {
    let image = ImageDescriptor::from(query);
    let upstream = fetch_image(app_state.client(), &app_state.config().comfy_url, &image).await?;

    let mut response = Response::builder().status(upstream.status());
    if let Some(content_type) = upstream.headers().get(CONTENT_TYPE) {
        response = response.header(CONTENT_TYPE, content_type.clone());
    }

    let body = Body::from_stream(
        upstream
            .bytes_stream()
            .inspect_err(|e| tracing::warn!("image stream interrupted: {}", e)),
    );

    response
        .body(body)
        .map_err(|e| AppError::internal("Failed to build response", e))
}

/// List images
///
/// List the images in the configured ComfyUI output directory, newest first.
#[utoipa::path(
    get,
    path = "/api/image/list",
    responses((
        status = OK, body = ListingResponse
    ), (
        status = INTERNAL_SERVER_ERROR, description = "Output directory missing or unreadable.", body = ErrorResponse
    )),
    tag = OPENAPI_TAG
)]
pub async fn list_outputs(
    State(app_state): State<Arc<AppState>>,
    Host(host): Host,
) -> Result<AppJson<ListingResponse>, AppError> {
    let config = app_state.config();
    let files = gallery::list_images(config.output_dir.as_deref()).await?;
    let origin = public_origin(config, &host)?;

    let images = files
        .into_iter()
        .map(|file| {
            let url = ImageDescriptor::output(file.filename.as_str()).relay_url(&origin)?;
            Ok(ListingEntry {
                mtime: file.mtime(),
                url: url.to_string(),
                filename: file.filename,
            })
        })
        .collect::<Result<Vec<_>, url::ParseError>>()?;

    Ok(AppJson(ListingResponse { images }))
}

pub fn image_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(generate_image))
        .route("/view", get(view_image))
        .route("/list", get(list_outputs))
}
