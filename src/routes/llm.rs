use super::{AppError, ErrorResponse, OPENAPI_TAG};
use crate::{
    chat::{forward, parse_body, UpstreamReply},
    state::AppState,
};
use axum::{body::Bytes, extract::State};
use std::sync::Arc;

/// Relay chat completion
///
/// Forward an arbitrary JSON object to the local chat-completion server and
/// return its answer unchanged.
#[utoipa::path(
    post,
    path = "/api/llm",
    request_body(content = String, content_type = "application/json", description = "Chat-completion request, forwarded verbatim."),
    responses((
        status = OK, description = "Upstream status and body."
    ), (
        status = BAD_REQUEST, description = "Body is not a JSON object.", body = ErrorResponse
    ), (
        status = BAD_GATEWAY, description = "Upstream unreachable.", body = ErrorResponse
    ), (
        status = GATEWAY_TIMEOUT, description = "Upstream did not answer in time.", body = ErrorResponse
    )),
    tag = OPENAPI_TAG
)]
pub async fn relay_chat(
    State(app_state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<UpstreamReply, AppError> {
    let body = parse_body(&body)?;
    let config = app_state.config();

    let reply = forward(app_state.client(), &config.llm_url, &body, config.llm_timeout).await?;

    Ok(reply)
}
