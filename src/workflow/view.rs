use super::history::ImageDescriptor;
use reqwest::{Client, Response};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ViewError {
    #[error("Missing filename")]
    MissingFilename,
    #[error("ComfyUI view error: {0}")]
    ComfyUIError(#[from] reqwest::Error),
    #[error("Invalid ComfyUI url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Opens ComfyUI's `/view` response for the image. Any status is returned
/// as-is, only transport failures are errors.
pub async fn fetch_image(
    client: &Client,
    comfy_url: &Url,
    image: &ImageDescriptor,
) -> Result<Response, ViewError> {
    if image.filename.is_empty() {
        return Err(ViewError::MissingFilename);
    }

    let url = image.upstream_url(comfy_url)?;
    tracing::debug!("fetch image: {}", url);

    Ok(client.get(url).send().await?)
}
