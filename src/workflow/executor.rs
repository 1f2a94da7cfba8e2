use super::{
    history::{History, ImageDescriptor},
    payload::ComfyUIPrompt,
    poll::{PollOutcome, RetryWithDeadline},
};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{timeout_at, Instant};
use url::Url;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Prompt is required")]
    EmptyPrompt,
    #[error("ComfyUI rejected the workflow ({status})")]
    Rejected { status: StatusCode, raw: String },
    #[error("Invalid ComfyUI response")]
    InvalidResponse { raw: String },
    #[error("Missing prompt_id from ComfyUI")]
    MissingPromptId { raw: Value },
    #[error("ComfyUI error: {0}")]
    ComfyUIError(#[from] reqwest::Error),
    #[error("Invalid ComfyUI url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("ComfyUI generation timeout")]
    TimedOut,
}

#[derive(Clone, Debug)]
pub struct GeneratedImage {
    pub prompt_id: String,
    pub image: ImageDescriptor,
}

/// Submits one workflow to ComfyUI and polls its history until an image
/// shows up. Submission and polling share a single deadline.
pub struct TaskExecutor<'a> {
    client: &'a Client,
    comfy_url: &'a Url,
    poll_interval: Duration,
    timeout: Duration,
}

impl<'a> TaskExecutor<'a> {
    pub fn new(
        client: &'a Client,
        comfy_url: &'a Url,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            comfy_url,
            poll_interval,
            timeout,
        }
    }

    async fn trigger_workflow(&self, prompt: &ComfyUIPrompt) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(self.comfy_url.join("prompt")?)
            .json(prompt)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(GenerationError::Rejected { status, raw });
        }

        let response_json = serde_json::from_str::<Value>(&raw)
            .map_err(|_| GenerationError::InvalidResponse { raw })?;
        tracing::debug!("response: {:?}", response_json);

        match response_json.get("prompt_id").and_then(Value::as_str) {
            Some(prompt_id) if !prompt_id.is_empty() => Ok(prompt_id.to_string()),
            _ => Err(GenerationError::MissingPromptId { raw: response_json }),
        }
    }

    /// One status probe. A non-2xx answer only means the job is not visible yet.
    async fn check_history(&self, prompt_id: &str) -> Result<Option<ImageDescriptor>, GenerationError> {
        let response = self
            .client
            .get(self.comfy_url.join(&format!("history/{}", prompt_id))?)
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!("history probe returned {}", response.status());
            return Ok(None);
        }

        let history = response.json::<History>().await?;
        Ok(history.first_image(prompt_id))
    }

    async fn wait_for_image(
        &self,
        prompt_id: &str,
        deadline: Instant,
    ) -> Result<ImageDescriptor, GenerationError> {
        let retry = RetryWithDeadline::new(self.poll_interval, deadline);

        match retry.run(|_| self.check_history(prompt_id)).await? {
            PollOutcome::Ready { value, attempts } => {
                tracing::info!("image ready after {} probe(s): {:?}", attempts, value);
                Ok(value)
            }
            PollOutcome::TimedOut { attempts } => {
                tracing::warn!("no image after {} probe(s)", attempts);
                Err(GenerationError::TimedOut)
            }
        }
    }

    #[tracing::instrument(skip_all, fields(client_id = %prompt.client_id, output_node = %prompt.output_node_id))]
    pub async fn run(&self, prompt: &ComfyUIPrompt) -> Result<GeneratedImage, GenerationError> {
        let deadline = Instant::now() + self.timeout;

        let flow = async {
            tracing::info!("trigger workflow");
            let prompt_id = self.trigger_workflow(prompt).await?;
            tracing::info!("prompt_id: {}", prompt_id);

            let image = self.wait_for_image(&prompt_id, deadline).await?;
            Ok::<_, GenerationError>(GeneratedImage { prompt_id, image })
        };

        timeout_at(deadline, flow)
            .await
            .unwrap_or(Err(GenerationError::TimedOut))
    }
}
