use std::{env, path::PathBuf, str::FromStr, time::Duration};
use url::Url;

const DEFAULT_LLM_URL: &str = "http://127.0.0.1:1234/v1/chat/completions";
const DEFAULT_COMFY_URL: &str = "http://127.0.0.1:8188";
const DEFAULT_CHECKPOINT: &str = "sd_xl_base_0.9.safetensors";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Full chat-completion endpoint, requests are posted here verbatim.
    pub llm_url: Url,
    /// ComfyUI base url, always ends with `/`.
    pub comfy_url: Url,
    pub checkpoint: String,
    pub output_dir: Option<PathBuf>,
    /// Origin used for image urls handed back to the browser.
    /// Falls back to `http://<Host header>` when unset.
    pub public_url: Option<Url>,
    pub llm_timeout: Duration,
    pub generation_timeout: Duration,
    pub poll_interval: Duration,
}

trait FromEnvWithDefault: Sized {
    fn from_env_or_default(key: &str, default: Self) -> Self;
}

impl FromEnvWithDefault for u16 {
    fn from_env_or_default(key: &str, default: Self) -> Self {
        env::var(key)
            .ok()
            .and_then(|val| val.parse().ok())
            .unwrap_or(default)
    }
}

impl FromEnvWithDefault for u64 {
    fn from_env_or_default(key: &str, default: Self) -> Self {
        env::var(key)
            .ok()
            .and_then(|val| val.parse().ok())
            .unwrap_or(default)
    }
}

impl FromEnvWithDefault for String {
    fn from_env_or_default(key: &str, default: Self) -> Self {
        env::var(key).unwrap_or(default)
    }
}

impl<T> FromEnvWithDefault for Option<T>
where
    T: FromStr,
{
    fn from_env_or_default(key: &str, default: Self) -> Self {
        env::var(key)
            .ok()
            .filter(|val| !val.trim().is_empty())
            .and_then(|val| val.parse().ok())
            .or(default)
    }
}

/// Urls are not silently replaced by their default: a typo in the
/// environment should stop the relay from starting.
fn url_from_env(key: &str, default: Option<&str>) -> anyhow::Result<Option<Url>> {
    match env::var(key).ok().filter(|val| !val.trim().is_empty()) {
        Some(val) => Url::parse(val.trim())
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid {}({}): {}", key, val, e)),
        None => Ok(default.map(Url::parse).transpose()?),
    }
}

/// `Url::join` drops the last path segment unless the base ends with `/`.
pub fn as_base_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let llm_url = url_from_env("LLM_URL", Some(DEFAULT_LLM_URL))?
            .ok_or_else(|| anyhow::anyhow!("LLM_URL is required"))?;
        let comfy_url = url_from_env("COMFY_URL", Some(DEFAULT_COMFY_URL))?
            .ok_or_else(|| anyhow::anyhow!("COMFY_URL is required"))?;

        Ok(Self {
            host: String::from_env_or_default("HOST", "0.0.0.0".into()),
            port: u16::from_env_or_default("PORT", 3001),
            llm_url,
            comfy_url: as_base_url(comfy_url),
            checkpoint: String::from_env_or_default("COMFY_CKPT", DEFAULT_CHECKPOINT.into()),
            output_dir: Option::<PathBuf>::from_env_or_default("COMFY_OUTPUT_DIR", None),
            public_url: url_from_env("PUBLIC_URL", None)?,
            llm_timeout: Duration::from_secs(u64::from_env_or_default("LLM_TIMEOUT_SECS", 60)),
            generation_timeout: Duration::from_secs(u64::from_env_or_default(
                "COMFY_TIMEOUT_SECS",
                120,
            )),
            poll_interval: Duration::from_millis(u64::from_env_or_default(
                "COMFY_POLL_INTERVAL_MS",
                1000,
            )),
        })
    }

    /// Configuration pointing at the given upstreams with the default
    /// timings. Used when the relay is embedded or driven from tests.
    pub fn with_upstreams(llm_url: Url, comfy_url: Url) -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3001,
            llm_url,
            comfy_url: as_base_url(comfy_url),
            checkpoint: DEFAULT_CHECKPOINT.into(),
            output_dir: None,
            public_url: None,
            llm_timeout: Duration::from_secs(60),
            generation_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(1),
        }
    }
}
