use crate::config::AppConfig;
use reqwest::Client;

#[derive(Clone, Debug)]
pub struct AppState {
    config: AppConfig,
    client: Client,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Shared http client, its connection pool is reused by every relay.
    pub fn client(&self) -> &Client {
        &self.client
    }
}
