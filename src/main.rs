use story_relay::config::AppConfig;
use story_relay::run;
use story_relay::state::AppState;
use tracing::{debug, error};

#[cfg(debug_assertions)]
use dotenv::dotenv;

#[tokio::main]
async fn main() {
    #[cfg(debug_assertions)]
    dotenv().ok();

    tracing_subscriber::fmt::init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("invalid config: {}", e);
            return;
        }
    };
    debug!("config: {:?}", config);

    if config.output_dir.is_none() {
        tracing::warn!("COMFY_OUTPUT_DIR not set, /api/image/list will fail");
    }

    let state = AppState::new(config);

    if let Err(e) = run(state).await {
        error!("failed to start app: {}", e);
    }
}
