//! codetrail entry point

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use codetrail::{run_server, Config};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codetrail=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "configuration is unreadable");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_server(config).await {
        tracing::error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
}
