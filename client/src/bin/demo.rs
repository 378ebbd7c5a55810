//! Boots the booking client against the configured backend, runs the
//! startup session restore, and logs where things stand. A smoke check of
//! the wiring without a UI.
//!
//! ```text
//! SAWARI_API_URL=http://localhost:8000/api cargo run -p sawari-client --bin demo
//! ```

use sawari_client::{Config, SawariApp};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(api = %config.api.base_url, "starting sawari client");

    let app = SawariApp::new(&config)?;
    app.restore_session().await?;
    app.session_store().settled(Duration::from_secs(10)).await?;

    let name = app
        .session_state(|s| s.profile.as_ref().map(|p| p.name.clone()))
        .await;
    match name {
        Some(name) => tracing::info!(%name, "session restored"),
        None => tracing::info!("no stored session; request an OTP to sign in"),
    }

    app.shutdown(Duration::from_secs(5)).await?;
    Ok(())
}
