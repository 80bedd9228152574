use std::env;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use llm_playground::core::logging;
use llm_playground::server;
use llm_playground::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; keys may come from the shell or secrets.yaml.
    let _ = dotenvy::dotenv();

    let state = AppState::initialize()
        .await
        .context("Failed to initialize application state")?;
    logging::init(&state.paths);

    let settings = state.config.settings()?;
    let port = env::var("PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .unwrap_or(settings.server.port);
    let bind_addr = format!("{}:{}", settings.server.host, port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on http://{}", addr);

    let app: Router = server::router(state.clone());
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
