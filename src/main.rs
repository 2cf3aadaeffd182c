use drawroom::config::ServerConfig;
use drawroom::{routes, state};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("drawroom=info,tower_http=info")),
        )
        .init();

    let config = ServerConfig::from_env().expect("invalid configuration");
    let addr = config.bind_addr();
    let state = state::AppState::new(config);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    tracing::info!(%addr, "drawroom listening");
    axum::serve(listener, app).await.expect("server failed");
}
