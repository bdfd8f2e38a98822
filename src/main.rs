use anyhow::Context;
use replay_studio::config::Config;
use replay_studio::server::build_router;
use replay_studio::shell::{AppShell, ComponentLibrary, HostDocument};
use replay_studio::state::AppState;
use replay_studio::store;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("replay-studio starting");

    let config = Config::from_env()?;
    config.log_startup();

    let document = match &config.shell_document {
        Some(path) => HostDocument::load(path)?,
        None => HostDocument::default(),
    };
    let shell = AppShell::builder(document)
        .plugin(ComponentLibrary::default())
        .initialize()
        .context("Failed to initialize the application shell")?;
    tracing::info!("Shell mounted with plugins: {:?}", shell.context().installed());

    let session_store = store::connect(&config.storage).await?;

    let addr = format!("{}:{}", config.service_host, config.service_port);
    let state = AppState::new(session_store, shell, config);
    let recorder = state.recorder.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    recorder.shutdown().await;
    tracing::info!("replay-studio stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
