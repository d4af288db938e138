use std::net::SocketAddr;
use telemetry_server::config::ServerConfig;
use telemetry_server::{build_router, AppState};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    info!(bind_host = %config.bind_host, bind_port = config.bind_port, "telemetry server starting");

    let state = match AppState::from_config(&config).await {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "failed to initialize server state");
            return std::process::ExitCode::FAILURE;
        }
    };

    let router = build_router(state);
    let addr: SocketAddr = match format!("{}:{}", config.bind_host, config.bind_port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(error = %e, "invalid bind address");
            return std::process::ExitCode::FAILURE;
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, "failed to bind listener");
            return std::process::ExitCode::FAILURE;
        }
    };

    info!(%addr, "telemetry server listening");
    match axum::serve(listener, router).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server exited with error");
            std::process::ExitCode::FAILURE
        }
    }
}
