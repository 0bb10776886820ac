use anyhow::Context;
use dotenvy::dotenv;
use tracing::{error, info, warn};

use rollcall::logging::init_tracing;
use rollcall::metrics::{init_metrics, metrics_app};
use rollcall::router::init_router;
use rollcall::state::init_app_state;
use rollcall_db::run_migrations;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing().context("Failed to initialise logging")?;

    let state = init_app_state().await?;
    run_migrations(&state.db).await?;

    if let Some(handle) = init_metrics()? {
        let metrics_addr = format!(
            "{}:{}",
            state.server_config.host, state.server_config.metrics_port
        );
        let listener = tokio::net::TcpListener::bind(&metrics_addr)
            .await
            .with_context(|| format!("Failed to bind metrics listener on {metrics_addr}"))?;
        info!("Metrics available at http://{metrics_addr}/metrics");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, metrics_app(handle)).await {
                error!(error = %e, "Metrics server error");
            }
        });
    }

    let addr = state.server_config.addr();
    let app = init_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running on http://{addr}");
    info!("Swagger UI available at http://{addr}/swagger-ui");
    info!("Scalar UI available at http://{addr}/scalar");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
