use anyhow::Context;
use db::DBService;
use server::{AppState, build_router, config::Config};
use services::services::escalation::EscalationService;
use tracing::{info, warn};
use utils::logging::{DEFAULT_FILTER, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(DEFAULT_FILTER);

    let config = Config::from_env().context("invalid configuration")?;
    let db = DBService::new(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;

    let state = AppState::new(config.clone(), db.clone());
    state
        .media
        .ensure_dir()
        .await
        .with_context(|| format!("failed to create {}", config.upload_dir.display()))?;

    if let Some(bootstrap) = &config.bootstrap_admin {
        match state
            .auth
            .seed_super_admin(&bootstrap.email, &bootstrap.password)
            .await
        {
            Ok(Some(_)) => {}
            Ok(None) => info!("Admins already exist, skipping bootstrap"),
            Err(e) => warn!(error = %e, "Failed to seed bootstrap admin"),
        }
    }
    if !state.auth.guest_enabled() {
        info!("GUEST_PASSWORD not set, guest login disabled");
    }

    EscalationService::spawn(db, state.notifications.clone(), config.escalation_hours);

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr()))?;
    info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
