use std::sync::Arc;

use modushop_outbox::DispatcherConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    modushop_observability::init();

    let config = dispatcher_config_from_env();
    let (services, dispatcher) = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pool = sqlx::PgPool::connect(&url).await?;
            modushop_api::app::services::build_postgres(pool, config)
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set; using in-memory stores");
            modushop_api::app::services::build_in_memory(config)
        }
    };

    let app = modushop_api::app::build_app(Arc::new(services));

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    dispatcher.shutdown().await;
    Ok(())
}

fn dispatcher_config_from_env() -> DispatcherConfig {
    let mut config = DispatcherConfig::default();
    if let Ok(secs) = std::env::var("OUTBOX_POLL_INTERVAL_SECS") {
        if let Ok(secs) = secs.parse() {
            config = config.with_poll_interval(std::time::Duration::from_secs(secs));
        }
    }
    if let Ok(days) = std::env::var("OUTBOX_RETENTION_DAYS") {
        if let Ok(days) = days.parse::<u64>() {
            config = config.with_retention(std::time::Duration::from_secs(days * 24 * 3600));
        }
    }
    config
}
