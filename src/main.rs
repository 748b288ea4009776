use assistant_bot::{
    config::{get_config, init_config, DeliveryMode},
    database::pool::{create_pool, run_migrations},
    routes,
    services::polling_service::PollingService,
    AppState,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    init_config()?;
    let config = get_config();
    info!(?config, "configuration loaded");

    let pool = create_pool().await?;
    run_migrations(&pool).await?;

    let app_state = AppState::new(pool)?;

    match config.delivery_mode {
        DeliveryMode::Webhook => {
            if let Some(target_webhook_url) = config.webhook_url() {
                info!("Checking Telegram webhook status...");
                if let Err(e) = app_state
                    .telegram_service
                    .ensure_webhook(&target_webhook_url, config.webhook_secret.as_deref())
                    .await
                {
                    tracing::warn!("Could not register Telegram webhook: {}", e);
                }
            }
        }
        DeliveryMode::Polling => {
            if let Err(e) = app_state.telegram_service.delete_webhook().await {
                tracing::warn!("Could not remove Telegram webhook: {}", e);
            }

            let state = app_state.clone();
            tokio::spawn(async move {
                info!("Starting Telegram long polling");
                let mut poller =
                    PollingService::new(state.telegram_service.clone(), state.bot_service.clone());
                loop {
                    match poller.run_once().await {
                        Ok(_) => {}
                        Err(e) => {
                            tracing::error!(error = %e, "Telegram polling error");
                            tokio::time::sleep(Duration::from_secs(3)).await;
                        }
                    }
                }
            });
        }
    }

    let app = routes::router(app_state);

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
