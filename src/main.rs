use axum::extract::DefaultBodyLimit;
use interview_backend::{
    config::{get_config, init_config},
    database::{
        ledger::{InterviewLedger, PgInterviewLedger},
        memory_ledger::MemoryInterviewLedger,
        pool::{create_pool, run_migrations},
    },
    middleware::cors::api_cors,
    routes,
    services::{
        notification_service::{LogNotifier, Notifier, OutboxNotifier},
        slot_service::{HttpSlotProvider, SlotProvider, WorkingHoursProvider},
    },
    AppState,
};
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("interview_backend=debug,tower_http=info")),
        )
        .init();
    init_config()?;
    let config = get_config();

    let http_client = Client::builder().timeout(Duration::from_secs(10)).build()?;

    let slot_provider: Arc<dyn SlotProvider> = match &config.slot_provider_url {
        Some(url) => {
            info!(url = %url, "using calendar slot provider");
            Arc::new(HttpSlotProvider::new(http_client.clone(), url)?)
        }
        None => {
            info!(
                start = config.workday_start_hour,
                end = config.workday_end_hour,
                "using working-hours slot provider"
            );
            Arc::new(WorkingHoursProvider::new(
                config.workday_start_hour,
                config.workday_end_hour,
            ))
        }
    };

    let (ledger, notifier): (Arc<dyn InterviewLedger>, Arc<dyn Notifier>) =
        match &config.database_url {
            Some(database_url) => {
                let pool = create_pool(database_url).await?;
                run_migrations(&pool).await?;
                info!("connected to postgres, migrations applied");

                let notifier: Arc<dyn Notifier> = match &config.notification_webhook_url {
                    Some(target) => {
                        let outbox = OutboxNotifier::new(
                            pool.clone(),
                            target.clone(),
                            config.notification_secret.clone(),
                        );
                        spawn_outbox_worker(outbox.clone());
                        Arc::new(outbox)
                    }
                    None => Arc::new(LogNotifier),
                };
                (Arc::new(PgInterviewLedger::new(pool)), notifier)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, interviews are kept in memory only");
                (Arc::new(MemoryInterviewLedger::new()), Arc::new(LogNotifier))
            }
        };

    let app_state = AppState::new(config.clone(), ledger, notifier, slot_provider);

    let app = routes::router(app_state)
        .layer(api_cors())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn spawn_outbox_worker(outbox: OutboxNotifier) {
    tokio::spawn(async move {
        loop {
            match outbox.run_once().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::time::sleep(Duration::from_millis(1000)).await;
                }
                Err(e) => {
                    tracing::error!(error = ?e, "notification worker error");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}
