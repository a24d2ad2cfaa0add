use std::net::SocketAddr;
use std::sync::Arc;

use recovery_desk::application::router::build_router;
use recovery_desk::application::state::AppState;
use recovery_desk::auth::WebhookAuth;
use recovery_desk::config::BackOfficeConfig;
use recovery_desk::domain::repositories::payment_gateway::PaymentGateway;
use recovery_desk::domain::services::gateway_guard::GuardedGateway;
use recovery_desk::infrastructure::asaas_client::{AsaasClient, AsaasConfig};
use recovery_desk::infrastructure::unconfigured_gateway::UnconfiguredGateway;
use recovery_desk::persistence::init_database;
use recovery_desk::persistence::ledger_repository::SqliteLedgerStore;
use recovery_desk::rate_limit::create_rate_limiter;
use recovery_desk::secrets::{load_gateway_api_key, load_webhook_token, SecretConfig};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to load .env: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recovery_desk=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BackOfficeConfig::from_env();
    let secret_config = SecretConfig::from_env();
    info!("Recovery desk starting (database: {})", config.database_url);

    let pool = init_database(&config.database_url).await?;
    let store = Arc::new(SqliteLedgerStore::new(pool.clone()));

    let gateway: Arc<dyn PaymentGateway> = match load_gateway_api_key(&secret_config) {
        Ok(api_key) => {
            let mut asaas = AsaasConfig::new(api_key, config.gateway_sandbox, config.gateway_timeout());
            if let Some(base_url) = &config.gateway_base_url {
                asaas = asaas.with_base_url(base_url);
            }
            info!(sandbox = config.gateway_sandbox, "Using Asaas payment gateway");
            Arc::new(AsaasClient::new(asaas)?)
        }
        Err(e) => {
            warn!(
                "Gateway API key unavailable ({}), charges will be left unsynced until resync",
                e
            );
            Arc::new(UnconfiguredGateway::new(e.to_string()))
        }
    };
    let gateway = GuardedGateway::new(gateway, config.gateway_timeout());

    let webhook_auth = match load_webhook_token(&secret_config) {
        Ok(token) => Some(WebhookAuth::new(&token)),
        Err(e) => {
            warn!("Webhook token unavailable ({}), webhook deliveries are not authenticated", e);
            None
        }
    };

    let app = build_router(
        AppState::new(store, gateway),
        webhook_auth,
        create_rate_limiter(config.webhook_rate_limit_per_minute),
    );

    let addr: SocketAddr = config.bind_address.parse()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C signal"),
                Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("Received SIGTERM signal");
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
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
        info!("Shutting down gracefully...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    pool.close().await;
    info!("Shutdown complete");
    Ok(())
}
