mod api;
mod application;
mod domain;
mod infrastructure;
mod ports;

use api::AppState;
use application::{spawn_session_sweeper, CheckoutService, CheckoutSettings};
use infrastructure::{
    checkout_settings_from_env, InMemorySaleRepository, MySqlSaleRepository, ZenoPayAdapter,
    ZenoPayConfig,
};
use ports::{SaleRepositoryPort, ZenoPayPort};
use sqlx::MySqlPool;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载环境变量
    dotenvy::dotenv().ok();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Starting POS USSD checkout service...");

    // 初始化 ZenoPay 配置
    let zenopay_config = ZenoPayConfig::from_env()?;
    info!("ZenoPay configuration loaded for {}", zenopay_config.base_url);
    let zenopay_adapter = Arc::new(ZenoPayAdapter::new(zenopay_config)?);

    let settings = checkout_settings_from_env()?;
    info!(
        "Polling every {:?} for up to {:?}, provider {}, tax {} bps (enabled: {})",
        settings.poll_interval,
        settings.poll_timeout,
        settings.provider,
        settings.tax_policy.rate_bps,
        settings.tax_policy.enabled
    );

    // 创建仓储
    match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            info!("Connecting to database...");
            let pool = MySqlPool::connect(&database_url).await?;
            info!("Database connected successfully");
            let repository = Arc::new(MySqlSaleRepository::new(Arc::new(pool)));
            serve(zenopay_adapter, repository, settings).await
        }
        Err(_) => {
            warn!("DATABASE_URL not set, sales are kept in memory only");
            let repository = Arc::new(InMemorySaleRepository::new());
            serve(zenopay_adapter, repository, settings).await
        }
    }
}

async fn serve<Z: ZenoPayPort, R: SaleRepositoryPort>(
    zenopay: Arc<Z>,
    repository: Arc<R>,
    settings: CheckoutSettings,
) -> anyhow::Result<()> {
    let checkout_service = Arc::new(CheckoutService::new(zenopay, repository, settings));
    let sweeper = spawn_session_sweeper(Arc::clone(&checkout_service));

    let app = api::create_router(AppState { checkout_service });

    // 启动服务器
    let host = std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("SERVER_PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    info!("Server listening on {}", addr);
    info!("Available endpoints:");
    info!("  GET    /health - Health check");
    info!("  POST   /api/checkout/sessions - Open checkout and send USSD popup");
    info!("  GET    /api/checkout/sessions/:session_id - Session status");
    info!("  POST   /api/checkout/sessions/:session_id/start - New payment attempt");
    info!("  POST   /api/checkout/sessions/:session_id/ussd - Resend USSD popup");
    info!("  POST   /api/checkout/sessions/:session_id/status - Check status now");
    info!("  POST   /api/checkout/sessions/:session_id/manual-reference - Manual reference");
    info!("  DELETE /api/checkout/sessions/:session_id - Close session");
    info!("  GET    /api/sales/:sale_id - Query sale");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    sweeper.abort();
    Ok(())
}
