/// Plaza server entry point
use anyhow::Context;
use plaza::{config::ServerConfig, error, jobs::JobScheduler, server, AppContext};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().context("Failed to load configuration")?;

    init_tracing(&config);

    error::set_expose_internal_errors(config.service.environment.is_development());

    tracing::info!(
        "Starting Plaza v{} ({:?})",
        env!("CARGO_PKG_VERSION"),
        config.service.environment
    );

    let ctx = AppContext::new(config)
        .await
        .context("Failed to initialize application context")?;

    let mut scheduler = JobScheduler::new(ctx.clone());
    scheduler.start();

    let result = server::serve(ctx).await;

    scheduler.stop().await;

    result.context("Server terminated with an error")
}

fn init_tracing(config: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("plaza={},tower_http=info", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
