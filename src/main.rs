use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bergamot_orchestrator::{
    AppConfig, WorkerContext, artifact::HttpTransport, build_router, engine::UnlinkedEngine,
    spawn_worker,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!(registry = %config.registry_url, "starting translation worker");

    let transport = Arc::new(HttpTransport::new()?);
    let context = WorkerContext::new(config.clone(), Arc::new(UnlinkedEngine), transport);
    let (worker, _task) = spawn_worker(context, config.command_queue_depth);
    let router = build_router(config.clone(), worker);

    let listener = TcpListener::bind(config.listen_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "command endpoint ready");

    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,hyper=warn".into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
