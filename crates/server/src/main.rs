use anyhow::Context as _;
use clap::Parser as _;
use collab_mcp::{Cli, CollabMcpServer, SessionLifecycle, logging};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_format)?;

    let settings = cli.settings().context("invalid configuration")?;
    cli.log_oauth_settings();

    let dispatcher = settings.dispatcher().await.context("invalid configuration")?;
    let backends: Vec<&str> = dispatcher.platforms().into_iter().map(|p| p.as_str()).collect();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        backends = %backends.join(","),
        tools = dispatcher.specs().count(),
        bind = %settings.bind,
        "starting collab-mcp"
    );

    let running = SessionLifecycle::start(settings.bind, CollabMcpServer::new(dispatcher))
        .await
        .with_context(|| format!("bind {}", settings.bind))?;

    shutdown_signal().await;
    info!("shutdown requested");
    running.stop().await.context("serve loop")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
