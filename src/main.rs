use anyhow::Context;

use inbox_a11y_monitor::config::MonitorConfig;
use inbox_a11y_monitor::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = MonitorConfig::from_env().context("invalid configuration")?;

    eprintln!("📬 Inbox A11y Monitor v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Inbox: {}{}", config.inbox.base_url, config.inbox.messages_path);
    eprintln!("   Poll interval: {}ms", config.poll_interval.as_millis());
    eprintln!("   Events: http://{}/events", config.bind_addr);
    eprintln!("   Status: http://{}/api/status\n", config.bind_addr);

    let bind_addr = config.bind_addr;
    server::run(config)
        .await
        .with_context(|| format!("monitor server on {bind_addr} failed"))?;

    Ok(())
}
