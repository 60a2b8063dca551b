use relay_agent::{Agent, AgentConfig};
use relay_agent::session::SessionError;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = AgentConfig::default();

    info!("Relay agent starting");
    info!("  Control endpoint: {}", config.control_url);
    info!("  Collector endpoint: {}", config.collector_url);
    info!("  Verify peer certificates: {}", config.verify_peer_certificate);

    let agent = Agent::new(config)?;

    match agent.run().await {
        Ok(summary) => {
            info!(
                "Session ended: {} received, {} executed, {} reports delivered",
                summary.received, summary.executed, summary.reports_delivered
            );
            Ok(())
        }
        Err(e @ SessionError::Connect(_)) => {
            error!("{}", e);
            Err(e.into())
        }
        Err(e) => {
            // Read errors end the session but are not a startup failure
            error!("{}", e);
            Ok(())
        }
    }
}
