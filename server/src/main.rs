use anyhow::Context;
use relay_server::control::StdinSource;
use relay_server::{Collector, ControlServer, ServerConfig};
use relay_shared::tls;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = ServerConfig::default();

    let (control_tls, collector_tls) = if config.has_tls_material() {
        let server_config = tls::server_config(&config.cert_path, &config.key_path)
            .context("failed to load TLS material")?;

        info!("TLS enabled with {}", config.cert_path.display());
        (
            Some(tls::acceptor(server_config.clone())),
            Some(Collector::tls_acceptor(server_config)),
        )
    } else {
        warn!(
            "TLS disabled: {} / {} not found, serving plaintext",
            config.cert_path.display(),
            config.key_path.display()
        );
        (None, None)
    };

    let control = ControlServer::bind(config.control_addr, control_tls, StdinSource::stdin())
        .await
        .context("control server failed to start")?;
    info!("Type a command and press enter to push it to connected agents");

    let control_task = tokio::spawn(control.run());
    let collector_task =
        tokio::spawn(Collector::new().bind_and_serve(config.collector_addr, collector_tls));

    tokio::select! {
        result = control_task => {
            result?.context("control server stopped")?;
        }
        result = collector_task => {
            result?.context("collector stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down server...");
        }
    }

    Ok(())
}
