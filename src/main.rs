use anyhow::Context;
use docqa::{api, config, logging, orchestrator::DocumentAssistant, remote::OpenAiClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::init_config().context("Failed to load configuration")?;
    logging::init_tracing(logging::LogSettings::server());

    tokio::fs::create_dir_all(&config.pdf_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.pdf_dir.display()))?;

    let client = Arc::new(
        OpenAiClient::new(
            &config.openai_base_url,
            &config.openai_api_key,
            Duration::from_secs(config.http_timeout_secs),
        )
        .context("Failed to build API client")?,
    );
    let assistant =
        DocumentAssistant::setup(config.assistant_settings(), client.clone(), client)
            .await
            .context("Failed to set up document assistant")?;
    let app = api::create_router(Arc::new(assistant));

    let (listener, port) = bind_listener(config.server_port)
        .await
        .context("Failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

async fn bind_listener(server_port: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4100..=4199;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 4100-4199",
    ))
}
