use std::net::SocketAddr;
use std::time::Duration;

use tokio_raknet_lite::{Message, RaknetClient, RaknetClientConfig, Reliability};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let remote: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:19132".to_string())
        .parse()?;
    let local: SocketAddr = "0.0.0.0:0".parse()?;

    let mut client = RaknetClient::new(RaknetClientConfig::default());

    match client.ping(local, remote).await {
        Ok(data) => tracing::info!(%remote, pong = %String::from_utf8_lossy(&data), "pong"),
        Err(e) => {
            tracing::error!(%remote, error = %e, "ping failed");
            return Ok(());
        }
    }

    // The bundled server only answers pings, so this succeeds against a full
    // RakNet server only.
    match client.connect(local, remote).await {
        Ok(()) => {
            tracing::info!(mtu = ?client.mtu(), server_guid = ?client.server_guid(), "connected");
            client
                .send(Message::new(&b"\xfe\x00"[..]).reliability(Reliability::ReliableOrdered))
                .await?;
            if let Some(reply) = client.receive(Duration::from_secs(2)).await {
                tracing::info!(len = reply.len(), id = reply.first().copied(), "received");
            }
            client.close().await;
        }
        Err(e) => tracing::warn!(%remote, error = %e, "connect failed"),
    }

    Ok(())
}
