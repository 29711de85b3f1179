use std::net::SocketAddr;

use bytes::Bytes;
use tokio_raknet_lite::{RaknetServer, RaknetServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bind: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "0.0.0.0:19132".to_string())
        .parse()?;

    let mut server = RaknetServer::new(
        RaknetServerConfig::builder()
            .bind_addr(bind)
            .pong_data(Bytes::from_static(
                b"MCPE;tokio-raknet-lite;11;1.0.0;0;10;0;basic_ping;Survival;1;19132;19133;",
            ))
            .build(),
    );
    let addr = server.start().await?;
    tracing::info!(%addr, guid = server.guid(), "answering pings, ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    server.stop().await;
    Ok(())
}
