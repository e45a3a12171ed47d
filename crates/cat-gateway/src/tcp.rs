//! TCP CAT endpoint
//!
//! Network clients speak the same text dialects as serial clients. Each
//! connection has its own frame extractor; every frame is executed right
//! away and its reply written back before the next frame is read.

use std::io::ErrorKind;
use std::sync::Arc;

use cat_protocol::{CatCodec, ProtocolCodec};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::context::GatewayContext;
use crate::events::GatewayEvent;

/// Port number reported in traffic events from TCP clients
pub const TCP_PORT_TAG: u32 = 0;

/// Commands that can be sent to the endpoint task
#[derive(Debug)]
pub enum EndpointCommand {
    /// Stop accepting and drop all clients
    Shutdown,
}

/// Accept clients until shutdown
pub async fn run_tcp_endpoint(
    listener: TcpListener,
    ctx: Arc<GatewayContext>,
    mut cmd_rx: mpsc::Receiver<EndpointCommand>,
) {
    match listener.local_addr() {
        Ok(addr) => info!("TCP CAT endpoint listening on {}", addr),
        Err(_) => info!("TCP CAT endpoint listening"),
    }
    let mut clients = JoinSet::new();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(EndpointCommand::Shutdown) | None => break,
                }
            }

            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let peer = peer.to_string();
                        info!("TCP client {} connected", peer);
                        let _ = ctx.events.send(GatewayEvent::ClientConnected { peer: peer.clone() });
                        let ctx = ctx.clone();
                        clients.spawn(async move {
                            serve_client(stream, &ctx).await;
                            info!("TCP client {} disconnected", peer);
                            let _ = ctx.events.send(GatewayEvent::ClientDisconnected { peer });
                        });
                    }
                    Err(e) => warn!("TCP accept failed: {}", e),
                }
            }

            Some(_) = clients.join_next(), if !clients.is_empty() => {}
        }
    }

    clients.abort_all();
    info!("TCP CAT endpoint stopped");
}

/// Serve one client connection until it closes
pub async fn serve_client<S>(mut stream: S, ctx: &GatewayContext)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut codec = CatCodec::new();
    let mut buf = vec![0u8; 1024];

    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::WouldBlock => continue,
            Err(e) => {
                warn!("TCP read error: {}", e);
                break;
            }
        };
        let _ = ctx.events.send(GatewayEvent::DataIn {
            port: TCP_PORT_TAG,
            data: buf[..n].to_vec(),
        });
        codec.push_bytes(&buf[..n]);

        while let Some(frame) = codec.next_command() {
            let reply = ctx.processor.execute(frame.as_str()).await;
            debug!("TCP {} -> {:?}", frame.as_str(), reply);
            if reply.is_empty() {
                continue;
            }
            if let Err(e) = stream.write_all(reply.as_bytes()).await {
                warn!("TCP write error: {}", e);
                return;
            }
            let _ = ctx.events.send(GatewayEvent::DataOut {
                port: TCP_PORT_TAG,
                data: reply.into_bytes(),
            });
        }
    }
}
