//! TCP transport and session handling
//!
//! Peer connections are persistent TCP streams framed as newline-delimited
//! text, one JSON envelope per line. Each session registers with the peer
//! manager, greets the remote (latest-block query now, pool query after a
//! short grace), and pumps inbound frames to the node's message loop.

use crate::network::message::Message;
use crate::network::peer::{PeerError, PeerHandle, PeerManager};
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec};

/// Grace between the latest-block query and the pool query, so the remote
/// side has its session set up before the second request lands
pub const POOL_QUERY_GRACE: Duration = Duration::from_millis(500);

/// TCP listener for inbound peer connections
pub struct Server {
    listener: TcpListener,
}

impl Server {
    /// Bind to a port
    pub async fn bind(port: u16) -> Result<Self, std::io::Error> {
        let addr = format!("0.0.0.0:{}", port);
        let listener = TcpListener::bind(&addr).await?;
        log::info!("p2p listening on {}", addr);
        Ok(Self { listener })
    }

    /// The bound address (useful when binding port 0)
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Accept one inbound connection
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), std::io::Error> {
        self.listener.accept().await
    }
}

/// Dial a peer
pub async fn connect_to_peer(addr: &str) -> Result<(TcpStream, SocketAddr), PeerError> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| PeerError::ConnectFailed(format!("{}: {}", addr, e)))?;
    let peer_addr = stream
        .peer_addr()
        .map_err(|e| PeerError::ConnectFailed(e.to_string()))?;
    Ok((stream, peer_addr))
}

/// Run one peer session until the transport closes or errors
///
/// Used for inbound and outbound connections alike. Inbound frames are
/// forwarded to the node loop as `(addr, message)`; malformed frames are
/// logged and dropped without ending the session.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    peer_manager: Arc<PeerManager>,
    message_tx: mpsc::Sender<(SocketAddr, Message)>,
) -> Result<(), PeerError> {
    let framed = Framed::new(stream, LinesCodec::new());
    let (mut writer, mut reader) = framed.split();

    let (tx, mut rx) = mpsc::channel::<Message>(100);
    let handle = PeerHandle::new(addr, tx);
    peer_manager.add_peer(handle.clone()).await;

    // writer task: drain the peer channel in enqueue order
    let write_handle = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match msg.to_frame() {
                Ok(frame) => {
                    if writer.send(frame).await.is_err() {
                        break;
                    }
                }
                Err(e) => log::warn!("failed to encode {}: {}", msg.type_name(), e),
            }
        }
    });

    // session greeting
    let _ = handle.send(Message::QueryLatest).await;
    let greeter = handle.clone();
    tokio::spawn(async move {
        tokio::time::sleep(POOL_QUERY_GRACE).await;
        let _ = greeter.send(Message::QueryPool).await;
    });

    loop {
        match reader.next().await {
            Some(Ok(frame)) => match Message::from_frame(&frame) {
                Ok(msg) => {
                    if message_tx.send((addr, msg)).await.is_err() {
                        break;
                    }
                }
                Err(e) => log::warn!("dropping malformed frame from {}: {}", addr, e),
            },
            Some(Err(e)) => {
                log::warn!("read error from {}: {}", addr, e);
                break;
            }
            None => {
                log::info!("peer {} closed the connection", addr);
                break;
            }
        }
    }

    write_handle.abort();
    peer_manager.remove_peer(&addr).await;
    Ok(())
}
