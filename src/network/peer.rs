//! Connected-peer registry
//!
//! Tracks live peer sessions by socket address and fans broadcasts out to
//! them. Each peer is reachable through an mpsc handle drained by its
//! session's writer task, so outbound messages preserve enqueue order.

use crate::network::message::{Message, MessageError};
use std::collections::HashMap;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};

/// Peer transport errors
#[derive(Error, Debug)]
pub enum PeerError {
    #[error("connection failed: {0}")]
    ConnectFailed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("peer disconnected")]
    Disconnected,
    #[error(transparent)]
    Message(#[from] MessageError),
}

/// Handle for sending messages to one peer session
#[derive(Clone)]
pub struct PeerHandle {
    pub addr: SocketAddr,
    tx: mpsc::Sender<Message>,
}

impl PeerHandle {
    pub fn new(addr: SocketAddr, tx: mpsc::Sender<Message>) -> Self {
        Self { addr, tx }
    }

    pub async fn send(&self, msg: Message) -> Result<(), PeerError> {
        self.tx.send(msg).await.map_err(|_| PeerError::Disconnected)
    }
}

/// Registry of live peer sessions
#[derive(Default)]
pub struct PeerManager {
    peers: RwLock<HashMap<SocketAddr, PeerHandle>>,
}

impl PeerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session
    pub async fn add_peer(&self, handle: PeerHandle) {
        let addr = handle.addr;
        self.peers.write().await.insert(addr, handle);
        log::info!("peer connected: {}", addr);
    }

    /// Deregister a session
    pub async fn remove_peer(&self, addr: &SocketAddr) {
        if self.peers.write().await.remove(addr).is_some() {
            log::info!("peer removed: {}", addr);
        }
    }

    /// Connected peers as `host:port` strings
    pub async fn peer_addresses(&self) -> Vec<String> {
        self.peers
            .read()
            .await
            .keys()
            .map(|addr| addr.to_string())
            .collect()
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Send a message to every connected peer
    ///
    /// Send failures are logged and skipped; there is no retry.
    pub async fn broadcast(&self, msg: Message) {
        let handles: Vec<PeerHandle> = self.peers.read().await.values().cloned().collect();
        for handle in handles {
            if let Err(e) = handle.send(msg.clone()).await {
                log::warn!("failed to send {} to {}: {}", msg.type_name(), handle.addr, e);
            }
        }
    }

    /// Send a message to one peer
    pub async fn send_to(&self, addr: &SocketAddr, msg: Message) -> Result<(), PeerError> {
        let handle = self
            .peers
            .read()
            .await
            .get(addr)
            .cloned()
            .ok_or(PeerError::Disconnected)?;
        handle.send(msg).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    #[tokio::test]
    async fn test_register_and_list() {
        let manager = PeerManager::new();
        let (tx, _rx) = mpsc::channel(4);
        manager.add_peer(PeerHandle::new(addr(7001), tx)).await;

        assert_eq!(manager.peer_count().await, 1);
        assert_eq!(manager.peer_addresses().await, vec!["127.0.0.1:7001"]);

        manager.remove_peer(&addr(7001)).await;
        assert_eq!(manager.peer_count().await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_peers() {
        let manager = PeerManager::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        manager.add_peer(PeerHandle::new(addr(7001), tx1)).await;
        manager.add_peer(PeerHandle::new(addr(7002), tx2)).await;

        manager.broadcast(Message::QueryLatest).await;
        assert!(matches!(rx1.recv().await, Some(Message::QueryLatest)));
        assert!(matches!(rx2.recv().await, Some(Message::QueryLatest)));
    }

    #[tokio::test]
    async fn test_broadcast_survives_dead_peer() {
        let manager = PeerManager::new();
        let (tx1, rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        manager.add_peer(PeerHandle::new(addr(7001), tx1)).await;
        manager.add_peer(PeerHandle::new(addr(7002), tx2)).await;

        drop(rx1);
        manager.broadcast(Message::QueryAll).await;
        assert!(matches!(rx2.recv().await, Some(Message::QueryAll)));
    }

    #[tokio::test]
    async fn test_send_to_unknown_peer_fails() {
        let manager = PeerManager::new();
        assert!(matches!(
            manager.send_to(&addr(7009), Message::QueryLatest).await,
            Err(PeerError::Disconnected)
        ));
    }
}
