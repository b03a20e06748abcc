//! The node orchestrator
//!
//! `Node` owns the chain, the transaction pool, the peer set, and the
//! wallet, and is the single place where they meet: gossip dispatch, the
//! chain reconciliation state machine, and the command surface the HTTP
//! layer calls are all methods here. Broadcasts flow through the node, so
//! the chain engine never needs to know the gossip layer exists.

use crate::core::{Block, Blockchain, BlockchainError, Transaction, UnspentTxOut};
use crate::crypto::is_valid_address;
use crate::mining::{Mempool, MempoolError, MiningTemplate};
use crate::network::message::Message;
use crate::network::peer::{PeerError, PeerManager};
use crate::network::server::{connect_to_peer, handle_connection, Server};
use crate::wallet::{Wallet, WalletError};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, RwLock};

/// Errors surfaced by node commands
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Mempool(#[from] MempoolError),
    #[error(transparent)]
    Blockchain(#[from] BlockchainError),
    #[error(transparent)]
    Peer(#[from] PeerError),
}

impl NodeError {
    /// Whether the failure was caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            NodeError::InvalidAddress(_) | NodeError::Wallet(_) | NodeError::Mempool(_)
        )
    }
}

/// The running node
pub struct Node {
    blockchain: Arc<RwLock<Blockchain>>,
    mempool: Arc<RwLock<Mempool>>,
    peer_manager: Arc<PeerManager>,
    wallet: Arc<Wallet>,
    p2p_port: u16,
    message_tx: mpsc::Sender<(SocketAddr, Message)>,
    message_rx: Mutex<Option<mpsc::Receiver<(SocketAddr, Message)>>>,
}

impl Node {
    /// Create a node from a wallet and the gossip port
    pub fn new(wallet: Wallet, p2p_port: u16) -> Self {
        let (message_tx, message_rx) = mpsc::channel(1000);
        Self {
            blockchain: Arc::new(RwLock::new(Blockchain::new())),
            mempool: Arc::new(RwLock::new(Mempool::new())),
            peer_manager: Arc::new(PeerManager::new()),
            wallet: Arc::new(wallet),
            p2p_port,
            message_tx,
            message_rx: Mutex::new(Some(message_rx)),
        }
    }

    /// Start the peer listener and run the message loop
    ///
    /// Runs until the node is dropped; spawn it. Calling it a second time
    /// is a no-op.
    pub async fn start(self: Arc<Self>) -> Result<(), PeerError> {
        let server = Server::bind(self.p2p_port).await?;

        let acceptor = self.clone();
        tokio::spawn(async move {
            loop {
                match server.accept().await {
                    Ok((stream, addr)) => {
                        let peer_manager = acceptor.peer_manager.clone();
                        let message_tx = acceptor.message_tx.clone();
                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(stream, addr, peer_manager, message_tx).await
                            {
                                log::warn!("session error with {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => log::error!("accept error: {}", e),
                }
            }
        });

        let Some(mut message_rx) = self.message_rx.lock().await.take() else {
            return Ok(());
        };
        while let Some((from, msg)) = message_rx.recv().await {
            self.handle_message(from, msg).await;
        }
        Ok(())
    }

    /// Dial a peer and run its session in the background
    pub async fn connect_to(&self, addr: &str) -> Result<(), NodeError> {
        log::info!("connecting to peer {}", addr);
        let (stream, peer_addr) = connect_to_peer(addr).await?;

        let peer_manager = self.peer_manager.clone();
        let message_tx = self.message_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, peer_manager, message_tx).await {
                log::warn!("session error with {}: {}", peer_addr, e);
            }
        });
        Ok(())
    }

    // =========================================================================
    // Gossip dispatch
    // =========================================================================

    /// Handle one inbound gossip message
    ///
    /// Failures are logged; nothing a peer sends can take the node down.
    async fn handle_message(&self, from: SocketAddr, msg: Message) {
        log::debug!("received {} from {}", msg.type_name(), from);

        match msg {
            Message::QueryLatest => {
                let latest = self.blockchain.read().await.latest_block().clone();
                self.respond(&from, Message::Blocks(vec![latest])).await;
            }
            Message::QueryAll => {
                let blocks = self.blockchain.read().await.blocks().to_vec();
                self.respond(&from, Message::Blocks(blocks)).await;
            }
            Message::Blocks(blocks) => {
                self.handle_blockchain_response(blocks).await;
            }
            Message::QueryPool => {
                let transactions = self.mempool.read().await.transactions();
                self.respond(&from, Message::Pool(transactions)).await;
            }
            Message::Pool(transactions) => {
                self.handle_pool_response(transactions).await;
            }
        }
    }

    /// Reconcile a received chain fragment with the local chain
    ///
    /// A fragment that is not ahead is ignored; one that extends the tip is
    /// appended and the new tip announced; a single block that does not
    /// link means the peer is further ahead, so the full chain is queried;
    /// anything else is a whole-chain replacement candidate.
    async fn handle_blockchain_response(&self, received: Vec<Block>) {
        let Some(latest_received) = received.last().cloned() else {
            log::warn!("received an empty block list");
            return;
        };
        let local_latest = self.blockchain.read().await.latest_block().clone();

        if latest_received.index <= local_latest.index {
            log::debug!(
                "received chain tip {} is not ahead of local tip {}",
                latest_received.index,
                local_latest.index
            );
            return;
        }

        if local_latest.hash == latest_received.previous_hash {
            let result = {
                let mut chain = self.blockchain.write().await;
                let result = chain.add_block(latest_received.clone());
                if result.is_ok() {
                    self.mempool.write().await.update(chain.utxo_set());
                }
                result
            };
            match result {
                Ok(()) => self.broadcast_latest().await,
                Err(e) => log::warn!("rejected block {}: {}", latest_received.index, e),
            }
        } else if received.len() == 1 {
            log::info!("peer tip {} does not link, querying full chain", latest_received.index);
            self.peer_manager.broadcast(Message::QueryAll).await;
        } else {
            let result = {
                let mut chain = self.blockchain.write().await;
                let result = chain.replace_chain(received);
                if result.is_ok() {
                    self.mempool.write().await.update(chain.utxo_set());
                }
                result
            };
            match result {
                Ok(()) => self.broadcast_latest().await,
                Err(e) => log::warn!("rejected candidate chain: {}", e),
            }
        }
    }

    /// Admit a received pool, transaction by transaction
    ///
    /// Admission failures are logged and skipped. If anything got in, the
    /// pool is gossiped onward.
    async fn handle_pool_response(&self, transactions: Vec<Transaction>) {
        let mut admitted = false;
        {
            let chain = self.blockchain.read().await;
            let mut pool = self.mempool.write().await;
            for tx in transactions {
                let id = tx.id.clone();
                match pool.add(tx, chain.utxo_set()) {
                    Ok(()) => admitted = true,
                    Err(e) => log::debug!("did not admit transaction {}: {}", id, e),
                }
            }
        }
        if admitted {
            self.broadcast_pool().await;
        }
    }

    /// Announce the chain tip to every peer
    pub async fn broadcast_latest(&self) {
        let latest = self.blockchain.read().await.latest_block().clone();
        self.peer_manager.broadcast(Message::Blocks(vec![latest])).await;
    }

    /// Gossip the transaction pool to every peer
    pub async fn broadcast_pool(&self) {
        let transactions = self.mempool.read().await.transactions();
        self.peer_manager.broadcast(Message::Pool(transactions)).await;
    }

    async fn respond(&self, to: &SocketAddr, msg: Message) {
        if let Err(e) = self.peer_manager.send_to(to, msg).await {
            log::warn!("failed to respond to {}: {}", to, e);
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Mine the next block: a coinbase for this wallet plus the whole pool
    pub async fn mine_block(&self) -> Result<Block, NodeError> {
        let template = {
            let chain = self.blockchain.read().await;
            let pool = self.mempool.read().await;
            MiningTemplate::with_coinbase(&chain, &self.wallet.address(), pool.transactions())
        };
        self.mine_and_append(template).await
    }

    /// Mine a block carrying the given transactions verbatim
    pub async fn mine_raw_block(&self, transactions: Vec<Transaction>) -> Result<Block, NodeError> {
        let template = {
            let chain = self.blockchain.read().await;
            MiningTemplate::raw(&chain, transactions)
        };
        self.mine_and_append(template).await
    }

    /// Build a spend and mine it immediately alongside the coinbase
    pub async fn mine_transaction(&self, receiver: &str, amount: u64) -> Result<Block, NodeError> {
        if !is_valid_address(receiver) {
            return Err(NodeError::InvalidAddress(receiver.to_string()));
        }
        let template = {
            let chain = self.blockchain.read().await;
            let pool = self.mempool.read().await;
            let tx = self
                .wallet
                .create_transaction(receiver, amount, &pool, chain.utxo_set())?;
            MiningTemplate::with_coinbase(&chain, &self.wallet.address(), vec![tx])
        };
        self.mine_and_append(template).await
    }

    /// Build a spend, admit it to the pool, and gossip the pool
    pub async fn send_transaction(
        &self,
        receiver: &str,
        amount: u64,
    ) -> Result<Transaction, NodeError> {
        if !is_valid_address(receiver) {
            return Err(NodeError::InvalidAddress(receiver.to_string()));
        }
        let tx = {
            let chain = self.blockchain.read().await;
            let mut pool = self.mempool.write().await;
            let tx = self
                .wallet
                .create_transaction(receiver, amount, &pool, chain.utxo_set())?;
            pool.add(tx.clone(), chain.utxo_set())?;
            tx
        };
        self.broadcast_pool().await;
        Ok(tx)
    }

    /// Mine a template and append the result
    ///
    /// The proof search runs without holding any lock; append re-validates,
    /// so a block mined against a tip that moved is simply rejected.
    async fn mine_and_append(&self, template: MiningTemplate) -> Result<Block, NodeError> {
        let block = template.mine();
        {
            let mut chain = self.blockchain.write().await;
            chain.add_block(block.clone())?;
            self.mempool.write().await.update(chain.utxo_set());
        }
        self.broadcast_latest().await;
        Ok(block)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// This wallet's address
    pub fn address(&self) -> String {
        self.wallet.address()
    }

    pub async fn blocks(&self) -> Vec<Block> {
        self.blockchain.read().await.blocks().to_vec()
    }

    pub async fn latest_block(&self) -> Block {
        self.blockchain.read().await.latest_block().clone()
    }

    pub async fn block_by_hash(&self, hash: &str) -> Option<Block> {
        self.blockchain.read().await.get_block_by_hash(hash).cloned()
    }

    /// Look up a transaction on the chain or in the pool
    pub async fn transaction_by_id(&self, id: &str) -> Option<Transaction> {
        if let Some(tx) = self.blockchain.read().await.get_transaction(id) {
            return Some(tx.clone());
        }
        self.mempool.read().await.get(id).cloned()
    }

    pub async fn unspent_tx_outs(&self) -> Vec<UnspentTxOut> {
        self.blockchain.read().await.unspent_tx_outs()
    }

    pub async fn my_unspent_tx_outs(&self) -> Vec<UnspentTxOut> {
        let chain = self.blockchain.read().await;
        self.wallet.utxos(chain.utxo_set())
    }

    pub async fn balance(&self) -> u64 {
        let chain = self.blockchain.read().await;
        self.wallet.balance(chain.utxo_set())
    }

    pub async fn pool_transactions(&self) -> Vec<Transaction> {
        self.mempool.read().await.transactions()
    }

    pub async fn peers(&self) -> Vec<String> {
        self.peer_manager.peer_addresses().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::COINBASE_AMOUNT;
    use crate::crypto::KeyPair;
    use crate::network::peer::PeerHandle;
    use std::time::Duration;

    fn test_node(p2p_port: u16) -> Arc<Node> {
        let wallet = Wallet::from_key_pair(KeyPair::generate());
        Arc::new(Node::new(wallet, p2p_port))
    }

    fn fake_addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    #[tokio::test]
    async fn test_mine_block_pays_the_wallet() {
        let node = test_node(0);
        assert_eq!(node.balance().await, 0);

        let block = node.mine_block().await.unwrap();
        assert_eq!(block.index, 1);
        assert_eq!(node.balance().await, COINBASE_AMOUNT);
        assert_eq!(node.unspent_tx_outs().await.len(), 2);
    }

    #[tokio::test]
    async fn test_send_transaction_flow() {
        let node = test_node(0);
        let other = KeyPair::generate();
        node.mine_block().await.unwrap();

        let tx = node.send_transaction(&other.address(), 30).await.unwrap();
        assert_eq!(tx.tx_outs.len(), 2);
        assert_eq!(tx.tx_outs[0].amount, 30);
        assert_eq!(tx.tx_outs[1].amount, 20);
        assert_eq!(node.pool_transactions().await.len(), 1);

        node.mine_block().await.unwrap();
        assert!(node.pool_transactions().await.is_empty());

        let chain = node.blockchain.read().await;
        assert_eq!(chain.balance_of(&other.address()), 30);
        // two coinbases earned, thirty spent
        assert_eq!(chain.balance_of(&node.address()), 2 * COINBASE_AMOUNT - 30);
    }

    #[tokio::test]
    async fn test_send_transaction_insufficient_funds() {
        let node = test_node(0);
        let other = KeyPair::generate();

        let result = node.send_transaction(&other.address(), 10_000).await;
        assert!(matches!(
            result,
            Err(NodeError::Wallet(WalletError::InsufficientFunds { .. }))
        ));
        assert!(node.pool_transactions().await.is_empty());
    }

    #[tokio::test]
    async fn test_send_transaction_rejects_bad_address() {
        let node = test_node(0);
        let result = node.send_transaction("nonsense", 1).await;
        assert!(matches!(result, Err(NodeError::InvalidAddress(_))));
        assert!(result.unwrap_err().is_client_error());
    }

    #[tokio::test]
    async fn test_mine_transaction_confirms_in_one_block() {
        let node = test_node(0);
        let other = KeyPair::generate();
        node.mine_block().await.unwrap();

        let block = node.mine_transaction(&other.address(), 10).await.unwrap();
        assert_eq!(block.transactions.len(), 2);

        let chain = node.blockchain.read().await;
        assert_eq!(chain.balance_of(&other.address()), 10);
    }

    #[tokio::test]
    async fn test_mine_raw_block_without_coinbase_fails() {
        let node = test_node(0);
        let result = node.mine_raw_block(vec![]).await;
        assert!(matches!(result, Err(NodeError::Blockchain(_))));
        assert_eq!(node.blocks().await.len(), 1);
    }

    #[tokio::test]
    async fn test_pool_response_admits_first_of_conflicting_pair() {
        let node = test_node(0);
        let other = test_node(0);
        node.mine_block().await.unwrap();

        // two spends of the same output, built against the same pool state
        let (tx1, tx2) = {
            let chain = node.blockchain.read().await;
            let empty = Mempool::new();
            let tx1 = node
                .wallet
                .create_transaction(&other.address(), 30, &empty, chain.utxo_set())
                .unwrap();
            let tx2 = node
                .wallet
                .create_transaction(&other.address(), 40, &empty, chain.utxo_set())
                .unwrap();
            (tx1, tx2)
        };

        node.handle_message(fake_addr(9000), Message::Pool(vec![tx1.clone(), tx2]))
            .await;
        let pooled = node.pool_transactions().await;
        assert_eq!(pooled.len(), 1);
        assert_eq!(pooled[0].id, tx1.id);
    }

    #[tokio::test]
    async fn test_reconciliation_appends_linking_block() {
        let node = test_node(0);

        // a block mined elsewhere on top of our tip
        let block = {
            let chain = node.blockchain.read().await;
            let miner = KeyPair::generate();
            MiningTemplate::with_coinbase(&chain, &miner.address(), vec![]).mine()
        };

        node.handle_message(fake_addr(9000), Message::Blocks(vec![block]))
            .await;
        assert_eq!(node.blocks().await.len(), 2);
    }

    #[tokio::test]
    async fn test_reconciliation_ignores_stale_tip() {
        let node = test_node(0);
        node.mine_block().await.unwrap();

        node.handle_message(fake_addr(9000), Message::Blocks(vec![Block::genesis()]))
            .await;
        assert_eq!(node.blocks().await.len(), 2);
    }

    #[tokio::test]
    async fn test_reconciliation_queries_full_chain_for_unlinked_tip() {
        let node = test_node(0);

        // observe broadcasts through a fake registered peer
        let (tx, mut rx) = mpsc::channel(8);
        node.peer_manager
            .add_peer(PeerHandle::new(fake_addr(9100), tx))
            .await;

        // a tip two blocks ahead, arriving alone
        let remote = test_node(0);
        remote.mine_block().await.unwrap();
        let tip = remote.mine_block().await.unwrap();

        node.handle_message(fake_addr(9000), Message::Blocks(vec![tip]))
            .await;
        assert_eq!(node.blocks().await.len(), 1);
        assert!(matches!(rx.recv().await, Some(Message::QueryAll)));
    }

    #[tokio::test]
    async fn test_reconciliation_replaces_with_longer_chain() {
        let node = test_node(0);
        node.mine_block().await.unwrap();
        let stale_coinbase = node.blocks().await[1].transactions[0].id.clone();

        let remote = test_node(0);
        remote.mine_block().await.unwrap();
        remote.mine_block().await.unwrap();

        node.handle_message(fake_addr(9000), Message::Blocks(remote.blocks().await))
            .await;

        assert_eq!(node.blocks().await.len(), 3);
        assert_eq!(node.balance().await, 0);
        assert!(node
            .unspent_tx_outs()
            .await
            .iter()
            .all(|unspent| unspent.tx_out_id != stale_coinbase));
    }

    #[tokio::test]
    async fn test_two_nodes_converge_over_tcp() {
        let seed = test_node(18731);
        seed.mine_block().await.unwrap();
        seed.mine_block().await.unwrap();
        tokio::spawn(seed.clone().start());

        let follower = test_node(18732);
        tokio::spawn(follower.clone().start());
        tokio::time::sleep(Duration::from_millis(200)).await;

        follower.connect_to("127.0.0.1:18731").await.unwrap();

        // greeting -> single-tip response -> full-chain query -> replacement
        for _ in 0..50 {
            if follower.blocks().await.len() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(follower.blocks().await.len(), 3);
        assert_eq!(
            follower.latest_block().await.hash,
            seed.latest_block().await.hash
        );
    }
}
