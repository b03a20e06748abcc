//! Peer-to-peer gossip
//!
//! Persistent TCP sessions carrying one JSON envelope per text frame.
//! Peers exchange five message types: latest-block and full-chain queries,
//! chain responses, and pool queries and responses. The node reconciles
//! received chains with the longest-heaviest rule and relays what it
//! accepts.

pub mod message;
pub mod node;
pub mod peer;
pub mod server;

pub use message::{Message, MessageError};
pub use node::{Node, NodeError};
pub use peer::{PeerError, PeerHandle, PeerManager};
pub use server::{connect_to_peer, Server, POOL_QUERY_GRACE};
