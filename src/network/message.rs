//! Gossip message types
//!
//! The wire format is a numeric-tagged envelope, one JSON object per frame:
//! `{ "type": <0..4>, "data": <string|null> }`. Structured payloads travel
//! as JSON strings nested inside the envelope.

use crate::core::{Block, Transaction};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message decode errors
#[derive(Error, Debug)]
pub enum MessageError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown message type {0}")]
    UnknownType(u8),
    #[error("message type {0} is missing its payload")]
    MissingData(u8),
}

/// Gossip messages exchanged between peers
#[derive(Debug, Clone)]
pub enum Message {
    /// Ask a peer for its latest block
    QueryLatest,
    /// Ask a peer for its full chain
    QueryAll,
    /// A chain fragment: the latest block alone, or the whole chain
    Blocks(Vec<Block>),
    /// Ask a peer for its transaction pool
    QueryPool,
    /// A peer's transaction pool
    Pool(Vec<Transaction>),
}

/// The on-wire envelope
#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: u8,
    data: Option<String>,
}

const QUERY_LATEST: u8 = 0;
const QUERY_ALL: u8 = 1;
const RESPONSE_BLOCKCHAIN: u8 = 2;
const QUERY_TRANSACTION_POOL: u8 = 3;
const RESPONSE_TRANSACTION_POOL: u8 = 4;

impl Message {
    /// Encode as a single wire frame
    pub fn to_frame(&self) -> Result<String, MessageError> {
        let envelope = match self {
            Message::QueryLatest => Envelope {
                kind: QUERY_LATEST,
                data: None,
            },
            Message::QueryAll => Envelope {
                kind: QUERY_ALL,
                data: None,
            },
            Message::Blocks(blocks) => Envelope {
                kind: RESPONSE_BLOCKCHAIN,
                data: Some(serde_json::to_string(blocks)?),
            },
            Message::QueryPool => Envelope {
                kind: QUERY_TRANSACTION_POOL,
                data: None,
            },
            Message::Pool(transactions) => Envelope {
                kind: RESPONSE_TRANSACTION_POOL,
                data: Some(serde_json::to_string(transactions)?),
            },
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Decode a wire frame
    pub fn from_frame(frame: &str) -> Result<Self, MessageError> {
        let envelope: Envelope = serde_json::from_str(frame)?;
        match envelope.kind {
            QUERY_LATEST => Ok(Message::QueryLatest),
            QUERY_ALL => Ok(Message::QueryAll),
            RESPONSE_BLOCKCHAIN => {
                let data = envelope
                    .data
                    .ok_or(MessageError::MissingData(RESPONSE_BLOCKCHAIN))?;
                Ok(Message::Blocks(serde_json::from_str(&data)?))
            }
            QUERY_TRANSACTION_POOL => Ok(Message::QueryPool),
            RESPONSE_TRANSACTION_POOL => {
                let data = envelope
                    .data
                    .ok_or(MessageError::MissingData(RESPONSE_TRANSACTION_POOL))?;
                Ok(Message::Pool(serde_json::from_str(&data)?))
            }
            other => Err(MessageError::UnknownType(other)),
        }
    }

    /// Message type name for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::QueryLatest => "QueryLatest",
            Message::QueryAll => "QueryAll",
            Message::Blocks(_) => "Blocks",
            Message::QueryPool => "QueryPool",
            Message::Pool(_) => "Pool",
        }
    }
}
