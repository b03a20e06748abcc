//! Wallet management
//!
//! Key file loading and signed transaction construction.

pub mod wallet;

pub use wallet::{Wallet, WalletError};
