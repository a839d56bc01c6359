#![doc = include_str!("../README.md")]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]

pub mod accounts;
mod config;
pub mod connection;
pub mod connector;
pub mod consts;
mod credentials;
pub mod error;
pub mod hd_path;
mod keyring;
mod network;
pub mod pagination;
pub mod protocol;
pub mod session;
mod signing;
mod state;
pub mod transaction;

#[cfg(any(test, feature = "test_session"))]
pub mod mock_session;

pub use config::KeyringConfig;
pub use connection::{ConnectionState, WalletSync};
pub use connector::{Connector, ConnectorMessage, Surface};
pub use consts::{CLOSE_CODE, KEYRING_TYPE, PAGE_SIZE};
pub use credentials::Credentials;
pub use error::Error;
pub use keyring::LatticeKeyring;
pub use network::Network;
pub use session::{ActiveWallet, FirmwareVersion, SessionFactory, SessionSetup, SignerSession};
pub use state::KeyringState;
pub use transaction::{SignedTransaction, Transaction};

pub type Result<T> = std::result::Result<T, error::Error>;
