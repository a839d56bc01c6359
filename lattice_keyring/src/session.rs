//! The contract of the external signer session talking to the device.

use std::future::Future;
use std::time::Duration;

use crate::error::BoxError;
use crate::protocol::{GetAddressesParams, SignRequest, SignResponse};
use crate::Network;

/// First firmware version signing typed (EIP-2930 and EIP-1559) transactions.
pub const TYPED_TX_FIRMWARE: FirmwareVersion = FirmwareVersion::new(0, 11, 0);

/// A connection to a Lattice through the signing service.
///
/// Requests are issued one at a time, the session serializes them on its transport anyway.
pub trait SignerSession {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Connect to the device with the given id, loading its active wallet.
    fn connect(&mut self, device_id: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn get_addresses(
        &mut self,
        params: &GetAddressesParams,
    ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send;

    fn sign(
        &mut self,
        request: &SignRequest,
    ) -> impl Future<Output = Result<SignResponse, Self::Error>> + Send;

    /// The wallet currently active on the device, as known after the last request.
    fn active_wallet(&self) -> Option<ActiveWallet>;

    /// Timeout of the requests issued from now on.
    fn timeout(&self) -> Duration;

    fn set_timeout(&mut self, timeout: Duration);

    fn firmware_version(&self) -> FirmwareVersion;
}

/// Builds signer sessions, this is where the external client gets constructed.
pub trait SessionFactory {
    type Session: SignerSession;

    fn create(&self, setup: SessionSetup) -> Result<Self::Session, BoxError>;
}

/// Parameters to construct a [`SignerSession`].
#[derive(Clone)]
pub struct SessionSetup {
    /// The application name the device is paired with
    pub name: String,

    /// Url of the signing service
    pub base_url: String,

    pub timeout: Duration,

    /// Seeds the transport encryption, see [`crate::Credentials::session_key`]
    pub session_key: [u8; 32],

    pub network: Network,
}

impl std::fmt::Debug for SessionSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSetup")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("network", &self.network)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveWallet {
    pub uid: Vec<u8>,

    /// Wallet name shown on the device, if any
    pub name: Option<String>,
}

impl ActiveWallet {
    /// The hex wallet identifier, `None` if the device reports no wallet (empty or zeroed uid).
    pub fn uid_hex(&self) -> Option<String> {
        if self.uid.iter().all(|b| *b == 0) {
            None
        } else {
            Some(hex::encode(&self.uid))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub fix: u8,
}

impl FirmwareVersion {
    pub const fn new(major: u8, minor: u8, fix: u8) -> Self {
        Self { major, minor, fix }
    }

    pub fn supports_typed_transactions(&self) -> bool {
        *self >= TYPED_TX_FIRMWARE
    }
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.fix)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn firmware_ordering() {
        assert!(!FirmwareVersion::new(0, 10, 9).supports_typed_transactions());
        assert!(FirmwareVersion::new(0, 11, 0).supports_typed_transactions());
        assert!(FirmwareVersion::new(0, 12, 1).supports_typed_transactions());
        assert!(FirmwareVersion::new(1, 0, 0).supports_typed_transactions());
        assert_eq!(FirmwareVersion::new(0, 11, 2).to_string(), "0.11.2");
    }

    #[test]
    fn wallet_uid_hex() {
        let wallet = ActiveWallet {
            uid: vec![0xab, 0x01],
            name: None,
        };
        assert_eq!(wallet.uid_hex().as_deref(), Some("ab01"));

        let empty = ActiveWallet {
            uid: vec![0; 32],
            name: None,
        };
        assert_eq!(empty.uid_hex(), None);
        let empty = ActiveWallet {
            uid: vec![],
            name: None,
        };
        assert_eq!(empty.uid_hex(), None);
    }
}
