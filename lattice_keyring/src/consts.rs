use std::time::Duration;

/// Offset added to a path index to mark it hardened.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// The device firmware rejects derivation paths deeper than this.
pub const MAX_PATH_DEPTH: usize = 5;

/// Character marking the segment of a path template replaced by the account index.
pub const PATH_PLACEHOLDER: char = 'x';

pub const STANDARD_HD_PATH: &str = "m/44'/60'/0'/0/x";

/// Number of addresses shown per page.
pub const PAGE_SIZE: u32 = 5;

/// Passed to `add_accounts` by hosts to ask for the device to be forgotten.
pub const CLOSE_CODE: i64 = -1000;

pub const KEYRING_TYPE: &str = "Lattice Hardware";

/// Default timeout of requests issued by the signer session.
pub const TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout used while the signer session connects to the device.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// How often the connector surface is checked while waiting for credentials.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Give up on the connector surface after this long without an answer.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(300);

pub const CONNECTOR_URL: &str = "https://lattice.gridplus.io";

pub const SIGNING_URL: &str = "https://signing.gridpl.us";
pub const SIGNING_URL_TESTNET: &str = "https://signing.staging-gridpl.us";

/// Name used in the connector url when the host did not set one.
pub const UNKNOWN_APP_NAME: &str = "Unknown";
