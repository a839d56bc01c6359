/// Boxed error raised by the host-provided signer session or session factory.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No credentials, cannot create a session key")]
    MissingCredentials,

    #[error("Invalid credentials returned from the Lattice connector")]
    InvalidCredentials,

    #[error("Lattice connector closed")]
    ConnectorClosed,

    #[error("Cannot open Lattice connector: {0}")]
    ConnectorOpen(#[source] BoxError),

    #[error("No active wallet found in Lattice")]
    NoActiveWallet,

    #[error("Active Lattice wallet changed from {known} to {reported}, reconnect to continue")]
    WalletChanged { known: String, reported: String },

    #[error("Could not confirm the active Lattice wallet after signing, refresh and try again")]
    StaleWallet,

    #[error("No connection to Lattice, cannot fetch addresses")]
    NoSession,

    #[error("No addresses returned from Lattice for path {0:?}")]
    NoAddressesReturned(Vec<u32>),

    #[error("Invalid HD path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Number of accounts to add must be a positive number, got {0}")]
    InvalidAccountCount(i64),

    #[error("Signer not present: {0}")]
    SignerNotPresent(String),

    #[error("`maxPriorityFeePerGas` and `maxFeePerGas` must be included for EIP1559 transactions")]
    MissingFeeFields,

    #[error("Unsupported transaction type: {0}")]
    UnsupportedTransactionType(u8),

    #[error("No signature returned")]
    MissingSignature,

    #[error("Only signTypedData V3 and V4 messages (EIP712) are supported, got version {0}")]
    UnsupportedTypedDataVersion(String),

    #[error("{0} is not supported by hardware wallets")]
    UnsupportedOperation(&'static str),

    #[error("Signer session error: {0}")]
    Session(#[source] BoxError),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl Error {
    pub(crate) fn session<E>(e: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::Session(e.into())
    }

    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        Error::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}
