use std::time::Duration;

use crate::consts::{
    CONNECTOR_URL, CONNECT_TIMEOUT, HANDSHAKE_TIMEOUT, POLL_INTERVAL, STANDARD_HD_PATH, TIMEOUT,
};
use crate::Network;

#[derive(Clone, Debug)]
pub struct KeyringConfig {
    /// The name the device is paired with, shown on the Lattice screen
    pub app_name: String,

    pub network: Network,

    /// Template used to derive new accounts
    pub hd_path: String,

    /// The companion page collecting the device credentials
    pub connector_url: String,

    /// Timeout of the requests issued by the signer session
    pub timeout: Duration,

    /// Timeout of the session connection to the device
    pub connect_timeout: Duration,

    /// How often the connector page is checked while waiting for credentials
    pub poll_interval: Duration,

    /// Waiting longer than this for credentials is treated as a closed connector
    pub handshake_timeout: Duration,
}

impl KeyringConfig {
    pub fn default_mainnet(app_name: &str) -> Self {
        Self::new(app_name, Network::Mainnet)
    }

    pub fn default_testnet(app_name: &str) -> Self {
        Self::new(app_name, Network::Testnet)
    }

    fn new(app_name: &str, network: Network) -> Self {
        Self {
            app_name: app_name.to_string(),
            network,
            hd_path: STANDARD_HD_PATH.to_string(),
            connector_url: CONNECTOR_URL.to_string(),
            timeout: TIMEOUT,
            connect_timeout: CONNECT_TIMEOUT,
            poll_interval: POLL_INTERVAL,
            handshake_timeout: HANDSHAKE_TIMEOUT,
        }
    }

    pub fn with_hd_path(mut self, hd_path: &str) -> Self {
        self.hd_path = hd_path.to_string();
        self
    }

    pub fn with_connector_url(mut self, connector_url: &str) -> Self {
        self.connector_url = connector_url.to_string();
        self
    }
}
