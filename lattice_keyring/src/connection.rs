use std::time::Duration;

use crate::connector::{Connector, Handshake};
use crate::credentials::Credentials;
use crate::session::{FirmwareVersion, SessionFactory, SessionSetup, SignerSession};
use crate::{Error, KeyringConfig, Network, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing known about the device
    NoCredentials,

    /// Credentials known, the signer session is not built yet
    CredentialsPending,

    /// Signer session built but not connected to the device
    SessionInitialized,

    Connected,

    /// The device reported a different wallet, either refused at connection or seen after
    /// signing. The next unlock reconnects.
    Disconnected,
}

/// Outcome of reading the active wallet identity from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletSync {
    Unchanged,
    Adopted {
        previous: Option<String>,
        current: String,
    },
}

impl WalletSync {
    /// Whether data derived from the previous wallet must be discarded.
    ///
    /// The first identity ever seen replaces nothing.
    pub fn invalidates_cache(&self) -> bool {
        matches!(
            self,
            WalletSync::Adopted {
                previous: Some(_),
                ..
            }
        )
    }
}

/// Owns the signer session and drives it through credential acquisition, session
/// construction and connection.
pub struct ConnectionManager<F: SessionFactory, C: Connector> {
    factory: F,
    connector: C,
    handshake: Handshake,

    credentials: Credentials,
    app_name: String,
    network: Network,

    session: Option<F::Session>,

    /// Hex identifier of the wallet active on the device
    wallet_uid: Option<String>,

    state: ConnectionState,

    /// Ask the credentials again at next unlock, even if already connected
    force_reconnect: bool,

    timeout: Duration,
    connect_timeout: Duration,
}

impl<F: SessionFactory, C: Connector> std::fmt::Debug for ConnectionManager<F, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("credentials", &self.credentials)
            .field("app_name", &self.app_name)
            .field("network", &self.network)
            .field("has_session", &self.session.is_some())
            .field("wallet_uid", &self.wallet_uid)
            .field("state", &self.state)
            .field("force_reconnect", &self.force_reconnect)
            .finish()
    }
}

impl<F: SessionFactory, C: Connector> ConnectionManager<F, C> {
    pub fn new(config: &KeyringConfig, factory: F, connector: C) -> Self {
        Self {
            factory,
            connector,
            handshake: Handshake {
                connector_url: config.connector_url.clone(),
                poll_interval: config.poll_interval,
                timeout: config.handshake_timeout,
            },
            credentials: Credentials::default(),
            app_name: config.app_name.clone(),
            network: config.network,
            session: None,
            wallet_uid: None,
            state: ConnectionState::NoCredentials,
            force_reconnect: false,
            timeout: config.timeout,
            connect_timeout: config.connect_timeout,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn wallet_uid(&self) -> Option<&str> {
        self.wallet_uid.as_deref()
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.has_credentials(&self.app_name)
    }

    /// A session is active when it's built and a wallet identity is known.
    pub fn has_session(&self) -> bool {
        self.session.is_some() && self.wallet_uid.is_some()
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == ConnectionState::Connected && self.has_credentials() && self.has_session()
    }

    /// Ask the credentials again at next unlock.
    pub fn force_reconnect(&mut self) {
        self.force_reconnect = true;
    }

    pub fn firmware_version(&self) -> Option<FirmwareVersion> {
        self.session.as_ref().map(|s| s.firmware_version())
    }

    /// The wallet the device currently reports, which may differ from [`Self::wallet_uid`].
    pub fn reported_wallet_uid(&self) -> Option<String> {
        self.session
            .as_ref()
            .and_then(|s| s.active_wallet())
            .and_then(|w| w.uid_hex())
    }

    pub(crate) fn session_mut(&mut self) -> Result<&mut F::Session> {
        if !self.has_session() {
            return Err(Error::NoSession);
        }
        self.session.as_mut().ok_or(Error::NoSession)
    }

    /// Make sure credentials are known, asking them to the connector if needed.
    pub async fn acquire_credentials(&mut self) -> Result<()> {
        if self.has_credentials() && !self.force_reconnect {
            return Ok(());
        }
        let credentials = self
            .handshake
            .run(&mut self.connector, &self.app_name)
            .await?;
        tracing::info!(
            "received credentials for device {:?}",
            credentials.device_id()
        );
        self.credentials = credentials;

        // A session built with previous credentials has the wrong key
        self.session = None;
        self.state = ConnectionState::CredentialsPending;
        Ok(())
    }

    /// Build the signer session unless one is already active.
    pub fn init_session(&mut self) -> Result<()> {
        if self.has_session() {
            return Ok(());
        }
        let session_key = self.credentials.session_key(&self.app_name)?;
        let base_url = self
            .credentials
            .endpoint()
            .unwrap_or_else(|| self.network.signing_url())
            .to_string();
        let setup = SessionSetup {
            name: self.app_name.clone(),
            base_url,
            timeout: self.timeout,
            session_key,
            network: self.network,
        };
        tracing::debug!("creating signer session {setup:?}");
        let session = self.factory.create(setup).map_err(Error::Session)?;
        self.session = Some(session);
        self.state = ConnectionState::SessionInitialized;
        Ok(())
    }

    /// Connect the session to the device and reconcile the active wallet.
    ///
    /// A removable card may have been swapped on the device since the last connection, changing
    /// the active wallet. With `allow_wallet_change` false a changed wallet fails with
    /// [`Error::WalletChanged`] leaving the known identity untouched.
    pub async fn connect(&mut self, allow_wallet_change: bool) -> Result<WalletSync> {
        let device_id = self
            .credentials
            .device_id()
            .ok_or(Error::MissingCredentials)?
            .to_string();
        let connect_timeout = self.connect_timeout;
        let session = self.session.as_mut().ok_or(Error::NoSession)?;

        let timeout = session.timeout();
        session.set_timeout(connect_timeout);
        let result = session.connect(&device_id).await;
        session.set_timeout(timeout);
        result.map_err(Error::session)?;

        let wallet = session.active_wallet().ok_or(Error::NoActiveWallet)?;
        let reported = wallet.uid_hex().ok_or(Error::NoActiveWallet)?;
        tracing::debug!(
            "connected to {device_id}, wallet {reported} ({})",
            wallet.name.as_deref().unwrap_or("unnamed")
        );

        match self.wallet_uid.clone() {
            Some(known) if known == reported => {
                self.state = ConnectionState::Connected;
                Ok(WalletSync::Unchanged)
            }
            Some(known) if !allow_wallet_change => {
                tracing::warn!("refusing wallet change from {known} to {reported}");
                self.state = ConnectionState::Disconnected;
                Err(Error::WalletChanged { known, reported })
            }
            _ => {
                self.state = ConnectionState::Connected;
                Ok(self.adopt(reported))
            }
        }
    }

    /// Make sure the session is connected: credentials, session and connection.
    pub async fn unlock(&mut self, allow_wallet_change: bool) -> Result<WalletSync> {
        if self.is_unlocked() && !self.force_reconnect {
            return Ok(WalletSync::Unchanged);
        }
        self.acquire_credentials().await?;
        self.init_session()?;
        let sync = self.connect(allow_wallet_change).await?;
        self.force_reconnect = false;
        Ok(sync)
    }

    /// Read the active wallet after a device request and adopt it if it changed.
    ///
    /// The session may silently reconnect to another wallet while serving a request.
    pub fn sync_wallet(&mut self) -> Result<WalletSync> {
        let reported = self.reported_wallet_uid().ok_or(Error::NoActiveWallet)?;
        if self.wallet_uid.as_deref() == Some(reported.as_str()) {
            Ok(WalletSync::Unchanged)
        } else {
            Ok(self.adopt(reported))
        }
    }

    /// The known wallet can't be trusted anymore, the next unlock reconnects to the device.
    pub(crate) fn mark_stale(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    fn adopt(&mut self, current: String) -> WalletSync {
        tracing::info!("active wallet is now {current}");
        let previous = self.wallet_uid.replace(current.clone());
        WalletSync::Adopted { previous, current }
    }

    /// Replace the persisted part of the state, dropping any session.
    pub(crate) fn restore(
        &mut self,
        credentials: Credentials,
        wallet_uid: Option<String>,
        app_name: Option<String>,
        network: Option<Network>,
    ) {
        if let Some(app_name) = app_name {
            self.app_name = app_name;
        }
        if let Some(network) = network {
            self.network = network;
        }
        self.credentials = credentials;
        self.wallet_uid = wallet_uid;
        self.session = None;
        self.force_reconnect = false;
        self.state = if self.has_credentials() {
            ConnectionState::CredentialsPending
        } else {
            ConnectionState::NoCredentials
        };
    }

    /// Forget everything about the device.
    pub fn forget(&mut self) {
        tracing::info!("forgetting device");
        self.credentials.clear();
        self.session = None;
        self.wallet_uid = None;
        self.force_reconnect = false;
        self.state = ConnectionState::NoCredentials;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::consts::{CONNECT_TIMEOUT, TIMEOUT};
    use crate::mock_session::{
        Answer, MockConnector, MockDevice, MockSessionFactory, APP_NAME, DEVICE_ID, PASSWORD,
        WALLET_B,
    };

    fn manager(device: &MockDevice) -> ConnectionManager<MockSessionFactory, MockConnector> {
        let connector = MockConnector::default();
        connector.push(Answer::credentials(DEVICE_ID, PASSWORD));
        let config = KeyringConfig::default_mainnet(APP_NAME);
        ConnectionManager::new(&config, MockSessionFactory::new(device.clone()), connector)
    }

    #[tokio::test]
    async fn connect_restores_timeout() {
        let device = MockDevice::default();
        let mut conn = manager(&device);
        assert_eq!(conn.state(), ConnectionState::NoCredentials);

        let sync = conn.unlock(false).await.unwrap();
        assert!(!sync.invalidates_cache());
        assert!(conn.is_unlocked());
        assert_eq!(conn.session_mut().unwrap().timeout(), TIMEOUT);

        conn.session_mut().unwrap().set_timeout(CONNECT_TIMEOUT * 3);
        conn.force_reconnect();
        conn.connect(false).await.unwrap();
        assert_eq!(conn.session_mut().unwrap().timeout(), CONNECT_TIMEOUT * 3);
    }

    #[tokio::test]
    async fn stale_connection_reconnects() {
        let device = MockDevice::default();
        let mut conn = manager(&device);
        conn.unlock(false).await.unwrap();
        let known = conn.wallet_uid().unwrap().to_string();

        device.set_wallet(&WALLET_B);
        conn.mark_stale();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(!conn.is_unlocked());

        let err = conn.unlock(false).await.unwrap_err();
        assert!(matches!(err, Error::WalletChanged { .. }));
        assert_eq!(conn.wallet_uid(), Some(known.as_str()));

        let sync = conn.unlock(true).await.unwrap();
        assert!(sync.invalidates_cache());
        assert!(conn.is_unlocked());
        assert_eq!(conn.wallet_uid(), Some(hex::encode(WALLET_B).as_str()));
    }
}
