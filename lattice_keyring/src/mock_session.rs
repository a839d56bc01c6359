#![allow(clippy::unwrap_used)]

//! In-memory Lattice used to test the keyring without a device.
//!
//! [`MockDevice`] is shared between the test and the sessions built by [`MockSessionFactory`],
//! so a test can swap the active wallet or change the firmware while the keyring holds a session.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sha2::{Digest, Sha256};
use url::Url;

use crate::consts::CONNECTOR_URL;
use crate::error::BoxError;
use crate::protocol::{GetAddressesParams, RawSignature, SignRequest, SignResponse};
use crate::session::{ActiveWallet, FirmwareVersion, SessionFactory, SessionSetup, SignerSession};
use crate::{Connector, ConnectorMessage, KeyringConfig, LatticeKeyring, Surface};

pub const DEVICE_ID: &str = "abc123";
pub const PASSWORD: &str = "correct horse";
pub const APP_NAME: &str = "Test Wallet";

pub const WALLET_A: [u8; 32] = [0xaa; 32];
pub const WALLET_B: [u8; 32] = [0xbb; 32];

/// A request received by the device.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Connection with the session timeout in use
    Connect { device_id: String, timeout: Duration },
    GetAddresses(GetAddressesParams),
    Sign(SignRequest),
}

#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error("Device {0} not found")]
    UnknownDevice(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Connection refused")]
    Refused,
}

#[derive(Debug)]
struct DeviceState {
    device_id: String,
    wallet_uid: Vec<u8>,
    firmware: FirmwareVersion,
    v: Vec<u8>,
    requests: Vec<Request>,
    refuse_connect: bool,
    drop_signature: bool,
    swap_on_fetch: Option<Vec<u8>>,
    swap_after_sign: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new(DEVICE_ID, &WALLET_A)
    }
}

impl MockDevice {
    pub fn new(device_id: &str, wallet_uid: &[u8]) -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                device_id: device_id.to_string(),
                wallet_uid: wallet_uid.to_vec(),
                firmware: FirmwareVersion::new(0, 15, 0),
                v: vec![0x01],
                requests: vec![],
                refuse_connect: false,
                drop_signature: false,
                swap_on_fetch: None,
                swap_after_sign: None,
            })),
        }
    }

    /// Change the active wallet, as inserting or removing a card does.
    pub fn set_wallet(&self, wallet_uid: &[u8]) {
        self.state.lock().unwrap().wallet_uid = wallet_uid.to_vec();
    }

    pub fn set_firmware(&self, firmware: FirmwareVersion) {
        self.state.lock().unwrap().firmware = firmware;
    }

    /// Recovery id returned in signatures, empty for a zero value.
    pub fn set_v(&self, v: &[u8]) {
        self.state.lock().unwrap().v = v.to_vec();
    }

    pub fn refuse_connect(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_connect = refuse;
    }

    /// Answer signing requests without a signature.
    pub fn drop_signature(&self, enabled: bool) {
        self.state.lock().unwrap().drop_signature = enabled;
    }

    /// Change the active wallet when the next address request arrives, as if the session
    /// reconnected to a swapped card before serving it.
    pub fn swap_wallet_on_fetch(&self, wallet_uid: &[u8]) {
        self.state.lock().unwrap().swap_on_fetch = Some(wallet_uid.to_vec());
    }

    /// Change the active wallet once the next signing request is served.
    pub fn swap_wallet_after_sign(&self, wallet_uid: &[u8]) {
        self.state.lock().unwrap().swap_after_sign = Some(wallet_uid.to_vec());
    }

    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.state.lock().unwrap().requests.clear();
    }

    pub fn address_requests(&self) -> Vec<GetAddressesParams> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                Request::GetAddresses(params) => Some(params),
                _ => None,
            })
            .collect()
    }

    pub fn sign_requests(&self) -> Vec<SignRequest> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                Request::Sign(req) => Some(req),
                _ => None,
            })
            .collect()
    }

    /// The address the device derives at `path` for the active wallet.
    pub fn address(&self, path: &[u32]) -> String {
        let wallet_uid = self.state.lock().unwrap().wallet_uid.clone();
        derive_address(&wallet_uid, path)
    }

    pub fn wallet_uid_hex(&self) -> String {
        hex::encode(&self.state.lock().unwrap().wallet_uid)
    }

    fn active_wallet(&self) -> ActiveWallet {
        ActiveWallet {
            uid: self.state.lock().unwrap().wallet_uid.clone(),
            name: Some("Mock wallet".to_string()),
        }
    }
}

fn derive_address(wallet_uid: &[u8], path: &[u32]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(wallet_uid);
    for index in path {
        hasher.update(index.to_be_bytes());
    }
    let digest = hasher.finalize();
    format!("0x{}", hex::encode(&digest[..20]))
}

fn sign_digest(tag: &[u8], request: &SignRequest, wallet_uid: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(tag);
    hasher.update(request.to_json().as_bytes());
    hasher.update(wallet_uid);
    hasher.finalize().to_vec()
}

#[derive(Debug)]
pub struct MockSession {
    device: MockDevice,
    setup: SessionSetup,
    timeout: Duration,
    connected: bool,
    active: Option<ActiveWallet>,
}

impl MockSession {
    pub fn setup(&self) -> &SessionSetup {
        &self.setup
    }
}

impl SignerSession for MockSession {
    type Error = MockError;

    async fn connect(&mut self, device_id: &str) -> Result<(), MockError> {
        let mut state = self.device.state.lock().unwrap();
        state.requests.push(Request::Connect {
            device_id: device_id.to_string(),
            timeout: self.timeout,
        });
        if state.refuse_connect {
            return Err(MockError::Refused);
        }
        if state.device_id != device_id {
            return Err(MockError::UnknownDevice(device_id.to_string()));
        }
        drop(state);
        self.connected = true;
        self.active = Some(self.device.active_wallet());
        Ok(())
    }

    async fn get_addresses(
        &mut self,
        params: &GetAddressesParams,
    ) -> Result<Vec<String>, MockError> {
        if !self.connected {
            return Err(MockError::NotConnected);
        }
        let mut state = self.device.state.lock().unwrap();
        state.requests.push(Request::GetAddresses(params.clone()));
        if let Some(uid) = state.swap_on_fetch.take() {
            state.wallet_uid = uid;
        }
        let mut addresses = vec![];
        if let Some((last, parent)) = params.start_path.split_last() {
            for i in 0..params.n {
                let mut path = parent.to_vec();
                path.push(last + i);
                addresses.push(derive_address(&state.wallet_uid, &path));
            }
        }
        drop(state);
        self.active = Some(self.device.active_wallet());
        Ok(addresses)
    }

    async fn sign(&mut self, request: &SignRequest) -> Result<SignResponse, MockError> {
        if !self.connected {
            return Err(MockError::NotConnected);
        }
        let mut state = self.device.state.lock().unwrap();
        state.requests.push(Request::Sign(request.clone()));
        let sig = (!state.drop_signature).then(|| RawSignature {
            r: sign_digest(b"r", request, &state.wallet_uid),
            s: sign_digest(b"s", request, &state.wallet_uid),
            v: state.v.clone(),
        });
        if let Some(uid) = state.swap_after_sign.take() {
            state.wallet_uid = uid;
        }
        drop(state);
        self.active = Some(self.device.active_wallet());
        Ok(SignResponse { sig })
    }

    fn active_wallet(&self) -> Option<ActiveWallet> {
        self.active.clone()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn firmware_version(&self) -> FirmwareVersion {
        self.device.state.lock().unwrap().firmware
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockSessionFactory {
    device: MockDevice,
    setups: Arc<Mutex<Vec<SessionSetup>>>,
}

impl MockSessionFactory {
    pub fn new(device: MockDevice) -> Self {
        Self {
            device,
            setups: Default::default(),
        }
    }

    /// Setups of every session created so far.
    pub fn setups(&self) -> Vec<SessionSetup> {
        self.setups.lock().unwrap().clone()
    }
}

impl SessionFactory for MockSessionFactory {
    type Session = MockSession;

    fn create(&self, setup: SessionSetup) -> Result<MockSession, BoxError> {
        self.setups.lock().unwrap().push(setup.clone());
        Ok(MockSession {
            device: self.device.clone(),
            timeout: setup.timeout,
            setup,
            connected: false,
            active: None,
        })
    }
}

/// How the connector page behaves once opened.
#[derive(Debug, Clone)]
pub enum Answer {
    /// Deliver these messages, then stay open
    Messages(Vec<ConnectorMessage>),

    /// The user closes the page
    Close,

    /// Nothing happens
    Silent,
}

impl Answer {
    /// The connector page posting `{deviceID, password}`.
    pub fn credentials(device_id: &str, password: &str) -> Self {
        let data = serde_json::json!({ "deviceID": device_id, "password": password });
        Answer::Messages(vec![ConnectorMessage::Posted {
            origin: CONNECTOR_URL.to_string(),
            data: data.to_string(),
        }])
    }
}

/// Opens scripted pages, answering with the queued [`Answer`]s in order, then closing.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    answers: Arc<Mutex<VecDeque<Answer>>>,
    opened: Arc<Mutex<Vec<Url>>>,
}

impl MockConnector {
    pub fn push(&self, answer: Answer) {
        self.answers.lock().unwrap().push_back(answer);
    }

    pub fn opened(&self) -> Vec<Url> {
        self.opened.lock().unwrap().clone()
    }
}

impl Connector for MockConnector {
    type Surface = MockSurface;

    fn open(&mut self, url: &Url) -> Result<MockSurface, BoxError> {
        self.opened.lock().unwrap().push(url.clone());
        let answer = self.answers.lock().unwrap().pop_front();
        Ok(match answer.unwrap_or(Answer::Close) {
            Answer::Messages(messages) => MockSurface {
                messages: messages.into(),
                closed: false,
            },
            Answer::Close => MockSurface {
                messages: VecDeque::new(),
                closed: true,
            },
            Answer::Silent => MockSurface {
                messages: VecDeque::new(),
                closed: false,
            },
        })
    }
}

#[derive(Debug)]
pub struct MockSurface {
    messages: VecDeque<ConnectorMessage>,
    closed: bool,
}

impl Surface for MockSurface {
    fn try_recv(&mut self) -> Option<ConnectorMessage> {
        self.messages.pop_front()
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// A keyring on a [`MockDevice`], its connector ready to hand out the device credentials once.
pub struct TestKeyring {
    pub keyring: LatticeKeyring<MockSessionFactory, MockConnector>,
    pub device: MockDevice,
    pub factory: MockSessionFactory,
    pub connector: MockConnector,
}

impl TestKeyring {
    pub fn new() -> Self {
        Self::with_config(KeyringConfig::default_mainnet(APP_NAME))
    }

    pub fn with_config(config: KeyringConfig) -> Self {
        Self::with_answers(config, vec![Answer::credentials(DEVICE_ID, PASSWORD)])
    }

    /// A keyring whose connector pages behave as `answers`.
    pub fn with_answers(config: KeyringConfig, answers: Vec<Answer>) -> Self {
        let device = MockDevice::default();
        let factory = MockSessionFactory::new(device.clone());
        let connector = MockConnector::default();
        for answer in answers {
            connector.push(answer);
        }
        let keyring = LatticeKeyring::new(config, factory.clone(), connector.clone());
        Self {
            keyring,
            device,
            factory,
            connector,
        }
    }
}

impl Default for TestKeyring {
    fn default() -> Self {
        Self::new()
    }
}
