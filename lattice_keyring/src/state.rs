use serde::{Deserialize, Serialize};

use crate::accounts::AccountRecord;
use crate::credentials::Credentials;
use crate::Network;

/// Persisted state of a [`crate::LatticeKeyring`].
///
/// Sessions are never persisted, a deserialized keyring connects again at the next unlock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyringState {
    pub creds: Credentials,

    pub accounts: Vec<AccountRecord>,

    #[serde(rename = "walletUID", skip_serializing_if = "Option::is_none")]
    pub wallet_uid: Option<String>,

    /// Application name the device is paired with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,

    pub page: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hd_path: Option<String>,

    pub unlocked_account: u32,
}

impl KeyringState {
    pub fn from_json(data: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_state() {
        let state = KeyringState::from_json("{}").unwrap();
        assert_eq!(state, KeyringState::default());
        assert_eq!(
            state.to_json().unwrap(),
            r#"{"creds":{"deviceID":null,"password":null,"endpoint":null},"accounts":[],"page":0,"unlockedAccount":0}"#
        );
    }

    #[test]
    fn state_json() {
        let json = r#"{
            "creds": {"deviceID": "dev", "password": "pw", "endpoint": null},
            "accounts": [{
                "address": "0x01",
                "derivationIndex": 4,
                "hdPath": "m/44'/60'/0'/0/x",
                "walletUID": "ab"
            }],
            "walletUID": "ab",
            "name": "app",
            "network": "testnet",
            "page": 2,
            "hdPath": "m/44'/60'/0'/0/x",
            "unlockedAccount": 4
        }"#;
        let state = KeyringState::from_json(json).unwrap();
        assert_eq!(state.creds, Credentials::new("dev", "pw", None));
        assert_eq!(state.accounts[0].derivation_index, 4);
        assert_eq!(state.network, Some(Network::Testnet));
        assert_eq!(state.page, 2);
        assert_eq!(state.unlocked_account, 4);

        let back = KeyringState::from_json(&state.to_json().unwrap()).unwrap();
        assert_eq!(back, state);
    }
}
