use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::transaction::TxRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "ETH")]
    Eth,
    #[serde(rename = "ETH_MSG")]
    EthMsg,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAddressesParams {
    pub currency: Currency,

    /// Path of the first address returned, the following increment the last index
    pub start_path: Vec<u32>,

    pub n: u32,

    pub skip_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignRequest {
    pub currency: Currency,
    pub data: SignData,
}

impl SignRequest {
    pub(crate) fn transaction(tx: TxRequest) -> Self {
        Self {
            currency: Currency::Eth,
            data: SignData::Transaction(tx),
        }
    }

    pub(crate) fn message(msg: MessageRequest) -> Self {
        Self {
            currency: Currency::EthMsg,
            data: SignData::Message(msg),
        }
    }

    pub(crate) fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SignData {
    Transaction(TxRequest),
    Message(MessageRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageProtocol {
    #[serde(rename = "signPersonal")]
    SignPersonal,
    #[serde(rename = "eip712")]
    Eip712,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    pub protocol: MessageProtocol,

    /// Hex or utf8 string for personal messages, the typed data object for eip712
    pub payload: serde_json::Value,

    pub signer_path: Vec<u32>,
}

/// What the signer session returns for a signing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignResponse {
    /// Absent if the device returned no signature
    pub sig: Option<RawSignature>,
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct RawSignature {
    pub r: Vec<u8>,
    pub s: Vec<u8>,

    /// Recovery id, may be empty for a zero value
    pub v: Vec<u8>,
}

impl Debug for RawSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawSignature")
            .field("r", &hex::encode(&self.r))
            .field("s", &hex::encode(&self.s))
            .field("v", &hex::encode(&self.v))
            .finish()
    }
}

impl RawSignature {
    pub(crate) fn is_complete(&self) -> bool {
        !self.r.is_empty() && !self.s.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn serialize_get_addresses() {
        let params = GetAddressesParams {
            currency: Currency::Eth,
            start_path: vec![0x8000002c, 0x8000003c, 0x80000000, 0, 0],
            n: 5,
            skip_cache: true,
        };
        let s = serde_json::to_string(&params).unwrap();
        assert_eq!(
            s,
            r#"{"currency":"ETH","startPath":[2147483692,2147483708,2147483648,0,0],"n":5,"skipCache":true}"#
        );
    }

    #[test]
    fn serialize_message_request() {
        let req = SignRequest::message(MessageRequest {
            protocol: MessageProtocol::SignPersonal,
            payload: "0x68656c6c6f".into(),
            signer_path: vec![1, 2],
        });
        let value: serde_json::Value = serde_json::from_str(&req.to_json()).unwrap();
        assert_eq!(value["currency"], "ETH_MSG");
        assert_eq!(value["data"]["protocol"], "signPersonal");
        assert_eq!(value["data"]["signerPath"], serde_json::json!([1, 2]));
    }

    #[test]
    fn signature_completeness() {
        let sig = RawSignature {
            r: vec![1],
            s: vec![2],
            v: vec![],
        };
        assert!(sig.is_complete());
        assert!(!RawSignature::default().is_complete());
    }
}
