//! Ethereum transactions and the request shapes the device signs.
//!
//! A transaction is signed as one of three shapes according to its type: legacy (0), access
//! list (1, EIP-2930) or priority fee (2, EIP-1559). Firmware older than
//! [`crate::session::TYPED_TX_FIRMWARE`] only signs the legacy shape, typed requests are
//! converted with [`TxRequest::into_legacy`] and the result is rewritten accordingly.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Deserializer, Serialize};

use crate::protocol::RawSignature;
use crate::session::FirmwareVersion;
use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(
        rename = "type",
        default,
        deserialize_with = "deserialize_tx_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub tx_type: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<U256>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<U256>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<U256>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,

    /// `None` for contract creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_list: Option<Vec<AccessListItem>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListItem {
    pub address: Address,
    pub storage_keys: Vec<B256>,
}

/// The type is given either as number or as hex string by hosts.
fn deserialize_tx_type<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<u8>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(u8),
        Str(String),
    }
    match Option::<NumOrStr>::deserialize(d)? {
        None => Ok(None),
        Some(NumOrStr::Num(n)) => Ok(Some(n)),
        Some(NumOrStr::Str(s)) => {
            let parsed = match s.strip_prefix("0x") {
                Some(hex) => u8::from_str_radix(hex, 16),
                None => s.parse(),
            };
            parsed.map(Some).map_err(serde::de::Error::custom)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    Legacy,
    AccessList,
    PriorityFee,
}

impl TxKind {
    /// The shape `tx` is signed with, checking the fields the shape requires.
    pub fn of(tx: &Transaction) -> Result<Self> {
        match tx.tx_type.unwrap_or(0) {
            0 => Ok(TxKind::Legacy),
            1 => Ok(TxKind::AccessList),
            2 => {
                if tx.max_fee_per_gas.is_none() || tx.max_priority_fee_per_gas.is_none() {
                    return Err(Error::MissingFeeFields);
                }
                Ok(TxKind::PriorityFee)
            }
            t => Err(Error::UnsupportedTransactionType(t)),
        }
    }
}

/// Fields common to every request shape, as hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxFields {
    pub chain_id: String,
    pub nonce: String,
    pub gas_limit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub value: String,
    pub data: String,
    pub signer_path: Vec<u32>,
}

impl TxFields {
    fn new(tx: &Transaction, signer_path: Vec<u32>) -> Self {
        let data: &[u8] = tx.data.as_ref().map(|d| d.as_ref()).unwrap_or_default();
        Self {
            // unspecified chain means mainnet
            chain_id: hex_number(tx.chain_id.or(Some(U256::from(1)))),
            nonce: hex_number(tx.nonce),
            gas_limit: hex_number(tx.gas_limit),
            to: tx.to.as_ref().map(hex_address),
            value: hex_number(tx.value),
            data: format!("0x{}", hex::encode(data)),
            signer_path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListEntry {
    pub address: String,
    pub storage_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyTx {
    #[serde(flatten)]
    pub fields: TxFields,
    pub gas_price: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListTx {
    #[serde(rename = "type")]
    pub tx_type: u8,
    #[serde(flatten)]
    pub fields: TxFields,
    pub gas_price: String,
    pub access_list: Vec<AccessListEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityFeeTx {
    #[serde(rename = "type")]
    pub tx_type: u8,
    #[serde(flatten)]
    pub fields: TxFields,
    pub max_fee_per_gas: String,
    pub max_priority_fee_per_gas: String,
    pub access_list: Vec<AccessListEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TxRequest {
    Legacy(LegacyTx),
    AccessList(AccessListTx),
    PriorityFee(PriorityFeeTx),
}

impl TxRequest {
    pub fn new(tx: &Transaction, signer_path: Vec<u32>) -> Result<Self> {
        let kind = TxKind::of(tx)?;
        let fields = TxFields::new(tx, signer_path);
        Ok(match kind {
            TxKind::Legacy => TxRequest::Legacy(LegacyTx {
                fields,
                gas_price: hex_number(tx.gas_price),
            }),
            TxKind::AccessList => TxRequest::AccessList(AccessListTx {
                tx_type: 1,
                fields,
                gas_price: hex_number(tx.gas_price),
                access_list: access_list(tx),
            }),
            TxKind::PriorityFee => TxRequest::PriorityFee(PriorityFeeTx {
                tx_type: 2,
                fields,
                max_fee_per_gas: hex_number(tx.max_fee_per_gas),
                max_priority_fee_per_gas: hex_number(tx.max_priority_fee_per_gas),
                access_list: access_list(tx),
            }),
        })
    }

    pub fn kind(&self) -> TxKind {
        match self {
            TxRequest::Legacy(_) => TxKind::Legacy,
            TxRequest::AccessList(_) => TxKind::AccessList,
            TxRequest::PriorityFee(_) => TxKind::PriorityFee,
        }
    }

    /// The legacy shape of this request, the max fee becomes the gas price.
    pub fn into_legacy(self) -> LegacyTx {
        match self {
            TxRequest::Legacy(tx) => tx,
            TxRequest::AccessList(tx) => LegacyTx {
                fields: tx.fields,
                gas_price: tx.gas_price,
            },
            TxRequest::PriorityFee(tx) => LegacyTx {
                fields: tx.fields,
                gas_price: tx.max_fee_per_gas,
            },
        }
    }

    /// Adapt the request to what `firmware` can sign.
    pub fn for_firmware(self, firmware: FirmwareVersion) -> PreparedTx {
        if self.kind() != TxKind::Legacy && !firmware.supports_typed_transactions() {
            tracing::info!(
                "firmware {firmware} can't sign typed transactions, reverting to legacy"
            );
            PreparedTx {
                request: TxRequest::Legacy(self.into_legacy()),
                downgraded: true,
            }
        } else {
            PreparedTx {
                request: self,
                downgraded: false,
            }
        }
    }
}

/// A request ready to be sent, remembering whether it was converted to legacy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTx {
    pub request: TxRequest,
    pub downgraded: bool,
}

/// The transaction given to sign with the signature added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub r: String,
    pub s: String,
    pub v: String,
}

impl SignedTransaction {
    /// Add `sig` to `tx`, rewriting type and fees if a legacy transaction was signed instead.
    pub(crate) fn new(tx: &Transaction, downgraded: bool, sig: &RawSignature) -> Self {
        let mut transaction = tx.clone();
        if downgraded {
            transaction.gas_price = tx.max_fee_per_gas.or(tx.gas_price);
            transaction.tx_type = None;
            transaction.max_fee_per_gas = None;
            transaction.max_priority_fee_per_gas = None;
            transaction.access_list = None;
        }
        let v = if sig.v.is_empty() {
            "0".to_string()
        } else {
            hex::encode(&sig.v)
        };
        Self {
            transaction,
            r: format!("0x{}", hex::encode(&sig.r)),
            s: format!("0x{}", hex::encode(&sig.s)),
            v: format!("0x{v}"),
        }
    }
}

fn hex_number(value: Option<U256>) -> String {
    format!("0x{:x}", value.unwrap_or_default())
}

fn hex_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

fn access_list(tx: &Transaction) -> Vec<AccessListEntry> {
    tx.access_list
        .iter()
        .flatten()
        .map(|item| AccessListEntry {
            address: hex_address(&item.address),
            storage_keys: item
                .storage_keys
                .iter()
                .map(|k| format!("0x{}", hex::encode(k.as_slice())))
                .collect(),
        })
        .collect()
}
