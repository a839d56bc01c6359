use crate::accounts::{AccountRecord, AddressCache};
use crate::connection::ConnectionManager;
use crate::connector::Connector;
use crate::hd_path;
use crate::protocol::{MessageProtocol, MessageRequest, RawSignature, SignRequest};
use crate::session::{SessionFactory, SignerSession};
use crate::transaction::{SignedTransaction, Transaction, TxKind, TxRequest};
use crate::{Error, Result};

/// Typed data versions the device can sign.
const TYPED_DATA_VERSIONS: [&str; 2] = ["V3", "V4"];

/// A message to sign with an account key.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Hex or utf8 message signed with the personal message prefix
    Personal(String),

    /// EIP-712 typed data
    TypedData {
        data: serde_json::Value,
        version: String,
    },
}

impl Message {
    fn check(&self) -> Result<()> {
        match self {
            Message::Personal(_) => Ok(()),
            Message::TypedData { version, .. } => {
                if TYPED_DATA_VERSIONS.contains(&version.as_str()) {
                    Ok(())
                } else {
                    Err(Error::UnsupportedTypedDataVersion(version.clone()))
                }
            }
        }
    }

    fn into_request(self, signer_path: Vec<u32>) -> MessageRequest {
        let (protocol, payload) = match self {
            Message::Personal(msg) => (MessageProtocol::SignPersonal, msg.into()),
            Message::TypedData { data, .. } => (MessageProtocol::Eip712, data),
        };
        MessageRequest {
            protocol,
            payload,
            signer_path,
        }
    }
}

/// Connect refusing wallet changes and find the account for `address` in the active wallet.
pub(crate) async fn resolve_signer<F, C>(
    conn: &mut ConnectionManager<F, C>,
    accounts: &AddressCache,
    address: &str,
) -> Result<AccountRecord>
where
    F: SessionFactory,
    C: Connector,
{
    conn.unlock(false).await?;
    let wallet_uid = conn.wallet_uid().ok_or(Error::NoActiveWallet)?;
    accounts
        .find_in_wallet(address, wallet_uid)
        .cloned()
        .ok_or_else(|| Error::SignerNotPresent(address.to_string()))
}

pub(crate) async fn sign_transaction<F, C>(
    conn: &mut ConnectionManager<F, C>,
    accounts: &AddressCache,
    address: &str,
    tx: &Transaction,
) -> Result<SignedTransaction>
where
    F: SessionFactory,
    C: Connector,
{
    // Checked before reaching the device
    TxKind::of(tx)?;

    let signer = resolve_signer(conn, accounts, address).await?;
    let path = hd_path::resolve(&signer.hd_path, signer.derivation_index)?;
    let firmware = conn.firmware_version().ok_or(Error::NoSession)?;
    let prepared = TxRequest::new(tx, path)?.for_firmware(firmware);

    let sig = sign(conn, &signer, &SignRequest::transaction(prepared.request)).await?;
    Ok(SignedTransaction::new(tx, prepared.downgraded, &sig))
}

/// Sign `message` returning the `0x` prefixed hex of r, s and v.
pub(crate) async fn sign_message<F, C>(
    conn: &mut ConnectionManager<F, C>,
    accounts: &AddressCache,
    address: &str,
    message: Message,
) -> Result<String>
where
    F: SessionFactory,
    C: Connector,
{
    message.check()?;

    let signer = resolve_signer(conn, accounts, address).await?;
    let path = hd_path::resolve(&signer.hd_path, signer.derivation_index)?;
    let request = SignRequest::message(message.into_request(path));

    let sig = sign(conn, &signer, &request).await?;
    Ok(message_signature(&sig))
}

async fn sign<F, C>(
    conn: &mut ConnectionManager<F, C>,
    signer: &AccountRecord,
    request: &SignRequest,
) -> Result<RawSignature>
where
    F: SessionFactory,
    C: Connector,
{
    let session = conn.session_mut()?;
    tracing::debug!("--->\tsign {}", request.to_json());
    let response = session.sign(request).await.map_err(Error::session)?;
    tracing::debug!("<---\t{response:?}");

    // The card may have been swapped while the user was confirming
    match conn.reported_wallet_uid() {
        Some(reported) if reported == signer.wallet_uid => {}
        reported => {
            tracing::warn!(
                "wallet {:?} reported after signing, expected {}",
                reported,
                signer.wallet_uid
            );
            conn.mark_stale();
            return Err(Error::StaleWallet);
        }
    }

    response
        .sig
        .filter(RawSignature::is_complete)
        .ok_or(Error::MissingSignature)
}

fn message_signature(sig: &RawSignature) -> String {
    format!(
        "0x{:0>64}{:0>64}{:0>2}",
        hex::encode(&sig.r),
        hex::encode(&sig.s),
        hex::encode(&sig.v)
    )
}
