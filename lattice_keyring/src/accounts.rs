use serde::{Deserialize, Serialize};

use crate::connection::{ConnectionManager, WalletSync};
use crate::connector::Connector;
use crate::hd_path;
use crate::protocol::{Currency, GetAddressesParams};
use crate::session::{SessionFactory, SignerSession};
use crate::{Error, Result};

/// An account derived from the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub address: String,

    /// Index inserted in `hd_path` to derive this account
    pub derivation_index: u32,

    /// The path template in use when the account was added
    pub hd_path: String,

    #[serde(rename = "walletUID")]
    pub wallet_uid: String,
}

impl AccountRecord {
    fn same_account(&self, other: &AccountRecord) -> bool {
        self.address.eq_ignore_ascii_case(&other.address)
            && self.wallet_uid == other.wallet_uid
            && self.hd_path == other.hd_path
    }
}

/// Accounts in the order they were added.
///
/// Each record carries its index, path and wallet, so removing one never misaligns the others.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressCache {
    records: Vec<AccountRecord>,
}

impl AddressCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from persisted records, dropping duplicates.
    pub fn from_records(records: Vec<AccountRecord>) -> Self {
        let mut cache = Self::new();
        for record in records {
            cache.insert(record);
        }
        cache
    }

    /// Append `record` unless the same address, wallet and path is already cached.
    ///
    /// Returns whether it was added.
    pub fn insert(&mut self, record: AccountRecord) -> bool {
        if self.records.iter().any(|r| r.same_account(&record)) {
            false
        } else {
            self.records.push(record);
            true
        }
    }

    /// Remove the first account matching `address`, case-insensitive.
    pub fn remove(&mut self, address: &str) -> Option<AccountRecord> {
        let position = self.position(address)?;
        Some(self.records.remove(position))
    }

    /// First account matching `address`, case-insensitive.
    pub fn find(&self, address: &str) -> Option<&AccountRecord> {
        self.position(address).map(|p| &self.records[p])
    }

    /// Account matching `address` derived from wallet `wallet_uid`.
    pub fn find_in_wallet(&self, address: &str, wallet_uid: &str) -> Option<&AccountRecord> {
        self.records
            .iter()
            .find(|r| r.address.eq_ignore_ascii_case(address) && r.wallet_uid == wallet_uid)
    }

    fn position(&self, address: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.address.eq_ignore_ascii_case(address))
    }

    pub fn addresses(&self) -> Vec<String> {
        self.records.iter().map(|r| r.address.clone()).collect()
    }

    pub fn records(&self) -> &[AccountRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// Fetch `count` addresses at `template` starting from index `start`.
///
/// Templates with the variable index before the last segment can't be iterated by the device,
/// their addresses are asked one request at a time.
/// The active wallet is read again after the fetch, the returned [`WalletSync`] tells whether it
/// changed.
pub(crate) async fn fetch_addresses<F, C>(
    conn: &mut ConnectionManager<F, C>,
    template: &str,
    count: u32,
    start: u32,
) -> Result<(Vec<String>, WalletSync)>
where
    F: SessionFactory,
    C: Connector,
{
    let session = conn.session_mut()?;
    let end = start
        .checked_add(count)
        .ok_or_else(|| Error::invalid_path(template, "index overflow"))?;

    let addresses = if hd_path::has_internal_variable_index(template) {
        // Fail before the first request if the last index can't be derived
        if count > 0 {
            hd_path::resolve(template, end - 1)?;
        }
        let mut addresses = Vec::new();
        for index in start..end {
            let path = hd_path::resolve(template, index)?;
            let mut batch = request_addresses(session, path, 1).await?;
            batch.truncate(1);
            addresses.append(&mut batch);
        }
        addresses
    } else {
        request_addresses(session, hd_path::resolve(template, start)?, count).await?
    };

    let sync = conn.sync_wallet()?;
    Ok((addresses, sync))
}

async fn request_addresses<S: SignerSession>(
    session: &mut S,
    start_path: Vec<u32>,
    n: u32,
) -> Result<Vec<String>> {
    let params = GetAddressesParams {
        currency: Currency::Eth,
        start_path,
        n,
        skip_cache: true,
    };
    tracing::debug!("--->\tget_addresses {params:?}");
    let addresses = session
        .get_addresses(&params)
        .await
        .map_err(Error::session)?;
    tracing::debug!("<---\t{addresses:?}");
    if addresses.is_empty() && n > 0 {
        return Err(Error::NoAddressesReturned(params.start_path));
    }
    Ok(addresses)
}
