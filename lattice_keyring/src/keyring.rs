use crate::accounts::{self, AccountRecord, AddressCache};
use crate::connection::{ConnectionManager, ConnectionState, WalletSync};
use crate::connector::Connector;
use crate::consts::{CLOSE_CODE, PAGE_SIZE};
use crate::hd_path;
use crate::pagination::{PageEntry, Pagination};
use crate::session::SessionFactory;
use crate::signing::{self, Message};
use crate::state::KeyringState;
use crate::transaction::{SignedTransaction, Transaction};
use crate::{Error, KeyringConfig, Result};

/// A Lattice exposed as a hierarchical deterministic keyring.
///
/// Every operation takes `&mut self`, so a single request at a time reaches the device.
#[derive(Debug)]
pub struct LatticeKeyring<F: SessionFactory, C: Connector> {
    conn: ConnectionManager<F, C>,
    accounts: AddressCache,
    pagination: Pagination,

    /// Template of accounts added from now on
    hd_path: String,

    /// Index of the first account added by [`Self::add_accounts`]
    unlocked_account: u32,
}

impl<F: SessionFactory, C: Connector> LatticeKeyring<F, C> {
    pub fn new(config: KeyringConfig, factory: F, connector: C) -> Self {
        let conn = ConnectionManager::new(&config, factory, connector);
        Self {
            conn,
            accounts: AddressCache::new(),
            pagination: Pagination::default(),
            hd_path: config.hd_path,
            unlocked_account: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.conn.state()
    }

    pub fn connection(&self) -> &ConnectionManager<F, C> {
        &self.conn
    }

    pub fn hd_path(&self) -> &str {
        &self.hd_path
    }

    pub fn page(&self) -> u32 {
        self.pagination.page()
    }

    pub fn is_unlocked(&self) -> bool {
        self.conn.is_unlocked()
    }

    /// Connect to the device, adopting the active wallet if it changed.
    pub async fn unlock(&mut self) -> Result<()> {
        let sync = self.conn.unlock(true).await?;
        self.reconcile(&sync);
        Ok(())
    }

    /// Ask the credentials again at next unlock.
    pub fn force_reconnect(&mut self) {
        self.conn.force_reconnect();
    }

    /// Add `count` accounts starting from the index set with [`Self::set_account_to_unlock`].
    ///
    /// [`CLOSE_CODE`] forgets the device instead. Returns all the accounts.
    pub async fn add_accounts(&mut self, count: i64) -> Result<Vec<String>> {
        if count == CLOSE_CODE {
            self.forget_device();
            return Ok(vec![]);
        }
        let count = u32::try_from(count)
            .ok()
            .filter(|c| *c > 0)
            .ok_or(Error::InvalidAccountCount(count))?;
        self.add_accounts_from(count, self.unlocked_account).await
    }

    /// Add `count` accounts derived from index `start`, skipping those already present.
    pub async fn add_accounts_from(&mut self, count: u32, start: u32) -> Result<Vec<String>> {
        self.unlock().await?;
        let (addresses, sync) =
            accounts::fetch_addresses(&mut self.conn, &self.hd_path, count, start).await?;
        self.reconcile(&sync);

        let wallet_uid = self
            .conn
            .wallet_uid()
            .ok_or(Error::NoActiveWallet)?
            .to_string();
        for (address, derivation_index) in addresses.into_iter().take(count as usize).zip(start..) {
            let added = self.accounts.insert(AccountRecord {
                address,
                derivation_index,
                hd_path: self.hd_path.clone(),
                wallet_uid: wallet_uid.clone(),
            });
            if added {
                tracing::debug!("added account {derivation_index}");
            }
        }
        Ok(self.accounts.addresses())
    }

    pub fn get_accounts(&self) -> Vec<String> {
        self.accounts.addresses()
    }

    pub fn accounts(&self) -> &[AccountRecord] {
        self.accounts.records()
    }

    /// Remove the account with `address` if present.
    pub fn remove_account(&mut self, address: &str) -> Option<AccountRecord> {
        let removed = self.accounts.remove(address);
        if removed.is_none() {
            tracing::warn!("address {address} not found");
        }
        removed
    }

    pub async fn get_first_page(&mut self) -> Result<Vec<PageEntry>> {
        self.pagination.reset();
        self.get_page(0).await
    }

    pub async fn get_next_page(&mut self) -> Result<Vec<PageEntry>> {
        self.get_page(1).await
    }

    pub async fn get_previous_page(&mut self) -> Result<Vec<PageEntry>> {
        self.get_page(-1).await
    }

    async fn get_page(&mut self, delta: i64) -> Result<Vec<PageEntry>> {
        self.pagination.move_by(delta);
        self.unlock().await?;

        // An adopted wallet moves the cursor back to the first page
        let start = self
            .pagination
            .start_index()
            .ok_or_else(|| Error::invalid_path(&self.hd_path, "page out of range"))?;
        let (addresses, sync) =
            accounts::fetch_addresses(&mut self.conn, &self.hd_path, PAGE_SIZE, start).await?;
        self.reconcile(&sync);

        Ok(addresses
            .into_iter()
            .take(PAGE_SIZE as usize)
            .zip(start..)
            .map(|(address, index)| PageEntry { address, index })
            .collect())
    }

    /// Set the index of the first account added by [`Self::add_accounts`].
    pub fn set_account_to_unlock(&mut self, index: u32) {
        self.unlocked_account = index;
    }

    /// Change the template used to derive accounts added from now on.
    pub fn set_hd_path(&mut self, template: &str) -> Result<()> {
        hd_path::validate(template)?;
        if template != self.hd_path {
            tracing::info!("hd path is now {template}");
            self.hd_path = template.to_string();
            self.pagination.reset();
        }
        Ok(())
    }

    /// Forget credentials, session, wallet and accounts.
    pub fn forget_device(&mut self) {
        self.conn.forget();
        self.accounts.clear();
        self.pagination.reset();
        self.unlocked_account = 0;
    }

    pub fn serialize(&self) -> KeyringState {
        KeyringState {
            creds: self.conn.credentials().clone(),
            accounts: self.accounts.records().to_vec(),
            wallet_uid: self.conn.wallet_uid().map(ToString::to_string),
            name: Some(self.conn.app_name().to_string()),
            network: Some(self.conn.network()),
            page: self.pagination.page(),
            hd_path: Some(self.hd_path.clone()),
            unlocked_account: self.unlocked_account,
        }
    }

    /// Restore a state returned by [`Self::serialize`], dropping any session.
    ///
    /// Missing optional fields keep the current values.
    pub fn deserialize(&mut self, state: KeyringState) -> Result<()> {
        if let Some(template) = state.hd_path.as_deref() {
            hd_path::validate(template)?;
        }
        self.conn
            .restore(state.creds, state.wallet_uid, state.name, state.network);
        self.accounts = AddressCache::from_records(state.accounts);
        self.pagination = Pagination::new(state.page);
        if let Some(template) = state.hd_path {
            self.hd_path = template;
        }
        self.unlocked_account = state.unlocked_account;
        Ok(())
    }

    pub async fn sign_transaction(
        &mut self,
        address: &str,
        tx: &Transaction,
    ) -> Result<SignedTransaction> {
        signing::sign_transaction(&mut self.conn, &self.accounts, address, tx).await
    }

    /// Sign a personal message, given as hex or utf8 string.
    pub async fn sign_personal_message(&mut self, address: &str, message: &str) -> Result<String> {
        let message = Message::Personal(message.to_string());
        signing::sign_message(&mut self.conn, &self.accounts, address, message).await
    }

    /// Sign EIP-712 typed `data`, `version` must be `V3` or `V4`.
    pub async fn sign_typed_data(
        &mut self,
        address: &str,
        data: serde_json::Value,
        version: &str,
    ) -> Result<String> {
        let message = Message::TypedData {
            data,
            version: version.to_string(),
        };
        signing::sign_message(&mut self.conn, &self.accounts, address, message).await
    }

    pub fn export_account(&self, _address: &str) -> Result<String> {
        Err(Error::UnsupportedOperation("Exporting private keys"))
    }

    fn reconcile(&mut self, sync: &WalletSync) {
        if sync.invalidates_cache() {
            tracing::info!("wallet changed, clearing {} cached accounts", self.accounts.len());
            self.accounts.clear();
            self.pagination.reset();
        }
    }
}
