//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use prepaid_billing_core::{
    AccountId, Changeset, EngineState, EventId, EventRecord, Plan, Subscription,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf, meta};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Every `(key, value)` pair of a column family, in key order.
    fn scan(&self, name: &str) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let cf = self.cf(name)?;
        self.db
            .iterator_cf(&cf, IteratorMode::Start)
            .map(|item| item.map_err(|e| StoreError::Database(e.to_string())))
            .collect()
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Engine State
    // =========================================================================

    fn load_state(&self) -> Result<EngineState> {
        let mut plans = Vec::new();
        for (key, value) in self.scan(cf::PLANS)? {
            let plan_idx = keys::plan_idx_from_key(&key)?;
            // plans are append-only, so indices must be dense
            if usize::try_from(plan_idx).ok() != Some(plans.len()) {
                return Err(StoreError::Serialization(format!(
                    "plan index gap at {plan_idx}"
                )));
            }
            plans.push(Self::deserialize::<Plan>(&value)?);
        }

        let subscriptions = self
            .scan(cf::SUBSCRIPTIONS)?
            .iter()
            .map(|(_, value)| Self::deserialize::<Subscription>(value))
            .collect::<Result<Vec<_>>>()?;

        let balances = self
            .scan(cf::BALANCES)?
            .iter()
            .map(|(key, value)| {
                let bytes = <[u8; 16]>::try_from(&key[..]).map_err(|_| {
                    StoreError::Serialization(format!("bad account key length {}", key.len()))
                })?;
                Ok((AccountId::from_bytes(bytes), Self::deserialize::<u64>(value)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let cf_meta = self.cf(cf::META)?;
        let paid_amount = self
            .db
            .get_cf(&cf_meta, meta::PAID_AMOUNT)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize::<u64>(&data))
            .transpose()?
            .unwrap_or_default();

        tracing::debug!(
            plans = plans.len(),
            subscriptions = subscriptions.len(),
            balances = balances.len(),
            paid_amount,
            "Loaded engine state"
        );

        Ok(EngineState {
            plans,
            subscriptions,
            balances,
            paid_amount,
        })
    }

    fn apply(&self, changes: &Changeset) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let cf_plans = self.cf(cf::PLANS)?;
        let cf_subscriptions = self.cf(cf::SUBSCRIPTIONS)?;
        let cf_balances = self.cf(cf::BALANCES)?;
        let cf_meta = self.cf(cf::META)?;
        let cf_events = self.cf(cf::EVENTS)?;
        let cf_by_account = self.cf(cf::EVENTS_BY_ACCOUNT)?;

        let mut batch = WriteBatch::default();
        for (plan_idx, plan) in &changes.plans {
            batch.put_cf(&cf_plans, keys::plan_key(*plan_idx), Self::serialize(plan)?);
        }
        for sub in &changes.subscriptions {
            batch.put_cf(
                &cf_subscriptions,
                keys::account_key(&sub.account),
                Self::serialize(sub)?,
            );
        }
        for (account, balance) in &changes.balances {
            batch.put_cf(&cf_balances, keys::account_key(account), Self::serialize(balance)?);
        }
        if let Some(paid_amount) = changes.paid_amount {
            batch.put_cf(&cf_meta, meta::PAID_AMOUNT, Self::serialize(&paid_amount)?);
        }
        for record in &changes.events {
            batch.put_cf(&cf_events, keys::event_key(&record.id), Self::serialize(record)?);
            if let Some(account) = record.event.account() {
                batch.put_cf(&cf_by_account, keys::account_event_key(&account, &record.id), []);
            }
        }

        // Write atomically
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    // =========================================================================
    // Event Operations
    // =========================================================================

    fn get_event(&self, event_id: &EventId) -> Result<Option<EventRecord>> {
        let cf = self.cf(cf::EVENTS)?;
        let key = keys::event_key(event_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_events_by_account(
        &self,
        account: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EventRecord>> {
        let cf_by_account = self.cf(cf::EVENTS_BY_ACCOUNT)?;
        let prefix = keys::account_events_prefix(account);

        let iter = self.db.iterator_cf(
            &cf_by_account,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        // ULID suffixes keep the index in time order
        let mut all_keys: Vec<Box<[u8]>> = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            all_keys.push(key);
        }

        let mut events = Vec::new();
        for key in all_keys.iter().rev().skip(offset).take(limit) {
            let event_id = keys::event_id_from_account_key(key)?;
            if let Some(record) = self.get_event(&event_id)? {
                events.push(record);
            }
        }

        Ok(events)
    }
}
