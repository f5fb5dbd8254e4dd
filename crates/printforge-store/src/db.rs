use dashmap::DashMap;
use parking_lot::Mutex;
use printforge_core::{PrintForgeError, Product, ProductId, Result, StorageConfig};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{path::Path, sync::Arc};
use tracing::info;

type DB = DBWithThreadMode<MultiThreaded>;

pub(crate) const PRODUCTS_CF: &str = "products";
pub(crate) const CATEGORIES_CF: &str = "categories";
pub(crate) const USERS_CF: &str = "users";
pub(crate) const CARTS_CF: &str = "carts";
pub(crate) const ORDERS_CF: &str = "orders";
pub(crate) const JOBS_CF: &str = "jobs";
pub(crate) const INDICES_CF: &str = "indices";

const ALL_CFS: [&str; 7] = [
    PRODUCTS_CF,
    CATEGORIES_CF,
    USERS_CF,
    CARTS_CF,
    ORDERS_CF,
    JOBS_CF,
    INDICES_CF,
];

/// Embedded storage engine backing every store trait. Column families hold
/// bincode rows keyed by uuid bytes; secondary lookups live in the indices
/// family and are written in the same batch as the primary record.
pub struct StoreDb {
    db: Arc<DB>,
    /// Hot-product read cache, invalidated on every product write.
    pub(crate) product_cache: DashMap<ProductId, Product>,
    /// Serializes read-modify-write stock adjustments.
    pub(crate) stock_lock: Mutex<()>,
}

impl StoreDb {
    pub fn open(config: &StorageConfig) -> Result<Self> {
        Self::open_at(&config.path)
    }

    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(num_cpus::get() as i32);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors)
            .map_err(|e| PrintForgeError::Storage(e.to_string()))?;

        info!(path = %path.as_ref().display(), "storage opened");

        Ok(Self {
            db: Arc::new(db),
            product_cache: DashMap::new(),
            stock_lock: Mutex::new(()),
        })
    }

    pub(crate) fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PrintForgeError::Storage(format!("missing column family {}", name)))
    }

    pub(crate) fn put_record<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = bincode::serialize(value)?;
        self.db
            .put_cf(&cf, key, bytes)
            .map_err(|e| PrintForgeError::Storage(e.to_string()))
    }

    pub(crate) fn get_record<T: DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self
            .db
            .get_cf(&cf, key)
            .map_err(|e| PrintForgeError::Storage(e.to_string()))?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn delete_record(&self, cf_name: &str, key: &[u8]) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db
            .delete_cf(&cf, key)
            .map_err(|e| PrintForgeError::Storage(e.to_string()))
    }

    /// Write a record plus its secondary index entries atomically.
    pub(crate) fn put_with_indices<T: Serialize>(
        &self,
        cf_name: &str,
        key: &[u8],
        value: &T,
        index_puts: &[(Vec<u8>, Vec<u8>)],
        index_deletes: &[Vec<u8>],
    ) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let indices = self.cf(INDICES_CF)?;
        let bytes = bincode::serialize(value)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf, key, bytes);
        for idx_key in index_deletes {
            batch.delete_cf(&indices, idx_key);
        }
        for (idx_key, idx_value) in index_puts {
            batch.put_cf(&indices, idx_key, idx_value);
        }
        self.db
            .write(batch)
            .map_err(|e| PrintForgeError::Storage(e.to_string()))
    }

    pub(crate) fn delete_with_indices(
        &self,
        cf_name: &str,
        key: &[u8],
        index_deletes: &[Vec<u8>],
    ) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let indices = self.cf(INDICES_CF)?;
        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf, key);
        for idx_key in index_deletes {
            batch.delete_cf(&indices, idx_key);
        }
        self.db
            .write(batch)
            .map_err(|e| PrintForgeError::Storage(e.to_string()))
    }

    pub(crate) fn get_index(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let indices = self.cf(INDICES_CF)?;
        self.db
            .get_cf(&indices, key)
            .map_err(|e| PrintForgeError::Storage(e.to_string()))
    }

    /// Collect index values under a key prefix (e.g. all product ids filed
    /// under one category).
    pub(crate) fn scan_index_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let indices = self.cf(INDICES_CF)?;
        let mut out = Vec::new();
        let iter = self
            .db
            .iterator_cf(&indices, IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item.map_err(|e| PrintForgeError::Storage(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push(value.to_vec());
        }
        Ok(out)
    }

    pub(crate) fn scan_records<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| PrintForgeError::Storage(e.to_string()))?;
            out.push(bincode::deserialize(&value)?);
        }
        Ok(out)
    }
}

pub(crate) fn slug_index_key(slug: &str) -> Vec<u8> {
    format!("slug:{}", slug).into_bytes()
}

pub(crate) fn email_index_key(email: &str) -> Vec<u8> {
    format!("email:{}", email.to_ascii_lowercase()).into_bytes()
}

pub(crate) fn tracking_index_key(code: &str) -> Vec<u8> {
    format!("track:{}", code).into_bytes()
}

pub(crate) fn category_member_key(category_id: &uuid::Uuid, product_id: &uuid::Uuid) -> Vec<u8> {
    let mut key = format!("cat:{}:", category_id).into_bytes();
    key.extend_from_slice(product_id.as_bytes());
    key
}

pub(crate) fn category_member_prefix(category_id: &uuid::Uuid) -> Vec<u8> {
    format!("cat:{}:", category_id).into_bytes()
}

pub(crate) fn user_order_key(user_id: &uuid::Uuid, order_id: &uuid::Uuid) -> Vec<u8> {
    let mut key = format!("uorder:{}:", user_id).into_bytes();
    key.extend_from_slice(order_id.as_bytes());
    key
}

pub(crate) fn user_order_prefix(user_id: &uuid::Uuid) -> Vec<u8> {
    format!("uorder:{}:", user_id).into_bytes()
}
