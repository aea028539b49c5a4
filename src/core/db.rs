use serde::de::DeserializeOwned;
use serde::Serialize;
use spin_sdk::key_value::Store;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

use crate::models::models::{Post, User};

/// A persisted record type: serializable, cheap to clone, keyed by string id.
pub trait Record: Serialize + DeserializeOwned + Clone {
    /// Key prefix in the key-value store ("user", "post").
    const KIND: &'static str;

    fn id(&self) -> &str;
}

/// Persistence contract the handlers depend on. Each call completes or fails
/// atomically; the backing engine is the single arbiter of conflicts.
pub trait Records<T: Record> {
    fn find_by_id(&self, id: &str) -> anyhow::Result<Option<T>>;
    fn find_one(&self, pred: &dyn Fn(&T) -> bool) -> anyhow::Result<Option<T>>;
    fn insert(&self, record: &T) -> anyhow::Result<()>;
    fn save(&self, record: &T) -> anyhow::Result<()>;
    fn delete_one(&self, id: &str) -> anyhow::Result<bool>;
    /// All records, newest-inserted first.
    fn all(&self) -> anyhow::Result<Vec<T>>;
}

fn record_key<T: Record>(id: &str) -> String {
    format!("{}:{}", T::KIND, id)
}

fn index_key<T: Record>() -> String {
    format!("{}:index", T::KIND)
}

/// Spin key-value backend. Records live at `{kind}:{id}`; a newest-first id
/// list at `{kind}:index` gives iteration order.
pub struct KvRecords<T> {
    store: Store,
    _marker: PhantomData<T>,
}

impl<T: Record> KvRecords<T> {
    pub fn open() -> anyhow::Result<Self> {
        let store = Store::open_default()
            .map_err(|e| anyhow::anyhow!("Failed to open key-value store: {}", e))?;
        Ok(Self {
            store,
            _marker: PhantomData,
        })
    }

    fn index(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.store.get_json(&index_key::<T>())?.unwrap_or_default())
    }
}

impl<T: Record> Records<T> for KvRecords<T> {
    fn find_by_id(&self, id: &str) -> anyhow::Result<Option<T>> {
        Ok(self.store.get_json(&record_key::<T>(id))?)
    }

    fn find_one(&self, pred: &dyn Fn(&T) -> bool) -> anyhow::Result<Option<T>> {
        for id in self.index()? {
            if let Some(record) = self.store.get_json::<T>(&record_key::<T>(&id))? {
                if pred(&record) {
                    return Ok(Some(record));
                }
            }
        }
        Ok(None)
    }

    fn insert(&self, record: &T) -> anyhow::Result<()> {
        self.store.set_json(&record_key::<T>(record.id()), record)?;

        let mut index = self.index()?;
        index.insert(0, record.id().to_string()); // prepend newest
        self.store.set_json(&index_key::<T>(), &index)?;
        Ok(())
    }

    fn save(&self, record: &T) -> anyhow::Result<()> {
        self.store.set_json(&record_key::<T>(record.id()), record)?;
        Ok(())
    }

    fn delete_one(&self, id: &str) -> anyhow::Result<bool> {
        let key = record_key::<T>(id);
        if self.store.get_json::<T>(&key)?.is_none() {
            return Ok(false);
        }
        self.store.delete(&key)?;

        let mut index = self.index()?;
        index.retain(|entry| entry != id);
        self.store.set_json(&index_key::<T>(), &index)?;
        Ok(true)
    }

    fn all(&self) -> anyhow::Result<Vec<T>> {
        let mut records = Vec::new();
        for id in self.index()? {
            if let Some(record) = self.store.get_json::<T>(&record_key::<T>(&id))? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

/// In-memory backend for the native binary and tests. One lock per
/// collection, held only within a single call.
pub struct MemRecords<T> {
    rows: Arc<RwLock<Vec<T>>>,
}

impl<T> Clone for MemRecords<T> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<T> Default for MemRecords<T> {
    fn default() -> Self {
        Self {
            rows: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<T> MemRecords<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Record> MemRecords<T> {
    fn read(&self) -> anyhow::Result<std::sync::RwLockReadGuard<'_, Vec<T>>> {
        self.rows
            .read()
            .map_err(|_| anyhow::anyhow!("Record lock poisoned"))
    }

    fn write(&self) -> anyhow::Result<std::sync::RwLockWriteGuard<'_, Vec<T>>> {
        self.rows
            .write()
            .map_err(|_| anyhow::anyhow!("Record lock poisoned"))
    }
}

impl<T: Record> Records<T> for MemRecords<T> {
    fn find_by_id(&self, id: &str) -> anyhow::Result<Option<T>> {
        Ok(self.read()?.iter().find(|r| r.id() == id).cloned())
    }

    fn find_one(&self, pred: &dyn Fn(&T) -> bool) -> anyhow::Result<Option<T>> {
        Ok(self.read()?.iter().find(|r| pred(r)).cloned())
    }

    fn insert(&self, record: &T) -> anyhow::Result<()> {
        self.write()?.insert(0, record.clone()); // prepend newest
        Ok(())
    }

    fn save(&self, record: &T) -> anyhow::Result<()> {
        let mut rows = self.write()?;
        match rows.iter_mut().find(|r| r.id() == record.id()) {
            Some(slot) => *slot = record.clone(),
            None => rows.insert(0, record.clone()),
        }
        Ok(())
    }

    fn delete_one(&self, id: &str) -> anyhow::Result<bool> {
        let mut rows = self.write()?;
        let before = rows.len();
        rows.retain(|r| r.id() != id);
        Ok(rows.len() < before)
    }

    fn all(&self) -> anyhow::Result<Vec<T>> {
        Ok(self.read()?.clone())
    }
}

/// Store handles for one request, passed explicitly to every handler.
pub struct AppContext {
    pub users: Box<dyn Records<User>>,
    pub posts: Box<dyn Records<Post>>,
}

impl AppContext {
    /// Key-value-backed context for the Spin component.
    pub fn kv() -> anyhow::Result<Self> {
        Ok(Self {
            users: Box::new(KvRecords::open()?),
            posts: Box::new(KvRecords::open()?),
        })
    }
}

/// Shared in-memory collections; cheap to clone into each request.
#[derive(Clone, Default)]
pub struct MemStore {
    pub users: MemRecords<User>,
    pub posts: MemRecords<Post>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(&self) -> AppContext {
        AppContext {
            users: Box::new(self.users.clone()),
            posts: Box::new(self.posts.clone()),
        }
    }
}
