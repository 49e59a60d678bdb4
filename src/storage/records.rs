//! Generic encrypted record store
//!
//! A `RecordStore<R>` keeps records in memory behind a `RwLock`, indexed by
//! id and by plaintext category reference, and persists the whole collection
//! to one JSON file on every mutation. The store never sees plaintext: the
//! sealed fields arrive already encrypted and leave the same way.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audit::EntityType;
use crate::crypto::AuthSession;
use crate::error::{StrongboxError, StrongboxResult};
use crate::models::{
    AccountMappingRecord, CategoryId, CategoryRecord, DescriptionMappingRecord, MappingId,
    PayeeId, PayeeRecord, RecordId, TransactionId, TransactionRecord,
};

use super::file_io::{read_json, write_json_atomic};

/// A record that can live in a `RecordStore`
pub trait StoredRecord: Clone + Serialize + DeserializeOwned {
    type Id: RecordId;

    /// Entity name used in errors and the audit log
    const ENTITY: EntityType;
    const ENTITY_NAME: &'static str;

    fn id(&self) -> Self::Id;

    /// Called by the store on insert
    fn assign_id(&mut self, id: Self::Id);

    /// Plaintext category reference used for index lookups
    fn category_ref(&self) -> Option<CategoryId> {
        None
    }

    /// Copy of this record with every sealed field moved from one key to another
    fn reseal(&self, from: &AuthSession, to: &AuthSession) -> StrongboxResult<Self>;
}

/// On-disk layout of a store file
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile<R> {
    #[serde(default)]
    next_id: u64,
    #[serde(default = "Vec::new")]
    records: Vec<R>,
}

impl<R> Default for StoreFile<R> {
    fn default() -> Self {
        Self {
            next_id: 1,
            records: Vec::new(),
        }
    }
}

#[derive(Serialize)]
struct StoreFileRef<'a, R> {
    next_id: u64,
    records: Vec<&'a R>,
}

struct StoreState<R: StoredRecord> {
    records: BTreeMap<R::Id, R>,
    by_category: HashMap<CategoryId, BTreeSet<R::Id>>,
    next_id: u64,
}

impl<R: StoredRecord> StoreState<R> {
    fn empty() -> Self {
        Self {
            records: BTreeMap::new(),
            by_category: HashMap::new(),
            next_id: 1,
        }
    }

    fn index(&mut self, record: &R) {
        if let Some(cat) = record.category_ref() {
            self.by_category.entry(cat).or_default().insert(record.id());
        }
    }

    fn unindex(&mut self, record: &R) {
        if let Some(cat) = record.category_ref() {
            if let Some(ids) = self.by_category.get_mut(&cat) {
                ids.remove(&record.id());
                if ids.is_empty() {
                    self.by_category.remove(&cat);
                }
            }
        }
    }

    /// Put a record in place, returning whatever it replaced
    fn put(&mut self, record: R) -> Option<R> {
        let previous = self.records.remove(&record.id());
        if let Some(prev) = &previous {
            self.unindex(prev);
        }
        self.index(&record);
        self.records.insert(record.id(), record);
        previous
    }

    fn take(&mut self, id: R::Id) -> Option<R> {
        let removed = self.records.remove(&id)?;
        self.unindex(&removed);
        Some(removed)
    }
}

/// JSON-file backed store for one record type
pub struct RecordStore<R: StoredRecord> {
    path: PathBuf,
    state: RwLock<StoreState<R>>,
}

impl<R: StoredRecord> RecordStore<R> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: RwLock::new(StoreState::empty()),
        }
    }

    fn read(&self) -> StrongboxResult<RwLockReadGuard<'_, StoreState<R>>> {
        self.state
            .read()
            .map_err(|e| StrongboxError::Storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> StrongboxResult<RwLockWriteGuard<'_, StoreState<R>>> {
        self.state
            .write()
            .map_err(|e| StrongboxError::Storage(format!("Failed to acquire write lock: {}", e)))
    }

    /// Load records from disk and rebuild the index
    pub fn load(&self) -> StrongboxResult<()> {
        let file: StoreFile<R> = read_json(&self.path)?;
        let mut state = self.write()?;
        *state = StoreState::empty();

        let mut max_id = 0;
        for record in file.records {
            max_id = max_id.max(record.id().raw_id());
            state.put(record);
        }
        // Never hand out an id at or below one already on disk
        state.next_id = file.next_id.max(max_id + 1).max(1);

        debug!(
            entity = R::ENTITY_NAME,
            count = state.records.len(),
            "Loaded record store"
        );
        Ok(())
    }

    fn persist(&self, state: &StoreState<R>) -> StrongboxResult<()> {
        let file = StoreFileRef {
            next_id: state.next_id,
            records: state.records.values().collect(),
        };
        write_json_atomic(&self.path, &file)
    }

    /// Insert a new record, assigning the next id
    pub fn insert(&self, mut record: R) -> StrongboxResult<R> {
        let mut state = self.write()?;
        let id = R::Id::from_raw_id(state.next_id);
        record.assign_id(id);
        state.next_id += 1;
        state.put(record.clone());

        if let Err(e) = self.persist(&state) {
            state.take(id);
            state.next_id -= 1;
            return Err(e);
        }
        Ok(record)
    }

    pub fn get(&self, id: R::Id) -> StrongboxResult<Option<R>> {
        Ok(self.read()?.records.get(&id).cloned())
    }

    /// Get a record or fail with `NotFound`
    pub fn require(&self, id: R::Id) -> StrongboxResult<R> {
        self.get(id)?.ok_or_else(|| StrongboxError::NotFound {
            entity_type: R::ENTITY_NAME,
            identifier: id.to_string(),
        })
    }

    /// All records in id order
    pub fn all(&self) -> StrongboxResult<Vec<R>> {
        Ok(self.read()?.records.values().cloned().collect())
    }

    pub fn contains(&self, id: R::Id) -> StrongboxResult<bool> {
        Ok(self.read()?.records.contains_key(&id))
    }

    /// Replace an existing record
    pub fn update(&self, record: R) -> StrongboxResult<()> {
        self.update_many(vec![record])
    }

    /// Replace several existing records in one atomic file write
    ///
    /// Either every record is persisted or none is; a missing id fails the
    /// whole call before anything changes.
    pub fn update_many(&self, records: Vec<R>) -> StrongboxResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut state = self.write()?;

        if let Some(missing) = records.iter().find(|r| !state.records.contains_key(&r.id())) {
            return Err(StrongboxError::NotFound {
                entity_type: R::ENTITY_NAME,
                identifier: missing.id().to_string(),
            });
        }

        let mut previous = Vec::with_capacity(records.len());
        for record in records {
            if let Some(prev) = state.put(record) {
                previous.push(prev);
            }
        }

        if let Err(e) = self.persist(&state) {
            for prev in previous {
                state.put(prev);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Remove a record, returning it
    pub fn delete(&self, id: R::Id) -> StrongboxResult<R> {
        let mut state = self.write()?;
        let removed = state.take(id).ok_or_else(|| StrongboxError::NotFound {
            entity_type: R::ENTITY_NAME,
            identifier: id.to_string(),
        })?;

        if let Err(e) = self.persist(&state) {
            state.put(removed);
            return Err(e);
        }
        Ok(removed)
    }

    /// Ids of records referencing a category, without decrypting anything
    pub fn ids_by_category(&self, category: CategoryId) -> StrongboxResult<Vec<R::Id>> {
        Ok(self
            .read()?
            .by_category
            .get(&category)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    pub fn count(&self) -> StrongboxResult<usize> {
        Ok(self.read()?.records.len())
    }
}

impl StoredRecord for TransactionRecord {
    type Id = TransactionId;
    const ENTITY: EntityType = EntityType::Transaction;
    const ENTITY_NAME: &'static str = "Transaction";

    fn id(&self) -> TransactionId {
        self.id
    }

    fn assign_id(&mut self, id: TransactionId) {
        self.id = id;
    }

    fn category_ref(&self) -> Option<CategoryId> {
        self.category_id
    }

    fn reseal(&self, from: &AuthSession, to: &AuthSession) -> StrongboxResult<Self> {
        Ok(Self {
            date: from.reseal(&self.date, to)?,
            amount: from.reseal(&self.amount, to)?,
            description: from.reseal(&self.description, to)?,
            account: from.reseal(&self.account, to)?,
            note: from.reseal_optional(self.note.as_ref(), to)?,
            link: from.reseal_optional(self.link.as_ref(), to)?,
            ..self.clone()
        })
    }
}

impl StoredRecord for CategoryRecord {
    type Id = CategoryId;
    const ENTITY: EntityType = EntityType::Category;
    const ENTITY_NAME: &'static str = "Category";

    fn id(&self) -> CategoryId {
        self.id
    }

    fn assign_id(&mut self, id: CategoryId) {
        self.id = id;
    }

    fn reseal(&self, from: &AuthSession, to: &AuthSession) -> StrongboxResult<Self> {
        Ok(Self {
            name: from.reseal(&self.name, to)?,
            limit: from.reseal(&self.limit, to)?,
            ..self.clone()
        })
    }
}

impl StoredRecord for PayeeRecord {
    type Id = PayeeId;
    const ENTITY: EntityType = EntityType::Payee;
    const ENTITY_NAME: &'static str = "Payee";

    fn id(&self) -> PayeeId {
        self.id
    }

    fn assign_id(&mut self, id: PayeeId) {
        self.id = id;
    }

    fn reseal(&self, from: &AuthSession, to: &AuthSession) -> StrongboxResult<Self> {
        Ok(Self {
            name: from.reseal(&self.name, to)?,
            ..self.clone()
        })
    }
}

impl StoredRecord for DescriptionMappingRecord {
    type Id = MappingId;
    const ENTITY: EntityType = EntityType::DescriptionMapping;
    const ENTITY_NAME: &'static str = "DescriptionMapping";

    fn id(&self) -> MappingId {
        self.id
    }

    fn assign_id(&mut self, id: MappingId) {
        self.id = id;
    }

    fn reseal(&self, from: &AuthSession, to: &AuthSession) -> StrongboxResult<Self> {
        Ok(Self {
            description: from.reseal(&self.description, to)?,
            category: from.reseal_optional(self.category.as_ref(), to)?,
            payee: from.reseal_optional(self.payee.as_ref(), to)?,
            ..self.clone()
        })
    }
}

impl StoredRecord for AccountMappingRecord {
    type Id = MappingId;
    const ENTITY: EntityType = EntityType::AccountMapping;
    const ENTITY_NAME: &'static str = "AccountMapping";

    fn id(&self) -> MappingId {
        self.id
    }

    fn assign_id(&mut self, id: MappingId) {
        self.id = id;
    }

    fn reseal(&self, from: &AuthSession, to: &AuthSession) -> StrongboxResult<Self> {
        Ok(Self {
            account: from.reseal(&self.account, to)?,
            display_name: from.reseal(&self.display_name, to)?,
            ..self.clone()
        })
    }
}
