//! Shared table and index bookkeeping used by both backends.
//!
//! A backend owns a [`Tables`] value behind its own lock. All record and
//! index semantics live here so the memory and file backends cannot drift.

use crate::error::{StoreError, StoreResult};
use crate::store::{BatchOp, StoreSpec, WriteBatch};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Extracts the string at a top-level field, if any.
fn extract_string<'a>(value: &'a Value, key_path: &str) -> Option<&'a str> {
    value.get(key_path).and_then(Value::as_str)
}

/// One record store plus its secondary indexes.
#[derive(Debug, Clone)]
pub(crate) struct Table {
    pub(crate) spec: StoreSpec,
    pub(crate) records: BTreeMap<String, Value>,
    /// index name -> index key -> primary keys
    entries: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl Table {
    pub(crate) fn new(spec: StoreSpec) -> Self {
        let entries = spec
            .indexes
            .iter()
            .map(|index| (index.name.clone(), BTreeMap::new()))
            .collect();
        Self {
            spec,
            records: BTreeMap::new(),
            entries,
        }
    }

    fn key_of(&self, value: &Value) -> StoreResult<String> {
        extract_string(value, &self.spec.key_path)
            .map(str::to_owned)
            .ok_or_else(|| StoreError::missing_key(&self.spec.name, &self.spec.key_path))
    }

    fn index_record(&mut self, key: &str, value: &Value) {
        for index in &self.spec.indexes {
            if let Some(index_key) = extract_string(value, &index.key_path) {
                self.entries
                    .entry(index.name.clone())
                    .or_default()
                    .entry(index_key.to_owned())
                    .or_default()
                    .insert(key.to_owned());
            }
        }
    }

    fn unindex_record(&mut self, key: &str, value: &Value) {
        for index in &self.spec.indexes {
            if let Some(index_key) = extract_string(value, &index.key_path) {
                if let Some(bucket) = self
                    .entries
                    .get_mut(&index.name)
                    .and_then(|by_key| by_key.get_mut(index_key))
                {
                    bucket.remove(key);
                }
            }
        }
    }

    pub(crate) fn insert(&mut self, value: Value) -> StoreResult<()> {
        let key = self.key_of(&value)?;
        if let Some(old) = self.records.remove(&key) {
            self.unindex_record(&key, &old);
        }
        self.index_record(&key, &value);
        self.records.insert(key, value);
        Ok(())
    }

    pub(crate) fn remove(&mut self, key: &str) {
        if let Some(old) = self.records.remove(key) {
            self.unindex_record(key, &old);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
        for by_key in self.entries.values_mut() {
            by_key.clear();
        }
    }

    pub(crate) fn scan_index(&self, index: &str, key: &str) -> StoreResult<Vec<Value>> {
        let by_key = self
            .entries
            .get(index)
            .ok_or_else(|| StoreError::unknown_index(&self.spec.name, index))?;
        let mut hits = Vec::new();
        if let Some(bucket) = by_key.get(key) {
            for primary in bucket {
                if let Some(record) = self.records.get(primary) {
                    hits.push(record.clone());
                }
            }
        }
        Ok(hits)
    }

    fn rebuild_indexes(&mut self) {
        self.entries = self
            .spec
            .indexes
            .iter()
            .map(|index| (index.name.clone(), BTreeMap::new()))
            .collect();
        let records: Vec<(String, Value)> = self
            .records
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, value) in &records {
            self.index_record(key, value);
        }
    }
}

/// All record stores plus the side-channel log.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
    pub(crate) stores: BTreeMap<String, Table>,
    pub(crate) side: BTreeMap<String, String>,
}

impl Tables {
    fn table(&self, store: &str) -> StoreResult<&Table> {
        self.stores
            .get(store)
            .ok_or_else(|| StoreError::unknown_store(store))
    }

    fn table_mut(&mut self, store: &str) -> StoreResult<&mut Table> {
        self.stores
            .get_mut(store)
            .ok_or_else(|| StoreError::unknown_store(store))
    }

    /// Creates missing stores and missing indexes on existing stores.
    pub(crate) fn ensure_schema(&mut self, specs: &[StoreSpec]) -> StoreResult<()> {
        for spec in specs {
            match self.stores.get_mut(&spec.name) {
                None => {
                    self.stores.insert(spec.name.clone(), Table::new(spec.clone()));
                }
                Some(table) => {
                    let mut grew = false;
                    for index in &spec.indexes {
                        if !table.spec.indexes.iter().any(|have| have.name == index.name) {
                            table.spec.indexes.push(index.clone());
                            grew = true;
                        }
                    }
                    if grew {
                        table.rebuild_indexes();
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn get(&self, store: &str, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.table(store)?.records.get(key).cloned())
    }

    pub(crate) fn put(&mut self, store: &str, value: Value) -> StoreResult<()> {
        self.table_mut(store)?.insert(value)
    }

    pub(crate) fn delete(&mut self, store: &str, key: &str) -> StoreResult<()> {
        self.table_mut(store)?.remove(key);
        Ok(())
    }

    pub(crate) fn scan(&self, store: &str) -> StoreResult<Vec<Value>> {
        Ok(self.table(store)?.records.values().cloned().collect())
    }

    pub(crate) fn scan_index(&self, store: &str, index: &str, key: &str) -> StoreResult<Vec<Value>> {
        self.table(store)?.scan_index(index, key)
    }

    pub(crate) fn count(&self, store: &str) -> StoreResult<usize> {
        Ok(self.table(store)?.records.len())
    }

    /// Applies a batch atomically.
    ///
    /// Every operation is validated up front; application below the
    /// validation loop cannot fail, so a bad batch leaves the tables
    /// untouched.
    pub(crate) fn apply(&mut self, batch: &WriteBatch) -> StoreResult<()> {
        for op in &batch.ops {
            match op {
                BatchOp::Put { store, value } => {
                    self.table(store)?.key_of(value)?;
                }
                BatchOp::Delete { store, .. } | BatchOp::Clear { store } => {
                    self.table(store)?;
                }
            }
        }
        for op in &batch.ops {
            match op {
                BatchOp::Put { store, value } => {
                    self.table_mut(store)?.insert(value.clone())?;
                }
                BatchOp::Delete { store, key } => {
                    self.table_mut(store)?.remove(key);
                }
                BatchOp::Clear { store } => {
                    self.table_mut(store)?.clear();
                }
            }
        }
        Ok(())
    }
}
