//! In-process adapter for simulations and tests.
//!
//! Keeps defined table specs in memory and records every call, so a
//! migration run can be exercised end to end without a database. Failures
//! can be scripted per table to rehearse error paths.

use super::{Adapter, AdapterError, Operation};
use crate::schema::TableSpec;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::debug;

/// Record of a single adapter invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterCall {
    /// Which operation was invoked.
    pub operation: Operation,

    /// Datastore the call was addressed to.
    pub datastore: String,

    /// Table the call was addressed to.
    pub table: String,
}

/// Adapter that applies schema operations to an in-memory catalog.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    tables: BTreeMap<(String, String), TableSpec>,
    calls: Vec<AdapterCall>,
    define_failures: BTreeMap<String, AdapterError>,
    drop_failures: BTreeMap<String, AdapterError>,
}

impl MemoryAdapter {
    /// Create a new, empty in-memory adapter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `define` to fail for the named table.
    pub fn fail_define(&self, table: impl Into<String>, error: AdapterError) {
        self.inner
            .lock()
            .unwrap()
            .define_failures
            .insert(table.into(), error);
    }

    /// Script `drop_table` to fail for the named table.
    pub fn fail_drop(&self, table: impl Into<String>, error: AdapterError) {
        self.inner
            .lock()
            .unwrap()
            .drop_failures
            .insert(table.into(), error);
    }

    /// Every call made against this adapter, in invocation order.
    pub fn calls(&self) -> Vec<AdapterCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// The spec currently defined for a table, if any.
    pub fn table(&self, datastore: &str, table: &str) -> Option<TableSpec> {
        self.inner
            .lock()
            .unwrap()
            .tables
            .get(&(datastore.to_string(), table.to_string()))
            .cloned()
    }

    /// Number of tables currently defined.
    pub fn tables_defined(&self) -> usize {
        self.inner.lock().unwrap().tables.len()
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn define(
        &self,
        datastore: &str,
        table: &str,
        spec: &TableSpec,
    ) -> std::result::Result<(), AdapterError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(AdapterCall {
            operation: Operation::Define,
            datastore: datastore.to_string(),
            table: table.to_string(),
        });

        if let Some(error) = inner.define_failures.get(table) {
            return Err(error.clone());
        }

        debug!("memory adapter: defining {}.{}", datastore, table);
        inner
            .tables
            .insert((datastore.to_string(), table.to_string()), spec.clone());
        Ok(())
    }

    async fn drop_table(
        &self,
        datastore: &str,
        table: &str,
    ) -> std::result::Result<(), AdapterError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(AdapterCall {
            operation: Operation::Drop,
            datastore: datastore.to_string(),
            table: table.to_string(),
        });

        if let Some(error) = inner.drop_failures.get(table) {
            return Err(error.clone());
        }

        debug!("memory adapter: dropping {}.{}", datastore, table);
        inner
            .tables
            .remove(&(datastore.to_string(), table.to_string()));
        Ok(())
    }

    fn adapter_type(&self) -> &'static str {
        "memory"
    }
}
