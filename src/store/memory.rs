//! In-memory store for exercising the engines without a Vault server.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use super::{KvStore, StoreError};
use crate::document::Values;

/// A store operation, recorded in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List(String),
    Read(String),
    Write(String),
    Delete(String),
}

/// Flat map of leaf paths to values with per-path failure injection.
///
/// Directories are implied by the leaves below them, so an unknown directory
/// lists as empty. Listing returns child names in insertion order of the first
/// leaf that introduced them.
#[derive(Debug, Default)]
pub struct MemoryStore {
    order: RefCell<Vec<String>>,
    data: RefCell<BTreeMap<String, Values>>,
    calls: RefCell<Vec<Call>>,
    fail_list: BTreeSet<String>,
    fail_read: BTreeSet<String>,
    fail_write: BTreeSet<String>,
    fail_delete: BTreeSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: &str, values: Values) -> Self {
        self.insert(path, values);
        self
    }

    /// Lists `path` under its parent without holding any data for it.
    pub fn with_phantom(mut self, path: &str) -> Self {
        self.order.get_mut().push(path.to_string());
        self
    }

    pub fn failing_list(mut self, path: &str) -> Self {
        self.fail_list.insert(path.to_string());
        self
    }

    pub fn failing_read(mut self, path: &str) -> Self {
        self.fail_read.insert(path.to_string());
        self
    }

    pub fn failing_write(mut self, path: &str) -> Self {
        self.fail_write.insert(path.to_string());
        self
    }

    pub fn failing_delete(mut self, path: &str) -> Self {
        self.fail_delete.insert(path.to_string());
        self
    }

    fn insert(&mut self, path: &str, values: Values) {
        let order = self.order.get_mut();
        if !order.iter().any(|p| p == path) {
            order.push(path.to_string());
        }
        self.data.get_mut().insert(path.to_string(), values);
    }

    pub fn get(&self, path: &str) -> Option<Values> {
        self.data.borrow().get(path).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn injected(path: &str) -> StoreError {
        StoreError::Api {
            status: 500,
            errors: vec![format!("injected failure for {path}")],
        }
    }
}

impl KvStore for MemoryStore {
    fn list(&self, path: &str) -> Result<Vec<String>, StoreError> {
        self.calls.borrow_mut().push(Call::List(path.to_string()));
        if self.fail_list.contains(path) {
            return Err(Self::injected(path));
        }

        let mut children: Vec<String> = Vec::new();
        for leaf in self.order.borrow().iter() {
            let Some(rest) = leaf.strip_prefix(path).filter(|r| !r.is_empty()) else {
                continue;
            };
            let child = match rest.find('/') {
                Some(idx) => &rest[..=idx],
                None => rest,
            };
            if !children.iter().any(|c| c == child) {
                children.push(child.to_string());
            }
        }
        Ok(children)
    }

    fn read(&self, path: &str) -> Result<Option<Values>, StoreError> {
        self.calls.borrow_mut().push(Call::Read(path.to_string()));
        if self.fail_read.contains(path) {
            return Err(Self::injected(path));
        }
        Ok(self.data.borrow().get(path).cloned())
    }

    fn write(&self, path: &str, values: &Values) -> Result<(), StoreError> {
        self.calls.borrow_mut().push(Call::Write(path.to_string()));
        if self.fail_write.contains(path) {
            return Err(Self::injected(path));
        }
        let mut order = self.order.borrow_mut();
        if !order.iter().any(|p| p == path) {
            order.push(path.to_string());
        }
        self.data
            .borrow_mut()
            .insert(path.to_string(), values.clone());
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.calls.borrow_mut().push(Call::Delete(path.to_string()));
        if self.fail_delete.contains(path) {
            return Err(Self::injected(path));
        }
        self.data.borrow_mut().remove(path);
        self.order.borrow_mut().retain(|p| p != path);
        Ok(())
    }
}
