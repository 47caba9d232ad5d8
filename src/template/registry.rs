//! Table of functions callable from document templates.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use super::functions::{self, MacroError};
use crate::store::{KvStore, StoreError, VaultClient};

/// A template function: string arguments in, value out.
pub type MacroFn = Arc<dyn Fn(&[String]) -> Result<Value, MacroError> + Send + Sync>;

/// Errors raised while populating a registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Duplicate function for name {0}")]
    DuplicateName(String),
}

/// Named template functions, populated once at startup.
///
/// Registration takes a lock so that concurrent setup code cannot race;
/// afterwards the registry is only read.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: Mutex<BTreeMap<String, MacroFn>>,
}

impl FunctionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding `env`, `file`, `b64encode`, `now` and `vault`.
    ///
    /// The `vault` function opens a fresh client from the environment on
    /// every call instead of sharing the caller's client, so templates can
    /// look up values in a different Vault than the one being written to.
    pub fn standard() -> Result<Self, RegistryError> {
        Self::standard_with(|| Ok(Box::new(VaultClient::from_env()?) as Box<dyn KvStore>))
    }

    /// Like [`FunctionRegistry::standard`] with a custom store factory for `vault`.
    pub fn standard_with<C>(connect: C) -> Result<Self, RegistryError>
    where
        C: Fn() -> Result<Box<dyn KvStore>, StoreError> + Send + Sync + 'static,
    {
        let registry = Self::new();
        registry.register("env", functions::env)?;
        registry.register("file", functions::file)?;
        registry.register("b64encode", functions::b64encode)?;
        registry.register("now", functions::now)?;
        registry.register("vault", functions::vault(connect))?;
        Ok(registry)
    }

    /// Adds `function` under `name`.
    ///
    /// Fails if the name is already taken; the existing entry is kept.
    pub fn register<F>(&self, name: impl Into<String>, function: F) -> Result<(), RegistryError>
    where
        F: Fn(&[String]) -> Result<Value, MacroError> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut functions = self.lock();
        if functions.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        functions.insert(name, Arc::new(function));
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<MacroFn> {
        self.lock().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, MacroFn>> {
        self.functions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn constant(value: &'static str) -> impl Fn(&[String]) -> Result<Value, MacroError> {
        move |_| Ok(Value::String(value.to_string()))
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = FunctionRegistry::new();
        registry.register("hello", constant("world")).unwrap();

        let function = registry.lookup("hello").unwrap();
        assert_eq!(function(&[]).unwrap(), Value::String("world".to_string()));
        assert!(registry.lookup("missing").is_none());
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let registry = FunctionRegistry::new();
        registry.register("dup", constant("first")).unwrap();

        let err = registry.register("dup", constant("second")).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(ref name) if name == "dup"));

        let function = registry.lookup("dup").unwrap();
        assert_eq!(function(&[]).unwrap(), Value::String("first".to_string()));
    }

    #[test]
    fn test_standard_functions() {
        let registry = FunctionRegistry::standard().unwrap();
        assert_eq!(
            registry.names(),
            vec!["b64encode", "env", "file", "now", "vault"]
        );
    }

    #[test]
    fn test_standard_rejects_reregistration() {
        let registry = FunctionRegistry::standard().unwrap();
        assert!(registry.register("env", functions::env).is_err());
    }

    #[test]
    fn test_concurrent_registration_keeps_one_winner() {
        let registry = Arc::new(FunctionRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.register("shared", constant("x")).is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(registry.names(), vec!["shared"]);
    }
}
