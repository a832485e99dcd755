//! Registry of named captioning backends.
//!
//! Built once at startup and read-only afterwards: the generation manager
//! shares it behind an `Arc` and only ever looks backends up.

use crate::backend::{Backend, BackendFactory};
use crate::config::Config;
use crate::error::CaptionError;
use std::collections::HashMap;
use std::sync::Arc;

/// Directory of available backends keyed by name.
#[derive(Default)]
pub struct Registry {
    backends: HashMap<String, Arc<dyn Backend>>,
    /// Names in registration order
    order: Vec<String>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry with one backend per `[backends.<name>]` entry.
    ///
    /// Entries are registered in name order. An unknown backend type fails the
    /// whole build rather than being skipped.
    pub fn from_config(config: &Config) -> Result<Self, CaptionError> {
        let mut registry = Self::new();
        for (name, entry) in &config.backends {
            let backend = BackendFactory::create(name, entry, config)?;
            registry.register(name, backend)?;
        }
        tracing::debug!("Registered {} backends", registry.len());
        Ok(registry)
    }

    /// Register a backend under `name`.
    ///
    /// # Errors
    /// `DuplicateName` if the name is taken; the existing backend is kept.
    pub fn register(&mut self, name: &str, backend: Arc<dyn Backend>) -> Result<(), CaptionError> {
        if self.backends.contains_key(name) {
            return Err(CaptionError::DuplicateName(name.to_string()));
        }
        self.backends.insert(name.to_string(), backend);
        self.order.push(name.to_string());
        Ok(())
    }

    /// Look up a backend by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Backend>, CaptionError> {
        self.backends
            .get(name)
            .cloned()
            .ok_or_else(|| CaptionError::NotFound(name.to_string()))
    }

    /// Registered names, in registration order.
    pub fn list(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
