//! Typed, opaque option map forwarded to attention kernels.
//!
//! Callers above the kernel boundary never interpret these entries; each
//! kernel decides which keys it understands.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single kernel option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KernelOption {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for KernelOption {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for KernelOption {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for KernelOption {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for KernelOption {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for KernelOption {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Ordered map of kernel-specific tuning knobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KernelOptions(BTreeMap<String, KernelOption>);

impl KernelOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<KernelOption>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<KernelOption>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&KernelOption> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &KernelOption)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}
