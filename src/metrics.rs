//! Generic metric store interface
//!
//! The concrete metric store is an out-of-scope external collaborator;
//! this module defines the trait the reactor and stat formatter depend on,
//! plus one in-process implementation built on `tokio::sync::broadcast` so
//! the rest of the crate is runnable and testable standalone.

use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;

/// A typed metric value
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Int(v) => Some(*v as f64),
            MetricValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetricValue::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

/// A single metric-change notification delivered to subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct MetricChange {
    pub name: String,
    pub value: MetricValue,
}

/// Generic metric store: name-addressed key/value storage with change notification
pub trait MetricStore: Send + Sync {
    fn set(&self, name: &str, value: MetricValue);
    fn get(&self, name: &str) -> Option<MetricValue>;
    fn clear(&self, name: &str);
    fn subscribe(&self) -> broadcast::Receiver<MetricChange>;
}

/// Default in-process metric store
pub struct InMemoryMetricStore {
    values: RwLock<HashMap<String, MetricValue>>,
    tx: broadcast::Sender<MetricChange>,
}

impl InMemoryMetricStore {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self {
            values: RwLock::new(HashMap::new()),
            tx,
        }
    }
}

impl Default for InMemoryMetricStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricStore for InMemoryMetricStore {
    fn set(&self, name: &str, value: MetricValue) {
        if let Ok(mut values) = self.values.write() {
            values.insert(name.to_string(), value.clone());
        }
        let _ = self.tx.send(MetricChange {
            name: name.to_string(),
            value,
        });
    }

    fn get(&self, name: &str) -> Option<MetricValue> {
        self.values.read().ok()?.get(name).cloned()
    }

    fn clear(&self, name: &str) {
        if let Ok(mut values) = self.values.write() {
            values.remove(name);
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<MetricChange> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_and_get_round_trip() {
        let store = InMemoryMetricStore::new();
        store.set("v.type", MetricValue::Str("XYZ".into()));
        assert_eq!(store.get("v.type"), Some(MetricValue::Str("XYZ".into())));
    }

    #[tokio::test]
    async fn subscribers_observe_changes() {
        let store = InMemoryMetricStore::new();
        let mut rx = store.subscribe();
        store.set("v.b.soc", MetricValue::Float(82.5));
        let change = rx.recv().await.unwrap();
        assert_eq!(change.name, "v.b.soc");
        assert_eq!(change.value.as_f64(), Some(82.5));
    }

    #[test]
    fn clear_removes_value() {
        let store = InMemoryMetricStore::new();
        store.set("v.type", MetricValue::Str("XYZ".into()));
        store.clear("v.type");
        assert_eq!(store.get("v.type"), None);
    }
}
