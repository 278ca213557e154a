use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use super::{CachingKey, CachingValue};

/// Almacenamiento clave → valor del cache. El core no fija el medio de
/// persistencia; se asume a lo sumo un escritor por clave (no se coordina).
pub trait CacheStore: Send {
    fn get(&self, key: &str) -> Option<CachingValue>;
    fn set(&mut self, key: String, value: CachingValue);
}

#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    inner: HashMap<String, CachingValue>,
}

impl CacheStore for InMemoryCacheStore {
    fn get(&self, key: &str) -> Option<CachingValue> {
        self.inner.get(key).cloned()
    }

    fn set(&mut self, key: String, value: CachingValue) {
        self.inner.insert(key, value);
    }
}

/// Handle compartible al store. Clonar el handle comparte el store
/// subyacente, de modo que varios flows (o varias rondas del mismo flow)
/// vean las mismas entradas.
#[derive(Clone)]
pub struct FlowCache {
    store: Arc<Mutex<dyn CacheStore>>,
}

impl FlowCache {
    pub fn new() -> Self {
        Self::with_store(InMemoryCacheStore::default())
    }

    pub fn with_store(store: impl CacheStore + 'static) -> Self {
        Self { store: Arc::new(Mutex::new(store)) }
    }

    pub fn get(&self, key: &CachingKey) -> Option<CachingValue> {
        self.store.lock().ok().and_then(|s| s.get(key.as_str()))
    }

    pub fn set(&self, key: &CachingKey, value: CachingValue) {
        if let Ok(mut store) = self.store.lock() {
            store.set(key.as_str().to_string(), value);
        }
    }
}

impl Default for FlowCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FlowCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FlowCache(..)")
    }
}
