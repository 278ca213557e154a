//! Cache direccionado por contenido para ejecuciones de flows.
//!
//! Rol en el flujo:
//! - Una `CachingKey` identifica una llamada repetible: hash canónico de la
//!   identidad del flow (config + estado, menos claves ignoradas) y del
//!   payload de entrada (menos claves ignoradas).
//! - Una `CachingValue` empaqueta todo lo necesario para reproducir la
//!   llamada sin ejecutarla: la salida, un snapshot (config, estado)
//!   suficiente para restaurar el flow, y la secuencia exacta de mensajes
//!   que la ejecución agregó a su history, para replay determinista de los
//!   efectos observables.
//! - El switch global (`set_caching_active`) apaga el caching de todo el
//!   proceso sin tocar la config de cada flow.

mod store;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::flow::FlowSnapshot;
use crate::hashing::hash_value;
use crate::message::{Message, Payload};

pub use store::{CacheStore, FlowCache, InMemoryCacheStore};

/// Switch de proceso: permite desactivar el caching globalmente (por ejemplo
/// en corridas de evaluación) sin reconstruir flows.
pub struct CachingParameters {
    active: AtomicBool,
}

pub static CACHING_PARAMETERS: Lazy<CachingParameters> =
    Lazy::new(|| CachingParameters { active: AtomicBool::new(true) });

pub fn caching_active() -> bool {
    CACHING_PARAMETERS.active.load(Ordering::Relaxed)
}

pub fn set_caching_active(active: bool) {
    CACHING_PARAMETERS.active.store(active, Ordering::Relaxed);
}

/// Identidad determinista de una llamada. Dos llamadas semánticamente
/// idénticas (misma identidad de flow, mismo input no-ignorado) comparan y
/// hashean igual.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CachingKey {
    hash: String,
}

impl CachingKey {
    pub fn new(flow_identity: &Value, input_data: &Payload, keys_to_ignore: &[String]) -> Self {
        let filtered: Payload = input_data.iter()
                                          .filter(|(k, _)| !keys_to_ignore.contains(k))
                                          .map(|(k, v)| (k.clone(), v.clone()))
                                          .collect();
        let fingerprint = json!({
            "flow": flow_identity,
            "input_data": Value::Object(filtered),
        });
        Self { hash: hash_value(&fingerprint) }
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl fmt::Display for CachingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash)
    }
}

/// Resultado cacheado de una ejecución.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachingValue {
    pub output_data: Payload,
    pub snapshot: FlowSnapshot,
    pub history_messages: Vec<Message>,
}
