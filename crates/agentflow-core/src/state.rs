//! Estado mutable de un flow.
//!
//! Mapa ordenado clave → JSON, propiedad exclusiva de su flow. Las
//! mutaciones externas pasan siempre por la vía única de update del kernel
//! (`FlowKernel::state_update` / `append_chat_message`), que clona valores y
//! registra el delta en el history; este módulo sólo expone la estructura y
//! las lecturas.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::FlowError;
use crate::message::Payload;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowState {
    values: IndexMap<String, Value>,
}

impl FlowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    /// Escritura cruda, restringida al crate: los llamadores externos deben
    /// pasar por la vía de update del kernel para que el cambio quede
    /// registrado.
    pub(crate) fn insert(&mut self, key: String, value: Value) {
        self.values.insert(key, value);
    }

    /// Entrada de tipo lista, creada (o normalizada) si hace falta. Usada por
    /// la vía de append de chat del kernel.
    pub(crate) fn array_entry(&mut self, key: &str) -> &mut Vec<Value> {
        let slot = self.values
                       .entry(key.to_string())
                       .or_insert_with(|| Value::Array(Vec::new()));
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
        }
        match slot {
            Value::Array(items) => items,
            _ => unreachable!("slot was just normalized to an array"),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear();
    }

    /// Copia del estado como payload (para construir inputs de hijos).
    pub fn to_payload(&self) -> Payload {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Subconjunto del estado para las claves pedidas; falla con
    /// `StateKeyMissing` si alguna no existe.
    pub fn select(&self, keys: &[String]) -> Result<Payload, FlowError> {
        let mut out = Payload::new();
        for key in keys {
            match self.values.get(key) {
                Some(value) => {
                    out.insert(key.clone(), value.clone());
                }
                None => return Err(FlowError::StateKeyMissing(key.clone())),
            }
        }
        Ok(out)
    }

    /// Vista JSON del estado sin las claves ignoradas, para la identidad de
    /// cache.
    pub fn filtered_value(&self, keys_to_ignore: &[String]) -> Value {
        let map: serde_json::Map<String, Value> = self.values
                                                      .iter()
                                                      .filter(|(k, _)| !keys_to_ignore.contains(k))
                                                      .map(|(k, v)| (k.clone(), v.clone()))
                                                      .collect();
        Value::Object(map)
    }
}

/// Veracidad de un valor de estado, para early-exit y end-of-interaction:
/// sigue la convención JSON usual (null/false/0/""/[]/{} son falsos).
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
