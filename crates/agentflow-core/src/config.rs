//! Configuración inmutable de un flow.
//!
//! Construcción por capas explícitas (sin introspección de jerarquías): cada
//! kind de flow declara una capa de defaults (objeto JSON); `from_layers`
//! fusiona las capas de raíz a hoja con merge recursivo clave a clave
//! (objetos anidados se fusionan, escalares se reemplazan), aplica los
//! overrides del llamador con la misma semántica, y valida las claves
//! requeridas antes de materializar la struct.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::FlowError;

/// Claves mínimas que todo kind debe exigir.
pub const BASE_REQUIRED_KEYS: &[&str] = &["name", "description"];

/// Merge recursivo: claves de `patch` sobre `base`; objetos anidados se
/// fusionan clave a clave, cualquier otro par se reemplaza por `patch`.
pub fn merge_values(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match base_map.get_mut(key) {
                    Some(slot) if slot.is_object() && value.is_object() => merge_values(slot, value),
                    _ => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (slot, other) => *slot = other.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    pub name: String,
    pub description: String,
    /// Claves que el flow espera leer de su entrada.
    #[serde(default)]
    pub input_interface: Vec<String>,
    /// Claves que el flow promete dejar en su estado al terminar.
    #[serde(default)]
    pub output_interface: Vec<String>,
    /// Excluidas de cualquier hash y de la serialización externa.
    #[serde(default = "default_private_keys")]
    pub private_keys: Vec<String>,
    /// Excluidas sólo del hashing de cache/identidad.
    #[serde(default = "default_keys_to_ignore_for_hash")]
    pub keys_to_ignore_for_hash: Vec<String>,
    #[serde(default = "default_true")]
    pub clear_flow_namespace_on_run_end: bool,
    #[serde(default = "default_true")]
    pub keep_raw_response: bool,
    #[serde(default)]
    pub enable_cache: bool,
    /// Opciones específicas del kind (bias, n_rounds, model_name, ...).
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

fn default_private_keys() -> Vec<String> {
    vec!["api_keys".to_string()]
}

fn default_keys_to_ignore_for_hash() -> Vec<String> {
    vec!["api_keys".to_string(),
         "api_information".to_string(),
         "name".to_string(),
         "description".to_string()]
}

fn default_true() -> bool {
    true
}

impl FlowConfig {
    /// Capa raíz de defaults, compartida por todos los kinds.
    pub fn base_defaults() -> Value {
        json!({
            "name": "Flow",
            "description": "A flow",
            "input_interface": [],
            "output_interface": [],
            "private_keys": default_private_keys(),
            "keys_to_ignore_for_hash": default_keys_to_ignore_for_hash(),
            "clear_flow_namespace_on_run_end": true,
            "keep_raw_response": true,
            "enable_cache": false,
        })
    }

    /// Fusiona `layers` en orden raíz → hoja, aplica `overrides`, valida
    /// `required_keys` y materializa la config.
    pub fn from_layers(layers: &[Value], overrides: Value, required_keys: &[&str]) -> Result<Self, FlowError> {
        if required_keys.is_empty() {
            return Err(FlowError::NoRequiredConfigKeys);
        }

        let mut merged = json!({});
        for layer in layers {
            merge_values(&mut merged, layer);
        }
        merge_values(&mut merged, &overrides);

        for key in required_keys {
            let present = merged.get(key).map(|v| !v.is_null()).unwrap_or(false);
            if !present {
                return Err(FlowError::MissingConfigKey((*key).to_string()));
            }
        }

        serde_json::from_value(merged).map_err(|e| FlowError::Config(e.to_string()))
    }

    /// Atajo para el caso común: defaults de un kind + overrides.
    pub fn build(kind_defaults: Value, overrides: Value, required_keys: &[&str]) -> Result<Self, FlowError> {
        Self::from_layers(&[Self::base_defaults(), kind_defaults], overrides, required_keys)
    }

    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(|v| v.as_str())
    }

    pub fn extra_u64(&self, key: &str) -> Option<u64> {
        self.extra.get(key).and_then(|v| v.as_u64())
    }

    pub fn extra_f64(&self, key: &str) -> Option<f64> {
        self.extra.get(key).and_then(|v| v.as_f64())
    }

    pub fn extra_bool(&self, key: &str) -> Option<bool> {
        self.extra.get(key).and_then(|v| v.as_bool())
    }

    /// Vista JSON de la config sin las claves ignoradas, para la identidad
    /// de cache.
    pub fn filtered_value(&self, keys_to_ignore: &[String]) -> Value {
        let mut rendered = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut rendered {
            for key in keys_to_ignore {
                map.remove(key);
            }
        }
        rendered
    }

    #[cfg(test)]
    pub(crate) fn for_tests(name: &str) -> Self {
        Self::build(json!({}), json!({"name": name, "description": "test flow"}), BASE_REQUIRED_KEYS)
            .expect("test config")
    }
}
