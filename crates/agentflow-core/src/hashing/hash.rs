//! Helpers de hash: abstraen el algoritmo (blake3) del resto del core.

use serde_json::Value;

use super::to_canonical_json;

/// Hashea un string y devuelve el digest en hex.
pub fn hash_str(input: &str) -> String {
    blake3::hash(input.as_bytes()).to_hex().to_string()
}

/// Hashea un `Value` vía su representación canónica.
pub fn hash_value(value: &Value) -> String {
    hash_str(&to_canonical_json(value))
}
