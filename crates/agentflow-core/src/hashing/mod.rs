//! Huellas deterministas del core.
//!
//! Las claves de cache se derivan de JSON canonicalizado (claves de objeto
//! ordenadas, sin espacios) hasheado con blake3. Dos llamadas semánticamente
//! idénticas producen el mismo hex digest sin importar el orden de inserción
//! de las claves.

mod canonical_json;
mod hash;

pub use canonical_json::to_canonical_json;
pub use hash::{hash_str, hash_value};
