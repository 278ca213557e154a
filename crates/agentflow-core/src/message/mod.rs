//! Mensajes intercambiados entre flows.
//!
//! Rol en el sistema:
//! - Un `Message` es la única vía de comunicación entre flows: entrada,
//!   salida, o entrada de log de un cambio de estado.
//! - Inmutable una vez construido; el enum `MessageKind` define el contrato
//!   observable (análogo al event log append-only del motor).
//! - Todo mensaje salvo la entrada inicial es trazable a su(s) padre(s) por
//!   id (`parent_ids` en inputs, `input_message_id` en outputs).

mod types;

pub use types::{ApiInfo, ChatRole, Message, MessageKind, Payload};
