//! Flow: la unidad polimórfica de ejecución.
//!
//! Provee el kernel compartido (config, estado, history, cache) y el trait
//! `Flow` con el protocolo uniforme de llamada.

pub mod contract;
pub mod kernel;

pub use contract::Flow;
pub use kernel::{FlowKernel, FlowSnapshot, PREVIOUS_MESSAGES_KEY};
