//! Log append-only de mensajes de un flow.

use serde::{Deserialize, Serialize};

use crate::message::Message;
use uuid::Uuid;

/// Secuencia ordenada de mensajes, propiedad exclusiva de un flow. Sólo
/// crece durante la vida del flow; únicamente un full reset la reemplaza.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega un mensaje y devuelve su id.
    pub fn add_message(&mut self, message: Message) -> Uuid {
        let id = message.id;
        self.messages.push(message);
        id
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Últimos `n` mensajes (los producidos por la ejecución más reciente,
    /// para el cache).
    pub fn last_n(&self, n: usize) -> &[Message] {
        let n = n.min(self.messages.len());
        &self.messages[self.messages.len() - n..]
    }
}
