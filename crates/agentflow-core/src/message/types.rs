use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::FlowConfig;
use crate::errors::FlowError;
use crate::history::History;

/// Payload nombrado de un mensaje (objeto JSON).
pub type Payload = Map<String, Value>;

/// Rol de un mensaje de conversación. Enum cerrado: cualquier otro rol es un
/// error del llamador, nunca se ignora en silencio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn parse(raw: &str) -> Result<Self, FlowError> {
        match raw {
            "system" => Ok(ChatRole::System),
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            other => Err(FlowError::InvalidRole(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credencial de un backend, resuelta por igualdad exacta de
/// `backend_used`. El registro completo viaja en el input message y se
/// propaga al estado del flow receptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiInfo {
    pub backend_used: String,
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Variantes de mensaje soportadas por el core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MessageKind {
    /// Entrada dirigida a un flow. Las claves en `private_keys` se excluyen
    /// de cualquier hash y de la serialización externa; las de
    /// `keys_to_ignore_for_hash` sólo del hashing de cache.
    Input {
        src_flow: String,
        dst_flow: String,
        data: Payload,
        private_keys: Vec<String>,
        keys_to_ignore_for_hash: Vec<String>,
        parent_ids: Vec<Uuid>,
        api_information: Vec<ApiInfo>,
        backend_used: Option<String>,
    },
    /// Salida de un flow hacia su llamador, con back-reference al input que
    /// responde y snapshot del history al momento de producción.
    Output {
        src_flow: String,
        dst_flow: String,
        output_data: Payload,
        raw_response: Option<Value>,
        input_message_id: Uuid,
        history: History,
    },
    /// Delta genérico de estado: registra exactamente las claves que
    /// cambiaron.
    StateUpdate { updated_flow: String, data: Payload },
    /// Marcador de reset de namespace (el estado previo se conserva).
    NamespaceReset { updated_flow: String },
    /// Marcador de reset completo. Invariante: debe ser el primer (y único)
    /// mensaje del history recién vaciado.
    FullReset { updated_flow: String },
    /// Un mensaje de chat fue añadido al transcript del flow.
    ChatMessageAppended {
        updated_flow: String,
        role: ChatRole,
        content: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub kind: MessageKind,
}

impl Message {
    pub fn new(created_by: impl Into<String>, kind: MessageKind) -> Self {
        Self { id: Uuid::new_v4(),
               created_at: Utc::now(),
               created_by: created_by.into(),
               kind }
    }

    /// Construye un input dirigido a `dst`, heredando de su config las listas
    /// de claves privadas e ignoradas para hash.
    pub fn input_to(dst: &FlowConfig, src_flow: &str, data: Payload, parent_ids: Vec<Uuid>) -> Self {
        debug_assert!(!data.contains_key("src_flow") && !data.contains_key("dst_flow"),
                      "`src_flow` y `dst_flow` son claves reservadas del protocolo");

        Self::new(src_flow,
                  MessageKind::Input { src_flow: src_flow.to_string(),
                                       dst_flow: dst.name.clone(),
                                       data,
                                       private_keys: dst.private_keys.clone(),
                                       keys_to_ignore_for_hash: dst.keys_to_ignore_for_hash.clone(),
                                       parent_ids,
                                       api_information: Vec::new(),
                                       backend_used: None })
    }

    /// Adjunta credenciales a un input ya construido. No-op sobre otras
    /// variantes.
    pub fn with_api_information(mut self, info: Vec<ApiInfo>, backend: Option<String>) -> Self {
        if let MessageKind::Input { api_information, backend_used, .. } = &mut self.kind {
            *api_information = info;
            *backend_used = backend;
        }
        self
    }

    /// Copia para replay de cache: mismo contenido, identidad y timestamp
    /// frescos, para que el history receptor conserve ids únicos.
    pub fn replayed(&self) -> Self {
        Self { id: Uuid::new_v4(),
               created_at: Utc::now(),
               created_by: self.created_by.clone(),
               kind: self.kind.clone() }
    }

    pub fn is_input(&self) -> bool {
        matches!(self.kind, MessageKind::Input { .. })
    }

    pub fn is_output(&self) -> bool {
        matches!(self.kind, MessageKind::Output { .. })
    }

    pub fn is_state_update(&self) -> bool {
        matches!(self.kind, MessageKind::StateUpdate { .. })
    }

    /// Etiqueta corta de la variante, para logs y asserts.
    pub fn kind_tag(&self) -> &'static str {
        match &self.kind {
            MessageKind::Input { .. } => "input",
            MessageKind::Output { .. } => "output",
            MessageKind::StateUpdate { .. } => "state_update",
            MessageKind::NamespaceReset { .. } => "namespace_reset",
            MessageKind::FullReset { .. } => "full_reset",
            MessageKind::ChatMessageAppended { .. } => "chat_message",
        }
    }

    /// Serialización para consumo externo: descarta credenciales y las
    /// claves declaradas privadas del payload de entrada.
    pub fn external_value(&self) -> Value {
        let mut message = self.clone();
        if let MessageKind::Input { data,
                                    private_keys,
                                    api_information,
                                    .. } = &mut message.kind
        {
            for key in private_keys.iter() {
                data.remove(key);
            }
            api_information.clear();
        }
        serde_json::to_value(&message).unwrap_or(Value::Null)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} (created_by={})", self.kind_tag(), self.id, self.created_by)
    }
}
