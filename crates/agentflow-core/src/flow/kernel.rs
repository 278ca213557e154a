//! Kernel compartido por todos los flows.
//!
//! Agrupa lo que en el diseño es transversal a cualquier kind: la config
//! inmutable, el estado mutable, el history append-only y el handle al
//! cache. Toda mutación de estado pasa por aquí para que quede registrada
//! en el history: nunca un cambio sin su entrada de log, nunca una entrada
//! sin su cambio.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::cache::FlowCache;
use crate::config::FlowConfig;
use crate::errors::FlowError;
use crate::history::History;
use crate::message::{ApiInfo, ChatRole, Message, MessageKind, Payload};
use crate::state::FlowState;

/// Clave de estado bajo la que vive el transcript de chat.
pub const PREVIOUS_MESSAGES_KEY: &str = "previous_messages";

/// Snapshot serializable de (config, estado): suficiente para devolver un
/// flow al punto exacto en que una salida cacheada fue producida. El history
/// no forma parte del snapshot; sus mensajes se re-reproducen aparte.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSnapshot {
    pub config: FlowConfig,
    pub state: FlowState,
}

#[derive(Debug)]
pub struct FlowKernel {
    pub config: FlowConfig,
    pub state: FlowState,
    pub history: History,
    pub cache: FlowCache,
    current_input: Option<Uuid>,
}

impl FlowKernel {
    pub fn new(config: FlowConfig) -> Self {
        Self::with_cache(config, FlowCache::new())
    }

    /// Construye el kernel compartiendo un cache existente (varios flows
    /// pueden apuntar al mismo store).
    pub fn with_cache(config: FlowConfig, cache: FlowCache) -> Self {
        Self { config,
               state: FlowState::new(),
               history: History::new(),
               cache,
               current_input: None }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Id del input que la llamada en curso está respondiendo.
    pub fn current_input(&self) -> Option<Uuid> {
        self.current_input
    }

    pub(crate) fn set_current_input(&mut self, id: Option<Uuid>) {
        self.current_input = id;
    }

    /// Registra un mensaje en el history y devuelve su id.
    pub fn log_message(&mut self, message: Message) -> Uuid {
        log::debug!("{}", message);
        self.history.add_message(message)
    }

    /// Vía única de mutación de estado. Salta updates no-op (valor igual al
    /// existente, o null sobre clave existente), clona los valores
    /// almacenados para que queden independientes del llamador, y registra
    /// exactamente las claves que cambiaron en un `StateUpdate`. Un payload
    /// vacío es un error del llamador.
    pub fn state_update(&mut self, update_data: &Payload) -> Result<Option<Uuid>, FlowError> {
        if update_data.is_empty() {
            return Err(FlowError::EmptyStateUpdate);
        }

        let mut changed = Payload::new();
        for (key, value) in update_data {
            if let Some(existing) = self.state.get(key) {
                if value.is_null() || value == existing {
                    continue;
                }
            }
            changed.insert(key.clone(), value.clone());
            self.state.insert(key.clone(), value.clone());
        }

        if changed.is_empty() {
            return Ok(None);
        }

        let updated_flow = self.config.name.clone();
        let message = Message::new(updated_flow.clone(),
                                   MessageKind::StateUpdate { updated_flow, data: changed });
        Ok(Some(self.log_message(message)))
    }

    /// Agrega un mensaje de chat al transcript: muta el estado y registra el
    /// `ChatMessageAppended` correspondiente, de forma atómica.
    pub fn append_chat_message(&mut self, role: ChatRole, content: &str) -> Uuid {
        let entry = json!({"role": role.as_str(), "content": content});
        self.state.array_entry(PREVIOUS_MESSAGES_KEY).push(entry);

        let updated_flow = self.config.name.clone();
        let message = Message::new(updated_flow.clone(),
                                   MessageKind::ChatMessageAppended { updated_flow,
                                                                      role,
                                                                      content: content.to_string() });
        self.log_message(message)
    }

    /// Reset del kernel (la recursión sobre sub-flows vive en el trait).
    ///
    /// Full reset: estado e history se vacían y el marcador `FullReset` se
    /// registra en el history recién vaciado; tras el reset, el history
    /// contiene exactamente ese marcador. Reset de namespace: sólo se
    /// registra el marcador; estado e history se conservan.
    pub fn reset(&mut self, full_reset: bool, src_flow: &str) {
        let updated_flow = self.config.name.clone();
        if full_reset {
            self.state.clear();
            self.history = History::new();
            let marker = Message::new(src_flow, MessageKind::FullReset { updated_flow });
            self.log_message(marker);
        } else {
            let marker = Message::new(src_flow, MessageKind::NamespaceReset { updated_flow });
            self.log_message(marker);
        }
    }

    /// Hook post-llamada: por defecto vacía el estado (no el history) al
    /// terminar cada llamada, salvo que la config pida persistirlo.
    pub(crate) fn post_call_hook(&mut self) {
        if self.config.clear_flow_namespace_on_run_end {
            self.state.clear();
            let updated_flow = self.config.name.clone();
            let marker = Message::new(updated_flow.clone(), MessageKind::NamespaceReset { updated_flow });
            self.log_message(marker);
        }
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        FlowSnapshot { config: self.config.clone(),
                       state: self.state.clone() }
    }

    pub fn restore(&mut self, snapshot: FlowSnapshot) {
        self.config = snapshot.config;
        self.state = snapshot.state;
    }

    /// Identidad del flow para el fingerprint de cache: config y estado sin
    /// las claves ignoradas.
    pub fn identity_value(&self) -> Value {
        let ignore = &self.config.keys_to_ignore_for_hash;
        json!({
            "flow_config": self.config.filtered_value(ignore),
            "flow_state": self.state.filtered_value(ignore),
        })
    }

    /// Credenciales presentes en el estado (propagadas desde el último
    /// input).
    pub fn api_information(&self) -> Vec<ApiInfo> {
        self.state
            .get("api_information")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    pub fn backend_used(&self) -> Option<String> {
        self.state
            .get("backend_used")
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    /// Empaqueta un input hacia `dst`, arrastrando las credenciales del
    /// estado de este kernel.
    pub fn package_input_message(&self, dst: &FlowConfig, payload: Payload, parent_ids: Vec<Uuid>) -> Message {
        Message::input_to(dst, self.name(), payload, parent_ids)
            .with_api_information(self.api_information(), self.backend_used())
    }

    /// Empaqueta la salida que responde a `input_message`, con snapshot del
    /// history actual.
    pub fn package_output_message(&self, input_message: &Message, response: Payload) -> Result<Message, FlowError> {
        let reply_to = match &input_message.kind {
            MessageKind::Input { src_flow, .. } => src_flow.clone(),
            _ => return Err(FlowError::InvalidInputMessage(input_message.kind_tag())),
        };

        let raw_response = if self.config.keep_raw_response {
            Some(Value::Object(response.clone()))
        } else {
            None
        };

        Ok(Message::new(self.name(),
                        MessageKind::Output { src_flow: self.name().to_string(),
                                              dst_flow: reply_to,
                                              output_data: response,
                                              raw_response,
                                              input_message_id: input_message.id,
                                              history: self.history.clone() }))
    }

    /// Estado restringido al output_interface declarado.
    pub fn select_outputs(&self) -> Result<Payload, FlowError> {
        self.state.select(&self.config.output_interface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kernel() -> FlowKernel {
        FlowKernel::new(FlowConfig::for_tests("k"))
    }

    fn payload(pairs: &[(&str, Value)]) -> Payload {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn noop_updates_do_not_grow_history() {
        let mut k = kernel();
        k.state_update(&payload(&[("v0", json!(10))])).unwrap();
        assert_eq!(k.history.len(), 1);

        // mismo valor: sin log, sin crecimiento
        let logged = k.state_update(&payload(&[("v0", json!(10))])).unwrap();
        assert!(logged.is_none());
        assert_eq!(k.history.len(), 1);

        // null sobre clave existente: también no-op
        let logged = k.state_update(&payload(&[("v0", json!(null))])).unwrap();
        assert!(logged.is_none());
        assert_eq!(k.state.get("v0"), Some(&json!(10)));
    }

    #[test]
    fn empty_update_is_an_error() {
        let mut k = kernel();
        assert!(matches!(k.state_update(&Payload::new()), Err(FlowError::EmptyStateUpdate)));
    }

    #[test]
    fn update_logs_exactly_the_changed_keys() {
        let mut k = kernel();
        k.state_update(&payload(&[("a", json!(1))])).unwrap();
        k.state_update(&payload(&[("a", json!(1)), ("b", json!(2))])).unwrap();

        let last = k.history.last_n(1).first().cloned().unwrap();
        match last.kind {
            MessageKind::StateUpdate { data, .. } => {
                assert_eq!(data.len(), 1);
                assert!(data.contains_key("b"));
            }
            other => panic!("expected a state update, got {:?}", other),
        }
    }

    #[test]
    fn chat_append_mutates_state_and_logs_atomically() {
        let mut k = kernel();
        k.append_chat_message(ChatRole::System, "hello");
        assert_eq!(k.history.len(), 1);

        let transcript = k.state.get(PREVIOUS_MESSAGES_KEY).unwrap();
        assert_eq!(transcript[0]["role"], json!("system"));
        assert_eq!(transcript[0]["content"], json!("hello"));
    }

    #[test]
    fn full_reset_leaves_exactly_the_marker() {
        let mut k = kernel();
        k.state_update(&payload(&[("v0", json!(1))])).unwrap();
        k.reset(true, "Launcher");

        assert!(k.state.is_empty());
        assert_eq!(k.history.len(), 1);
        assert!(matches!(k.history.messages()[0].kind, MessageKind::FullReset { .. }));
    }

    #[test]
    fn namespace_reset_retains_state_and_history() {
        let mut k = kernel();
        k.state_update(&payload(&[("v0", json!(1))])).unwrap();
        k.reset(false, "Launcher");

        assert_eq!(k.state.get("v0"), Some(&json!(1)));
        assert_eq!(k.history.len(), 2);
        assert!(matches!(k.history.messages()[1].kind, MessageKind::NamespaceReset { .. }));
    }
}
