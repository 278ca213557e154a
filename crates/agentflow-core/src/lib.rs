//! agentflow-core: núcleo de ejecución de flows componibles.
//!
//! Un flow es una unidad de trabajo con estado propio, config inmutable y
//! history append-only, que consume un mensaje de entrada y emite uno de
//! salida bajo un contrato uniforme (`Flow::execute`). Los operadores
//! compuestos (secuencial, generador-crítico) poseen sub-flows y conducen
//! interacciones de varias rondas a través del mismo contrato. El cache
//! direccionado por contenido permite resolver llamadas repetidas
//! restaurando snapshot + replay de mensajes.

pub mod cache;
pub mod composite;
pub mod config;
pub mod errors;
pub mod flow;
pub mod hashing;
pub mod history;
pub mod message;
pub mod state;

pub use cache::{caching_active, set_caching_active, CacheStore, CachingKey, CachingValue, FlowCache, InMemoryCacheStore};
pub use composite::{GcRoles, GeneratorCriticFlow, SequentialFlow};
pub use config::{merge_values, FlowConfig, BASE_REQUIRED_KEYS};
pub use errors::{BackendError, FlowError};
pub use flow::{Flow, FlowKernel, FlowSnapshot, PREVIOUS_MESSAGES_KEY};
pub use history::History;
pub use message::{ApiInfo, ChatRole, Message, MessageKind, Payload};
pub use state::{is_truthy, FlowState};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Flow mínimo: devuelve su entrada tal cual y anota la última clave
    // vista en su estado.
    struct EchoFlow {
        kernel: FlowKernel,
    }

    impl EchoFlow {
        fn new(clear_on_run_end: bool) -> Self {
            let config = FlowConfig::build(json!({}),
                                           json!({
                                               "name": "echo",
                                               "description": "echoes its input",
                                               "clear_flow_namespace_on_run_end": clear_on_run_end,
                                           }),
                                           BASE_REQUIRED_KEYS).unwrap();
            Self { kernel: FlowKernel::new(config) }
        }
    }

    impl Flow for EchoFlow {
        fn kernel(&self) -> &FlowKernel {
            &self.kernel
        }

        fn kernel_mut(&mut self) -> &mut FlowKernel {
            &mut self.kernel
        }

        fn run(&mut self, input_data: &Payload) -> Result<Payload, FlowError> {
            self.kernel.state_update(input_data)?;
            Ok(input_data.clone())
        }
    }

    fn input_for(flow: &EchoFlow, data: Payload) -> Message {
        Message::input_to(&flow.kernel.config, "Launcher", data, vec![])
    }

    #[test]
    fn execute_logs_one_input_and_links_the_output() {
        let mut flow = EchoFlow::new(false);
        let mut data = Payload::new();
        data.insert("v0".into(), json!(10));
        let input = input_for(&flow, data);

        let output = flow.execute(&input).unwrap();

        let inputs_logged = flow.kernel.history.messages().iter().filter(|m| m.is_input()).count();
        assert_eq!(inputs_logged, 1);

        match output.kind {
            MessageKind::Output { input_message_id, output_data, .. } => {
                assert_eq!(input_message_id, input.id);
                assert_eq!(output_data["v0"], json!(10));
            }
            other => panic!("expected an output message, got {:?}", other),
        }
    }

    #[test]
    fn post_call_hook_clears_state_but_not_history() {
        let mut flow = EchoFlow::new(true);
        let mut data = Payload::new();
        data.insert("v0".into(), json!(1));
        let input = input_for(&flow, data);

        flow.execute(&input).unwrap();

        assert!(flow.kernel.state.is_empty());
        // input + state update + marcador del hook
        assert_eq!(flow.kernel.history.len(), 3);
        assert!(matches!(flow.kernel.history.messages()[2].kind,
                         MessageKind::NamespaceReset { .. }));
    }

    #[test]
    fn executing_a_non_input_message_is_rejected() {
        let mut flow = EchoFlow::new(false);
        let marker = Message::new("x", MessageKind::NamespaceReset { updated_flow: "x".into() });
        let err = flow.execute(&marker).unwrap_err();
        assert!(matches!(err, FlowError::InvalidInputMessage("namespace_reset")));
    }
}
