//! Contrato uniforme de ejecución de un flow.
//!
//! `Flow` es el trait polimórfico del sistema. Los kinds concretos aportan
//! `run` (la unidad de trabajo) y el acceso a su kernel; el protocolo
//! transversal (registrar el input, decidir cache o ejecución, empaquetar
//! la salida y correr el hook post-llamada) vive como métodos provistos del
//! trait, de modo que se aplica idéntico a cada kind sin que `run` sepa de
//! history ni de caching.

use serde_json::Value;

use crate::cache::{caching_active, CachingKey, CachingValue};
use crate::errors::FlowError;
use crate::flow::kernel::FlowKernel;
use crate::message::{Message, MessageKind, Payload};

pub trait Flow {
    fn kernel(&self) -> &FlowKernel;

    fn kernel_mut(&mut self) -> &mut FlowKernel;

    /// Unidad de trabajo del kind concreto. No gestiona history ni cache;
    /// eso es responsabilidad del protocolo de `execute`.
    fn run(&mut self, input_data: &Payload) -> Result<Payload, FlowError>;

    /// Un kind debe optar explícitamente por soportar caching.
    fn supports_caching(&self) -> bool {
        false
    }

    /// Sub-flows del kind, si los tiene (operadores compuestos).
    fn subflows_mut(&mut self) -> Vec<&mut dyn Flow> {
        Vec::new()
    }

    /// Clave de fin-de-interacción que este flow designa entre sus salidas
    /// declaradas, si designa alguna.
    fn end_of_interaction_key(&self) -> Option<String> {
        None
    }

    fn name(&self) -> &str {
        self.kernel().name()
    }

    /// Interfaz declarada del flow: qué claves espera y qué claves promete.
    fn interface_description(&self) -> Value {
        let config = &self.kernel().config;
        serde_json::json!({
            "input": config.input_interface,
            "output": config.output_interface,
        })
    }

    /// Reset de estado e history. Con `recursive`, primero los sub-flows;
    /// los resets de sub-flows son siempre completos, sin importar
    /// `full_reset`.
    fn reset(&mut self, full_reset: bool, recursive: bool, src_flow: &str) {
        if recursive {
            for child in self.subflows_mut() {
                child.reset(true, true, src_flow);
            }
        }
        self.kernel_mut().reset(full_reset, src_flow);
    }

    /// Punto de entrada único de una llamada.
    ///
    /// Secuencia: (1) propagar credenciales del mensaje al estado, (2)
    /// registrar el input en el history, (3) ejecutar `run` o resolver por
    /// cache, (4) empaquetar la salida con back-reference al input, (5)
    /// hook post-llamada, (6) devolver. Los errores suben sin modificar; el
    /// estado ya mutado permanece (sin rollback).
    fn execute(&mut self, input_message: &Message) -> Result<Message, FlowError> {
        let (data, api_information, backend_used) = match &input_message.kind {
            MessageKind::Input { data,
                                 api_information,
                                 backend_used,
                                 .. } => (data.clone(), api_information.clone(), backend_used.clone()),
            _ => return Err(FlowError::InvalidInputMessage(input_message.kind_tag())),
        };

        if !api_information.is_empty() {
            let rendered = serde_json::to_value(&api_information).map_err(|e| FlowError::Internal(e.to_string()))?;
            let mut update = Payload::new();
            update.insert("api_information".to_string(), rendered);
            self.kernel_mut().state_update(&update)?;
        }
        if let Some(backend) = backend_used {
            let mut update = Payload::new();
            update.insert("backend_used".to_string(), Value::String(backend));
            self.kernel_mut().state_update(&update)?;
        }

        let kernel = self.kernel_mut();
        kernel.log_message(input_message.clone());
        kernel.set_current_input(Some(input_message.id));

        let response = if self.kernel().config.enable_cache && caching_active() {
            self.run_cached(&data)?
        } else {
            self.run(&data)?
        };

        let output_message = self.kernel().package_output_message(input_message, response)?;

        self.kernel_mut().post_call_hook();

        Ok(output_message)
    }

    /// Despacho con cache: en hit restaura el snapshot, re-reproduce los
    /// mensajes registrados y devuelve la salida cacheada; en miss ejecuta
    /// `run`, extrae exactamente los mensajes nuevos del history y guarda la
    /// entrada. Falla antes de cualquier lookup si el kind no soporta
    /// caching.
    fn run_cached(&mut self, input_data: &Payload) -> Result<Payload, FlowError> {
        if !self.supports_caching() {
            return Err(FlowError::CachingUnsupported(self.kernel().name().to_string()));
        }

        let key = {
            let kernel = self.kernel();
            CachingKey::new(&kernel.identity_value(), input_data, &kernel.config.keys_to_ignore_for_hash)
        };

        if let Some(cached) = self.kernel().cache.get(&key) {
            let CachingValue { output_data,
                               snapshot,
                               history_messages } = cached;
            let kernel = self.kernel_mut();
            kernel.restore(snapshot);
            for message in &history_messages {
                kernel.log_message(message.replayed());
            }
            log::debug!("cache hit for flow `{}` (key {})", kernel.name(), key);
            Ok(output_data)
        } else {
            let history_len_before = self.kernel().history.len();
            let response = self.run(input_data)?;

            let kernel = self.kernel();
            let created = kernel.history.len() - history_len_before;
            let value = CachingValue { output_data: response.clone(),
                                       snapshot: kernel.snapshot(),
                                       history_messages: kernel.history.last_n(created).to_vec() };
            kernel.cache.set(&key, value);
            log::debug!("cached flow `{}` (key {})", kernel.name(), key);
            Ok(response)
        }
    }
}
