//! Composición secuencial de sub-flows.

use serde_json::{json, Value};
use uuid::Uuid;

use crate::composite::{call_child, output_data_of, state_key_is_truthy, ChildSlot};
use crate::config::{FlowConfig, BASE_REQUIRED_KEYS};
use crate::errors::FlowError;
use crate::flow::{Flow, FlowKernel};
use crate::message::Payload;

/// Ejecuta sus hijos estrictamente en orden de declaración. Si
/// `early_exit_key` está configurada y se vuelve verdadera en el estado tras
/// fusionar la respuesta de un hijo, los hijos restantes se saltan.
pub struct SequentialFlow {
    kernel: FlowKernel,
    children: Vec<ChildSlot>,
    early_exit_key: Option<String>,
}

impl std::fmt::Debug for SequentialFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let child_names: Vec<&str> = self.children.iter().map(|c| c.name.as_str()).collect();
        f.debug_struct("SequentialFlow")
         .field("name", &self.kernel.name())
         .field("children", &child_names)
         .field("early_exit_key", &self.early_exit_key)
         .finish_non_exhaustive()
    }
}

impl SequentialFlow {
    pub fn required_config_keys() -> &'static [&'static str] {
        BASE_REQUIRED_KEYS
    }

    pub fn default_config() -> Value {
        json!({
            "name": "SequentialFlow",
            "description": "Executes its child flows in declaration order",
        })
    }

    /// Valida la topología y construye el operador. Necesita al menos un
    /// hijo.
    pub fn from_config(config: FlowConfig, children: Vec<(String, Box<dyn Flow>)>) -> Result<Self, FlowError> {
        if children.is_empty() {
            return Err(FlowError::InvalidTopology("sequential composition needs at least one child flow".to_string()));
        }

        let early_exit_key = config.extra_str("early_exit_key").map(str::to_string);
        let children = children.into_iter()
                               .map(|(name, flow)| ChildSlot { name, flow })
                               .collect();

        Ok(Self { kernel: FlowKernel::new(config),
                  children,
                  early_exit_key })
    }

    /// Defaults del kind + overrides del llamador.
    pub fn instantiate_with_overrides(overrides: Value, children: Vec<(String, Box<dyn Flow>)>) -> Result<Self, FlowError> {
        let config = FlowConfig::build(Self::default_config(), overrides, Self::required_config_keys())?;
        Self::from_config(config, children)
    }

    pub fn child(&self, name: &str) -> Option<&dyn Flow> {
        self.children
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.flow.as_ref())
    }

    fn early_exit(&self) -> bool {
        self.early_exit_key
            .as_deref()
            .map(|key| state_key_is_truthy(&self.kernel, key))
            .unwrap_or(false)
    }
}

impl Flow for SequentialFlow {
    fn kernel(&self) -> &FlowKernel {
        &self.kernel
    }

    fn kernel_mut(&mut self) -> &mut FlowKernel {
        &mut self.kernel
    }

    fn run(&mut self, input_data: &Payload) -> Result<Payload, FlowError> {
        let mut parents: Vec<Uuid> = self.kernel.current_input().into_iter().collect();
        let mut carried = input_data.clone();

        for index in 0..self.children.len() {
            let answer = call_child(&mut self.kernel, &mut self.children[index], &carried, &parents)?;
            carried = output_data_of(&answer);
            parents = vec![answer.id];

            if self.early_exit() {
                log::info!("Early end of sequential flow detected");
                break;
            }
        }

        self.kernel.select_outputs()
    }

    fn subflows_mut(&mut self) -> Vec<&mut dyn Flow> {
        self.children.iter_mut().map(|c| &mut *c.flow as &mut dyn Flow).collect()
    }
}
