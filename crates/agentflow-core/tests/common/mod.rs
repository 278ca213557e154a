//! Flows concretos mínimos compartidos por los tests de integración.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use agentflow_core::{Flow, FlowCache, FlowConfig, FlowError, FlowKernel, Message, Payload, BASE_REQUIRED_KEYS};
use serde_json::{json, Value};

pub fn payload(pairs: &[(&str, Value)]) -> Payload {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

pub fn input_for(flow: &dyn Flow, src: &str, data: Payload) -> Message {
    Message::input_to(&flow.kernel().config, src, data, vec![])
}

/// Suma un bias fijo a cada valor numérico de su entrada (el flow "add-bias"
/// del escenario de composición secuencial).
pub struct AddBiasFlow {
    kernel: FlowKernel,
    bias: i64,
}

impl AddBiasFlow {
    pub fn new(name: &str, bias: i64) -> Self {
        let config = FlowConfig::build(json!({
                                           "input_interface": ["v0"],
                                           "output_interface": ["v0"],
                                       }),
                                       json!({
                                           "name": name,
                                           "description": "flow-sum",
                                           "bias": bias,
                                           "clear_flow_namespace_on_run_end": false,
                                       }),
                                       BASE_REQUIRED_KEYS).unwrap();
        Self { kernel: FlowKernel::new(config), bias }
    }
}

impl Flow for AddBiasFlow {
    fn kernel(&self) -> &FlowKernel {
        &self.kernel
    }

    fn kernel_mut(&mut self) -> &mut FlowKernel {
        &mut self.kernel
    }

    fn run(&mut self, input_data: &Payload) -> Result<Payload, FlowError> {
        let mut answer = self.bias;
        for value in input_data.values() {
            answer += value.as_i64().unwrap_or(0);
        }
        Ok(payload(&[("v0", json!(answer))]))
    }
}

/// Flow guionado: devuelve sus salidas en ciclo, cuenta invocaciones y
/// anota el número de turno en su estado. Puede designar una clave de
/// fin-de-interacción.
pub struct ScriptedFlow {
    kernel: FlowKernel,
    outputs: Vec<Payload>,
    calls: Arc<AtomicUsize>,
    eoi: Option<String>,
}

impl ScriptedFlow {
    pub fn new(name: &str, outputs: Vec<Payload>, output_interface: &[&str]) -> Self {
        let config = FlowConfig::build(json!({"output_interface": output_interface}),
                                       json!({
                                           "name": name,
                                           "description": "scripted flow",
                                           "clear_flow_namespace_on_run_end": false,
                                       }),
                                       BASE_REQUIRED_KEYS).unwrap();
        Self { kernel: FlowKernel::new(config),
               outputs,
               calls: Arc::new(AtomicUsize::new(0)),
               eoi: None }
    }

    pub fn with_eoi(mut self, key: &str) -> Self {
        self.eoi = Some(key.to_string());
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl Flow for ScriptedFlow {
    fn kernel(&self) -> &FlowKernel {
        &self.kernel
    }

    fn kernel_mut(&mut self) -> &mut FlowKernel {
        &mut self.kernel
    }

    fn end_of_interaction_key(&self) -> Option<String> {
        self.eoi.clone()
    }

    fn run(&mut self, _input_data: &Payload) -> Result<Payload, FlowError> {
        let turn = self.calls.fetch_add(1, Ordering::SeqCst);
        self.kernel.state_update(&payload(&[("turns", json!(turn + 1))]))?;
        Ok(self.outputs[turn % self.outputs.len()].clone())
    }
}

/// Flow determinista apto para cache: duplica `v0`, registra la última
/// entrada vista y cuenta cuántas veces `run` se ejecutó de verdad.
pub struct CachingProbe {
    kernel: FlowKernel,
    calls: Arc<AtomicUsize>,
    supported: bool,
}

impl CachingProbe {
    pub fn new(name: &str, cache: FlowCache, enable_cache: bool) -> Self {
        Self::build(name, cache, enable_cache, true, json!({}))
    }

    pub fn without_support(name: &str, cache: FlowCache, enable_cache: bool) -> Self {
        Self::build(name, cache, enable_cache, false, json!({}))
    }

    pub fn with_overrides(name: &str, cache: FlowCache, overrides: Value) -> Self {
        Self::build(name, cache, true, true, overrides)
    }

    fn build(name: &str, cache: FlowCache, enable_cache: bool, supported: bool, overrides: Value) -> Self {
        let mut merged = json!({
            "name": name,
            "description": "caching probe",
            "enable_cache": enable_cache,
        });
        agentflow_core::merge_values(&mut merged, &overrides);
        let config = FlowConfig::build(json!({}), merged, BASE_REQUIRED_KEYS).unwrap();
        Self { kernel: FlowKernel::with_cache(config, cache),
               calls: Arc::new(AtomicUsize::new(0)),
               supported }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl Flow for CachingProbe {
    fn kernel(&self) -> &FlowKernel {
        &self.kernel
    }

    fn kernel_mut(&mut self) -> &mut FlowKernel {
        &mut self.kernel
    }

    fn supports_caching(&self) -> bool {
        self.supported
    }

    fn run(&mut self, input_data: &Payload) -> Result<Payload, FlowError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let v0 = input_data.get("v0").and_then(|v| v.as_i64()).unwrap_or(0);
        self.kernel.state_update(&payload(&[("last_seen", json!(v0))]))?;
        Ok(payload(&[("result", json!(v0 * 2))]))
    }
}
