//! Operadores de control de flujo compuestos.
//!
//! Un flow compuesto posee sub-flows nombrados y conduce interacciones de
//! varios pasos invocando `execute` sobre ellos y fusionando cada respuesta
//! en su propio estado. La invocación es estrictamente secuencial: el padre
//! bloquea durante cada hijo, sin fan-out.
//!
//! Tracking de padres: el payload de cada hijo se construye con el data del
//! mensaje producido más recientemente (el input del padre al comienzo)
//! encima del estado del padre, y `parent_ids` apunta a ese mensaje.

pub mod generator_critic;
pub mod sequential;

pub use generator_critic::{GcRoles, GeneratorCriticFlow};
pub use sequential::SequentialFlow;

use uuid::Uuid;

use crate::errors::FlowError;
use crate::flow::{Flow, FlowKernel};
use crate::message::{Message, MessageKind, Payload};
use crate::state::is_truthy;

/// Sub-flow nombrado de un operador compuesto.
pub(crate) struct ChildSlot {
    pub name: String,
    pub flow: Box<dyn Flow>,
}

/// Payload para un hijo: estado del padre con `carried` (el data del último
/// mensaje producido) encima, restringido al `input_interface` del hijo
/// cuando lo declara. Una clave declarada y ausente es error del llamador.
pub(crate) fn build_child_payload(kernel: &FlowKernel, carried: &Payload, child: &ChildSlot) -> Result<Payload, FlowError> {
    let mut merged = kernel.state.to_payload();
    for (key, value) in carried {
        merged.insert(key.clone(), value.clone());
    }

    let wanted = &child.flow.kernel().config.input_interface;
    if wanted.is_empty() {
        return Ok(merged);
    }

    let mut selected = Payload::new();
    for key in wanted {
        match merged.get(key) {
            Some(value) => {
                selected.insert(key.clone(), value.clone());
            }
            None => return Err(FlowError::StateKeyMissing(key.clone())),
        }
    }
    Ok(selected)
}

/// Invoca un hijo: empaqueta su input (credenciales del padre incluidas,
/// `parent_ids` = puntero de tracking), registra la respuesta en el history
/// del padre y fusiona su `output_data` en el estado del padre, con a lo
/// sumo un update registrado por hijo.
pub(crate) fn call_child(kernel: &mut FlowKernel,
                         child: &mut ChildSlot,
                         carried: &Payload,
                         parents: &[Uuid])
                         -> Result<Message, FlowError> {
    let payload = build_child_payload(kernel, carried, child)?;
    let input = kernel.package_input_message(&child.flow.kernel().config, payload, parents.to_vec());
    let answer = child.flow.execute(&input)?;

    kernel.log_message(answer.clone());
    if let MessageKind::Output { output_data, .. } = &answer.kind {
        if !output_data.is_empty() {
            kernel.state_update(output_data)?;
        }
    }
    Ok(answer)
}

pub(crate) fn output_data_of(message: &Message) -> Payload {
    match &message.kind {
        MessageKind::Output { output_data, .. } => output_data.clone(),
        _ => Payload::new(),
    }
}

pub(crate) fn state_key_is_truthy(kernel: &FlowKernel, key: &str) -> bool {
    kernel.state.get(key).map(is_truthy).unwrap_or(false)
}
