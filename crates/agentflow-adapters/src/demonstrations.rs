//! Dataset acotado de demostraciones few-shot.

use agentflow_core::Payload;

/// Colección de ejemplos query/response para sembrar una conversación. El
/// flow de chat la trunca a `demonstrations_k` ejemplos si la config lo
/// pide.
#[derive(Debug, Clone, Default)]
pub struct DemonstrationsDataset {
    samples: Vec<Payload>,
}

impl DemonstrationsDataset {
    pub fn new(samples: Vec<Payload>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[Payload] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
