//! agentflow: capa de orquestación componible para flows de varios pasos.
//!
//! Paquete paraguas del workspace: re-exporta el núcleo de ejecución
//! (`agentflow-core`) y las hojas concretas (`agentflow-adapters`) bajo un
//! único nombre.

pub use agentflow_adapters::{call_with_retries, find_api_info, Backend, ChatAtomicFlow, ChatMessage, ChatPrompts,
                             DemonstrationsDataset, PromptTemplate};
pub use agentflow_core::{caching_active, is_truthy, merge_values, set_caching_active, ApiInfo, BackendError,
                         CacheStore, CachingKey, CachingValue, ChatRole, Flow, FlowCache, FlowConfig, FlowError,
                         FlowKernel, FlowSnapshot, FlowState, GcRoles, GeneratorCriticFlow, History,
                         InMemoryCacheStore, Message, MessageKind, Payload, SequentialFlow, BASE_REQUIRED_KEYS,
                         PREVIOUS_MESSAGES_KEY};
