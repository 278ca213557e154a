//! agentflow-adapters: flows hoja concretos sobre el core neutral.
//!
//! El core no interpreta la semántica de ningún backend; este crate aporta
//! la hoja orientada a chat (`ChatAtomicFlow`), el trait `Backend` que
//! abstrae la llamada de chat-completion, el renderizado de prompts y los
//! datasets de demostraciones few-shot.

pub mod backend;
pub mod chat;
pub mod demonstrations;
pub mod template;

pub use backend::{call_with_retries, find_api_info, Backend, ChatMessage};
pub use chat::{ChatAtomicFlow, ChatPrompts};
pub use demonstrations::DemonstrationsDataset;
pub use template::PromptTemplate;
