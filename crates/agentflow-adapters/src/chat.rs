//! Flow atómico orientado a chat.
//!
//! Todo su estado es el transcript ordenado bajo `previous_messages`. La
//! primera invocación siembra la conversación (mensaje system renderizado
//! contra el payload, más las demostraciones few-shot si las hay); cada
//! invocación agrega el mensaje user renderizado y la respuesta del backend
//! como assistant. Cada append muta estado y registra su entrada de log de
//! forma atómica, vía el kernel.

use std::time::Duration;

use agentflow_core::{ChatRole, Flow, FlowCache, FlowConfig, FlowError, FlowKernel, Payload, PREVIOUS_MESSAGES_KEY};
use serde_json::{json, Value};

use crate::backend::{call_with_retries, find_api_info, Backend, ChatMessage};
use crate::demonstrations::DemonstrationsDataset;
use crate::template::PromptTemplate;

/// Templates de la conversación. `init_human` (si se declara) reemplaza al
/// template user en el primer turno; `demonstrations_response` renderiza la
/// respuesta de cada demostración.
pub struct ChatPrompts {
    pub system: PromptTemplate,
    pub human: PromptTemplate,
    pub init_human: Option<PromptTemplate>,
    pub demonstrations_response: Option<PromptTemplate>,
}

pub struct ChatAtomicFlow {
    kernel: FlowKernel,
    backend: Box<dyn Backend>,
    prompts: ChatPrompts,
    demonstrations: Option<DemonstrationsDataset>,
}

impl std::fmt::Debug for ChatAtomicFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatAtomicFlow").field("name", &self.kernel.name()).finish_non_exhaustive()
    }
}

impl ChatAtomicFlow {
    pub fn required_config_keys() -> &'static [&'static str] {
        &["name", "description", "model_name", "generation_parameters"]
    }

    pub fn default_config() -> Value {
        json!({
            "name": "ChatAtomicFlow",
            "description": "Chat-oriented atomic flow backed by a chat-completion backend",
            "n_api_retries": 6,
            "wait_time_between_retries": 3.0,
            // el transcript debe sobrevivir entre llamadas de una interacción
            "clear_flow_namespace_on_run_end": false,
        })
    }

    pub fn from_config(config: FlowConfig,
                       backend: Box<dyn Backend>,
                       prompts: ChatPrompts,
                       demonstrations: Option<DemonstrationsDataset>)
                       -> Result<Self, FlowError> {
        Self::with_cache(config, backend, prompts, demonstrations, FlowCache::new())
    }

    /// Variante que comparte un cache existente entre flows.
    pub fn with_cache(config: FlowConfig,
                      backend: Box<dyn Backend>,
                      prompts: ChatPrompts,
                      demonstrations: Option<DemonstrationsDataset>,
                      cache: FlowCache)
                      -> Result<Self, FlowError> {
        if ["system", "user", "assistant"].contains(&config.name.as_str()) {
            return Err(FlowError::Config(format!("flow name `{}` cannot be a chat role name", config.name)));
        }
        if demonstrations.is_some() && prompts.demonstrations_response.is_none() {
            return Err(FlowError::Config("demonstrations require a demonstrations_response template".to_string()));
        }

        Ok(Self { kernel: FlowKernel::with_cache(config, cache),
                  backend,
                  prompts,
                  demonstrations })
    }

    /// Defaults del kind + overrides del llamador.
    pub fn instantiate_with_overrides(overrides: Value,
                                      backend: Box<dyn Backend>,
                                      prompts: ChatPrompts,
                                      demonstrations: Option<DemonstrationsDataset>)
                                      -> Result<Self, FlowError> {
        let config = FlowConfig::build(Self::default_config(), overrides, Self::required_config_keys())?;
        Self::from_config(config, backend, prompts, demonstrations)
    }

    /// Append validado: el rol llega como texto del llamador y se rechaza si
    /// no es uno de los tres reconocidos, sin tocar estado ni history.
    pub fn append_chat_message(&mut self, role: &str, content: &str) -> Result<(), FlowError> {
        let role = ChatRole::parse(role)?;
        self.kernel.append_chat_message(role, content);
        Ok(())
    }

    fn conversation_initialized(&self) -> bool {
        self.kernel
            .state
            .get(PREVIOUS_MESSAGES_KEY)
            .and_then(|v| v.as_array())
            .map(|items| !items.is_empty())
            .unwrap_or(false)
    }

    fn initialize_conversation(&mut self, input_data: &Payload) -> Result<(), FlowError> {
        let system_content = self.prompts.system.render(input_data)?;
        self.kernel.append_chat_message(ChatRole::System, &system_content);
        self.add_demonstrations()
    }

    fn add_demonstrations(&mut self) -> Result<(), FlowError> {
        let dataset = match &self.demonstrations {
            Some(dataset) => dataset,
            None => return Ok(()),
        };
        let response_template = match &self.prompts.demonstrations_response {
            Some(template) => template,
            None => return Ok(()),
        };
        let query_template = self.prompts.init_human.as_ref().unwrap_or(&self.prompts.human);

        let k = self.kernel
                    .config
                    .extra_u64("demonstrations_k")
                    .map(|v| v as usize)
                    .unwrap_or(usize::MAX);

        let mut rendered = Vec::new();
        for sample in dataset.samples().iter().take(k) {
            rendered.push((query_template.render(sample)?, response_template.render(sample)?));
        }
        for (query, response) in rendered {
            self.kernel.append_chat_message(ChatRole::User, &query);
            self.kernel.append_chat_message(ChatRole::Assistant, &response);
        }
        Ok(())
    }

    fn process_input(&mut self, input_data: &Payload) -> Result<(), FlowError> {
        let user_content = if self.conversation_initialized() {
            self.prompts.human.render(input_data)?
        } else {
            self.initialize_conversation(input_data)?;
            match &self.prompts.init_human {
                Some(template) => template.render(input_data)?,
                None => self.prompts.human.render(input_data)?,
            }
        };
        self.kernel.append_chat_message(ChatRole::User, &user_content);
        Ok(())
    }

    fn transcript(&self) -> Result<Vec<ChatMessage>, FlowError> {
        match self.kernel.state.get(PREVIOUS_MESSAGES_KEY) {
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| FlowError::Internal(e.to_string())),
            None => Ok(Vec::new()),
        }
    }

    fn call_backend(&self) -> Result<String, FlowError> {
        let backend_used = self.kernel
                               .backend_used()
                               .ok_or_else(|| FlowError::BackendNotConfigured("(backend_used not set)".to_string()))?;
        let api_information = self.kernel.api_information();
        let api = find_api_info(&api_information, &backend_used)?;

        let messages = self.transcript()?;
        let generation_parameters = self.kernel
                                        .config
                                        .extra("generation_parameters")
                                        .cloned()
                                        .unwrap_or(Value::Null);
        let n_api_retries = self.kernel.config.extra_u64("n_api_retries").unwrap_or(6) as u32;
        let wait = Duration::from_secs_f64(self.kernel
                                               .config
                                               .extra_f64("wait_time_between_retries")
                                               .unwrap_or(3.0));

        call_with_retries(self.backend.as_ref(), api, &messages, &generation_parameters, n_api_retries, wait)
    }
}

impl Flow for ChatAtomicFlow {
    fn kernel(&self) -> &FlowKernel {
        &self.kernel
    }

    fn kernel_mut(&mut self) -> &mut FlowKernel {
        &mut self.kernel
    }

    fn supports_caching(&self) -> bool {
        true
    }

    fn end_of_interaction_key(&self) -> Option<String> {
        self.kernel
            .config
            .extra_str("end_of_interaction_key")
            .map(str::to_string)
    }

    fn run(&mut self, input_data: &Payload) -> Result<Payload, FlowError> {
        self.process_input(input_data)?;

        let response = self.call_backend()?;
        self.kernel.append_chat_message(ChatRole::Assistant, &response);

        let mut output = Payload::new();
        output.insert("api_output".to_string(), Value::String(response));
        Ok(output)
    }
}
