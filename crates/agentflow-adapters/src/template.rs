//! Renderizado de prompts con variables nombradas.

use agentflow_core::{FlowError, Payload};
use serde_json::Value;

/// Template con variables declaradas estilo `{variable}`. Sólo las variables
/// declaradas se sustituyen; una variable declarada ausente del payload es
/// un error del llamador.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    input_variables: Vec<String>,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>, input_variables: &[&str]) -> Self {
        Self { template: template.into(),
               input_variables: input_variables.iter().map(|v| v.to_string()).collect() }
    }

    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    pub fn render(&self, payload: &Payload) -> Result<String, FlowError> {
        let mut rendered = self.template.clone();
        for variable in &self.input_variables {
            let value = payload.get(variable)
                               .ok_or_else(|| FlowError::MissingTemplateVar(variable.clone()))?;
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            rendered = rendered.replace(&format!("{{{variable}}}"), &text);
        }
        Ok(rendered)
    }
}
