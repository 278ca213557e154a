//! Adaptador de backend: la llamada externa de chat-completion.
//!
//! El core consume esta interfaz angosta y trata cualquier error como
//! reintentable hasta agotar el presupuesto de intentos; el error del último
//! intento sube sin modificar, con su tipo y mensaje originales.

use std::time::Duration;

use agentflow_core::{ApiInfo, BackendError, ChatRole, FlowError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mensaje con rol de un transcript de conversación.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Backend de chat-completion: recibe el transcript completo y los
/// parámetros de generación, devuelve una única respuesta textual.
pub trait Backend {
    fn call(&self, api: &ApiInfo, messages: &[ChatMessage], generation_parameters: &Value) -> Result<String, BackendError>;
}

/// Resuelve la credencial por igualdad exacta del identificador de backend.
pub fn find_api_info<'a>(api_information: &'a [ApiInfo], backend_used: &str) -> Result<&'a ApiInfo, FlowError> {
    api_information.iter()
                   .find(|api| api.backend_used == backend_used)
                   .ok_or_else(|| FlowError::BackendNotConfigured(backend_used.to_string()))
}

/// Llama al backend hasta `n_api_retries` veces con una espera fija entre
/// intentos. Sin backoff exponencial ni jitter: simplicidad deliberada.
pub fn call_with_retries(backend: &dyn Backend,
                         api: &ApiInfo,
                         messages: &[ChatMessage],
                         generation_parameters: &Value,
                         n_api_retries: u32,
                         wait_between_retries: Duration)
                         -> Result<String, FlowError> {
    let attempts = n_api_retries.max(1);
    let mut attempt = 1;
    loop {
        match backend.call(api, messages, generation_parameters) {
            Ok(response) => return Ok(response),
            Err(error) => {
                log::error!("error {attempt} in calling backend `{}`: {error}; retrying in {:?}",
                            api.backend_used,
                            wait_between_retries);
                if attempt >= attempts {
                    return Err(error.into());
                }
                attempt += 1;
                std::thread::sleep(wait_between_retries);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FailingBackend {
        succeed_after: u32,
        attempts: AtomicU32,
    }

    impl Backend for FailingBackend {
        fn call(&self, _api: &ApiInfo, _messages: &[ChatMessage], _params: &Value) -> Result<String, BackendError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt >= self.succeed_after {
                Ok(format!("ok after {attempt}"))
            } else {
                Err(BackendError::Transient(format!("boom {attempt}")))
            }
        }
    }

    fn api() -> ApiInfo {
        ApiInfo { backend_used: "openai".to_string(),
                  api_key: "sk-test".to_string(),
                  endpoint: None }
    }

    #[test]
    fn retries_until_success_within_attempt_limit() {
        let backend = FailingBackend { succeed_after: 3, attempts: AtomicU32::new(0) };
        let out = call_with_retries(&backend, &api(), &[], &Value::Null, 3, Duration::ZERO).unwrap();
        assert_eq!(out, "ok after 3");
        assert_eq!(backend.attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn the_last_error_is_raised_unchanged() {
        let backend = FailingBackend { succeed_after: 10, attempts: AtomicU32::new(0) };
        let err = call_with_retries(&backend, &api(), &[], &Value::Null, 2, Duration::ZERO).unwrap_err();
        match err {
            FlowError::Backend(BackendError::Transient(msg)) => assert_eq!(msg, "boom 2"),
            other => panic!("expected the backend error unchanged, got {other:?}"),
        }
        assert_eq!(backend.attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missing_credential_is_reported_by_name() {
        let err = find_api_info(&[api()], "azure").unwrap_err();
        assert!(matches!(err, FlowError::BackendNotConfigured(name) if name == "azure"));
    }
}
