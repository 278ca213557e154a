//! Errores específicos del core de flows.
//!
//! Taxonomía (ver diseño): errores de configuración y topología se levantan
//! en construcción y nunca se reintentan; errores de estado se levantan en el
//! sitio de llamada; el error de backend conserva el tipo y mensaje original
//! tras agotar los reintentos (wrapping transparente, sin envolver el texto).

use thiserror::Error;

/// Error de un backend externo de chat-completion. El core trata ambas
/// variantes como reintetables hasta agotar el presupuesto de intentos.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("transient backend error: {0}")]
    Transient(String),
    #[error("permanent backend error: {0}")]
    Permanent(String),
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("flow kind declares no required config keys")]
    NoRequiredConfigKeys,
    #[error("`{0}` is a required parameter in the flow config")]
    MissingConfigKey(String),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("invalid topology: {0}")]
    InvalidTopology(String),
    #[error("end-of-interaction key `{0}` is not among the generator's declared outputs")]
    InvalidEoiKey(String),
    #[error("state update called with an empty payload")]
    EmptyStateUpdate,
    #[error("key `{0}` not found in the flow state")]
    StateKeyMissing(String),
    #[error("invalid chat role `{0}`: expected one of `system`, `user`, `assistant`")]
    InvalidRole(String),
    #[error("expected an input message, got `{0}`")]
    InvalidInputMessage(&'static str),
    #[error("flow `{0}` does not support caching, but enable_cache is set")]
    CachingUnsupported(String),
    #[error("no credential configured for backend `{0}`")]
    BackendNotConfigured(String),
    #[error("template variable `{0}` missing from the payload")]
    MissingTemplateVar(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("internal: {0}")]
    Internal(String),
}
