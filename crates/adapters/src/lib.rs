mod base_url;
mod error;
mod llm;
mod retry;

pub use base_url::{check_base_url, ollama_base_url};
pub use error::AdapterError;
pub use llm::{create_llm_adapter, create_llm_adapter_from_profile, SUPPORTED_INTERFACES};
pub use retry::{call_with_retry, RetryConfig};

pub use quill_core::config::{Config, ConfigStore, LlmConfig, NovelConfig};
pub use quill_core::{LanguageModel, LanguageModelError};
