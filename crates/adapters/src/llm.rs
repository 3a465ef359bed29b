use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use reqwest::header::{self, HeaderValue};
use serde::{Deserialize, Serialize};

use quill_core::{Config, LanguageModel, LanguageModelError, LlmConfig};

use crate::base_url::{check_base_url, ollama_base_url};
use crate::error::AdapterError;
use crate::retry::{call_with_retry, RetryConfig};

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a skilled novelist and editor. Follow the instructions exactly and return only the requested text.";

/// Interface formats understood by `create_llm_adapter_from_profile`.
pub const SUPPORTED_INTERFACES: &[&str] = &[
    "ollama",
    "openai",
    "openai-compatible",
    "lmstudio",
    "llama.cpp",
    "deepseek",
    "vllm",
];

pub fn create_llm_adapter(
    config: &Config,
    profile_name: &str,
) -> Result<Box<dyn LanguageModel>, AdapterError> {
    let profile = config.get_llm_profile(profile_name).ok_or_else(|| {
        AdapterError::InvalidConfig(format!("unknown LLM profile `{}`", profile_name))
    })?;
    create_llm_adapter_from_profile(profile)
}

pub fn create_llm_adapter_from_profile(
    profile: &LlmConfig,
) -> Result<Box<dyn LanguageModel>, AdapterError> {
    let fmt = profile.interface_format.trim().to_lowercase();

    let default_base = match fmt.as_str() {
        "ollama" => return Ok(Box::new(OllamaAdapter::new(profile)?)),
        "openai" => "https://api.openai.com/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "lmstudio" | "lm studio" => "http://localhost:1234/v1",
        "llama.cpp" | "llamacpp" => "http://localhost:8080/v1",
        "vllm" => "http://localhost:8000/v1",
        "openai-compatible" | "openai_compatible" => "",
        other => {
            return Err(AdapterError::InvalidConfig(format!(
                "unknown interface_format `{}` (supported: {})",
                other,
                SUPPORTED_INTERFACES.join(", ")
            )))
        }
    };
    Ok(Box::new(OpenAiLikeAdapter::new(profile, default_base)?))
}

fn build_client(timeout_secs: u64) -> Result<Client, AdapterError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()?)
}

fn require_model_name(profile: &LlmConfig) -> Result<String, AdapterError> {
    let name = profile.model_name.trim();
    if name.is_empty() {
        return Err(AdapterError::InvalidConfig(
            "model_name must not be empty".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Chat completions backend shared by OpenAI and the servers that mimic it.
struct OpenAiLikeAdapter {
    client: Client,
    url: String,
    api_key: Option<String>,
    model_name: String,
    max_tokens: Option<u32>,
    temperature: f32,
    system_prompt: String,
    retry: RetryConfig,
}

impl OpenAiLikeAdapter {
    fn new(profile: &LlmConfig, default_base: &str) -> Result<Self, AdapterError> {
        let raw_base = if profile.base_url.trim().is_empty() {
            default_base
        } else {
            profile.base_url.as_str()
        };
        let base_url = check_base_url(raw_base);
        if base_url.is_empty() {
            return Err(AdapterError::InvalidConfig(format!(
                "base_url must be set for interface `{}`",
                profile.interface_format
            )));
        }

        Ok(Self {
            client: build_client(profile.timeout)?,
            url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: profile.resolved_api_key(),
            model_name: require_model_name(profile)?,
            max_tokens: (profile.max_tokens > 0).then_some(profile.max_tokens),
            temperature: profile.temperature,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            retry: RetryConfig::from_profile(profile),
        })
    }

    fn invoke_once(&self, prompt: &str) -> Result<String, AdapterError> {
        let body = ChatCompletionRequest {
            model: &self.model_name,
            messages: vec![
                ChatMessageRequest {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessageRequest {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
        };

        let mut request = self.client.post(&self.url).header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!("POST {} (model {})", self.url, self.model_name);
        let response = request.json(&body).send()?;
        handle_chat_response(response)
    }

    fn complete(&self, prompt: &str) -> Result<String, AdapterError> {
        call_with_retry(|| self.invoke_once(prompt), &self.retry)
    }
}

impl LanguageModel for OpenAiLikeAdapter {
    fn invoke(&self, prompt: &str) -> Result<String, LanguageModelError> {
        Ok(self.complete(prompt)?)
    }
}

/// Native Ollama `/api/generate` backend.
struct OllamaAdapter {
    client: Client,
    url: String,
    model_name: String,
    options: OllamaOptions,
    retry: RetryConfig,
}

impl OllamaAdapter {
    const DEFAULT_BASE: &'static str = "http://localhost:11434";

    fn new(profile: &LlmConfig) -> Result<Self, AdapterError> {
        let base = match ollama_base_url(&profile.base_url) {
            base if base.is_empty() => Self::DEFAULT_BASE.to_string(),
            base => base,
        };

        Ok(Self {
            client: build_client(profile.timeout)?,
            url: format!("{base}/api/generate"),
            model_name: require_model_name(profile)?,
            options: OllamaOptions {
                temperature: profile.temperature,
                num_predict: (profile.max_tokens > 0).then_some(profile.max_tokens),
            },
            retry: RetryConfig::from_profile(profile),
        })
    }

    fn invoke_once(&self, prompt: &str) -> Result<String, AdapterError> {
        let body = OllamaGenerateRequest {
            model: &self.model_name,
            prompt,
            stream: false,
            options: &self.options,
        };

        debug!("POST {} (model {})", self.url, self.model_name);
        let response = self.client.post(&self.url).json(&body).send()?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(AdapterError::HttpStatus { status, body });
        }

        let parsed: OllamaGenerateResponse = response.json()?;
        parsed
            .response
            .filter(|text| !text.trim().is_empty())
            .ok_or(AdapterError::EmptyResponse)
    }

    fn complete(&self, prompt: &str) -> Result<String, AdapterError> {
        call_with_retry(|| self.invoke_once(prompt), &self.retry)
    }
}

impl LanguageModel for OllamaAdapter {
    fn invoke(&self, prompt: &str) -> Result<String, LanguageModelError> {
        Ok(self.complete(prompt)?)
    }
}

fn handle_chat_response(response: reqwest::blocking::Response) -> Result<String, AdapterError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().unwrap_or_default();
        return Err(AdapterError::HttpStatus { status, body });
    }

    let parsed: ChatCompletionResponse = response.json()?;
    extract_choice_content(parsed).ok_or(AdapterError::EmptyResponse)
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessageRequest<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessageRequest<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

fn extract_choice_content(response: ChatCompletionResponse) -> Option<String> {
    response.choices.into_iter().find_map(|choice| {
        choice
            .message
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .or_else(|| choice.text.filter(|text| !text.trim().is_empty()))
    })
}

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    response: Option<String>,
}
