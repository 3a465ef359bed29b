use quill_core::LanguageModelError;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to parse response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid adapter configuration: {0}")]
    InvalidConfig(String),
    #[error("unexpected http status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("operation failed after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: usize,
        #[source]
        source: Box<AdapterError>,
    },
    #[error("API returned an empty response")]
    EmptyResponse,
}

impl AdapterError {
    pub fn retry_exhausted(attempts: usize, source: AdapterError) -> Self {
        AdapterError::RetryExhausted {
            attempts,
            source: Box::new(source),
        }
    }

    /// The innermost error once retry wrapping is peeled off.
    pub fn root(&self) -> &AdapterError {
        match self {
            AdapterError::RetryExhausted { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<AdapterError> for LanguageModelError {
    fn from(error: AdapterError) -> Self {
        LanguageModelError::new(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_unwraps_nested_retries() {
        let err = AdapterError::retry_exhausted(
            3,
            AdapterError::retry_exhausted(2, AdapterError::EmptyResponse),
        );
        assert!(matches!(err.root(), AdapterError::EmptyResponse));
        assert_eq!(
            err.to_string(),
            "operation failed after 3 attempts: operation failed after 2 attempts: API returned an empty response"
        );
    }

    #[test]
    fn converts_into_language_model_error() {
        let err: LanguageModelError = AdapterError::InvalidConfig("no model".into()).into();
        assert_eq!(err.to_string(), "invalid adapter configuration: no model");
    }
}
