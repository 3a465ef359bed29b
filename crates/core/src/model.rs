use std::error::Error as StdError;
use std::fmt;

use crate::logging::{LogLevel, LogRecord, LogSink};
use crate::text::strip_code_fences;

/// Error returned across the language model boundary. Adapters box their own
/// error types into it so the core crate stays free of HTTP concerns.
#[derive(Debug)]
pub struct LanguageModelError {
    inner: Box<dyn StdError + Send + Sync>,
}

impl LanguageModelError {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Box::new(error),
        }
    }

    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self {
            inner: message.into(),
        }
    }
}

impl fmt::Display for LanguageModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl StdError for LanguageModelError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.inner.as_ref())
    }
}

pub trait LanguageModel: Send + Sync {
    fn invoke(&self, prompt: &str) -> Result<String, LanguageModelError>;
}

impl<T: LanguageModel + ?Sized> LanguageModel for Box<T> {
    fn invoke(&self, prompt: &str) -> Result<String, LanguageModelError> {
        (**self).invoke(prompt)
    }
}

impl<T: LanguageModel + ?Sized> LanguageModel for &T {
    fn invoke(&self, prompt: &str) -> Result<String, LanguageModelError> {
        (**self).invoke(prompt)
    }
}

/// Calls the model until it returns non-empty text after code fences are
/// stripped.
///
/// Returns `Ok(String::new())` when every attempt came back empty. A model
/// error ends the loop at once: transport failures are already retried by the
/// HTTP adapters.
pub fn invoke_with_cleaning<M: LanguageModel + ?Sized>(
    model: &M,
    sink: &dyn LogSink,
    stage: &str,
    prompt: &str,
    max_retries: usize,
) -> Result<String, LanguageModelError> {
    let max_retries = max_retries.max(1);

    for attempt in 1..=max_retries {
        sink.log(LogRecord::new(
            LogLevel::Debug,
            format!("prompt sent to model ({stage}, attempt {attempt}):\n{prompt}"),
        ));

        match model.invoke(prompt) {
            Ok(response) => {
                sink.log(LogRecord::new(
                    LogLevel::Debug,
                    format!("model response ({stage}, attempt {attempt}):\n{response}"),
                ));
                let cleaned = strip_code_fences(&response);
                if !cleaned.is_empty() {
                    return Ok(cleaned);
                }
                sink.log(LogRecord::warn(format!(
                    "model returned an empty response ({stage}, attempt {attempt}/{max_retries})"
                )));
            }
            Err(err) => {
                sink.log(LogRecord::new(
                    LogLevel::Error,
                    format!("model call failed ({stage}): {err}"),
                ));
                return Err(err);
            }
        }
    }

    Ok(String::new())
}
