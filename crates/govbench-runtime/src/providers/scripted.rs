//! Offline provider that answers from a script instead of a model.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Generation, GenerationConfig, ProviderError, TextGenerator, TokenUsage};

type Responder = dyn Fn(&str, usize) -> Result<String, ProviderError> + Send + Sync;

/// A [`TextGenerator`] driven by a closure of `(prompt, call_index)`.
///
/// Every prompt it receives is recorded, so callers can inspect exactly what
/// the pipeline sent.
pub struct ScriptedGenerator {
    responder: Box<Responder>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&str, usize) -> Result<String, ProviderError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Return the same text for every prompt.
    pub fn always(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::from_fn(move |_, _| Ok(text.clone()))
    }

    /// Replay replies in call order, repeating the last one once exhausted.
    /// An `Err` entry becomes an HTTP failure with that message.
    pub fn sequence(replies: Vec<Result<String, String>>) -> Self {
        Self::from_fn(move |_, index| {
            let reply = replies
                .get(index)
                .or_else(|| replies.last())
                .cloned()
                .unwrap_or_else(|| Ok(String::new()));
            reply.map_err(ProviderError::HttpError)
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

impl std::fmt::Debug for ScriptedGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedGenerator")
            .field("calls", &self.calls())
            .finish()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<Generation, ProviderError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());

        let text = (self.responder)(prompt, index)?;
        Ok(Generation {
            usage: TokenUsage {
                prompt_tokens: (prompt.len() / 4) as u32,
                completion_tokens: (text.len() / 4) as u32,
            },
            text,
            model: config.model.clone(),
            finish_reason: Some("STOP".to_string()),
        })
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequence_repeats_last_reply() {
        let generator = ScriptedGenerator::sequence(vec![Err("boom".into()), Ok("{}".into())]);
        let config = GenerationConfig::default();

        assert!(generator.generate("a", &config).await.is_err());
        assert_eq!(generator.generate("b", &config).await.unwrap().text, "{}");
        assert_eq!(generator.generate("c", &config).await.unwrap().text, "{}");
        assert_eq!(generator.calls(), 3);
        assert_eq!(generator.prompts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_responder_sees_prompt() {
        let generator = ScriptedGenerator::from_fn(|prompt, _| Ok(prompt.to_uppercase()));
        let generation = generator.generate("hi", &GenerationConfig::new("m")).await.unwrap();
        assert_eq!(generation.text, "HI");
        assert_eq!(generation.model, "m");
    }
}
