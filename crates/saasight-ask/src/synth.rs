//! Query synthesis: model translation with a pattern-matcher fallback
//!
//! [`QuerySynthesizer`] is a fall-through chain. The primary translator (the
//! language model) is tried once; on any failure the question goes to the
//! [`PatternTranslator`]. Nothing here validates the statement; that is the
//! safety gate's job, downstream.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::intent;
use crate::model::{complete_within, LanguageModel, ModelError};
use crate::prompt::{strip_code_fences, translation_prompt};
use crate::Source;

/// Why the primary translation path gave up. Always recovered locally.
#[derive(Debug, Error)]
pub enum SynthesisFailure {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Language model returned no SQL statement")]
    Malformed,
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, question: &str) -> Result<String, SynthesisFailure>;
}

/// Remote translation through a [`LanguageModel`].
pub struct ModelTranslator {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl ModelTranslator {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }
}

#[async_trait]
impl Translator for ModelTranslator {
    async fn translate(&self, question: &str) -> Result<String, SynthesisFailure> {
        let prompt = translation_prompt(question);
        let raw = complete_within(self.model.as_ref(), &prompt, self.timeout).await?;

        let sql = strip_code_fences(&raw);
        if sql.is_empty() {
            return Err(SynthesisFailure::Malformed);
        }

        info!(model = self.model.name(), sql, "Model generated SQL");
        Ok(sql.to_string())
    }
}

/// Local keyword matcher. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternTranslator;

impl PatternTranslator {
    pub fn query(&self, question: &str) -> String {
        let intent = intent::classify(question);
        debug!(?intent, "Question classified");
        intent.canned_query().to_string()
    }
}

#[async_trait]
impl Translator for PatternTranslator {
    async fn translate(&self, question: &str) -> Result<String, SynthesisFailure> {
        Ok(self.query(question))
    }
}

/// A statement plus the path that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesized {
    pub query: String,
    pub source: Source,
}

pub struct QuerySynthesizer {
    primary: Option<Box<dyn Translator>>,
    fallback: PatternTranslator,
}

impl QuerySynthesizer {
    pub fn new(primary: Option<Box<dyn Translator>>) -> Self {
        Self {
            primary,
            fallback: PatternTranslator,
        }
    }

    pub fn with_model(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self::new(Some(Box::new(ModelTranslator::new(model, timeout))))
    }

    /// Pattern matcher only.
    pub fn fallback_only() -> Self {
        Self::new(None)
    }

    /// Never fails: model errors fall through to the pattern matcher.
    pub async fn synthesize(&self, question: &str) -> Synthesized {
        if let Some(primary) = &self.primary {
            match primary.translate(question).await {
                Ok(query) => {
                    return Synthesized {
                        query,
                        source: Source::Model,
                    }
                }
                Err(e) => warn!(error = %e, "Model unavailable, using fallback query"),
            }
        }

        let query = self.fallback.query(question);
        Synthesized {
            query,
            source: Source::Fallback,
        }
    }

    pub fn fallback(&self) -> &PatternTranslator {
        &self.fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replies with a fixed string and records prompts.
    struct Scripted {
        reply: Result<String, ()>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for Scripted {
        async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply
                .clone()
                .map_err(|_| ModelError::Unavailable("scripted failure".to_string()))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_model_output_is_cleaned() {
        let model = Scripted::replying("```sql\nSELECT plan_type FROM users LIMIT 100\n```");
        let synth = QuerySynthesizer::with_model(model.clone(), TIMEOUT);

        let out = synth.synthesize("Which plans exist?").await;
        assert_eq!(out.source, Source::Model);
        assert_eq!(out.query, "SELECT plan_type FROM users LIMIT 100");

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Which plans exist?"));
    }

    #[tokio::test]
    async fn test_model_failure_falls_back_to_pattern() {
        let synth = QuerySynthesizer::with_model(Scripted::failing(), TIMEOUT);
        let out = synth.synthesize("How many users?").await;
        assert_eq!(out.source, Source::Fallback);
        assert_eq!(out.query, "SELECT COUNT(*) AS total_users FROM users");
    }

    #[tokio::test]
    async fn test_blank_model_output_falls_back() {
        let synth = QuerySynthesizer::with_model(Scripted::replying("```\n\n```"), TIMEOUT);
        let out = synth.synthesize("What's our MRR?").await;
        assert_eq!(out.source, Source::Fallback);
        assert!(out.query.contains("SUM(mrr)"));
    }

    #[tokio::test]
    async fn test_model_output_is_not_validated_here() {
        let synth =
            QuerySynthesizer::with_model(Scripted::replying("DROP TABLE users"), TIMEOUT);
        let out = synth.synthesize("How many users?").await;
        assert_eq!(out.source, Source::Model);
        assert_eq!(out.query, "DROP TABLE users");
    }

    #[tokio::test]
    async fn test_fallback_only() {
        let synth = QuerySynthesizer::fallback_only();
        let out = synth.synthesize("Which features are most popular?").await;
        assert_eq!(out.source, Source::Fallback);
        assert!(out.query.contains("FROM events"));

        let direct = synth.fallback().translate("Which features are most popular?").await;
        assert_eq!(direct.unwrap(), out.query);
    }
}
