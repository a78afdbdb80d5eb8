//! saasight question answering
//!
//! Turns a natural-language business question into a read-only query,
//! runs it through the safety gate and executor from `saasight-duck`, and
//! summarizes the result. Both language-model steps have a deterministic
//! fallback, so the pipeline answers even when the model is unreachable.

pub mod insight;
pub mod intent;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod prompt;
pub mod synth;

use serde::{Deserialize, Serialize};

pub use insight::{Insight, InsightFailure, InsightGenerator, Summarizer};
pub use intent::{classify, fallback_query, Intent};
pub use metrics::Metrics;
pub use model::{LanguageModel, ModelConfig, ModelError, OpenAiModel};
pub use pipeline::{Answer, AskError, AskPipeline};
pub use synth::{QuerySynthesizer, SynthesisFailure, Synthesized, Translator};

/// Which path produced a query or an insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// The language model.
    Model,
    /// The deterministic pattern matcher or template.
    Fallback,
}
