//! translate → validate → execute → summarize

use std::sync::Arc;
use std::time::Duration;

use saasight_duck::{
    validate, DataStore, ExecutionError, QueryExecutor, QueryResult, RejectedQuery, StoreError,
    ValidatedQuery,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::insight::InsightGenerator;
use crate::metrics::Metrics;
use crate::model::{LanguageModel, ModelConfig, OpenAiModel};
use crate::synth::QuerySynthesizer;
use crate::Source;

/// The only failures a caller ever sees. Model trouble is absorbed by the
/// fallbacks and never shows up here.
#[derive(Debug, Error)]
pub enum AskError {
    #[error("Query rejected: {0}")]
    Rejected(#[from] RejectedQuery),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub query: String,
    pub result: QueryResult,
    pub insight: String,
    pub query_source: Source,
    pub insight_source: Source,
}

pub struct AskPipeline {
    synthesizer: QuerySynthesizer,
    executor: QueryExecutor,
    insights: InsightGenerator,
    metrics: Option<Metrics>,
}

impl AskPipeline {
    pub fn new(
        synthesizer: QuerySynthesizer,
        executor: QueryExecutor,
        insights: InsightGenerator,
    ) -> Self {
        Self {
            synthesizer,
            executor,
            insights,
            metrics: None,
        }
    }

    /// Remote model when the config has a key, fallbacks only otherwise.
    pub fn from_config(config: &ModelConfig, store: Arc<dyn DataStore>) -> Self {
        match OpenAiModel::from_config(config) {
            Some(model) => {
                info!(model = %config.model, "Language model enabled");
                Self::with_model(Arc::new(model), config.timeout, store)
            }
            None => {
                warn!("No API key configured, answering with fallbacks only");
                Self::fallback_only(store)
            }
        }
    }

    /// Both model steps share one model.
    pub fn with_model(
        model: Arc<dyn LanguageModel>,
        timeout: Duration,
        store: Arc<dyn DataStore>,
    ) -> Self {
        Self::new(
            QuerySynthesizer::with_model(model.clone(), timeout),
            QueryExecutor::new(store),
            InsightGenerator::with_model(model, timeout),
        )
    }

    pub fn fallback_only(store: Arc<dyn DataStore>) -> Self {
        Self::new(
            QuerySynthesizer::fallback_only(),
            QueryExecutor::new(store),
            InsightGenerator::fallback_only(),
        )
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    /// Answer one question. The safety gate runs before the store is touched.
    pub async fn ask(&self, question: &str) -> Result<Answer, AskError> {
        let span = tracing::info_span!("ask", request_id = %Uuid::new_v4());
        self.ask_inner(question).instrument(span).await
    }

    async fn ask_inner(&self, question: &str) -> Result<Answer, AskError> {
        info!(question, "Question received");
        self.count(|m| &m.questions);

        let synthesized = self.synthesizer.synthesize(question).await;
        if synthesized.source == Source::Fallback {
            self.count(|m| &m.synthesis_fallbacks);
        }

        let validated = validate(&synthesized.query).map_err(|e| {
            error!(query = %synthesized.query, error = %e, "Safety gate rejected query");
            self.count(|m| &m.rejected_queries);
            e
        })?;

        let result = self.execute(&validated).await.map_err(|e| {
            self.count(|m| &m.execution_errors);
            e
        })?;
        info!(kind = ?result.kind, rows = result.row_count, "Query answered");

        let insight = self.insights.generate(question, &result).await;
        if insight.source == Source::Fallback {
            self.count(|m| &m.insight_fallbacks);
        }

        Ok(Answer {
            query: validated.into_string(),
            result,
            insight: insight.text,
            query_source: synthesized.source,
            insight_source: insight.source,
        })
    }

    /// Store calls block, so they run on tokio's blocking pool.
    async fn execute(&self, query: &ValidatedQuery) -> Result<QueryResult, ExecutionError> {
        let executor = self.executor.clone();
        let query = query.clone();
        tokio::task::spawn_blocking(move || executor.execute(&query))
            .await
            .map_err(|e| ExecutionError::from(StoreError::Interrupted(e.to_string())))?
    }

    fn count(&self, counter: impl Fn(&Metrics) -> &prometheus::IntCounter) {
        if let Some(metrics) = &self.metrics {
            counter(metrics).inc();
        }
    }
}
