//! Prometheus counters for the ask pipeline

use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub questions: IntCounter,
    pub synthesis_fallbacks: IntCounter,
    pub insight_fallbacks: IntCounter,
    pub rejected_queries: IntCounter,
    pub execution_errors: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let counter = |name: &str, help: &str| -> Result<IntCounter, prometheus::Error> {
            let c = IntCounter::new(name, help)?;
            registry.register(Box::new(c.clone()))?;
            Ok(c)
        };

        let questions = counter("saasight_questions_total", "Questions received")?;
        let synthesis_fallbacks = counter(
            "saasight_synthesis_fallbacks_total",
            "Questions answered with a pattern-matched query",
        )?;
        let insight_fallbacks = counter(
            "saasight_insight_fallbacks_total",
            "Insights produced from a template",
        )?;
        let rejected_queries = counter(
            "saasight_rejected_queries_total",
            "Queries stopped by the safety gate",
        )?;
        let execution_errors = counter(
            "saasight_execution_errors_total",
            "Queries that failed in the data store",
        )?;

        Ok(Self {
            registry,
            questions,
            synthesis_fallbacks,
            insight_fallbacks,
            rejected_queries,
            execution_errors,
        })
    }

    /// Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
