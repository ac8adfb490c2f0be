//! Concurrent fan-out of one prompt to every enabled endpoint

use futures::future::join_all;
use std::time::{Duration, Instant};

use crate::error::QueryError;
use crate::llm::provider::LlmProvider;

/// Why an endpoint produced no text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Request,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    Success(String),
    Failed { kind: FailureKind, detail: String },
}

/// One endpoint's answer to one prompt
#[derive(Debug, Clone)]
pub struct EndpointResponse {
    pub endpoint: String,
    pub latency: Duration,
    pub outcome: ResponseOutcome,
}

impl EndpointResponse {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ResponseOutcome::Success(_))
    }

    pub fn text(&self) -> Option<&str> {
        match &self.outcome {
            ResponseOutcome::Success(text) => Some(text),
            ResponseOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ResponseOutcome::Success(_) => None,
            ResponseOutcome::Failed { detail, .. } => Some(detail),
        }
    }
}

/// Sends a prompt to all endpoints at once and waits for every one to settle
pub struct Dispatcher {
    providers: Vec<Box<dyn LlmProvider>>,
}

impl Dispatcher {
    pub fn new(providers: Vec<Box<dyn LlmProvider>>) -> Self {
        Self { providers }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn endpoint_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Responses come back in provider order regardless of completion order
    pub async fn dispatch(&self, prompt: &str) -> Vec<EndpointResponse> {
        let calls = self
            .providers
            .iter()
            .map(|provider| query_endpoint(provider.as_ref(), prompt));

        join_all(calls).await
    }
}

async fn query_endpoint(provider: &dyn LlmProvider, prompt: &str) -> EndpointResponse {
    let limit = provider.timeout();
    let start = Instant::now();

    let outcome = match tokio::time::timeout(limit, provider.generate(prompt)).await {
        Ok(Ok(text)) => ResponseOutcome::Success(text),
        Ok(Err(e)) => ResponseOutcome::Failed {
            kind: FailureKind::Request,
            detail: e.to_string(),
        },
        Err(_) => ResponseOutcome::Failed {
            kind: FailureKind::Timeout,
            detail: QueryError::EndpointTimeout {
                endpoint: provider.name().to_string(),
                timeout_secs: limit.as_secs(),
            }
            .to_string(),
        },
    };
    let latency = start.elapsed();

    match &outcome {
        ResponseOutcome::Success(text) => {
            tracing::info!(
                endpoint = provider.name(),
                latency_ms = latency.as_millis() as u64,
                chars = text.len(),
                "endpoint responded"
            );
        }
        ResponseOutcome::Failed { detail, .. } => {
            tracing::warn!(
                endpoint = provider.name(),
                latency_ms = latency.as_millis() as u64,
                "endpoint failed: {}",
                detail
            );
        }
    }

    EndpointResponse {
        endpoint: provider.name().to_string(),
        latency,
        outcome,
    }
}
