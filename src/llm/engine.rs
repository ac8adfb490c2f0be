//! Query engine - fan out, join, then judge

use std::time::{Duration, Instant};

use crate::config::{Config, Credentials};
use crate::error::QueryError;
use crate::llm::dispatch::{Dispatcher, EndpointResponse};
use crate::llm::judge::{Judge, JudgeOutput};
use crate::llm::provider::{create_provider, LlmProvider};

/// Lifecycle of one query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Idle,
    Dispatching,
    Awaiting { pending: usize },
    Judging,
    Done,
    Failed,
}

/// Everything one query produced, including degraded-mode output on failure
#[derive(Debug)]
pub struct QueryReport {
    pub query: String,
    pub responses: Vec<EndpointResponse>,
    pub judge: String,
    pub outcome: std::result::Result<JudgeOutput, QueryError>,
    pub states: Vec<QueryState>,
    pub elapsed: Duration,
}

impl QueryReport {
    pub fn state(&self) -> QueryState {
        self.states.last().copied().unwrap_or(QueryState::Idle)
    }

    pub fn is_done(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn successes(&self) -> impl Iterator<Item = &EndpointResponse> {
        self.responses.iter().filter(|r| r.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &EndpointResponse> {
        self.responses.iter().filter(|r| !r.is_success())
    }
}

/// Owns the endpoint providers and the judge for the lifetime of the process
pub struct QueryEngine {
    dispatcher: Dispatcher,
    judge: Option<Judge>,
    /// Reported when the judge could not be built
    configured_judge: String,
}

impl QueryEngine {
    pub fn new(endpoints: Vec<Box<dyn LlmProvider>>, judge: Option<Box<dyn LlmProvider>>) -> Self {
        Self {
            dispatcher: Dispatcher::new(endpoints),
            judge: judge.map(Judge::new),
            configured_judge: "judge".to_string(),
        }
    }

    /// Build providers for every endpoint that has a credential
    pub fn from_config(config: &Config, credentials: &Credentials) -> Self {
        let endpoints = config
            .enabled_endpoints(credentials)
            .into_iter()
            .map(|endpoint| create_provider(endpoint, &config.system_prompt))
            .collect();

        let judge = match config.judge_endpoint(credentials) {
            Ok(endpoint) => Some(create_provider(endpoint, &config.system_prompt)),
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        };

        Self {
            configured_judge: config.judge.name.clone(),
            ..Self::new(endpoints, judge)
        }
    }

    pub fn endpoint_names(&self) -> Vec<&str> {
        self.dispatcher.endpoint_names()
    }

    pub fn judge_name(&self) -> &str {
        self.judge
            .as_ref()
            .map(|j| j.name())
            .unwrap_or(self.configured_judge.as_str())
    }

    /// Run one query to completion; endpoint and judge failures end up in the report
    pub async fn process(&self, query: &str) -> QueryReport {
        let start = Instant::now();
        let mut states = vec![QueryState::Idle];

        if self.dispatcher.is_empty() {
            states.push(QueryState::Failed);
            return self.report(query, start, Vec::new(), Err(QueryError::NoEndpointsEnabled), states);
        }
        let Some(judge) = &self.judge else {
            states.push(QueryState::Failed);
            let err = QueryError::JudgeNotConfigured(self.configured_judge.clone());
            return self.report(query, start, Vec::new(), Err(err), states);
        };

        states.push(QueryState::Dispatching);
        tracing::info!(endpoints = self.dispatcher.len(), "querying endpoints");
        states.push(QueryState::Awaiting {
            pending: self.dispatcher.len(),
        });
        let responses = self.dispatcher.dispatch(query).await;

        let successes: Vec<&EndpointResponse> = responses.iter().filter(|r| r.is_success()).collect();
        tracing::info!(
            succeeded = successes.len(),
            total = responses.len(),
            "all endpoints settled"
        );

        if successes.is_empty() {
            states.push(QueryState::Failed);
            let err = QueryError::NoSuccessfulResponses {
                failed: responses.len(),
            };
            return self.report(query, start, responses, Err(err), states);
        }

        states.push(QueryState::Judging);
        let outcome = judge.merge(query, &successes).await;

        match &outcome {
            Ok(_) => states.push(QueryState::Done),
            Err(e) => {
                tracing::error!("{}", e);
                states.push(QueryState::Failed);
            }
        }

        self.report(query, start, responses, outcome, states)
    }

    fn report(
        &self,
        query: &str,
        start: Instant,
        responses: Vec<EndpointResponse>,
        outcome: std::result::Result<JudgeOutput, QueryError>,
        states: Vec<QueryState>,
    ) -> QueryReport {
        QueryReport {
            query: query.to_string(),
            responses,
            judge: self.judge_name().to_string(),
            outcome,
            states,
            elapsed: start.elapsed(),
        }
    }
}
