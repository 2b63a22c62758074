//! Client side of the feedback generator contract.

use std::time::Duration;

use async_trait::async_trait;
use feedgen_common::wire::{FeedbackListing, GenerateRequest, GenerationResult, ProgressReport};
use feedgen_common::{FeedgenError, Result};
use serde::de::DeserializeOwned;

/// The two remote operations the batch driver depends on.
#[async_trait]
pub trait FeedbackService: Send + Sync {
    async fn fetch_progress(&self) -> Result<ProgressReport>;
    async fn generate_batch(&self, count: u64) -> Result<GenerationResult>;
}

#[derive(Clone, Debug)]
pub struct HttpFeedbackService {
    http: reqwest::Client,
    base_url: String,
}

impl HttpFeedbackService {
    /// `timeout` of `None` keeps reqwest's default (no overall deadline).
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let http = builder.build().map_err(|e| FeedgenError::Transport(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn list_feedbacks(&self) -> Result<FeedbackListing> {
        let url = format!("{}/list", self.base_url);
        let resp = self.http.get(&url).send().await.map_err(transport)?;
        decode(resp).await
    }
}

#[async_trait]
impl FeedbackService for HttpFeedbackService {
    async fn fetch_progress(&self) -> Result<ProgressReport> {
        let url = format!("{}/progress", self.base_url);
        tracing::debug!(target: "client", "GET {}", url);
        let resp = self.http.get(&url).send().await.map_err(transport)?;
        decode::<ProgressReport>(resp).await?.into_checked()
    }

    async fn generate_batch(&self, count: u64) -> Result<GenerationResult> {
        let url = format!("{}/generate", self.base_url);
        tracing::debug!(target: "client", "POST {} count={}", url, count);
        let resp = self
            .http
            .post(&url)
            .json(&GenerateRequest { count })
            .send()
            .await
            .map_err(transport)?;
        decode(resp).await
    }
}

fn transport(e: reqwest::Error) -> FeedgenError {
    FeedgenError::Transport(e.to_string())
}

// The service reports failures as JSON with a 5xx status, so the body is
// decoded whatever the status.
async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    let bytes = resp.bytes().await.map_err(transport)?;
    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::warn!(target: "client", "undecodable body with status {}", status);
        FeedgenError::Format(format!("status {}: {}", status, e))
    })
}

#[cfg(feature = "mock")]
pub mod mock {
    //! Scripted in-memory service that records every call it receives.

    use std::collections::VecDeque;

    use tokio::sync::Mutex as AsyncMutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Step {
        /// Generate exactly what was asked for.
        Fulfil,
        /// Generate this many items whatever was asked for.
        Partial(u64),
        /// Answer `success: false` with this error.
        Reject(String),
        /// Fail before any response is read.
        Unreachable(String),
        /// Answer with a body that does not decode.
        Garbled,
    }

    struct State {
        count: u64,
        script: VecDeque<Step>,
        fallback: Step,
        generate_requests: Vec<u64>,
        progress_calls: usize,
        progress_fails_from: Option<usize>,
    }

    pub struct ScriptedService {
        state: AsyncMutex<State>,
    }

    impl ScriptedService {
        pub fn starting_at(count: u64) -> Self {
            Self {
                state: AsyncMutex::new(State {
                    count,
                    script: VecDeque::new(),
                    fallback: Step::Fulfil,
                    generate_requests: Vec::new(),
                    progress_calls: 0,
                    progress_fails_from: None,
                }),
            }
        }

        /// Queue an outcome for the next unscripted generate call.
        pub fn then(mut self, step: Step) -> Self {
            self.state.get_mut().script.push_back(step);
            self
        }

        /// Outcome once the script is exhausted.
        pub fn otherwise(mut self, step: Step) -> Self {
            self.state.get_mut().fallback = step;
            self
        }

        /// Progress calls with a zero-based index of `n` or more fail.
        pub fn progress_fails_from(mut self, n: usize) -> Self {
            self.state.get_mut().progress_fails_from = Some(n);
            self
        }

        pub async fn generate_requests(&self) -> Vec<u64> {
            self.state.lock().await.generate_requests.clone()
        }

        pub async fn progress_calls(&self) -> usize {
            self.state.lock().await.progress_calls
        }

        pub async fn count(&self) -> u64 {
            self.state.lock().await.count
        }
    }

    #[async_trait]
    impl FeedbackService for ScriptedService {
        async fn fetch_progress(&self) -> Result<ProgressReport> {
            let mut s = self.state.lock().await;
            let index = s.progress_calls;
            s.progress_calls += 1;
            if s.progress_fails_from.is_some_and(|n| index >= n) {
                return Err(FeedgenError::Transport("connection refused".into()));
            }
            Ok(ProgressReport::with_count(s.count))
        }

        async fn generate_batch(&self, count: u64) -> Result<GenerationResult> {
            let mut s = self.state.lock().await;
            s.generate_requests.push(count);
            let step = match s.script.pop_front() {
                Some(step) => step,
                None => s.fallback.clone(),
            };
            match step {
                Step::Fulfil => {
                    s.count += count;
                    Ok(GenerationResult::succeeded(count, s.count))
                }
                Step::Partial(n) => {
                    s.count += n;
                    Ok(GenerationResult::succeeded(n, s.count))
                }
                Step::Reject(msg) => Ok(GenerationResult::failed(msg)),
                Step::Unreachable(msg) => Err(FeedgenError::Transport(msg)),
                Step::Garbled => Err(FeedgenError::Format("expected value at line 1 column 1".into())),
            }
        }
    }
}
