pub type Result<T> = core::result::Result<T, FeedgenError>;

#[derive(thiserror::Error, Debug)]
pub enum FeedgenError {
    /// The request never produced a readable response.
    #[error("request failed: {0}")]
    Transport(String),
    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Format(String),
    /// The service answered but reported a failure.
    #[error("{0}")]
    Application(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("console write failed: {0}")]
    Io(#[from] std::io::Error),
}

pub mod wire {
    use serde::{Deserialize, Serialize};

    use crate::{FeedgenError, Result};

    /// Body of `GET /progress`.
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ProgressReport {
        #[serde(default)]
        pub count: u64,
        /// `"12.30%"` once items exist, the number `0` before that.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub progress: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub last_updated: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub error: Option<String>,
    }

    impl ProgressReport {
        pub fn with_count(count: u64) -> Self {
            Self { count, ..Self::default() }
        }

        /// A progress body carrying `error` is a service-side failure.
        pub fn into_checked(self) -> Result<Self> {
            match self.error {
                Some(err) => Err(FeedgenError::Application(err)),
                None => Ok(self),
            }
        }
    }

    /// Body of `POST /generate`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct GenerateRequest {
        pub count: u64,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct FeedbackItem {
        pub id: u64,
        pub feedback: String,
        pub timestamp: String,
    }

    /// Response of `POST /generate`.
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GenerationResult {
        pub success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub generated: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub total_count: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub feedbacks: Option<Vec<FeedbackItem>>,
    }

    /// What a successful batch tells the driver.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BatchOutcome {
        pub generated: u64,
        pub total_count: u64,
    }

    impl GenerationResult {
        pub fn succeeded(generated: u64, total_count: u64) -> Self {
            Self {
                success: true,
                generated: Some(generated),
                total_count: Some(total_count),
                ..Self::default()
            }
        }

        pub fn failed(error: impl Into<String>) -> Self {
            Self { success: false, error: Some(error.into()), ..Self::default() }
        }

        pub fn into_outcome(self) -> Result<BatchOutcome> {
            if !self.success {
                let msg = self.error.unwrap_or_else(|| "generation failed without an error message".into());
                return Err(FeedgenError::Application(msg));
            }
            let total_count = self
                .total_count
                .ok_or_else(|| FeedgenError::Format("successful result is missing totalCount".into()))?;
            Ok(BatchOutcome { generated: self.generated.unwrap_or(0), total_count })
        }
    }

    /// Body of `GET /list`.
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct FeedbackListing {
        pub count: u64,
        #[serde(default)]
        pub files: Vec<String>,
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn failed_result_carries_service_message() {
            let body = r#"{"success":false,"error":"rate limited","stack":"at worker.js"}"#;
            let result: GenerationResult = serde_json::from_str(body).unwrap();
            match result.into_outcome() {
                Err(FeedgenError::Application(msg)) => assert_eq!(msg, "rate limited"),
                other => panic!("expected application error, got {:?}", other),
            }
        }

        #[test]
        fn success_without_total_is_a_format_error() {
            let result: GenerationResult = serde_json::from_str(r#"{"success":true,"generated":4}"#).unwrap();
            assert!(matches!(result.into_outcome(), Err(FeedgenError::Format(_))));
        }

        #[test]
        fn progress_accepts_both_percentage_shapes() {
            let fresh: ProgressReport =
                serde_json::from_str(r#"{"count":0,"progress":0,"message":"No feedbacks generated yet"}"#).unwrap();
            assert_eq!(fresh.count, 0);
            let later: ProgressReport =
                serde_json::from_str(r#"{"count":123,"progress":"12.30%","lastUpdated":"2024-01-01T00:00:00Z"}"#)
                    .unwrap();
            assert_eq!(later.count, 123);
            assert_eq!(later.last_updated.as_deref(), Some("2024-01-01T00:00:00Z"));
        }

        #[test]
        fn progress_error_body_is_rejected() {
            let report: ProgressReport = serde_json::from_str(r#"{"error":"bucket unavailable"}"#).unwrap();
            assert!(matches!(report.into_checked(), Err(FeedgenError::Application(_))));
        }
    }
}

pub mod config {
    use serde::Deserialize;
    use std::env;
    use std::time::Duration;

    use crate::{FeedgenError, Result};

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    #[serde(default)]
    pub struct DriverConfig {
        pub base_url: String,
        pub target: u64,
        pub batch_size: u64,
        pub delay_secs: f64,
        pub timeout_secs: Option<u64>,
    }

    impl Default for DriverConfig {
        fn default() -> Self {
            Self {
                base_url: "http://localhost:8787".into(),
                target: 1000,
                batch_size: 10,
                delay_secs: 2.0,
                timeout_secs: None,
            }
        }
    }

    impl DriverConfig {
        pub fn load() -> Result<Self> {
            Self::from_lookup(|key| env::var(key).ok())
        }

        /// `FEEDGEN_CONFIG` points at a YAML file; otherwise individual
        /// `FEEDGEN_*` variables override the defaults.
        pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
            if let Some(path) = lookup("FEEDGEN_CONFIG") {
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| FeedgenError::Config(format!("cannot read {}: {}", path, e)))?;
                return Self::from_yaml(&text);
            }
            let mut cfg = Self::default();
            if let Some(v) = lookup("FEEDGEN_BASE_URL") { cfg.base_url = v; }
            if let Some(v) = lookup("FEEDGEN_TARGET") { cfg.target = parse_var("FEEDGEN_TARGET", &v)?; }
            if let Some(v) = lookup("FEEDGEN_BATCH_SIZE") { cfg.batch_size = parse_var("FEEDGEN_BATCH_SIZE", &v)?; }
            if let Some(v) = lookup("FEEDGEN_DELAY_SECS") { cfg.delay_secs = parse_var("FEEDGEN_DELAY_SECS", &v)?; }
            if let Some(v) = lookup("FEEDGEN_TIMEOUT_SECS") { cfg.timeout_secs = Some(parse_var("FEEDGEN_TIMEOUT_SECS", &v)?); }
            Ok(cfg)
        }

        pub fn from_yaml(text: &str) -> Result<Self> {
            serde_yaml::from_str(text).map_err(|e| FeedgenError::Config(e.to_string()))
        }

        pub fn validate(&self) -> Result<()> {
            if self.target == 0 {
                return Err(FeedgenError::Config("target must be greater than zero".into()));
            }
            if self.batch_size == 0 {
                return Err(FeedgenError::Config("batch_size must be greater than zero".into()));
            }
            if Duration::try_from_secs_f64(self.delay_secs).is_err() {
                return Err(FeedgenError::Config(format!("delay_secs must be a non-negative number of seconds that fits a Duration, got {}", self.delay_secs)));
            }
            if self.timeout_secs == Some(0) {
                return Err(FeedgenError::Config("timeout_secs must be greater than zero; leave it unset for no timeout".into()));
            }
            if self.base_url.trim().is_empty() {
                return Err(FeedgenError::Config("base_url is empty".into()));
            }
            Ok(())
        }

        pub fn delay(&self) -> Duration {
            // validate() rejects anything try_from_secs_f64 refuses.
            Duration::try_from_secs_f64(self.delay_secs).unwrap_or(Duration::MAX)
        }

        pub fn timeout(&self) -> Option<Duration> {
            self.timeout_secs.map(Duration::from_secs)
        }
    }

    fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
        value
            .trim()
            .parse()
            .map_err(|_| FeedgenError::Config(format!("{} has an invalid value: {:?}", key, value)))
    }
}
