use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::core::{
    domain::Language,
    traits::executor::{DispatchError, DispatchRequest, Dispatcher},
};

pub fn language_id(language: Language) -> u32 {
    match language {
        Language::Cpp => 54,
        Language::JavaScript => 63,
        Language::Python => 71,
        Language::Java => 62,
    }
}

#[derive(Debug, Serialize)]
struct CreateSubmission {
    source_code: String,
    language_id: u32,
    stdin: String,
    cpu_time_limit: f64,
    wall_time_limit: f64,
    callback_url: String,
}

#[derive(Debug, Deserialize)]
struct CreatedSubmission {
    token: String,
}

/// Dispatches test runs to a Judge0 instance. Results come back through
/// `PUT <callback_url>?submissionId=..&testCaseIndex=..`.
#[derive(Clone, Debug)]
pub struct Judge0Dispatcher {
    client: reqwest::Client,
    base_url: String,
    callback_url: String,
}

impl Judge0Dispatcher {
    /// `timeout` bounds both connecting and the whole create request.
    pub fn new(
        base_url: impl Into<String>,
        callback_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            callback_url: callback_url.into(),
        })
    }

    fn callback_for(&self, request: &DispatchRequest) -> Result<Url, DispatchError> {
        let mut url = Url::parse(&self.callback_url)
            .map_err(|e| DispatchError::InvalidCallbackUrl(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("submissionId", &request.submission_id.to_string())
            .append_pair("testCaseIndex", &request.test_case_index.to_string());
        Ok(url)
    }

    fn body_for(&self, request: &DispatchRequest) -> Result<CreateSubmission, DispatchError> {
        let limit_secs = request.time_limit_ms as f64 / 1000.0;
        Ok(CreateSubmission {
            source_code: STANDARD.encode(&request.code),
            language_id: language_id(request.language),
            stdin: STANDARD.encode(&request.stdin),
            cpu_time_limit: limit_secs,
            wall_time_limit: limit_secs,
            callback_url: self.callback_for(request)?.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Dispatcher for Judge0Dispatcher {
    #[tracing::instrument(skip_all, fields(submission_id = %request.submission_id, index = request.test_case_index))]
    async fn dispatch(&self, request: DispatchRequest) -> Result<String, DispatchError> {
        let body = self.body_for(&request)?;
        let url = format!(
            "{}/submissions?base64_encoded=true&wait=false",
            self.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let created: CreatedSubmission = response
            .json()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;
        tracing::debug!(token = %created.token, "Dispatched to remote judge");

        Ok(created.token)
    }
}
