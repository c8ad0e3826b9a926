use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    EssayResponse, MatchRequest, Scholarship, ScholarshipAnalysis, SpecificEssayRequest,
    StudentProfile, StudentScholarshipMatch,
};

/// The external catalog and AI endpoints this crate consumes.
pub trait ScholarshipApi: Send + Sync {
    fn list_scholarships(&self) -> impl Future<Output = ApiResult<Vec<Scholarship>>> + Send;

    fn get_scholarship(&self, id: &str) -> impl Future<Output = ApiResult<Scholarship>> + Send;

    fn analyze_scholarship(
        &self,
        scholarship: &Scholarship,
    ) -> impl Future<Output = ApiResult<ScholarshipAnalysis>> + Send;

    fn match_student(
        &self,
        request: &MatchRequest<'_>,
    ) -> impl Future<Output = ApiResult<StudentScholarshipMatch>> + Send;

    fn general_essay(
        &self,
        student: &StudentProfile,
    ) -> impl Future<Output = ApiResult<String>> + Send;

    fn specific_essay(
        &self,
        request: &SpecificEssayRequest<'_>,
    ) -> impl Future<Output = ApiResult<String>> + Send;
}

#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl From<&AppConfig> for ApiClientConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }
}

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: ApiClientConfig,
}

impl HttpBackend {
    pub fn new(config: ApiClientConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn map_send_error(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout(Duration::from_secs(self.config.timeout_secs))
        } else {
            ApiError::Network(err.to_string())
        }
    }

    async fn decode<T: DeserializeOwned>(&self, path: &str, response: Response) -> ApiResult<T> {
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(path.to_string()));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.map_send_error(e))?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        tracing::debug!(path, "GET");
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        self.decode(path, response).await
    }

    /// POST with up to `max_retries` extra attempts on transient failures.
    async fn post_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let mut attempt = 0u32;

        loop {
            tracing::debug!(path, attempt, "POST");
            let result = match self.client.post(self.url(path)).json(body).send().await {
                Ok(response) => self.decode(path, response).await,
                Err(e) => Err(self.map_send_error(e)),
            };

            match result {
                Err(err) if err.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let backoff_ms = self
                        .config
                        .retry_backoff_ms
                        .saturating_mul(1u64 << (attempt - 1).min(4))
                        .min(8_000);
                    tracing::warn!(
                        path,
                        attempt,
                        backoff_ms,
                        error = %err,
                        "retrying after backoff"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                other => return other,
            }
        }
    }
}

impl ScholarshipApi for HttpBackend {
    async fn list_scholarships(&self) -> ApiResult<Vec<Scholarship>> {
        self.get_json("/scholarships").await
    }

    async fn get_scholarship(&self, id: &str) -> ApiResult<Scholarship> {
        self.get_json(&format!("/scholarships/{id}"))
            .await
            .map_err(|err| match err {
                ApiError::NotFound(_) => ApiError::NotFound(id.to_string()),
                other => other,
            })
    }

    async fn analyze_scholarship(
        &self,
        scholarship: &Scholarship,
    ) -> ApiResult<ScholarshipAnalysis> {
        self.post_json("/analyze-scholarship", scholarship).await
    }

    async fn match_student(
        &self,
        request: &MatchRequest<'_>,
    ) -> ApiResult<StudentScholarshipMatch> {
        let matched: StudentScholarshipMatch = self.post_json("/match-student", request).await?;
        if matched.match_score > 100 {
            return Err(ApiError::Decode(format!(
                "match_score {} is outside 0-100",
                matched.match_score
            )));
        }
        Ok(matched)
    }

    async fn general_essay(&self, student: &StudentProfile) -> ApiResult<String> {
        let response: EssayResponse = self.post_json("/essay/general", student).await?;
        Ok(response.essay)
    }

    async fn specific_essay(&self, request: &SpecificEssayRequest<'_>) -> ApiResult<String> {
        let response: EssayResponse = self.post_json("/essay/specific", request).await?;
        Ok(response.essay)
    }
}
