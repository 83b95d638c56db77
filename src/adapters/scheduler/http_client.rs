//! REST client for a QStash-style remote cron scheduler.
//!
//! Endpoints used:
//! - `POST   {base}/v2/schedules/{destination}` (cron + delivery options in headers)
//! - `GET    {base}/v2/schedules`
//! - `GET    {base}/v2/schedules/{id}`
//! - `DELETE {base}/v2/schedules/{id}`

use std::time::Duration;

use async_trait::async_trait;
use backoff::ExponentialBackoff;
use reqwest::{Client as ReqwestClient, Response, StatusCode};
use serde::Deserialize;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::SchedulerConfig;
use crate::domain::ports::{RemoteSchedule, RemoteScheduler, ScheduleRequest};

/// Connection settings for [`HttpScheduler`].
#[derive(Debug, Clone)]
pub struct HttpSchedulerConfig {
    /// Scheduler API root.
    pub base_url: String,
    /// Bearer token.
    pub token: Option<String>,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Upper bound on retrying transient API failures.
    pub max_retry_elapsed: Duration,
}

impl HttpSchedulerConfig {
    /// Client settings from config.
    pub fn from_settings(settings: &SchedulerConfig) -> DomainResult<Self> {
        let base_url = settings
            .base_url
            .clone()
            .ok_or_else(|| DomainError::Configuration("scheduler.base_url is not set".to_string()))?;
        Ok(Self {
            base_url,
            token: settings.token.clone(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            max_retry_elapsed: Duration::from_secs(settings.request_timeout_secs * 2),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateScheduleResponse {
    schedule_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleBody {
    schedule_id: String,
    destination: String,
    cron: String,
    #[serde(default)]
    is_paused: bool,
}

impl From<ScheduleBody> for RemoteSchedule {
    fn from(body: ScheduleBody) -> Self {
        Self {
            schedule_id: body.schedule_id,
            destination: body.destination,
            cron: body.cron,
            is_paused: body.is_paused,
        }
    }
}

/// REST client of the remote scheduler.
pub struct HttpScheduler {
    http_client: ReqwestClient,
    config: HttpSchedulerConfig,
}

impl HttpScheduler {
    /// Build the client.
    pub fn new(config: HttpSchedulerConfig) -> DomainResult<Self> {
        let http_client = ReqwestClient::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DomainError::ExternalService(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http_client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(200),
            max_elapsed_time: Some(self.config.max_retry_elapsed),
            ..ExponentialBackoff::default()
        }
    }

    /// Send with retries on connection errors and 5xx responses.
    async fn send<F>(&self, build: F) -> DomainResult<Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let build = &build;
        backoff::future::retry(self.backoff(), || async move {
            let response = self.authorized(build()).send().await.map_err(|e| {
                tracing::debug!(error = %e, "scheduler request failed, retrying");
                backoff::Error::transient(DomainError::ExternalService(e.to_string()))
            })?;
            if response.status().is_server_error() {
                let status = response.status();
                tracing::debug!(%status, "scheduler returned server error, retrying");
                return Err(backoff::Error::transient(DomainError::ExternalService(format!(
                    "scheduler returned {status}"
                ))));
            }
            Ok::<_, backoff::Error<DomainError>>(response)
        })
        .await
    }
}

async fn error_for(response: Response, action: &str) -> DomainError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    DomainError::ExternalService(format!("scheduler {action} failed with {status}: {body}"))
}

#[async_trait]
impl RemoteScheduler for HttpScheduler {
    async fn create_schedule(&self, request: &ScheduleRequest) -> DomainResult<String> {
        let url = self.url(&format!("schedules/{}", request.destination));
        let response = self
            .send(|| {
                let mut builder = self
                    .http_client
                    .post(&url)
                    .header("Content-Type", "application/json")
                    .header("Upstash-Cron", &request.cron)
                    .header("Upstash-Retries", request.retries.to_string())
                    .header("Upstash-Delay", format!("{}s", request.delay.as_secs()))
                    .json(&request.body);
                for (name, value) in &request.headers {
                    builder = builder.header(format!("Upstash-Forward-{name}"), value);
                }
                builder
            })
            .await?;

        if !response.status().is_success() {
            return Err(error_for(response, "create").await);
        }
        let created: CreateScheduleResponse = response
            .json()
            .await
            .map_err(|e| DomainError::ExternalService(format!("invalid create response: {e}")))?;

        tracing::info!(schedule_id = %created.schedule_id, cron = %request.cron, "remote schedule created");
        Ok(created.schedule_id)
    }

    async fn delete_schedule(&self, schedule_id: &str) -> DomainResult<()> {
        let url = self.url(&format!("schedules/{schedule_id}"));
        let response = self.send(|| self.http_client.delete(&url)).await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                tracing::debug!(schedule_id, "remote schedule already removed");
                Ok(())
            }
            _ => Err(error_for(response, "delete").await),
        }
    }

    async fn get_schedule(&self, schedule_id: &str) -> DomainResult<Option<RemoteSchedule>> {
        let url = self.url(&format!("schedules/{schedule_id}"));
        let response = self.send(|| self.http_client.get(&url)).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: ScheduleBody = response
                    .json()
                    .await
                    .map_err(|e| DomainError::ExternalService(format!("invalid schedule response: {e}")))?;
                Ok(Some(body.into()))
            }
            _ => Err(error_for(response, "lookup").await),
        }
    }

    async fn list_schedules(&self) -> DomainResult<Vec<RemoteSchedule>> {
        let url = self.url("schedules");
        let response = self.send(|| self.http_client.get(&url)).await?;

        if !response.status().is_success() {
            return Err(error_for(response, "list").await);
        }
        let bodies: Vec<ScheduleBody> = response
            .json()
            .await
            .map_err(|e| DomainError::ExternalService(format!("invalid schedule list: {e}")))?;
        Ok(bodies.into_iter().map(RemoteSchedule::from).collect())
    }
}
