//! Weights & Biases run tracking over its public HTTP API

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{RunHandle, RunPayload, TrackingBackend, TrackingError, TrackingResult};
use crate::config::TrackingConfig;

const HISTORY_FILE: &str = "wandb-history.jsonl";

const VIEWER_QUERY: &str = "query Viewer { viewer { id entity username } }";

const UPSERT_RUN_MUTATION: &str = "mutation UpsertBucket($name: String!, $project: String!, $entity: String!) {
  upsertBucket(input: {name: $name, modelName: $project, entityName: $entity}) {
    bucket { id name }
  }
}";

/// W&B client authenticating with an API key
pub struct WandbClient {
    api_key: String,
    base_url: String,
    entity: Option<String>,
    http_client: Client,
}

impl WandbClient {
    pub fn new(api_key: impl Into<String>) -> TrackingResult<Self> {
        Ok(Self {
            api_key: api_key.into(),
            base_url: "https://api.wandb.ai".to_string(),
            entity: None,
            http_client: build_http_client(10_000)?,
        })
    }

    /// Create from tracking settings
    pub fn from_config(config: &TrackingConfig, api_key: String) -> TrackingResult<Self> {
        let mut client = Self::new(api_key)?.with_base_url(&config.base_url);
        client.http_client = build_http_client(config.timeout_ms)?;
        if let Some(entity) = &config.entity {
            client = client.with_entity(entity);
        }
        Ok(client)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Log under this entity instead of the key owner's default
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http_client
            .post(format!("{}/{}", self.base_url, path))
            .basic_auth("api", Some(&self.api_key))
    }

    async fn graphql<T: DeserializeOwned>(&self, query: &str, variables: Value) -> TrackingResult<T> {
        let response = self
            .post("graphql")
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;
        let envelope: GraphQLResponse<T> = check_status(response).await?.json().await?;

        if let Some(error) = envelope.errors.into_iter().next() {
            return Err(TrackingError::GraphQL(error.message));
        }
        envelope
            .data
            .ok_or_else(|| TrackingError::GraphQL("response carried no data".to_string()))
    }

    async fn file_stream(&self, run: &RunHandle, body: Value) -> TrackingResult<()> {
        let path = format!("files/{}/{}/{}/file_stream", run.entity, run.project, run.run_id);
        let response = self.post(&path).json(&body).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

fn build_http_client(timeout_ms: u64) -> TrackingResult<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()?)
}

async fn check_status(response: reqwest::Response) -> TrackingResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(TrackingError::Auth(format!("HTTP {}: {}", status.as_u16(), message)));
    }
    Err(TrackingError::Api {
        status: status.as_u16(),
        message,
    })
}

#[derive(Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQLError>,
}

#[derive(Deserialize)]
struct GraphQLError {
    message: String,
}

#[derive(Deserialize)]
struct ViewerData {
    viewer: Option<Viewer>,
}

#[derive(Deserialize)]
struct Viewer {
    entity: Option<String>,
    username: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertData {
    upsert_bucket: Option<Value>,
}

/// One history line: the payload plus the step bookkeeping fields
fn history_line(run: &RunHandle, step: u64, payload: &RunPayload) -> String {
    let mut row = payload.clone();
    row.insert("_step".to_string(), json!(step));
    row.insert("_runtime".to_string(), json!(run.runtime_secs()));
    row.insert("_timestamp".to_string(), json!(Utc::now().timestamp_millis() as f64 / 1000.0));
    Value::Object(row).to_string()
}

#[async_trait]
impl TrackingBackend for WandbClient {
    fn name(&self) -> &str {
        "wandb"
    }

    async fn start_run(&self, project: &str) -> TrackingResult<RunHandle> {
        let viewer: ViewerData = self.graphql(VIEWER_QUERY, json!({})).await?;
        let viewer = viewer
            .viewer
            .ok_or_else(|| TrackingError::Auth("API key was not accepted".to_string()))?;

        let entity = self
            .entity
            .clone()
            .or(viewer.entity)
            .or(viewer.username)
            .ok_or_else(|| TrackingError::GraphQL("no entity for API key".to_string()))?;

        let started_at = Utc::now();
        let run_id = started_at.format("%Y%m%d-%H%M%S").to_string();

        let created: UpsertData = self
            .graphql(
                UPSERT_RUN_MUTATION,
                json!({ "name": run_id, "project": project, "entity": entity }),
            )
            .await?;
        if created.upsert_bucket.is_none() {
            return Err(TrackingError::GraphQL("run was not created".to_string()));
        }

        tracing::debug!(entity = %entity, project, run_id = %run_id, "wandb run created");

        Ok(RunHandle {
            entity,
            project: project.to_string(),
            run_id,
            started_at,
        })
    }

    async fn log(&self, run: &RunHandle, step: u64, payload: &RunPayload) -> TrackingResult<()> {
        let body = json!({
            "files": {
                HISTORY_FILE: {
                    "offset": step,
                    "content": [history_line(run, step, payload)],
                }
            }
        });
        self.file_stream(run, body).await
    }

    async fn finish(&self, run: &RunHandle, exit_code: i32) -> TrackingResult<()> {
        self.file_stream(run, json!({ "complete": true, "exitcode": exit_code }))
            .await
    }
}
