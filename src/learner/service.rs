//! Learner Sidecar Adapter
//!
//! HTTP client for the external learner service. Four endpoints mirror the
//! trait: /classify, /generate, /train, /initial_fit. Training gets its own
//! generous timeout since a fine-tune run can take minutes.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{
    CheckpointRef, ClassifyCriteria, Learner, LearnerError, TrainingExample,
};
use crate::config::{LearnerConfig, Persona};
use crate::platform::TimelineItem;

/// Learner sidecar client
#[derive(Clone)]
pub struct LearnerService {
    client: Client,
    train_client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    item: &'a TimelineItem,
    criteria: ClassifyCriteria,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    accepted: bool,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    item: &'a TimelineItem,
    persona: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    text: String,
}

#[derive(Serialize)]
struct TrainRequest<'a> {
    examples: &'a [TrainingExample],
}

#[derive(Serialize)]
struct InitialFitRequest<'a> {
    corpus: &'a [String],
}

#[derive(Deserialize)]
struct CheckpointResponse {
    checkpoint: String,
}

impl LearnerService {
    pub fn new(config: &LearnerConfig) -> Result<Self, LearnerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.call_timeout_secs))
            .build()
            .map_err(|e| LearnerError::Network(e.to_string()))?;
        let train_client = Client::builder()
            .timeout(Duration::from_secs(config.train_timeout_secs))
            .build()
            .map_err(|e| LearnerError::Network(e.to_string()))?;

        Ok(Self {
            client,
            train_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_json<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        client: &Client,
        url: String,
        body: &Req,
    ) -> Result<Resp, LearnerError> {
        let response = client.post(url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LearnerError::Service {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| LearnerError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl Learner for LearnerService {
    async fn classify(
        &self,
        item: &TimelineItem,
        criteria: ClassifyCriteria,
    ) -> Result<bool, LearnerError> {
        let response: ClassifyResponse = Self::post_json(
            &self.client,
            format!("{}/classify", self.base_url),
            &ClassifyRequest { item, criteria },
        )
        .await?;

        debug!(
            "classify item {} against {}: {}",
            item.id,
            criteria.as_str(),
            response.accepted
        );
        Ok(response.accepted)
    }

    async fn generate(
        &self,
        item: &TimelineItem,
        persona: &Persona,
    ) -> Result<String, LearnerError> {
        let response: GenerateResponse = Self::post_json(
            &self.client,
            format!("{}/generate", self.base_url),
            &GenerateRequest {
                item,
                persona: persona.render(),
            },
        )
        .await?;
        Ok(response.text)
    }

    async fn train(&self, examples: &[TrainingExample]) -> Result<CheckpointRef, LearnerError> {
        info!("submitting {} examples for training", examples.len());
        let response: CheckpointResponse = Self::post_json(
            &self.train_client,
            format!("{}/train", self.base_url),
            &TrainRequest { examples },
        )
        .await?;
        Ok(CheckpointRef(response.checkpoint))
    }

    async fn initial_fit(&self, corpus: &[String]) -> Result<CheckpointRef, LearnerError> {
        info!("submitting initial-fit corpus of {} documents", corpus.len());
        let response: CheckpointResponse = Self::post_json(
            &self.train_client,
            format!("{}/initial_fit", self.base_url),
            &InitialFitRequest { corpus },
        )
        .await?;
        Ok(CheckpointRef(response.checkpoint))
    }
}
