use crate::config::PredictionConfig;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors returned by the prediction service
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Prediction request returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Prediction request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Prediction response contained no labels")]
    EmptyPrediction,
}

/// Labels an image
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Return the top label for the encoded image
    async fn classify(&self, image: &[u8]) -> Result<String, ClassifierError>;
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    payload: Vec<AnnotationPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotationPayload {
    display_name: String,
}

/// Client for an AutoML Vision image classification model
pub struct AutoMlClassifier {
    http: Client,
    predict_url: String,
    access_token: String,
}

impl AutoMlClassifier {
    pub fn new(config: &PredictionConfig) -> Result<Self, ClassifierError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            predict_url: format!(
                "{}/v1beta1/{}:predict",
                config.endpoint.trim_end_matches('/'),
                config.model_name()
            ),
            access_token: config.access_token.clone(),
        })
    }
}

#[async_trait]
impl Classifier for AutoMlClassifier {
    #[instrument(skip(self, image), fields(size_bytes = image.len()))]
    async fn classify(&self, image: &[u8]) -> Result<String, ClassifierError> {
        let body = serde_json::json!({
            "payload": {
                "image": { "imageBytes": STANDARD.encode(image) }
            }
        });

        let resp = self
            .http
            .post(&self.predict_url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClassifierError::Status { status, body });
        }

        let prediction: PredictResponse = resp.json().await?;
        let label = first_label(prediction)?;
        debug!(label = %label, "Image classified");

        Ok(label)
    }
}

/// Only the first payload entry counts; no thresholding
fn first_label(prediction: PredictResponse) -> Result<String, ClassifierError> {
    prediction
        .payload
        .into_iter()
        .next()
        .map(|p| p.display_name)
        .ok_or(ClassifierError::EmptyPrediction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn classifier_for(server: &MockServer) -> AutoMlClassifier {
        AutoMlClassifier::new(&PredictionConfig {
            endpoint: server.uri(),
            project_id: "nds".to_string(),
            model_id: "ICN123".to_string(),
            access_token: "ya29.token".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_first_label_wins() {
        let prediction: PredictResponse = serde_json::from_value(serde_json::json!({
            "payload": [
                { "displayName": "cat", "classification": { "score": 0.4 } },
                { "displayName": "dog", "classification": { "score": 0.9 } }
            ]
        }))
        .unwrap();

        assert_eq!(first_label(prediction).unwrap(), "cat");
    }

    #[test]
    fn test_empty_payload() {
        let prediction: PredictResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            first_label(prediction),
            Err(ClassifierError::EmptyPrediction)
        ));
    }

    #[tokio::test]
    async fn test_classify_posts_image_to_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/v1beta1/projects/nds/locations/us-central1/models/ICN123:predict",
            ))
            .and(header("Authorization", "Bearer ya29.token"))
            .and(body_json(serde_json::json!({
                "payload": { "image": { "imageBytes": "AQID" } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "payload": [{ "displayName": "selfie" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let label = classifier_for(&server).classify(&[1, 2, 3]).await.unwrap();
        assert_eq!(label, "selfie");
    }

    #[tokio::test]
    async fn test_classify_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not deployed"))
            .mount(&server)
            .await;

        let err = classifier_for(&server).classify(&[1]).await.unwrap_err();
        match err {
            ClassifierError::Status { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "model not deployed");
            }
            other => panic!("Expected Status, got {:?}", other),
        }
    }
}
