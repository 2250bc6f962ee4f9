use async_trait::async_trait;
use aws_sdk_sqs::Client;
use tracing::{debug, info};

use super::ImageQueue;
use crate::error::QueueError;

/// SQS-backed implementation of [`ImageQueue`].
///
/// The queue is declared once with `CreateQueue`, which is idempotent: an
/// existing queue with the same name is reused and its URL returned.
#[derive(Clone)]
pub struct SqsImageQueue {
    client: Client,
    name: String,
    url: String,
}

impl SqsImageQueue {
    /// Declare `name` on the broker and return a dispatcher bound to it.
    pub async fn declare(client: Client, name: impl Into<String>) -> Result<Self, QueueError> {
        let name = name.into();

        let output = client
            .create_queue()
            .queue_name(&name)
            .send()
            .await
            .map_err(|e| QueueError::Declare {
                queue: name.clone(),
                message: e.to_string(),
            })?;

        let url = output.queue_url().ok_or_else(|| QueueError::Declare {
            queue: name.clone(),
            message: "broker returned no queue URL".to_string(),
        })?;

        info!(queue = %name, url = %url, "Declared processing queue");

        Ok(Self {
            url: url.to_string(),
            client,
            name,
        })
    }

    /// Get the queue URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ImageQueue for SqsImageQueue {
    async fn enqueue(&self, img_id: &str) -> Result<(), QueueError> {
        let output = self
            .client
            .send_message()
            .queue_url(&self.url)
            .message_body(img_id)
            .send()
            .await
            .map_err(|e| QueueError::Send {
                img_id: img_id.to_string(),
                message: e.to_string(),
            })?;

        debug!(
            img_id = img_id,
            message_id = output.message_id().unwrap_or("-"),
            "Enqueued image"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Create an SQS client with optional custom endpoint and region.
///
/// Use a custom endpoint for SQS-compatible brokers like ElasticMQ or
/// LocalStack:
/// ```ignore
/// let client = create_sqs_client(Some("http://localhost:9324"), "us-east-1").await;
/// ```
///
/// Credentials come from the standard AWS provider chain.
pub async fn create_sqs_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;
    Client::new(&sdk_config)
}
