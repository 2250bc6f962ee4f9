//! Processing queue dispatch.
//!
//! Accepted uploads are handed to the external face processing worker by
//! pushing the image id onto a managed queue. The HTTP layer only depends on
//! the [`ImageQueue`] trait; [`SqsImageQueue`] is the production
//! implementation.
//!
//! Delivery, ordering and retries belong to the broker and the worker. A push
//! either succeeds or surfaces a [`QueueError`] to the caller.

mod sqs;

use async_trait::async_trait;

use crate::error::QueueError;

pub use sqs::{create_sqs_client, SqsImageQueue};

/// Sink for image ids awaiting processing.
#[async_trait]
pub trait ImageQueue: Send + Sync {
    /// Push one image id. The message body is the id itself.
    async fn enqueue(&self, img_id: &str) -> Result<(), QueueError>;

    /// Name of the target queue, for logging.
    fn name(&self) -> &str;
}
