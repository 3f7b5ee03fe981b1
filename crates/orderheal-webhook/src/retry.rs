//! Retry scheduling
//!
//! A retry is the POS order id placed on the retry queue. The consumer that
//! re-runs order creation lives outside this crate. Duplicate messages are
//! possible if the queue redelivers.

use std::sync::Arc;
use tracing::info;

use crate::{ports::MessageQueue, Result};

pub struct RetryScheduler {
    queue: Arc<dyn MessageQueue>,
    queue_name: String,
}

impl RetryScheduler {
    pub fn new(queue: Arc<dyn MessageQueue>, queue_name: &str) -> Self {
        Self {
            queue,
            queue_name: queue_name.to_string(),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub async fn schedule_retry(&self, pos_order_id: &str) -> Result<()> {
        self.queue
            .publish(&self.queue_name, pos_order_id.as_bytes().to_vec())
            .await?;

        info!(
            pos_order_id = %pos_order_id,
            queue = %self.queue_name,
            "Order creation retry scheduled"
        );
        Ok(())
    }
}
