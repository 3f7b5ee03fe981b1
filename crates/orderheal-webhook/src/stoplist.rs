//! Stop-list correction
//!
//! Takes a product or attribute named in a POS error off sale.

use orderheal_core::{Order, Store};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    catalog::ErrorSolution,
    ports::{StopListClient, StopListNotifier},
    WebhookError,
};

#[derive(Error, Debug)]
pub enum StopListError {
    #[error("Unsupported error code for stop-list correction: {0}")]
    UnsupportedErrorCode(String),

    #[error("Error code {0} is configured as both a product and an attribute code")]
    OverlappingCode(String),

    #[error(transparent)]
    Client(#[from] WebhookError),
}

/// What a stop-list error code points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopListTarget {
    Product,
    Attribute,
}

/// Disjoint product and attribute error-code sets
#[derive(Debug, Clone, Default)]
pub struct StopListCodes {
    product: HashSet<String>,
    attribute: HashSet<String>,
}

impl StopListCodes {
    pub fn new<P, A>(product: P, attribute: A) -> Result<Self, StopListError>
    where
        P: IntoIterator<Item = String>,
        A: IntoIterator<Item = String>,
    {
        let product: HashSet<String> = product.into_iter().collect();
        let attribute: HashSet<String> = attribute.into_iter().collect();

        if let Some(code) = product.intersection(&attribute).next() {
            return Err(StopListError::OverlappingCode(code.clone()));
        }

        Ok(Self { product, attribute })
    }

    pub fn target(&self, code: &str) -> Option<StopListTarget> {
        if self.product.contains(code) {
            Some(StopListTarget::Product)
        } else if self.attribute.contains(code) {
            Some(StopListTarget::Attribute)
        } else {
            None
        }
    }
}

/// Sent to the stop-list notification sink after a correction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopListNotice {
    pub store_id: String,
    pub store_name: String,
    pub target: StopListTarget,
    pub item_id: String,
    pub item_name: Option<String>,
    pub error_code: String,
    pub pos_order_id: String,
}

pub struct StopListCorrector {
    client: Arc<dyn StopListClient>,
    notifier: Arc<dyn StopListNotifier>,
    codes: StopListCodes,
}

impl StopListCorrector {
    pub fn new(
        client: Arc<dyn StopListClient>,
        notifier: Arc<dyn StopListNotifier>,
        codes: StopListCodes,
    ) -> Self {
        Self {
            client,
            notifier,
            codes,
        }
    }

    /// Put `extracted_id` on the store's stop-list.
    ///
    /// Fails loudly for codes outside both sets. The follow-up notice is
    /// best-effort and never fails the correction.
    pub async fn correct(
        &self,
        store: &Store,
        extracted_id: &str,
        solution: &ErrorSolution,
        order: &Order,
    ) -> Result<(), StopListError> {
        let target = self
            .codes
            .target(&solution.code)
            .ok_or_else(|| StopListError::UnsupportedErrorCode(solution.code.clone()))?;

        let ids = vec![extracted_id.to_string()];
        match target {
            StopListTarget::Product => self.client.stop_products(store, &ids).await?,
            StopListTarget::Attribute => self.client.stop_attributes(store, &ids).await?,
        }

        info!(
            store_id = %store.id,
            item_id = %extracted_id,
            target = ?target,
            error_code = %solution.code,
            "Item put on stop-list"
        );

        if solution.send_to_telegram {
            let notice = StopListNotice {
                store_id: store.id.clone(),
                store_name: store.name.clone(),
                target,
                item_id: extracted_id.to_string(),
                item_name: order.item_name(extracted_id).map(String::from),
                error_code: solution.code.clone(),
                pos_order_id: order.pos_order_id.clone(),
            };

            if let Err(e) = self.notifier.notify(&notice).await {
                warn!(store_id = %store.id, error = %e, "Failed to send stop-list notice");
            }
        }

        Ok(())
    }
}
