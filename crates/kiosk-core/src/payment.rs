//! Payment collaborator: invoked only when an `ORDER` completes.
//!
//! The response is not interpreted beyond success or failure.

use crate::cart::{OrderCart, OrderItem};
use crate::error::{KioskError, KioskResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub store: String,
    pub items: Vec<OrderItem>,
}

impl OrderRequest {
    pub fn from_cart(store: &str, cart: &OrderCart) -> Self {
        Self {
            store: store.to_string(),
            items: cart.items().to_vec(),
        }
    }

    pub fn total(&self) -> u64 {
        self.items
            .iter()
            .fold(0u64, |acc, line| acc.saturating_add(line.line_total()))
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Submit the order. `Ok(())` means the backend accepted it.
    async fn submit(&self, order: &OrderRequest) -> KioskResult<()>;
}

#[derive(Deserialize)]
struct PaymentReply {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    success: Option<bool>,
}

/// `POST {base}/api/pay` with `{ store, items }`.
#[derive(Debug, Clone)]
pub struct HttpPayment {
    base_url: String,
    client: reqwest::Client,
}

impl HttpPayment {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> KioskResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPayment {
    async fn submit(&self, order: &OrderRequest) -> KioskResult<()> {
        let url = format!("{}/api/pay", self.base_url.trim_end_matches('/'));
        info!("💳 submitting order: {} lines, total {}", order.items.len(), order.total());
        let res = self.client.post(&url).json(order).send().await?;
        if !res.status().is_success() {
            return Err(KioskError::Status {
                status: res.status().as_u16(),
                url,
            });
        }
        // An empty or non-JSON body on a 2xx is still a success.
        let body = res.text().await?;
        let Ok(reply) = serde_json::from_str::<PaymentReply>(&body) else {
            return Ok(());
        };
        let declined = reply.success == Some(false)
            || reply
                .status
                .as_deref()
                .is_some_and(|s| !s.eq_ignore_ascii_case("success") && !s.eq_ignore_ascii_case("ok"));
        if declined {
            warn!("payment declined: {}", body);
            return Err(KioskError::Payment(format!("declined: {}", body)));
        }
        Ok(())
    }
}
