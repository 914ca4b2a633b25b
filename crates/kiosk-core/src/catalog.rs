//! Catalog collaborator: the store's menu, fetched by store name.
//!
//! Catalog entries are loosely shaped. Missing ids fall back to the name,
//! missing or malformed prices to 0, missing descriptions to empty.

use crate::error::{KioskError, KioskResult};
use crate::menu::{MenuBoard, MenuItem};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_menu(&self, store: &str) -> KioskResult<Vec<MenuItem>>;
}

/// Load the board for `store`, degrading to an empty board on any failure.
pub async fn load_board(source: &dyn CatalogSource, store: &str) -> MenuBoard {
    match source.fetch_menu(store).await {
        Ok(items) => {
            info!("📋 loaded {} menu items for {}", items.len(), store);
            MenuBoard::new(items)
        }
        Err(e) => {
            warn!("catalog unavailable for {}: {}", store, e);
            MenuBoard::default()
        }
    }
}

/// `GET {base}/api/menu?store=<name>`.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCatalog {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> KioskResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    async fn fetch_menu(&self, store: &str) -> KioskResult<Vec<MenuItem>> {
        let url = format!("{}/api/menu", self.base_url.trim_end_matches('/'));
        let res = self
            .client
            .get(&url)
            .query(&[("store", store)])
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(KioskError::Status {
                status: res.status().as_u16(),
                url,
            });
        }
        let body: Value = res.json().await?;
        parse_menu(&body)
    }
}

/// Accepts `{ "menu": [...] }` or a bare list.
pub fn parse_menu(body: &Value) -> KioskResult<Vec<MenuItem>> {
    let entries = match body {
        Value::Array(list) => list,
        Value::Object(map) => match map.get("menu").or_else(|| map.get("items")) {
            Some(Value::Array(list)) => list,
            _ => return Err(KioskError::Catalog("response has no menu list".to_string())),
        },
        _ => return Err(KioskError::Catalog("unexpected catalog payload".to_string())),
    };
    Ok(entries.iter().filter_map(parse_entry).collect())
}

fn parse_entry(entry: &Value) -> Option<MenuItem> {
    let name = entry.get("name")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }
    let id = match entry.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => name.to_string(),
    };
    let price = entry.get("price").map(parse_price).unwrap_or(0);
    let description = entry
        .get("description")
        .or_else(|| entry.get("desc"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    Some(MenuItem::new(id, name, price).with_description(description))
}

fn parse_price(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f > 0.0).map(|f| f.trunc() as u64))
            .unwrap_or(0),
        Value::String(s) => s
            .chars()
            .filter(char::is_ascii_digit)
            .collect::<String>()
            .parse()
            .unwrap_or(0),
        _ => 0,
    }
}
