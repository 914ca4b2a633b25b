//! In-memory order cart for one kiosk session.
//!
//! Invariants: at most one entry per item id, and no entry ever holds a
//! quantity below 1. Decrements clamp at 1; only `remove` drops an entry.

use crate::menu::MenuItem;
use serde::{Deserialize, Serialize};

/// A cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub name: String,
    pub price: u64,
    pub quantity: u32,
}

impl OrderItem {
    pub fn line_total(&self) -> u64 {
        self.price.saturating_mul(u64::from(self.quantity))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderCart {
    items: Vec<OrderItem>,
}

impl OrderCart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert `item` to exactly `quantity`. A zero quantity is rejected and
    /// leaves the cart untouched; returns whether the cart changed shape or value.
    pub fn add_or_set_quantity(&mut self, item: &MenuItem, quantity: u32) -> bool {
        if quantity == 0 {
            return false;
        }
        match self.items.iter_mut().find(|line| line.id == item.id) {
            Some(line) => {
                let changed = line.quantity != quantity;
                line.quantity = quantity;
                changed
            }
            None => {
                self.items.push(OrderItem {
                    id: item.id.clone(),
                    name: item.name.clone(),
                    price: item.price,
                    quantity,
                });
                true
            }
        }
    }

    /// Add `item` at quantity 1 unless it is already in the cart.
    pub fn add_if_absent(&mut self, item: &MenuItem) -> bool {
        if self.contains(&item.id) {
            return false;
        }
        self.add_or_set_quantity(item, 1)
    }

    /// Shift an existing entry's quantity by `delta`, clamped to a minimum of 1.
    ///
    /// Returns the resulting quantity, or `None` when the id is not in the cart.
    /// Never creates and never removes entries.
    pub fn adjust_quantity(&mut self, id: &str, delta: i64) -> Option<u32> {
        let line = self.items.iter_mut().find(|line| line.id == id)?;
        let next = (i64::from(line.quantity) + delta).clamp(1, i64::from(u32::MAX));
        line.quantity = next as u32;
        Some(line.quantity)
    }

    /// Remove the entry with `id`. Absent ids are a no-op.
    pub fn remove(&mut self, id: &str) -> Option<OrderItem> {
        let index = self.items.iter().position(|line| line.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn total(&self) -> u64 {
        self.items
            .iter()
            .fold(0u64, |acc, line| acc.saturating_add(line.line_total()))
    }

    pub fn get(&self, id: &str) -> Option<&OrderItem> {
        self.items.iter().find(|line| line.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Names of the current entries, in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.items.iter().map(|line| line.name.clone()).collect()
    }

    /// Spoken summary, e.g. "불고기정식 2개, 김치찌개 1개. 총 42,000원입니다."
    pub fn summary(&self, empty_phrase: &str) -> String {
        if self.items.is_empty() {
            return empty_phrase.to_string();
        }
        let lines = self
            .items
            .iter()
            .map(|line| format!("{} {}개", line.name, line.quantity))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}. 총 {}원입니다.", lines, format_won(self.total()))
    }
}

/// Group digits by thousands: 42000 -> "42,000".
pub fn format_won(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
