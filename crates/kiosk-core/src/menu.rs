//! Menu items and the per-turn menu board.

use serde::{Deserialize, Serialize};

/// A single sellable item as supplied by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    /// Price in the minor currency unit (KRW has no subunit, so won).
    pub price: u64,
    #[serde(default)]
    pub description: String,
}

impl MenuItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Normalize a menu name for matching: all whitespace removed, lowercased.
///
/// "불고기 정식" and "불고기정식" compare equal; so do "Cold Noodles" and "coldnoodles".
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// The ordered list of items the kiosk currently knows about.
///
/// Order matters: recommendations move named items to the front and the first
/// item is what the menu screen features.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuBoard {
    items: Vec<MenuItem>,
}

impl MenuBoard {
    pub fn new(items: Vec<MenuItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn featured(&self) -> Option<&MenuItem> {
        self.items.first()
    }

    pub fn get(&self, id: &str) -> Option<&MenuItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Find an item by name after normalization. Empty names never match.
    pub fn find_by_name(&self, name: &str) -> Option<&MenuItem> {
        let needle = normalize_name(name);
        if needle.is_empty() {
            return None;
        }
        self.items
            .iter()
            .find(|item| normalize_name(&item.name) == needle)
    }

    /// Stable reorder: items whose names appear in `names` first, in their
    /// existing relative order, everything else after, also in order.
    ///
    /// Returns how many items were prioritized.
    pub fn prioritize<S: AsRef<str>>(&mut self, names: &[S]) -> usize {
        let wanted: Vec<String> = names
            .iter()
            .map(|n| normalize_name(n.as_ref()))
            .filter(|n| !n.is_empty())
            .collect();
        if wanted.is_empty() {
            return 0;
        }
        // sort_by_key is stable, so ties keep their current order.
        self.items
            .sort_by_key(|item| !wanted.contains(&normalize_name(&item.name)));
        self.items
            .iter()
            .take_while(|item| wanted.contains(&normalize_name(&item.name)))
            .count()
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.name.as_str()).collect()
    }
}

impl From<Vec<MenuItem>> for MenuBoard {
    fn from(items: Vec<MenuItem>) -> Self {
        Self::new(items)
    }
}
