use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

/// Fallback category when neither sender identity nor merchant keywords
/// resolve anything.
pub const OTHERS: &str = "others";

#[derive(Error, Debug)]
pub enum CategoryError {
    #[error("failed to parse category table: {0}")]
    Parse(String),
}

/// Two-stage category lookup: sender address first (identity is stronger
/// evidence), merchant keywords second. Immutable after construction; built
/// once at startup and passed by reference into the normalizer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryTable {
    /// Lowercased sender address → category.
    #[serde(default)]
    senders: HashMap<String, String>,
    /// Ordered (keyword, category) pairs; first hit wins, so more specific
    /// keywords must come before their prefixes ("amazon pay" before "amazon").
    #[serde(default)]
    keywords: Vec<(String, String)>,
}

impl CategoryTable {
    pub fn new(senders: HashMap<String, String>, keywords: Vec<(String, String)>) -> Self {
        let senders = senders
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Self { senders, keywords }
    }

    pub fn from_toml(toml_content: &str) -> Result<Self, CategoryError> {
        let table: CategoryTable =
            toml::from_str(toml_content).map_err(|e| CategoryError::Parse(e.to_string()))?;
        Ok(Self::new(table.senders, table.keywords))
    }

    /// The mapping recovered from the original deployment's sender and
    /// keyword tables.
    pub fn builtin() -> Self {
        // Bank alert addresses deliberately stay out of this table: the bank
        // is the messenger, not the spend category. Only senders that imply
        // the merchant belong here.
        let senders = [
            ("no-reply@amazonpay.in", "shopping"),
            ("noreply@swiggy.in", "food"),
            ("no-reply@zomato.com", "food"),
            ("noreply@uber.com", "travel"),
        ]
        .into_iter()
        .map(|(a, c)| (a.to_string(), c.to_string()))
        .collect();

        let keywords = [
            ("amazon pay", "utilities"),
            ("mobile recharge", "utilities"),
            ("electricity", "utilities"),
            ("water bill", "utilities"),
            ("swiggy", "food"),
            ("zomato", "food"),
            ("restaurant", "food"),
            ("indian oil", "fuel"),
            ("hpcl", "fuel"),
            ("fuel", "fuel"),
            ("amazon", "shopping"),
            ("flipkart", "shopping"),
            ("myntra", "shopping"),
            ("ola", "travel"),
            ("uber", "travel"),
            ("irctc", "travel"),
            ("goibibo", "travel"),
            ("smallcase", "investments"),
            ("investment", "investments"),
        ]
        .into_iter()
        .map(|(k, c)| (k.to_string(), c.to_string()))
        .collect();

        Self { senders, keywords }
    }

    /// Resolve a category. Sender lookup is exact and case-insensitive;
    /// the keyword pass scans the merchant/counterparty text. This order is
    /// load-bearing: sender identity always wins.
    pub fn resolve(&self, sender_address: &str, merchant: &str) -> String {
        if let Some(cat) = self.senders.get(&sender_address.trim().to_lowercase()) {
            return cat.clone();
        }
        let merchant = merchant.to_lowercase();
        for (keyword, cat) in &self.keywords {
            if merchant.contains(keyword.as_str()) {
                return cat.clone();
            }
        }
        OTHERS.to_string()
    }
}
