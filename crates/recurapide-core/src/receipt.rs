//! Structured receipt data returned to callers.
//!
//! Wire keys keep the spelling the completion model is asked for
//! (`"Transaction Name"`, `"Additional Info"`, ...).

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

pub const KEY_TRANSACTIONS: &str = "transactions";
pub const KEY_TRANSACTION_NAME: &str = "Transaction Name";
pub const KEY_CATEGORY: &str = "Category";
pub const KEY_AMOUNT: &str = "Amount";
pub const KEY_DATE: &str = "Date";
pub const KEY_ADDITIONAL_INFO: &str = "Additional Info";

/// Keys every transaction must carry, in prompt order. `Place` and any other
/// extra keys are optional and pass through untouched.
pub const REQUIRED_TRANSACTION_KEYS: [&str; 5] = [
    KEY_TRANSACTION_NAME,
    KEY_CATEGORY,
    KEY_AMOUNT,
    KEY_DATE,
    KEY_ADDITIONAL_INFO,
];

/// Unparsed text returned by the completion model.
///
/// Untrusted until it has been through [`crate::schema::validate_completion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCompletion(String);

impl RawCompletion {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A single line item from a receipt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    #[serde(rename = "Transaction Name")]
    pub transaction_name: String,
    #[serde(rename = "Category")]
    pub category: Option<String>,
    #[serde(rename = "Amount")]
    pub amount: f64,
    #[serde(rename = "Date")]
    pub date: String,
    /// `None` when the model reported no additional information (JSON `null`).
    #[serde(rename = "Additional Info")]
    pub additional_info: Option<String>,
    /// Keys the model added beyond the required five (e.g. `"Place"`), verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Validated output of the structuring step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredResult {
    pub transactions: Vec<TransactionRecord>,
    /// Top-level scalar fields such as `"Total Amount"` or `"Card Type"`.
    #[serde(flatten)]
    pub summary_fields: BTreeMap<String, Value>,
}

impl StructuredResult {
    /// Sum of all transaction amounts.
    pub fn transactions_total(&self) -> f64 {
        self.transactions.iter().map(|t| t.amount).sum()
    }
}
