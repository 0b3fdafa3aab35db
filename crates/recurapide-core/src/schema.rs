//! Receipt schema enforcement for completion model output.
//!
//! This is the only path from model text to a [`StructuredResult`]. Output is
//! parsed as-is: a fenced or otherwise decorated answer is malformed, not repaired.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::PipelineError;
use crate::receipt::{
    KEY_ADDITIONAL_INFO, KEY_AMOUNT, KEY_CATEGORY, KEY_DATE, KEY_TRANSACTION_NAME,
    KEY_TRANSACTIONS, REQUIRED_TRANSACTION_KEYS, RawCompletion, StructuredResult,
    TransactionRecord,
};

/// Parse and check a raw completion against the receipt schema.
pub fn validate_completion(raw: &RawCompletion) -> Result<StructuredResult, PipelineError> {
    let value: Value = serde_json::from_str(raw.as_str())?;
    validate_value(value)
}

/// Check an already-parsed JSON value against the receipt schema.
pub fn validate_value(value: Value) -> Result<StructuredResult, PipelineError> {
    let mut root = match value {
        Value::Object(map) => map,
        other => {
            return Err(violation(format!(
                "top level must be an object, got {}",
                type_name(&other)
            )));
        }
    };

    let transactions = match root.remove(KEY_TRANSACTIONS) {
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(violation(format!(
                "\"{KEY_TRANSACTIONS}\" must be an array, got {}",
                type_name(&other)
            )));
        }
        None => return Err(violation(format!("missing \"{KEY_TRANSACTIONS}\" key"))),
    };

    let transactions = transactions
        .into_iter()
        .enumerate()
        .map(|(i, item)| validate_transaction(i, item))
        .collect::<Result<Vec<_>, _>>()?;

    let mut summary_fields = BTreeMap::new();
    for (key, value) in root {
        if !is_scalar(&value) {
            return Err(violation(format!(
                "summary field \"{key}\" must be a scalar, got {}",
                type_name(&value)
            )));
        }
        summary_fields.insert(key, value);
    }

    Ok(StructuredResult {
        transactions,
        summary_fields,
    })
}

fn validate_transaction(index: usize, item: Value) -> Result<TransactionRecord, PipelineError> {
    let mut fields = match item {
        Value::Object(map) => map,
        other => {
            return Err(violation(format!(
                "transactions[{index}] must be an object, got {}",
                type_name(&other)
            )));
        }
    };

    if let Some(missing) = REQUIRED_TRANSACTION_KEYS
        .iter()
        .find(|key| !fields.contains_key(**key))
    {
        return Err(violation(format!(
            "transactions[{index}] is missing \"{missing}\""
        )));
    }

    let transaction_name = take_string(&mut fields, index, KEY_TRANSACTION_NAME)?;
    let category = take_nullable_string(&mut fields, index, KEY_CATEGORY)?;
    let amount = take_number(&mut fields, index, KEY_AMOUNT)?;
    let date = take_string(&mut fields, index, KEY_DATE)?;
    let additional_info = take_nullable_string(&mut fields, index, KEY_ADDITIONAL_INFO)?;

    Ok(TransactionRecord {
        transaction_name,
        category,
        amount,
        date,
        additional_info,
        extra: fields.into_iter().collect(),
    })
}

fn take_string(
    fields: &mut Map<String, Value>,
    index: usize,
    key: &str,
) -> Result<String, PipelineError> {
    match fields.remove(key) {
        Some(Value::String(s)) => Ok(s),
        other => Err(wrong_type(index, key, "a string", other.as_ref())),
    }
}

fn take_nullable_string(
    fields: &mut Map<String, Value>,
    index: usize,
    key: &str,
) -> Result<Option<String>, PipelineError> {
    match fields.remove(key) {
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Null) => Ok(None),
        other => Err(wrong_type(index, key, "a string or null", other.as_ref())),
    }
}

fn take_number(
    fields: &mut Map<String, Value>,
    index: usize,
    key: &str,
) -> Result<f64, PipelineError> {
    match fields.remove(key) {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| violation(format!("transactions[{index}].\"{key}\" is out of range"))),
        other => Err(wrong_type(index, key, "a number", other.as_ref())),
    }
}

fn wrong_type(index: usize, key: &str, expected: &str, got: Option<&Value>) -> PipelineError {
    let got = got.map(type_name).unwrap_or("nothing");
    violation(format!(
        "transactions[{index}].\"{key}\" must be {expected}, got {got}"
    ))
}

fn violation(detail: String) -> PipelineError {
    tracing::debug!(%detail, "schema violation");
    PipelineError::SchemaViolation(detail)
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
