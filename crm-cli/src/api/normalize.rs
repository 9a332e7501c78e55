//! Response normalization
//!
//! The Web API decorates records with annotation keys (`field@OData...`),
//! reports lookups as `_field_value`, and flattens joined columns into
//! `alias.column` keys. Normalization drops the annotations, renames lookups
//! to their field name and folds dotted keys into nested objects.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{CrmError, Result};

const TOTAL_RECORD_COUNT: &str = "@Microsoft.Dynamics.CRM.totalrecordcount";
const LOOKUP_SUFFIX: &str = "_value";

/// A response with annotations at the top and normalized records under `value`
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NormalizedResponse {
    /// Top-level `@` keys, copied through unchanged
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
    pub value: Vec<Map<String, Value>>,
}

impl NormalizedResponse {
    pub fn records(&self) -> &[Map<String, Value>] {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Present when the query asked for `returntotalrecordcount`
    pub fn total_record_count(&self) -> Option<u64> {
        self.metadata.get(TOTAL_RECORD_COUNT).and_then(Value::as_u64)
    }

    pub fn into_value(self) -> Value {
        let mut object = self.metadata;
        object.insert(
            "value".to_string(),
            Value::Array(self.value.into_iter().map(Value::Object).collect()),
        );
        Value::Object(object)
    }

    /// Decode every record into a typed model
    pub fn records_as<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.value
            .iter()
            .map(|record| {
                serde_json::from_value(Value::Object(record.clone())).map_err(|e| {
                    let payload = Value::Object(record.clone()).to_string();
                    log::error!("Record validation failed: {} (payload: {})", e, payload);
                    CrmError::Validation {
                        message: e.to_string(),
                        payload,
                    }
                })
            })
            .collect()
    }
}

/// Normalize a decoded response body
///
/// Returns `None` when the body cannot be treated as a record listing at
/// all (not an object, `value` not an array, a record that is not an object).
pub fn normalize_response(raw: &Value) -> Option<NormalizedResponse> {
    let Some(object) = raw.as_object() else {
        log::debug!("No response data received");
        return None;
    };

    let metadata: Map<String, Value> = object
        .iter()
        .filter(|(key, _)| key.starts_with('@'))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let records = match object.get("value") {
        None => Vec::new(),
        Some(Value::Array(records)) => records.clone(),
        Some(other) => {
            log::error!("Error parsing response: 'value' is not an array: {}", other);
            return None;
        }
    };

    log::debug!("Number of records to process: {}", records.len());

    let mut value = Vec::with_capacity(records.len());
    for record in &records {
        match record.as_object() {
            Some(record) => value.push(normalize_record(record)),
            None => {
                log::error!("Error parsing response: record is not an object: {}", record);
                return None;
            }
        }
    }

    Some(NormalizedResponse { metadata, value })
}

/// Normalize a single record
///
/// A key that cannot be transformed is kept with its raw value.
pub fn normalize_record(record: &Map<String, Value>) -> Map<String, Value> {
    let mut parsed = Map::new();

    for (key, value) in record {
        if key.contains('@') {
            continue;
        }

        if let Err(reason) = apply_key(&mut parsed, key, value) {
            log::error!("Error parsing record field {}: {}", key, reason);
            parsed.insert(key.clone(), value.clone());
        }
    }

    parsed
}

fn apply_key(
    parsed: &mut Map<String, Value>,
    key: &str,
    value: &Value,
) -> std::result::Result<(), String> {
    if let Some(stripped) = key.strip_suffix(LOOKUP_SUFFIX) {
        let base = stripped.strip_prefix('_').unwrap_or(stripped);
        if base.is_empty() {
            return Err("lookup key has no field name".to_string());
        }
        parsed.insert(base.to_string(), value.clone());
        return Ok(());
    }

    if let Some((base, sub)) = key.split_once('.') {
        let nested = parsed
            .entry(base.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        return match nested {
            Value::Object(nested) => {
                nested.insert(sub.to_string(), value.clone());
                Ok(())
            }
            other => Err(format!("'{}' already holds a non-object value {}", base, other)),
        };
    }

    parsed.insert(key.to_string(), value.clone());
    Ok(())
}
