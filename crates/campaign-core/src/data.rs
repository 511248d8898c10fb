//! Campaign data: the flat field-name to value mapping a template renders.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors produced when decoding campaign data from JSON.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("invalid campaign data JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("campaign data must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Field values for one render cycle.
///
/// Replaced wholesale on every edit; never mutated while a template
/// definition is applied with it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CampaignData(BTreeMap<String, Value>);

impl CampaignData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a JSON object into campaign data.
    pub fn from_json_str(json: &str) -> Result<Self, DataError> {
        let value: Value = serde_json::from_str(json)?;
        match value {
            Value::Object(map) => Ok(Self(map.into_iter().collect())),
            other => Err(DataError::NotAnObject(json_type_name(&other))),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Field names in sorted order.
    pub fn fields(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.0.clone().into_iter().collect())
    }

    /// Render the generated data module served as `virtual:campaign-data`.
    pub fn to_module_source(&self) -> String {
        let body = serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| "{}".to_string());
        format!("export const campaignData = {body};\n")
    }
}

impl FromIterator<(String, Value)> for CampaignData {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for CampaignData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.fields().join(", ");
        write!(f, "{{{fields}}}")
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
