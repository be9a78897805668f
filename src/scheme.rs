use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{NotifyError, Result};

pub const ATTR_CHANNEL_ID: &str = "id";
pub const ATTR_CHANNEL: &str = "channel";
pub const ATTR_EXPIRY: &str = "expiry";
pub const ATTR_NAME: &str = "name";

/// One device subscription, keyed by its channel id.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Registration {
    pub id: String,
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

pub type Registrations = BTreeMap<String, Registration>;

impl Registration {
    /// Checks a request body against the subscription schema. Every violation
    /// is reported, joined into one human readable message.
    pub fn validate(data: &Value) -> Result<Self> {
        let obj = data
            .as_object()
            .ok_or_else(|| NotifyError::Validation("expected a dictionary".to_string()))?;

        let mut errors = Vec::new();
        let mut id = None;
        let mut channel = None;
        let mut expiry = None;
        let mut name = None;

        for (key, value) in obj {
            match key.as_str() {
                ATTR_CHANNEL_ID => match value.as_str() {
                    Some(s) => id = Some(s.to_string()),
                    None => errors.push(value_error("expected str", key)),
                },
                ATTR_CHANNEL => match value.as_str() {
                    Some(s) if is_valid_url(s) => channel = Some(s.to_string()),
                    Some(_) => errors.push(value_error("invalid url", key)),
                    None => errors.push(value_error("expected str", key)),
                },
                ATTR_EXPIRY => match value {
                    Value::Null => {}
                    Value::Number(n) => match (n.as_u64(), n.as_i64()) {
                        (Some(v), _) => expiry = Some(v),
                        (None, Some(_)) => errors.push(value_error("value must be at least 0", key)),
                        (None, None) => errors.push(value_error("expected int", key)),
                    },
                    _ => errors.push(value_error("expected int", key)),
                },
                ATTR_NAME => match value.as_str() {
                    Some(s) => name = Some(s.to_string()),
                    None => errors.push(value_error("expected str", key)),
                },
                _ => errors.push(format!("extra keys not allowed @ data['{}']", key)),
            }
        }

        for required in [ATTR_CHANNEL_ID, ATTR_CHANNEL] {
            if !obj.contains_key(required) {
                errors.push(format!("required key not provided @ data['{}']", required));
            }
        }

        match (id, channel) {
            (Some(id), Some(channel)) if errors.is_empty() => Ok(Registration {
                id,
                channel,
                expiry,
                name,
            }),
            _ => Err(NotifyError::Validation(errors.join(". "))),
        }
    }
}

fn value_error(what: &str, key: &str) -> String {
    format!("{} for dictionary value @ data['{}']", what, key)
}

fn is_valid_url(s: &str) -> bool {
    match url::Url::parse(s) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some(),
        Err(_) => false,
    }
}
