//! EventProperties - context fields every task payload carries

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Project / stage / service context plus free-form labels.
///
/// Any JSON object decodes into this; missing fields become empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventProperties {
    #[serde(default, deserialize_with = "null_as_default")]
    pub project: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stage: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub service: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusType {
    #[default]
    Succeeded,
    Errored,
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    #[default]
    Pass,
    Warning,
    Fail,
}

/// Shape of lifecycle payloads (`.started`, `.finished`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventData {
    #[serde(flatten)]
    pub properties: EventProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultType>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl EventProperties {
    /// Decodes the context fields out of an arbitrary payload.
    ///
    /// `null` decodes as empty properties; any other non-object is an error.
    pub fn from_payload(payload: &Value) -> Result<Self, serde_json::Error> {
        match payload {
            Value::Null => Ok(Self::default()),
            other => Self::deserialize(other),
        }
    }

    /// Writes these properties over the matching keys of `payload`.
    ///
    /// Other keys are left untouched. A `null` payload becomes an object.
    pub fn write_into(&self, payload: Value) -> Result<Value, serde_json::Error> {
        let mut object = match payload {
            Value::Null => Map::new(),
            Value::Object(object) => object,
            other => {
                return Err(<serde_json::Error as serde::de::Error>::invalid_type(
                    unexpected(&other),
                    &"a JSON object",
                ));
            }
        };
        if let Value::Object(fields) = serde_json::to_value(self)? {
            object.extend(fields);
        }
        Ok(Value::Object(object))
    }
}

/// Copies the context of `source` onto `new`.
///
/// project, stage and service always come from `source`. Labels start as the
/// source labels; a label of `new` is kept only where the source has no
/// non-empty value for that key.
pub fn merge_context(source: &EventProperties, new: EventProperties) -> EventProperties {
    let mut labels = source.labels.clone();
    for (key, value) in new.labels {
        let occupied = labels.get(&key).is_some_and(|v| !v.is_empty());
        if !occupied {
            labels.insert(key, value);
        }
    }
    EventProperties {
        project: source.project.clone(),
        stage: source.stage.clone(),
        service: source.service.clone(),
        labels,
    }
}

/// Applies `merge_context` to the context fields of a JSON payload.
pub fn merge_into_payload(
    source: &EventProperties,
    payload: Value,
) -> Result<Value, serde_json::Error> {
    let new = EventProperties::from_payload(&payload)?;
    merge_context(source, new).write_into(payload)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn unexpected(value: &Value) -> serde::de::Unexpected<'_> {
    use serde::de::Unexpected;
    match value {
        Value::Null => Unexpected::Unit,
        Value::Bool(b) => Unexpected::Bool(*b),
        Value::Number(_) => Unexpected::Other("number"),
        Value::String(s) => Unexpected::Str(s),
        Value::Array(_) => Unexpected::Seq,
        Value::Object(_) => Unexpected::Map,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(project: &str, labels: &[(&str, &str)]) -> EventProperties {
        EventProperties {
            project: project.to_string(),
            stage: "dev".to_string(),
            service: "carts".to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn source_labels_win() {
        let source = props("sockshop", &[("foo", "bar")]);
        let new = props("other", &[("foo", "foo"), ("bar", "foo")]);

        let merged = merge_context(&source, new);

        assert_eq!(merged.project, "sockshop");
        assert_eq!(merged.labels.len(), 2);
        assert_eq!(merged.labels["foo"], "bar");
        assert_eq!(merged.labels["bar"], "foo");
    }

    #[test]
    fn empty_source_label_can_be_filled() {
        let source = props("p", &[("foo", "")]);
        let new = props("p", &[("foo", "filled")]);

        let merged = merge_context(&source, new);
        assert_eq!(merged.labels["foo"], "filled");
    }

    #[test]
    fn decodes_null_and_partial_payloads() {
        assert_eq!(
            EventProperties::from_payload(&Value::Null).unwrap(),
            EventProperties::default()
        );

        let decoded =
            EventProperties::from_payload(&json!({"project": "p", "labels": null, "extra": 1}))
                .unwrap();
        assert_eq!(decoded.project, "p");
        assert!(decoded.labels.is_empty());
    }

    #[test]
    fn rejects_badly_typed_payloads() {
        assert!(EventProperties::from_payload(&json!("nope")).is_err());
        assert!(EventProperties::from_payload(&json!({"project": 3})).is_err());
        assert!(EventProperties::from_payload(&json!({"labels": ["a"]})).is_err());
    }

    #[test]
    fn merge_into_payload_keeps_other_fields() {
        let source = props("sockshop", &[("owner", "team-a")]);
        let payload = json!({"project": "ignored", "deployment": {"url": "http://x"}});

        let merged = merge_into_payload(&source, payload).unwrap();

        assert_eq!(merged["project"], "sockshop");
        assert_eq!(merged["stage"], "dev");
        assert_eq!(merged["labels"]["owner"], "team-a");
        assert_eq!(merged["deployment"]["url"], "http://x");
    }

    #[test]
    fn event_data_serializes_lowercase_enums() {
        let data = EventData {
            properties: props("p", &[]),
            status: Some(StatusType::Errored),
            result: Some(ResultType::Fail),
            message: "boom".to_string(),
        };
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["status"], "errored");
        assert_eq!(value["result"], "fail");
        assert_eq!(value["project"], "p");
    }
}
