use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Serialisable description of a filter.
///
/// `id` and `type` usually match; composite presets carry their own id with
/// type `root`. Older configs may omit `type`, in which case `id` names the
/// kind. Unknown params are ignored by every factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Instance identifier.
    pub id: String,
    /// Filter kind.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    /// Kind-specific parameters.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

impl FilterConfig {
    /// Config of the given kind whose id equals its kind.
    pub fn new(kind: impl Into<String>) -> Self {
        let kind = kind.into();
        Self {
            id: kind.clone(),
            kind,
            params: Map::new(),
        }
    }

    /// Replace the instance id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set a parameter.
    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Kind used for dispatch, falling back to the id for legacy configs.
    pub fn resolved_kind(&self) -> &str {
        if self.kind.is_empty() {
            &self.id
        } else {
            &self.kind
        }
    }

    /// Raw parameter value.
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Parameter as an unsigned integer; fractional numbers are truncated.
    pub fn u32_param(&self, key: &str) -> Option<u32> {
        let value = self.param(key)?;
        value
            .as_u64()
            .or_else(|| value.as_f64().filter(|n| *n >= 0.0).map(|n| n as u64))
            .and_then(|n| u32::try_from(n).ok())
    }

    /// Parameter as a float.
    pub fn f64_param(&self, key: &str) -> Option<f64> {
        self.param(key)?.as_f64()
    }

    /// Parameter as a bool.
    pub fn bool_param(&self, key: &str) -> Option<bool> {
        self.param(key)?.as_bool()
    }

    /// Parameter as a string.
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.param(key)?.as_str()
    }

    /// Parameter as an array; a scalar counts as a one-element array.
    pub fn list_param(&self, key: &str) -> Vec<&Value> {
        match self.param(key) {
            Some(Value::Array(values)) => values.iter().collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(value) => vec![value],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_config_dispatches_on_id() -> anyhow::Result<()> {
        let config: FilterConfig = serde_json::from_value(json!({"id": "owned"}))?;
        assert_eq!(config.resolved_kind(), "owned");
        assert!(config.params.is_empty());
        Ok(())
    }

    #[test]
    fn serializes_type_field() -> anyhow::Result<()> {
        let config = FilterConfig::new("grade").with_param("min", 2);
        assert_eq!(
            serde_json::to_value(&config)?,
            json!({"id": "grade", "type": "grade", "params": {"min": 2}})
        );
        Ok(())
    }

    #[test]
    fn typed_param_accessors() {
        let config = FilterConfig::new("level")
            .with_param("min", 10.7)
            .with_param("max", -3)
            .with_param("values", "epic");
        assert_eq!(config.u32_param("min"), Some(10));
        assert_eq!(config.u32_param("max"), None);
        assert_eq!(config.list_param("values"), vec![&json!("epic")]);
        assert!(config.list_param("missing").is_empty());
    }
}
