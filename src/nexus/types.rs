use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a script create/update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptPayload<'a> {
    pub name: &'a str,
    #[serde(rename = "type")]
    pub script_type: &'a str,
    pub content: &'a str,
}

/// A script as listed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptDescriptor {
    pub name: String,
    #[serde(rename = "type", default)]
    pub script_type: String,
    #[serde(default)]
    pub content: String,
}

/// Raw body returned by running a script.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScriptRunResult {
    body: String,
}

impl ScriptRunResult {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// The `result` field of a JSON object body, or the raw body otherwise.
    pub fn result(&self) -> String {
        if !self.body.is_empty() {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&self.body) {
                if let Some(result) = map.get("result") {
                    return match result {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                }
            }
        }
        self.body.clone()
    }
}
