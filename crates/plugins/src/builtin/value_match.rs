use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::PluginError;
use crate::plugin::{parse_input, Plugin, PluginFactory, PluginKind, PluginMetadata};

const NAME: &str = "value_match";

#[derive(Deserialize)]
struct Candidate {
    id: Value,
    value: String,
}

#[derive(Deserialize)]
struct Input {
    value: String,
    #[serde(default)]
    candidates: Vec<Candidate>,
}

/// Correlates a value against candidates, ignoring case and surrounding
/// whitespace.
pub struct ValueMatchFactory;

impl PluginFactory for ValueMatchFactory {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: NAME.to_string(),
            kind: PluginKind::Correlation,
            version: "1.0.0".to_string(),
            author: None,
            description: Some("Match a value against candidate values".to_string()),
            inputs: vec!["value".to_string(), "candidates".to_string()],
            outputs: vec!["matches".to_string()],
        }
    }

    fn create(&self, args: Value) -> Result<Box<dyn Plugin>, PluginError> {
        let input: Input = parse_input(NAME, args)?;
        Ok(Box::new(ValueMatch { input }))
    }
}

struct ValueMatch {
    input: Input,
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

#[async_trait]
impl Plugin for ValueMatch {
    async fn run(&mut self) -> Result<Value, PluginError> {
        let needle = normalize(&self.input.value);
        let matches: Vec<&Value> = self
            .input
            .candidates
            .iter()
            .filter(|c| normalize(&c.value) == needle)
            .map(|c| &c.id)
            .collect();
        Ok(json!({ "matches": matches }))
    }
}
