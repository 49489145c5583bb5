use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::PluginError;
use crate::plugin::{parse_input, Plugin, PluginFactory, PluginKind, PluginMetadata};

const NAME: &str = "hash_type";

static HEX_DIGEST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]+$").expect("valid regex"));

/// Digest name for a hex string length.
fn algorithm_for_len(len: usize) -> Option<&'static str> {
    match len {
        32 => Some("md5"),
        40 => Some("sha1"),
        64 => Some("sha256"),
        128 => Some("sha512"),
        _ => None,
    }
}

#[derive(Deserialize)]
struct Input {
    value: String,
}

/// Guesses the digest algorithm of a hex hash value.
pub struct HashTypeFactory;

impl PluginFactory for HashTypeFactory {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: NAME.to_string(),
            kind: PluginKind::Enrichment,
            version: "1.0.0".to_string(),
            author: None,
            description: Some("Identify the digest algorithm of a hex hash".to_string()),
            inputs: vec!["value".to_string()],
            outputs: vec!["hash_type".to_string()],
        }
    }

    fn create(&self, args: Value) -> Result<Box<dyn Plugin>, PluginError> {
        let input: Input = parse_input(NAME, args)?;
        Ok(Box::new(HashType { input }))
    }
}

struct HashType {
    input: Input,
}

#[async_trait]
impl Plugin for HashType {
    async fn run(&mut self) -> Result<Value, PluginError> {
        let value = self.input.value.trim();
        let hash_type = HEX_DIGEST
            .is_match(value)
            .then(|| algorithm_for_len(value.len()))
            .flatten();
        Ok(json!({ "value": value, "hash_type": hash_type }))
    }
}
