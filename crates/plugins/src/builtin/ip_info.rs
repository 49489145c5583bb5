use std::net::IpAddr;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::PluginError;
use crate::plugin::{parse_input, Plugin, PluginFactory, PluginKind, PluginMetadata};

const NAME: &str = "ip_info";

#[derive(Deserialize)]
struct Input {
    value: String,
}

/// Classifies an IP address value.
pub struct IpInfoFactory;

impl PluginFactory for IpInfoFactory {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: NAME.to_string(),
            kind: PluginKind::Enrichment,
            version: "1.0.0".to_string(),
            author: None,
            description: Some("Classify an IPv4 or IPv6 address".to_string()),
            inputs: vec!["value".to_string()],
            outputs: vec![
                "version".to_string(),
                "is_private".to_string(),
                "is_loopback".to_string(),
                "is_multicast".to_string(),
            ],
        }
    }

    fn create(&self, args: Value) -> Result<Box<dyn Plugin>, PluginError> {
        let input: Input = parse_input(NAME, args)?;
        Ok(Box::new(IpInfo { input }))
    }
}

struct IpInfo {
    input: Input,
}

#[async_trait]
impl Plugin for IpInfo {
    async fn run(&mut self) -> Result<Value, PluginError> {
        let addr: IpAddr =
            self.input
                .value
                .trim()
                .parse()
                .map_err(|_| PluginError::Execution {
                    name: NAME.to_string(),
                    reason: format!("'{}' is not an IP address", self.input.value),
                })?;

        let (version, is_private) = match addr {
            IpAddr::V4(v4) => (4, v4.is_private() || v4.is_link_local()),
            // fc00::/7 unique local, fe80::/10 link local
            IpAddr::V6(v6) => {
                let first = v6.segments()[0];
                (6, (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80)
            }
        };

        Ok(json!({
            "value": addr.to_string(),
            "version": version,
            "is_private": is_private,
            "is_loopback": addr.is_loopback(),
            "is_multicast": addr.is_multicast(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    async fn run(value: &str) -> Result<Value, PluginError> {
        IpInfoFactory
            .create(json!({ "value": value }))
            .unwrap()
            .run()
            .await
    }

    #[tokio::test]
    async fn classifies_v4() {
        let out = run("10.1.2.3").await.unwrap();
        assert_eq!(out["version"], 4);
        assert_eq!(out["is_private"], true);
        assert_eq!(out["is_loopback"], false);

        let out = run("8.8.8.8").await.unwrap();
        assert_eq!(out["is_private"], false);
    }

    #[tokio::test]
    async fn classifies_v6() {
        let out = run("::1").await.unwrap();
        assert_eq!(out["version"], 6);
        assert_eq!(out["is_loopback"], true);

        let out = run("fd12:3456::1").await.unwrap();
        assert_eq!(out["is_private"], true);

        let out = run("ff02::1").await.unwrap();
        assert_eq!(out["is_multicast"], true);
    }

    #[tokio::test]
    async fn rejects_non_address() {
        assert_matches!(run("example.org").await, Err(PluginError::Execution { .. }));
    }
}
