//! Script-backed plugins loaded from manifests.
//!
//! A [`ScriptPlugin`] runs its manifest's entry point as a child process:
//! the construction arguments are piped to stdin as JSON and stdout is
//! parsed as the JSON result. The child is killed if it outlives the
//! manifest's timeout.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use crate::error::PluginError;
use crate::manifest::{PluginManifest, Runtime};
use crate::plugin::{Plugin, PluginFactory, PluginMetadata};

/// Maximum stdout or stderr size captured per stream (10 MiB).
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Factory for one manifest-described plugin.
#[derive(Debug, Clone)]
pub struct ScriptPluginFactory {
    manifest: PluginManifest,
    manifest_path: PathBuf,
    entry_path: PathBuf,
}

impl ScriptPluginFactory {
    /// `manifest_path` is where the manifest was read from; the entry is
    /// resolved against its parent directory.
    pub fn new(manifest: PluginManifest, manifest_path: &Path) -> Self {
        let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
        let entry_path = base_dir.join(&manifest.entry);
        // The child runs with its own directory as cwd, so the entry path
        // must not depend on ours.
        let entry_path = std::path::absolute(&entry_path).unwrap_or(entry_path);
        Self {
            manifest,
            manifest_path: manifest_path.to_path_buf(),
            entry_path,
        }
    }

    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    pub fn entry_path(&self) -> &Path {
        &self.entry_path
    }
}

impl PluginFactory for ScriptPluginFactory {
    fn metadata(&self) -> PluginMetadata {
        self.manifest.metadata()
    }

    fn discriminator(&self) -> String {
        self.manifest_path.display().to_string()
    }

    /// Arguments must be a JSON object carrying every declared input.
    fn create(&self, args: Value) -> Result<Box<dyn Plugin>, PluginError> {
        let invalid = |reason: String| PluginError::NotAValidPlugin {
            name: self.manifest.name.clone(),
            reason,
        };

        let object = args
            .as_object()
            .ok_or_else(|| invalid("construction arguments must be a JSON object".into()))?;
        if let Some(missing) = self
            .manifest
            .inputs
            .iter()
            .find(|input| !object.contains_key(input.as_str()))
        {
            return Err(invalid(format!("missing input '{missing}'")));
        }

        Ok(Box::new(ScriptPlugin {
            name: self.manifest.name.clone(),
            runtime: self.manifest.runtime,
            entry_path: self.entry_path.clone(),
            timeout: Duration::from_secs(self.manifest.timeout_secs()),
            args,
        }))
    }
}

/// One constructed script plugin invocation.
pub struct ScriptPlugin {
    name: String,
    runtime: Runtime,
    entry_path: PathBuf,
    timeout: Duration,
    args: Value,
}

impl ScriptPlugin {
    fn command(&self) -> Command {
        match self.runtime {
            Runtime::Shell => {
                let mut cmd = Command::new("sh");
                cmd.arg(&self.entry_path);
                cmd
            }
            Runtime::Python => {
                let mut cmd = Command::new("python3");
                cmd.arg(&self.entry_path);
                cmd
            }
            Runtime::Binary => Command::new(&self.entry_path),
        }
    }

    fn failure(&self, reason: impl Into<String>) -> PluginError {
        PluginError::Execution {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Plugin for ScriptPlugin {
    async fn run(&mut self) -> Result<Value, PluginError> {
        let mut cmd = self.command();
        // `kill_on_drop(true)` reaps the child when it is dropped on timeout.
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = self.entry_path.parent() {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| self.failure(format!("failed to spawn entry point: {e}")))?;

        // Written from its own task so a script that never reads stdin
        // cannot stall the run past its timeout.
        let stdin_task = child.stdin.take().map(|mut stdin| {
            let input = serde_json::to_vec(&self.args).unwrap_or_default();
            tokio::spawn(async move {
                // The script may close stdin without reading it.
                let _ = stdin.write_all(&input).await;
            })
        });

        let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
        let stderr_task = tokio::spawn(read_stream(child.stderr.take()));

        let waited = tokio::time::timeout(self.timeout, child.wait()).await;
        if let Some(task) = stdin_task {
            task.abort();
        }
        let status = match waited {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => return Err(self.failure(format!("failed to wait for entry point: {e}"))),
            Err(_) => {
                return Err(self.failure(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(self.failure(format!(
                "exit code {}: {}",
                status.code().unwrap_or(-1),
                String::from_utf8_lossy(&stderr).trim()
            )));
        }

        serde_json::from_slice(trim_ascii(&stdout))
            .map_err(|e| self.failure(format!("stdout is not valid JSON: {e}")))
    }
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

/// Read an entire output stream into a byte buffer, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn write_plugin(dir: &Path, script: &str, inputs: &[&str]) -> ScriptPluginFactory {
        std::fs::write(dir.join("run.sh"), script).unwrap();
        let manifest: PluginManifest = serde_json::from_value(json!({
            "name": "script_test",
            "kind": "enrichment",
            "version": "1",
            "inputs": inputs,
            "runtime": "shell",
            "entry": "run.sh",
            "timeout_secs": 2
        }))
        .unwrap();
        ScriptPluginFactory::new(manifest, &dir.join("plugin.json"))
    }

    #[tokio::test]
    async fn script_receives_args_on_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let factory = write_plugin(dir.path(), "cat\n", &["value"]);

        let mut plugin = factory.create(json!({ "value": "8.8.8.8" })).unwrap();
        assert_eq!(plugin.run().await.unwrap(), json!({ "value": "8.8.8.8" }));
    }

    #[test]
    fn missing_declared_input_is_not_a_valid_plugin() {
        let dir = tempfile::tempdir().unwrap();
        let factory = write_plugin(dir.path(), "cat\n", &["value"]);

        assert_matches!(
            factory.create(json!({ "other": 1 })),
            Err(PluginError::NotAValidPlugin { .. })
        );
        assert_matches!(
            factory.create(json!("value")),
            Err(PluginError::NotAValidPlugin { .. })
        );
    }

    #[tokio::test]
    async fn non_zero_exit_is_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let factory = write_plugin(dir.path(), "echo boom >&2\nexit 3\n", &[]);

        let err = factory.create(json!({})).unwrap().run().await.unwrap_err();
        assert_matches!(err, PluginError::Execution { ref reason, .. } if reason.contains("boom"));
    }

    #[tokio::test]
    async fn non_json_stdout_is_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let factory = write_plugin(dir.path(), "echo not-json\n", &[]);

        let err = factory.create(json!({})).unwrap().run().await.unwrap_err();
        assert_matches!(err, PluginError::Execution { .. });
    }

    #[tokio::test]
    async fn hung_script_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let factory = write_plugin(dir.path(), "sleep 30\n", &[]);

        let start = std::time::Instant::now();
        let err = factory.create(json!({})).unwrap().run().await.unwrap_err();
        assert_matches!(err, PluginError::Execution { ref reason, .. } if reason.contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn timeout_holds_when_script_ignores_large_input() {
        let dir = tempfile::tempdir().unwrap();
        let factory = write_plugin(dir.path(), "sleep 6\necho '{}'\n", &["blob"]);
        let blob = "x".repeat(512 * 1024);

        let start = std::time::Instant::now();
        let err = factory
            .create(json!({ "blob": blob }))
            .unwrap()
            .run()
            .await
            .unwrap_err();
        assert_matches!(err, PluginError::Execution { ref reason, .. } if reason.contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn discriminator_is_manifest_path() {
        let dir = tempfile::tempdir().unwrap();
        let factory = write_plugin(dir.path(), "cat\n", &[]);
        assert!(factory.discriminator().ends_with("plugin.json"));
        assert_eq!(factory.entry_path(), dir.path().join("run.sh"));
    }
}
